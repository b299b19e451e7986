use serde_json::Value;
use url::Url;

use super::tags::derive_tags;
use crate::config::MOBILE_BASE;
use crate::model::Product;
use crate::nlp::Analyzer;

// Candidate keys per field, first match wins.
const WRAPPER_KEY: &str = "item";
const TITLE_KEYS: &[&str] = &["productTitle", "productName", "title"];
const PRICE_KEYS: &[&str] = &["lowPrice", "price"];
const STORE_KEYS: &[&str] = &["mallName"];
const AD_KEYS: &[&str] = &["adId", "adcrUrl"];
const AD_URL_KEYS: &[&str] = &["adcrUrl"];
const MALL_URL_KEYS: &[&str] = &["mallProductUrl"];
const ID_KEYS: &[&str] = &["id"];

const UNKNOWN_STORE: &str = "Unknown";

/// Outcome of normalizing one raw list element.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Organic(Product),
    Ad,
    MissingTitle,
}

/// Turn one raw list element into a Product. `rank` is only used when the
/// element is accepted as an organic listing.
pub fn normalize_item(raw: &Value, rank: u32, analyzer: &dyn Analyzer) -> Normalized {
    let item = unwrap_item(raw);

    if is_ad(item) {
        return Normalized::Ad;
    }

    let title = match first_text(item, TITLE_KEYS) {
        Some(t) => t,
        None => return Normalized::MissingTitle,
    };

    let tags = derive_tags(item, &title, analyzer);

    Normalized::Organic(Product {
        rank,
        price: first_price(item, PRICE_KEYS).unwrap_or(0),
        store_name: first_text(item, STORE_KEYS).unwrap_or_else(|| UNKNOWN_STORE.to_string()),
        url: resolve_url(item),
        is_ad: false,
        tags,
        title,
    })
}

/// List elements are usually `{ "item": { ... } }`; some layouts inline the fields.
fn unwrap_item(raw: &Value) -> &Value {
    raw.get(WRAPPER_KEY).filter(|v| v.is_object()).unwrap_or(raw)
}

pub fn is_ad(item: &Value) -> bool {
    AD_KEYS.iter().any(|k| item.get(*k).is_some_and(is_truthy))
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn first_text(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        item.get(*k)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// First key holding a non-zero price. Zero counts as missing so a `0`
/// low price falls through to the list price.
fn first_price(item: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter()
        .find_map(|k| item.get(*k).and_then(coerce_price).filter(|p| *p > 0))
}

fn coerce_price(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|i| i.max(0) as u64))
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.max(0.0) as u64)),
        Value::String(s) => {
            let digits: String = s.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
            digits
                .parse::<u64>()
                .ok()
                .or_else(|| digits.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.max(0.0) as u64))
        }
        _ => None,
    }
}

/// Ad redirect → mall product page → synthesized mobile product page.
fn resolve_url(item: &Value) -> Url {
    if let Some(ad_url) = first_text(item, AD_URL_KEYS) {
        let resolved = if ad_url.starts_with("http") {
            Url::parse(&ad_url)
        } else {
            MOBILE_BASE.join(&ad_url)
        };
        if let Ok(url) = resolved {
            return url;
        }
    }

    if let Some(mall_url) = first_text(item, MALL_URL_KEYS) {
        if let Ok(url) = Url::parse(&mall_url) {
            if matches!(url.scheme(), "http" | "https") {
                return url;
            }
        }
    }

    let id = ID_KEYS
        .iter()
        .find_map(|k| match item.get(*k) {
            Some(Value::String(s)) => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_default();

    MOBILE_BASE
        .join(&format!("/product/{}", id))
        .unwrap_or_else(|_| MOBILE_BASE.clone())
}
