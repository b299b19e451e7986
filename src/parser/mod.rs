pub mod locate;
pub mod normalize;
pub mod tags;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::model::Product;
use crate::nlp::Analyzer;
use normalize::{normalize_item, Normalized};

/// Per-payload counters, for logging and the CLI summary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractStats {
    pub raw_items: usize,
    pub ads: usize,
    pub rejected: usize,
    pub accepted: usize,
}

/// Parse a `__NEXT_DATA__` payload into organic Products.
/// Malformed JSON and unknown layouts both yield an empty list.
pub fn extract_products(json: &str, max_items: usize, analyzer: &dyn Analyzer) -> Vec<Product> {
    extract_with_stats(json, max_items, analyzer).0
}

pub fn extract_with_stats(
    json: &str,
    max_items: usize,
    analyzer: &dyn Analyzer,
) -> (Vec<Product>, ExtractStats) {
    let doc: Value = match serde_json::from_str(json) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Failed to parse payload JSON: {}", e);
            return (Vec::new(), ExtractStats::default());
        }
    };
    let (products, stats) = normalize_items(locate::locate_items(&doc), max_items, analyzer);
    if products.is_empty() {
        info!("No products found in payload");
    }
    (products, stats)
}

/// Single pass over the raw list. Ads and title-less items take no rank
/// and do not count toward `max_items`; once the cap is reached the rest
/// of the list is left untouched.
pub fn normalize_items(
    items: &[Value],
    max_items: usize,
    analyzer: &dyn Analyzer,
) -> (Vec<Product>, ExtractStats) {
    let mut products: Vec<Product> = Vec::with_capacity(max_items.min(items.len()));
    let mut stats = ExtractStats {
        raw_items: items.len(),
        ..Default::default()
    };

    for (i, raw) in items.iter().enumerate() {
        if products.len() >= max_items {
            break;
        }
        let rank = products.len() as u32 + 1;
        match normalize_item(raw, rank, analyzer) {
            Normalized::Organic(product) => {
                debug!("[Organic #{}] {} / {} / {}", rank, product.title, product.price, product.tags);
                products.push(product);
            }
            Normalized::Ad => stats.ads += 1,
            Normalized::MissingTitle => {
                debug!("Skipping item {} without a title", i);
                stats.rejected += 1;
            }
        }
    }

    stats.accepted = products.len();
    info!(
        "Extracted {} organic products ({} raw, {} ads skipped, {} without title)",
        stats.accepted, stats.raw_items, stats.ads, stats.rejected
    );
    (products, stats)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::ScriptAnalyzer;
    use serde_json::json;

    fn payload(list: Value) -> String {
        json!({"props": {"pageProps": {"compositeProducts": {"list": list}}}}).to_string()
    }

    fn extract(list: Value, max_items: usize) -> Vec<Product> {
        extract_products(&payload(list), max_items, &ScriptAnalyzer::new())
    }

    #[test]
    fn ad_item_fully_excluded() {
        let products = extract(
            json!([
                {"title": "Blue Wool Coat", "price": 50000, "mallName": "ShopA"},
                {"title": "Red Coat", "price": 30000, "adId": "x1"},
            ]),
            20,
        );
        assert_eq!(products.len(), 1);
        let p = &products[0];
        assert_eq!(p.rank, 1);
        assert_eq!(p.title, "Blue Wool Coat");
        assert_eq!(p.price, 50000);
        assert!(!p.is_ad);
    }

    #[test]
    fn titleless_item_consumes_no_rank() {
        let products = extract(
            json!([
                {"price": 100},
                {"title": "First"},
                {"adId": "a", "title": "Ad"},
                {"title": "Second"},
            ]),
            20,
        );
        let ranks: Vec<(u32, &str)> = products.iter().map(|p| (p.rank, p.title.as_str())).collect();
        assert_eq!(ranks, vec![(1, "First"), (2, "Second")]);
    }

    #[test]
    fn cap_counts_organic_only() {
        let list: Vec<Value> = (0..10)
            .map(|i| {
                if i % 2 == 0 {
                    json!({"title": format!("Ad {}", i), "adcrUrl": "/ad"})
                } else {
                    json!({"title": format!("Item {}", i)})
                }
            })
            .collect();
        let products = extract(Value::Array(list), 3);
        assert_eq!(products.len(), 3);
        assert_eq!(products[2].title, "Item 5");
        assert!(products.iter().all(|p| !p.is_ad));
    }

    #[test]
    fn ranks_dense_from_one() {
        let list: Vec<Value> = (0..30)
            .map(|i| match i % 3 {
                0 => json!({"title": format!("T{}", i)}),
                1 => json!({"adId": i}),
                _ => json!({"productName": ""}),
            })
            .collect();
        let products = extract(Value::Array(list), 20);
        assert_eq!(products.len(), 10);
        for (i, p) in products.iter().enumerate() {
            assert_eq!(p.rank as usize, i + 1);
        }
    }

    #[test]
    fn zero_cap_is_empty() {
        assert!(extract(json!([{"title": "A"}]), 0).is_empty());
    }

    #[test]
    fn malformed_json_is_empty() {
        let analyzer = ScriptAnalyzer::new();
        assert!(extract_products("{not json", 20, &analyzer).is_empty());
        assert!(extract_products("", 20, &analyzer).is_empty());
    }

    #[test]
    fn unknown_layout_is_empty() {
        let json = json!({"props": {"pageProps": {"somethingElse": []}}}).to_string();
        let (products, stats) = extract_with_stats(&json, 20, &ScriptAnalyzer::new());
        assert!(products.is_empty());
        assert_eq!(stats, ExtractStats::default());
    }

    #[test]
    fn stats_are_counted() {
        let (_, stats) = extract_with_stats(
            &payload(json!([{"title": "A"}, {"adId": "1"}, {}, {"title": "B"}])),
            20,
            &ScriptAnalyzer::new(),
        );
        assert_eq!(stats, ExtractStats { raw_items: 4, ads: 1, rejected: 1, accepted: 2 });
    }

    #[test]
    fn fixture_payload() {
        let json = std::fs::read_to_string("tests/fixtures/next_data.json").unwrap();
        let products = extract_products(&json, 20, &ScriptAnalyzer::new());
        assert_eq!(products.len(), 4);
        assert!(products.iter().all(|p| !p.is_ad));
        assert_eq!(products[0].title, "기모 부츠컷 슬랙스 겨울 여자 바지");
        assert_eq!(products[0].tags, "#겨울바지 #기모 #밴딩");
        assert_eq!(products[1].tags, "#밍크 #기모 #팬츠");
        assert_eq!(products[1].store_name, "Unknown");
        assert_eq!(products[2].url.as_str(), "https://smartstore.naver.com/pants/products/555");
        assert_eq!(products[2].price, 33000);
        assert_eq!(products[3].rank, 4);
        assert_eq!(products[3].tags, "#스판 #부츠컷");
    }
}
