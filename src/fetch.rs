use std::sync::LazyLock;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, REFERER};
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use tracing::{info, warn};

use crate::config;

static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static NEXT_DATA_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(config::NEXT_DATA_SELECTOR).unwrap());

/// Raw search page plus the request facts worth logging.
pub struct SearchPage {
    pub url: String,
    pub html: String,
    pub status: StatusCode,
    pub latency_ms: u128,
}

pub fn build_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(REFERER, HeaderValue::from_static(config::REFERER));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(config::ACCEPT_LANGUAGE));

    Client::builder()
        .user_agent(config::USER_AGENT)
        .default_headers(headers)
        .timeout(Duration::from_secs(config::REQUEST_TIMEOUT_SECS))
        .build()
        .context("Failed to build HTTP client")
}

/// Fetch the mobile search page for `keyword`, waiting a random delay
/// first and retrying rate limits and server errors with backoff.
pub async fn fetch_search_page(client: &Client, keyword: &str) -> Result<SearchPage> {
    let delay = random_delay();
    info!("Waiting {:.2}s before request", delay.as_secs_f64());
    tokio::time::sleep(delay).await;

    for attempt in 0..=config::MAX_RETRIES {
        let page = fetch_once(client, keyword).await?;
        let status = page.status;

        let should_retry = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
        if !should_retry {
            if !status.is_success() {
                bail!("Search request for {:?} failed with HTTP {}", keyword, page.status);
            }
            if is_captcha(&page.html) {
                bail!("Captcha page served for {:?}; try again later", keyword);
            }
            info!("Fetched {} ({} bytes, {}ms)", page.url, page.html.len(), page.latency_ms);
            return Ok(page);
        }
        if attempt == config::MAX_RETRIES {
            break;
        }

        let backoff = Duration::from_millis(config::BASE_BACKOFF_MS * 2u64.pow(attempt));
        warn!(
            "HTTP {} for {:?} (attempt {}/{}), backing off {:.1}s",
            page.status,
            keyword,
            attempt + 1,
            config::MAX_RETRIES,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }

    Err(anyhow!("Gave up on {:?} after {} retries", keyword, config::MAX_RETRIES))
}

async fn fetch_once(client: &Client, keyword: &str) -> Result<SearchPage> {
    let start = Instant::now();
    let response = client
        .get(config::SEARCH_URL)
        .query(&[("query", keyword), ("productSet", "total")])
        .send()
        .await
        .with_context(|| format!("Search request for {:?} failed", keyword))?;

    let url = response.url().to_string();
    let status = response.status();
    let html = response.text().await.context("Failed to read search page body")?;

    Ok(SearchPage {
        url,
        html,
        status,
        latency_ms: start.elapsed().as_millis(),
    })
}

fn random_delay() -> Duration {
    let secs = rand::rng().random_range(config::MIN_REQUEST_DELAY_SECS..=config::MAX_REQUEST_DELAY_SECS);
    Duration::from_secs_f64(secs)
}

pub fn is_captcha(html: &str) -> bool {
    if config::CAPTCHA_MARKERS.iter().any(|m| html.contains(m)) {
        return true;
    }
    let doc = Html::parse_document(html);
    doc.select(&TITLE_SEL)
        .next()
        .map(|t| t.text().collect::<String>().to_lowercase().contains("captcha"))
        .unwrap_or(false)
}

/// Text of the `__NEXT_DATA__` script, if the page has one.
pub fn extract_next_data(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let text: String = doc.select(&NEXT_DATA_SEL).next()?.text().collect();
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Payload from a saved file: HTML pages are searched for the script,
/// anything that already looks like JSON is returned as-is.
pub fn payload_from_saved(contents: &str) -> Option<String> {
    let trimmed = contents.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Some(trimmed.to_string());
    }
    let payload = extract_next_data(contents);
    if payload.is_none() {
        warn!("__NEXT_DATA__ script not found in page");
    }
    payload
}
