use serde::{Deserialize, Serialize};
use url::Url;

/// One organic search listing. Field order is the product CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub rank: u32,
    pub title: String,
    pub price: u64,
    pub store_name: String,
    pub tags: String,
    pub url: Url,
    pub is_ad: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordReportRow {
    pub rank: u32,
    pub keyword: String,
    pub occurrence_count: u32,
    pub related_product_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagReportRow {
    pub rank: u32,
    pub tag: String,
    pub usage_count: u32,
}
