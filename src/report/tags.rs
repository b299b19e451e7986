use super::{organic, Frequency};
use crate::model::{Product, TagReportRow};

/// Every `#tag` across organic products, most used first. No cap.
pub fn tag_report(products: &[Product]) -> Vec<TagReportRow> {
    let mut freq = Frequency::default();

    for (idx, product) in organic(products).enumerate() {
        for tag in product.tags.split_whitespace().filter(|t| t.starts_with('#')) {
            freq.add(tag, idx);
        }
    }

    freq.ranked()
        .into_iter()
        .enumerate()
        .map(|(i, e)| TagReportRow {
            rank: i as u32 + 1,
            tag: e.term,
            usage_count: e.count,
        })
        .collect()
}
