pub mod keywords;
pub mod tags;

use std::collections::HashMap;

use crate::model::Product;

/// Products that count toward a report. Ads are dropped here even though
/// extraction already excludes them: report input may come from a CSV.
fn organic(products: &[Product]) -> impl Iterator<Item = &Product> {
    products.iter().filter(|p| !p.is_ad)
}

/// Occurrence counter that remembers first-seen order for tie-breaking.
#[derive(Debug, Default)]
struct Frequency {
    index: HashMap<String, usize>,
    entries: Vec<Entry>,
}

#[derive(Debug)]
struct Entry {
    term: String,
    count: u32,
    last_product: Option<usize>,
    products: u32,
}

impl Frequency {
    /// Count one occurrence of `term` in product number `product`.
    fn add(&mut self, term: &str, product: usize) {
        let idx = match self.index.get(term) {
            Some(&idx) => idx,
            None => {
                self.index.insert(term.to_string(), self.entries.len());
                self.entries.push(Entry {
                    term: term.to_string(),
                    count: 0,
                    last_product: None,
                    products: 0,
                });
                self.entries.len() - 1
            }
        };
        let entry = &mut self.entries[idx];
        entry.count += 1;
        // Products are fed in order, so a changed index is a new product.
        if entry.last_product != Some(product) {
            entry.last_product = Some(product);
            entry.products += 1;
        }
    }

    /// Entries by count descending; `sort_by` is stable, so equal counts
    /// keep first-seen order.
    fn ranked(mut self) -> Vec<Entry> {
        self.entries.sort_by(|a, b| b.count.cmp(&a.count));
        self.entries
    }
}
