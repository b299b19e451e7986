use std::collections::HashSet;

use tracing::warn;

use super::{organic, Frequency};
use crate::config::{KEYWORD_REPORT_LIMIT, STOPWORDS};
use crate::model::{KeywordReportRow, Product};
use crate::nlp::{Analyzer, PosTag};

const KEYWORD_POS: &[PosTag] = &[PosTag::CommonNoun, PosTag::ProperNoun, PosTag::ForeignScript];

/// Read-only stopword set shared by every report run.
#[derive(Debug, Clone)]
pub struct Stopwords(HashSet<String>);

impl Stopwords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Stopwords(words.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, word: &str) -> bool {
        self.0.contains(word)
    }
}

impl Default for Stopwords {
    fn default() -> Self {
        Stopwords::new(STOPWORDS.iter().copied())
    }
}

/// Keywords of one title, in title order.
pub fn title_keywords(title: &str, analyzer: &dyn Analyzer, stopwords: &Stopwords) -> anyhow::Result<Vec<String>> {
    Ok(analyzer
        .tokenize(title)?
        .into_iter()
        .filter(|t| KEYWORD_POS.contains(&t.tag) && t.char_len() > 1 && !stopwords.contains(&t.form))
        .map(|t| t.form)
        .collect())
}

/// Top keywords across organic product titles.
pub fn keyword_report(
    products: &[Product],
    analyzer: &dyn Analyzer,
    stopwords: &Stopwords,
) -> Vec<KeywordReportRow> {
    let mut freq = Frequency::default();

    for (idx, product) in organic(products).enumerate() {
        match title_keywords(&product.title, analyzer, stopwords) {
            Ok(words) => {
                for word in &words {
                    freq.add(word, idx);
                }
            }
            Err(e) => warn!("Skipping title {:?} in keyword report: {}", product.title, e),
        }
    }

    freq.ranked()
        .into_iter()
        .take(KEYWORD_REPORT_LIMIT)
        .enumerate()
        .map(|(i, e)| KeywordReportRow {
            rank: i as u32 + 1,
            keyword: e.term,
            occurrence_count: e.count,
            related_product_count: e.products,
        })
        .collect()
}
