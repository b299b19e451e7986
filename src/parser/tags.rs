use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::nlp::{Analyzer, PosTag};

/// Item fields that may carry seller-declared tags, in harvest order.
const TAG_FIELDS: &[&str] = &["tags", "keywords", "hashTags", "openTags", "attribute"];
const TAG_DELIMITER: char = '|';
const NAME_KEYS: &[&str] = &["tagName", "name"];
const NLP_TAG_POS: &[PosTag] = &[
    PosTag::CommonNoun,
    PosTag::ProperNoun,
    PosTag::ForeignScript,
    PosTag::Root,
];

/// The shapes a tag-like field has been seen in.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TagField {
    Names(Vec<String>),
    Named(Vec<NamedTag>),
    Delimited(String),
    Plain(Vec<Value>),
}

#[derive(Debug, Deserialize)]
struct NamedTag {
    #[serde(rename = "tagName", alias = "name")]
    name: String,
}

impl TagField {
    fn into_candidates(self) -> Vec<String> {
        match self {
            TagField::Names(names) => names,
            TagField::Named(tags) => tags.into_iter().map(|t| t.name).collect(),
            TagField::Delimited(s) => s.split(TAG_DELIMITER).map(str::to_string).collect(),
            TagField::Plain(values) => values.iter().filter_map(plain_candidate).collect(),
        }
    }
}

fn plain_candidate(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => NAME_KEYS
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

/// Build the `#a #b` tag string for one item: seller tags from every
/// tag-like field, or noun tokens of the title when the item has none.
pub fn derive_tags(item: &Value, title: &str, analyzer: &dyn Analyzer) -> String {
    let mut tags = harvest_json_tags(item);
    if tags.is_empty() {
        tags = nlp_tags(title, analyzer);
    }
    format_tags(&tags)
}

/// Union of cleaned candidates across all tag fields. Fields that decode
/// as none of the known shapes contribute nothing.
pub fn harvest_json_tags(item: &Value) -> Vec<String> {
    TAG_FIELDS
        .iter()
        .filter_map(|field| item.get(*field))
        .filter_map(|value| TagField::deserialize(value).ok())
        .flat_map(TagField::into_candidates)
        .filter_map(|c| clean_tag(&c))
        .collect()
}

pub fn nlp_tags(title: &str, analyzer: &dyn Analyzer) -> Vec<String> {
    match analyzer.tokenize(title) {
        Ok(tokens) => tokens
            .into_iter()
            .filter(|t| NLP_TAG_POS.contains(&t.tag) && t.char_len() > 1)
            .map(|t| t.form)
            .collect(),
        Err(e) => {
            warn!("NLP tag fallback failed for {:?}: {}", title, e);
            Vec::new()
        }
    }
}

/// Trim, drop leading `#` and inner whitespace so the tag survives a
/// whitespace split downstream.
fn clean_tag(raw: &str) -> Option<String> {
    let tag: String = raw.trim().trim_start_matches('#').split_whitespace().collect();
    if tag.is_empty() {
        None
    } else {
        Some(tag)
    }
}

/// Deduplicate in first-seen order and join as `#a #b`.
pub fn format_tags(tags: &[String]) -> String {
    let mut seen = HashSet::new();
    tags.iter()
        .filter(|t| seen.insert(t.as_str()))
        .map(|t| format!("#{}", t))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::ScriptAnalyzer;
    use serde_json::json;

    #[test]
    fn seller_tags_skip_nlp() {
        let item = json!({"tags": ["#wool", "#winter"]});
        let tags = derive_tags(&item, "Wool Coat", &ScriptAnalyzer::new());
        assert_eq!(tags, "#wool #winter");
    }

    #[test]
    fn named_object_tags() {
        let item = json!({"tags": [{"tagName": "기모"}, {"tagName": "밴딩"}]});
        assert_eq!(harvest_json_tags(&item), vec!["기모", "밴딩"]);
    }

    #[test]
    fn delimited_attribute() {
        let item = json!({"attribute": "기모| 밴딩 ||하이웨스트"});
        assert_eq!(harvest_json_tags(&item), vec!["기모", "밴딩", "하이웨스트"]);
    }

    #[test]
    fn mixed_array_keeps_strings_and_names() {
        let item = json!({"keywords": ["슬랙스", 3, null, {"name": "부츠컷"}, {"id": 1}, "  "]});
        assert_eq!(harvest_json_tags(&item), vec!["슬랙스", "부츠컷"]);
    }

    #[test]
    fn union_across_fields_in_order() {
        let item = json!({
            "attribute": "밴딩",
            "tags": ["기모"],
            "hashTags": ["겨울바지"],
            "openTags": ["기모"],
        });
        let tags = derive_tags(&item, "ignored", &ScriptAnalyzer::new());
        assert_eq!(tags, "#기모 #겨울바지 #밴딩");
    }

    #[test]
    fn undecodable_fields_are_ignored() {
        let item = json!({"tags": 42, "keywords": {"a": "b"}, "hashTags": true});
        assert!(harvest_json_tags(&item).is_empty());
    }

    #[test]
    fn inner_whitespace_removed() {
        let item = json!({"tags": ["겨울 코트", "# 울"]});
        assert_eq!(harvest_json_tags(&item), vec!["겨울코트", "울"]);
    }

    #[test]
    fn nlp_fallback_keeps_nouns_and_roots() {
        let item = json!({"tags": []});
        let tags = derive_tags(&item, "따뜻한 기모 바지 1+1 A", &ScriptAnalyzer::new());
        assert_eq!(tags, "#따뜻 #기모 #바지");
    }

    #[test]
    fn nlp_fallback_drops_particles_and_predicates() {
        let tags = derive_tags(&json!({}), "예쁜 코트를 입어요", &ScriptAnalyzer::new());
        assert_eq!(tags, "#코트");
        let tags = derive_tags(&json!({}), "따뜻하고 가벼운 패딩을 추천", &ScriptAnalyzer::new());
        assert_eq!(tags, "#따뜻 #패딩 #추천");
    }

    #[test]
    fn nlp_fallback_dedups() {
        let tags = derive_tags(&json!({}), "Wool Coat Wool", &ScriptAnalyzer::new());
        assert_eq!(tags, "#Wool #Coat");
    }

    struct FailingAnalyzer;

    impl Analyzer for FailingAnalyzer {
        fn tokenize(&self, _text: &str) -> anyhow::Result<Vec<crate::nlp::Token>> {
            anyhow::bail!("model not loaded")
        }
    }

    #[test]
    fn analyzer_failure_means_no_tags() {
        assert_eq!(derive_tags(&json!({}), "Wool Coat", &FailingAnalyzer), "");
    }
}
