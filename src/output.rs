use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::MOBILE_BASE;
use crate::model::Product;

/// Columns the keyword report needs from a product CSV.
pub const KEYWORD_INPUT_COLUMNS: &[&str] = &["title", "is_ad"];
/// Columns the tag report needs from a product CSV.
pub const TAG_INPUT_COLUMNS: &[&str] = &["tags"];

/// Paths for one run's three CSV files, sharing a timestamp suffix.
#[derive(Debug, Clone)]
pub struct RunFiles {
    pub products: PathBuf,
    pub keywords: PathBuf,
    pub tags: PathBuf,
}

impl RunFiles {
    pub fn new(raw_dir: &Path, reports_dir: &Path, stamp: &str) -> Self {
        RunFiles {
            products: raw_dir.join(format!("results_{}.csv", stamp)),
            keywords: reports_dir.join(format!("keyword_report_{}.csv", stamp)),
            tags: reports_dir.join(format!("tag_report_{}.csv", stamp)),
        }
    }

    /// Report paths paired with an existing `results_<stamp>.csv`.
    pub fn for_products(products: &Path, reports_dir: &Path) -> Self {
        let stem = products
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let stamp = stem
            .strip_prefix("results_")
            .map(str::to_string)
            .unwrap_or_else(timestamp);
        RunFiles {
            products: products.to_path_buf(),
            keywords: reports_dir.join(format!("keyword_report_{}.csv", stamp)),
            tags: reports_dir.join(format!("tag_report_{}.csv", stamp)),
        }
    }
}

pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

pub fn write_rows<W: Write, T: Serialize>(writer: W, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write rows to `path`, creating parent directories. An empty slice
/// still produces a file, header-less, so the run leaves a trace.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_rows(file, rows).with_context(|| format!("Failed to write {}", path.display()))
}

/// Product CSV row as read back; any column may be missing.
#[derive(Debug, Deserialize)]
struct ProductRecord {
    #[serde(default)]
    rank: Option<u32>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    price: Option<u64>,
    #[serde(default)]
    store_name: Option<String>,
    #[serde(default)]
    tags: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    is_ad: Option<bool>,
}

impl ProductRecord {
    fn into_product(self, position: usize) -> Product {
        let url = self
            .url
            .as_deref()
            .and_then(|u| Url::parse(u).ok())
            .unwrap_or_else(|| MOBILE_BASE.clone());
        Product {
            rank: self.rank.unwrap_or(position as u32 + 1),
            title: self.title.unwrap_or_default(),
            price: self.price.unwrap_or(0),
            store_name: self.store_name.unwrap_or_else(|| "Unknown".to_string()),
            tags: self.tags.unwrap_or_default(),
            url,
            is_ad: self.is_ad.unwrap_or(false),
        }
    }
}

/// Read a product CSV back. Fails if any of `required` is not a column.
pub fn read_products<R: Read>(reader: R, required: &[&str]) -> Result<Vec<Product>> {
    let mut rdr = csv::Reader::from_reader(reader);
    // Spreadsheet exports prefix the first header with a BOM.
    let headers: csv::StringRecord = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}'))
        .collect();
    rdr.set_headers(headers.clone());
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        bail!("product CSV is missing required column(s): {}", missing.join(", "));
    }

    let mut products = Vec::new();
    for (i, record) in rdr.deserialize::<ProductRecord>().enumerate() {
        products.push(record?.into_product(i));
    }
    Ok(products)
}

pub fn load_products(path: &Path, required: &[&str]) -> Result<Vec<Product>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    read_products(file, required).with_context(|| format!("Failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{KeywordReportRow, TagReportRow};

    fn sample() -> Vec<Product> {
        vec![Product {
            rank: 1,
            title: "Blue Wool Coat".into(),
            price: 50000,
            store_name: "ShopA".into(),
            tags: "#wool #winter".into(),
            url: Url::parse("https://m.shopping.naver.com/product/1").unwrap(),
            is_ad: false,
        }]
    }

    fn to_string<T: Serialize>(rows: &[T]) -> String {
        let mut buf = Vec::new();
        write_rows(&mut buf, rows).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn product_columns_in_order() {
        let out = to_string(&sample());
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("rank,title,price,store_name,tags,url,is_ad"));
        assert_eq!(
            lines.next(),
            Some("1,Blue Wool Coat,50000,ShopA,#wool #winter,https://m.shopping.naver.com/product/1,false")
        );
    }

    #[test]
    fn report_columns() {
        let kw = to_string(&[KeywordReportRow {
            rank: 1,
            keyword: "Wool".into(),
            occurrence_count: 2,
            related_product_count: 2,
        }]);
        assert!(kw.starts_with("rank,keyword,occurrence_count,related_product_count\n1,Wool,2,2"));
        let tags = to_string(&[TagReportRow { rank: 1, tag: "#wool".into(), usage_count: 3 }]);
        assert!(tags.starts_with("rank,tag,usage_count\n1,#wool,3"));
    }

    #[test]
    fn read_back_written_products() {
        let csv = to_string(&sample());
        let products = read_products(csv.as_bytes(), KEYWORD_INPUT_COLUMNS).unwrap();
        assert_eq!(products, sample());
    }

    #[test]
    fn missing_required_column_is_error() {
        let csv = "rank,title,price\n1,Coat,100\n";
        let err = read_products(csv.as_bytes(), KEYWORD_INPUT_COLUMNS).unwrap_err();
        assert!(err.to_string().contains("is_ad"));
    }

    #[test]
    fn partial_columns_get_defaults() {
        let csv = "tags,is_ad\n#a #b,false\n#c,true\n";
        let products = read_products(csv.as_bytes(), TAG_INPUT_COLUMNS).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].rank, 1);
        assert_eq!(products[0].store_name, "Unknown");
        assert!(products[1].is_ad);
    }

    #[test]
    fn bom_prefixed_header_maps_first_column() {
        let csv = "\u{feff}rank,title,is_ad,tags\n7,Wool Coat,false,#wool\n";
        let products = read_products(csv.as_bytes(), KEYWORD_INPUT_COLUMNS).unwrap();
        assert_eq!(products[0].rank, 7);
        assert_eq!(products[0].title, "Wool Coat");

        let csv = "\u{feff}title,is_ad\nWool Coat,false\n";
        let products = read_products(csv.as_bytes(), KEYWORD_INPUT_COLUMNS).unwrap();
        assert_eq!(products[0].title, "Wool Coat");
    }

    #[test]
    fn run_files_share_stamp() {
        let files = RunFiles::for_products(Path::new("data/raw/results_20260101_120000.csv"), Path::new("out"));
        assert_eq!(files.keywords, Path::new("out/keyword_report_20260101_120000.csv"));
        assert_eq!(files.tags, Path::new("out/tag_report_20260101_120000.csv"));
    }
}
