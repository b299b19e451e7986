use std::path::PathBuf;
use std::sync::LazyLock;

use url::Url;

pub const SEARCH_URL: &str = "https://m.shopping.naver.com/search/all";
pub const MOBILE_DOMAIN: &str = "https://m.shopping.naver.com";
pub static MOBILE_BASE: LazyLock<Url> = LazyLock::new(|| Url::parse(MOBILE_DOMAIN).unwrap());
pub const REFERER: &str = "https://m.naver.com/";
pub const ACCEPT_LANGUAGE: &str = "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7";
pub const USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1";

pub const NEXT_DATA_SELECTOR: &str = r#"script#__NEXT_DATA__[type="application/json"]"#;
pub const CAPTCHA_MARKERS: &[&str] = &["wtm_captcha.js", r#"class="captcha_form""#];

pub const MIN_REQUEST_DELAY_SECS: f64 = 1.0;
pub const MAX_REQUEST_DELAY_SECS: f64 = 3.0;
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
pub const MAX_RETRIES: u32 = 3;
pub const BASE_BACKOFF_MS: u64 = 2000;

pub const DEFAULT_MAX_ITEMS: usize = 20;
pub const KEYWORD_REPORT_LIMIT: usize = 30;

const DATA_DIR_ENV: &str = "SNIPER_DATA_DIR";
const KO_DIC_ENV: &str = "SNIPER_KO_DIC";
const DEFAULT_DATA_DIR: &str = "data";

/// Sales-pitch, shipping and gender words that say nothing about the product itself.
pub const STOPWORDS: &[&str] = &[
    "무료배송", "할인", "특가", "당일발송", "당일", "출고", "기획", "세일",
    "공구", "이벤트", "증정", "사은품", "프로모션", "쿠폰", "혜택",
    "한정수량", "신상", "국내생산", "자체제작", "빅사이즈",
    "여성", "여자", "남자", "남성", "무료", "배송", "도착", "보장",
    "추천", "인기", "공식", "정품", "세트",
];

/// Brand names the analyzer should tag as proper nouns.
pub const PROPER_NOUNS: &[&str] = &[
    "나이키", "아디다스", "뉴발란스", "유니클로", "무신사", "노스페이스",
    "Nike", "Adidas", "NewBalance", "Uniqlo",
];

/// Dictionary for the ko-dic analyzer: `SNIPER_KO_DIC` if set, else the
/// embedded copy when compiled in. `None` means the rule-based analyzer.
pub fn ko_dic_uri() -> Option<String> {
    match std::env::var(KO_DIC_ENV) {
        Ok(uri) if !uri.trim().is_empty() => Some(uri),
        _ if cfg!(feature = "embed-ko-dic") => Some("embedded://ko-dic".to_string()),
        _ => None,
    }
}

pub fn data_dir() -> PathBuf {
    std::env::var(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR))
}

pub fn raw_dir() -> PathBuf {
    data_dir().join("raw")
}

pub fn reports_dir() -> PathBuf {
    data_dir().join("reports")
}

pub fn db_path() -> PathBuf {
    data_dir().join("sniper.sqlite")
}
