mod config;
mod db;
mod fetch;
mod model;
mod nlp;
mod output;
mod parser;
mod report;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use model::{KeywordReportRow, Product, TagReportRow};
use nlp::{Analyzer, DictionaryAnalyzer, ScriptAnalyzer};
use output::RunFiles;
use report::keywords::Stopwords;

#[derive(Parser)]
#[command(name = "shop_sniper", about = "Shopping search keyword and tag analyzer")]
struct Cli {
    /// Skip recording the run in the history database
    #[arg(long, global = true)]
    no_db: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch search results for a keyword and build both reports
    Search {
        keyword: String,
        /// Max organic products to keep
        #[arg(short = 'n', long, default_value_t = config::DEFAULT_MAX_ITEMS)]
        max_items: usize,
    },
    /// Parse saved search pages (HTML or __NEXT_DATA__ JSON) and build reports
    Extract {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Max organic products to keep per page
        #[arg(short = 'n', long, default_value_t = config::DEFAULT_MAX_ITEMS)]
        max_items: usize,
    },
    /// Rebuild keyword and tag reports from a product CSV
    Analyze {
        products: PathBuf,
        /// Directory for the report files (default: data/reports)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
    /// List recent runs
    History {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let analyzer = build_analyzer();
    let analyzer: &dyn Analyzer = &*analyzer;
    let stopwords = Stopwords::default();

    let result = match cli.command {
        Commands::Search { keyword, max_items } => {
            let keyword = keyword.trim().to_string();
            if keyword.is_empty() {
                println!("Keyword is empty.");
                return Ok(());
            }
            println!(">>> Analyzing '{}'...", keyword);

            let client = fetch::build_client()?;
            let page = fetch::fetch_search_page(&client, &keyword).await?;
            let products = match fetch::extract_next_data(&page.html) {
                Some(json) => parser::extract_products(&json, max_items, analyzer),
                None => {
                    warn!("__NEXT_DATA__ script not found on {}", page.url);
                    Vec::new()
                }
            };
            if products.is_empty() {
                println!("No products found.");
                return Ok(());
            }

            let files = RunFiles::new(&config::raw_dir(), &config::reports_dir(), &output::timestamp());
            let run = build_reports(products, analyzer, &stopwords);
            write_run_files(&files, &run)?;
            if !cli.no_db {
                record_run(&keyword, "search", &run)?;
            }
            print_summary(&keyword, &run, &files);
            Ok(())
        }
        Commands::Extract { files, max_items } => {
            let runs = extract_files(&files, max_items, analyzer, &stopwords);
            let conn = if cli.no_db { None } else { Some(open_db()?) };
            let stamp = output::timestamp();

            let mut total = 0;
            for (i, (path, run)) in runs.into_iter().enumerate() {
                if run.products.is_empty() {
                    println!("{}: no products found", path.display());
                    continue;
                }
                let run_files = RunFiles::new(
                    &config::raw_dir(),
                    &config::reports_dir(),
                    &extract_stamp(&stamp, i, &path),
                );
                write_run_files(&run_files, &run)?;
                if let Some(conn) = &conn {
                    save(conn, &path.display().to_string(), "extract", &run)?;
                }
                total += run.products.len();
                println!(
                    "{}: {} products, {} keywords, {} tags -> {}",
                    path.display(),
                    run.products.len(),
                    run.keywords.len(),
                    run.tags.len(),
                    run_files.products.display()
                );
            }
            println!("Extracted {} products from {} files.", total, files.len());
            Ok(())
        }
        Commands::Analyze { products, out_dir } => {
            let reports_dir = out_dir.unwrap_or_else(config::reports_dir);
            let files = RunFiles::for_products(&products, &reports_dir);

            // A CSV missing the needed columns yields an empty report, not a failed command.
            let keywords = match output::load_products(&products, output::KEYWORD_INPUT_COLUMNS) {
                Ok(rows) => report::keywords::keyword_report(&rows, analyzer, &stopwords),
                Err(e) => {
                    warn!("Keyword analysis skipped: {:#}", e);
                    Vec::new()
                }
            };
            let tags = match output::load_products(&products, output::TAG_INPUT_COLUMNS) {
                Ok(rows) => report::tags::tag_report(&rows),
                Err(e) => {
                    warn!("Tag analysis skipped: {:#}", e);
                    Vec::new()
                }
            };

            output::write_csv(&files.keywords, &keywords)?;
            output::write_csv(&files.tags, &tags)?;
            println!("Keyword report: {} rows -> {}", keywords.len(), files.keywords.display());
            println!("Tag report:     {} rows -> {}", tags.len(), files.tags.display());
            print_top_keywords(&keywords);
            Ok(())
        }
        Commands::History { limit } => {
            let conn = open_db()?;
            let runs = db::fetch_runs(&conn, limit)?;
            if runs.is_empty() {
                println!("No runs recorded.");
                return Ok(());
            }

            println!(
                "{:>4} | {:<19} | {:<8} | {:<24} | {:>5} | {:<16} | {:<16}",
                "Run", "When", "Source", "Query", "Items", "Top keyword", "Top tag"
            );
            println!("{}", "-".repeat(110));
            for r in &runs {
                println!(
                    "{:>4} | {:<19} | {:<8} | {:<24} | {:>5} | {:<16} | {:<16}",
                    r.id,
                    r.created_at,
                    r.source,
                    truncate(&r.query, 24),
                    r.product_count,
                    truncate(r.top_keyword.as_deref().unwrap_or("-"), 16),
                    truncate(r.top_tag.as_deref().unwrap_or("-"), 16),
                );
            }
            if let Some(latest) = runs.first() {
                let keywords = db::fetch_keywords(&conn, latest.id)?;
                println!("\nLatest run #{}:", latest.id);
                print_top_keywords(&keywords);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

/// ko-dic analyzer when a dictionary is configured, else the rule-based one.
fn build_analyzer() -> Box<dyn Analyzer> {
    if let Some(uri) = config::ko_dic_uri() {
        match DictionaryAnalyzer::load(&uri) {
            Ok(analyzer) => {
                info!("Using ko-dic analyzer from {}", uri);
                return Box::new(analyzer);
            }
            Err(e) => warn!("{:#}; falling back to rule-based analyzer", e),
        }
    }
    Box::new(ScriptAnalyzer::new().with_proper_nouns(config::PROPER_NOUNS.iter().copied()))
}

/// File suffix for the i-th input of an extract batch. The index keeps
/// same-named files from different directories apart.
fn extract_stamp(stamp: &str, index: usize, path: &Path) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("page");
    format!("{}_{:03}_{}", stamp, index + 1, stem)
}

/// Products of one page plus both reports built from them.
struct AnalyzedRun {
    products: Vec<Product>,
    keywords: Vec<KeywordReportRow>,
    tags: Vec<TagReportRow>,
}

fn build_reports(products: Vec<Product>, analyzer: &dyn Analyzer, stopwords: &Stopwords) -> AnalyzedRun {
    let keywords = report::keywords::keyword_report(&products, analyzer, stopwords);
    let tags = report::tags::tag_report(&products);
    AnalyzedRun { products, keywords, tags }
}

/// Parse saved pages in parallel. Each page gets its own product list and
/// reports; an unreadable file becomes an empty run.
fn extract_files(
    files: &[PathBuf],
    max_items: usize,
    analyzer: &dyn Analyzer,
    stopwords: &Stopwords,
) -> Vec<(PathBuf, AnalyzedRun)> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(files.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let runs: Vec<(PathBuf, AnalyzedRun)> = files
        .par_iter()
        .map(|path| {
            let products = match read_payload(path) {
                Ok(Some(json)) => parser::extract_products(&json, max_items, analyzer),
                Ok(None) => Vec::new(),
                Err(e) => {
                    warn!("{:#}", e);
                    Vec::new()
                }
            };
            pb.inc(1);
            (path.clone(), build_reports(products, analyzer, stopwords))
        })
        .collect();

    pb.finish_and_clear();
    runs
}

fn read_payload(path: &Path) -> Result<Option<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(fetch::payload_from_saved(&contents))
}

fn write_run_files(files: &RunFiles, run: &AnalyzedRun) -> Result<()> {
    output::write_csv(&files.products, &run.products)?;
    output::write_csv(&files.keywords, &run.keywords)?;
    output::write_csv(&files.tags, &run.tags)?;
    info!("Wrote {}", files.products.display());
    Ok(())
}

fn open_db() -> Result<rusqlite::Connection> {
    let conn = db::connect(&config::db_path())?;
    db::init_schema(&conn)?;
    Ok(conn)
}

fn record_run(query: &str, source: &str, run: &AnalyzedRun) -> Result<()> {
    let conn = open_db()?;
    save(&conn, query, source, run)
}

fn save(conn: &rusqlite::Connection, query: &str, source: &str, run: &AnalyzedRun) -> Result<()> {
    let run_id = db::save_run(
        conn,
        &db::RunRecord {
            query,
            source,
            products: &run.products,
            keywords: &run.keywords,
            tags: &run.tags,
        },
    )?;
    info!("Recorded run #{}", run_id);
    Ok(())
}

fn print_summary(keyword: &str, run: &AnalyzedRun, files: &RunFiles) {
    println!("\nCollected {} products -> {}", run.products.len(), files.products.display());
    println!("\n{}", "=".repeat(40));
    println!("Top keywords for '{}'", keyword);
    println!("{}", "=".repeat(40));
    print_top_keywords(&run.keywords);
    if !run.tags.is_empty() {
        let top_tags: Vec<&str> = run.tags.iter().take(10).map(|t| t.tag.as_str()).collect();
        println!("Tags: {}", top_tags.join(" "));
    }
    println!("{}", "=".repeat(40));
    println!("Keyword report: {}", files.keywords.display());
    println!("Tag report:     {}", files.tags.display());
}

fn print_top_keywords(keywords: &[KeywordReportRow]) {
    for k in keywords.iter().take(10) {
        println!(
            "{}. {} (seen {}x, in {} products)",
            k.rank, k.keyword, k.occurrence_count, k.related_product_count
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_stem_in_different_dirs_gets_distinct_files() {
        let a = extract_stamp("20260101_120000", 0, Path::new("shop_a/page.html"));
        let b = extract_stamp("20260101_120000", 1, Path::new("shop_b/page.html"));
        assert_eq!(a, "20260101_120000_001_page");
        assert_eq!(b, "20260101_120000_002_page");

        let raw = Path::new("raw");
        let reports = Path::new("reports");
        let fa = RunFiles::new(raw, reports, &a);
        let fb = RunFiles::new(raw, reports, &b);
        assert_ne!(fa.products, fb.products);
        assert_ne!(fa.keywords, fb.keywords);
        assert_ne!(fa.tags, fb.tags);
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("기모 슬랙스", 2), "기모...");
        assert_eq!(truncate("coat", 10), "coat");
    }
}
