use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use strikebase::config::{self, Config};
use strikebase::datastore::open_datastore;
use strikebase::http_client::build_http_client;
use strikebase::import::{
    DEFAULT_IMPORT_URLS, FixedDelay, HttpPageSource, ImportOptions, read_url_list, run_import,
};
use strikebase::logging;

fn main() -> Result<()> {
    config::load_dotenv();
    logging::init();

    let mut config = Config::from_env()?;
    if let Some(path) = parse_path_arg("--db") {
        config = config.with_sqlite_path(path);
    }
    let delay = parse_value_arg("--delay-ms")
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(config.import_delay);

    let urls = match parse_path_arg("--urls-file") {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("read url list {}", path.display()))?;
            read_url_list(&raw)
        }
        None => DEFAULT_IMPORT_URLS.iter().map(|u| u.to_string()).collect(),
    };
    let options = ImportOptions {
        expand_categories: has_flag("--expand-categories"),
    };

    let client = build_http_client(&config)?;
    let source = HttpPageSource::new(client);
    let mut store = open_datastore(&config)?;
    let mut throttle = FixedDelay(delay);
    let mut rng = rand::thread_rng();

    println!("Starting bulk import of {} url(s)", urls.len());
    let summary = run_import(
        &source,
        store.as_mut(),
        &mut throttle,
        &mut rng,
        &urls,
        options,
    );

    println!();
    println!("Bulk import finished");
    println!("URLs attempted: {}", summary.urls_attempted);
    if summary.categories_expanded > 0 {
        println!("Categories expanded: {}", summary.categories_expanded);
    }
    println!("Fighters upserted: {}", summary.fighters_upserted);
    println!("Fetch/parse failures: {}", summary.fetch_failures);
    println!("Store failures: {}", summary.persist_failures);
    if !summary.errors.is_empty() {
        println!("Errors: {}", summary.errors.len());
        for err in summary.errors.iter().take(10) {
            println!(" - {err}");
        }
    }

    Ok(())
}

fn has_flag(flag: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == flag)
}

fn parse_value_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    parse_value_arg(name).map(PathBuf::from)
}
