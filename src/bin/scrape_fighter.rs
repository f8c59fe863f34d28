use std::path::PathBuf;

use anyhow::{Result, anyhow};

use strikebase::config::{self, Config};
use strikebase::datastore::open_datastore;
use strikebase::http_client::build_http_client;
use strikebase::import::{HttpPageSource, scrape_page, store_profile};
use strikebase::logging;

fn main() -> Result<()> {
    config::load_dotenv();
    logging::init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let url = args
        .iter()
        .find(|a| a.starts_with("http://") || a.starts_with("https://"))
        .cloned()
        .ok_or_else(|| anyhow!("usage: scrape_fighter <url> [--db PATH] [--dry-run]"))?;
    let dry_run = args.iter().any(|a| a == "--dry-run");

    let mut config = Config::from_env()?;
    if let Some(path) = parse_db_path_arg(&args) {
        config = config.with_sqlite_path(path);
    }

    let source = HttpPageSource::new(build_http_client(&config)?);
    let (profile, stats) = scrape_page(&source, &url, &mut rand::thread_rng())?;

    println!("Name: {}", profile.name);
    println!("Image: {}", profile.image_url.as_deref().unwrap_or("-"));
    println!("Gym: {}", profile.gym.as_deref().unwrap_or("-"));
    println!("Height: {}", profile.height.as_deref().unwrap_or("-"));
    println!("Weight: {}", profile.weight.as_deref().unwrap_or("-"));
    println!("Division: {}", profile.division);
    println!("Age: {}", profile.age_label());
    println!(
        "Record: W:{} L:{} D:{} KO:{}",
        profile.record.wins, profile.record.losses, profile.record.draws, profile.record.kos
    );

    if dry_run {
        return Ok(());
    }

    let mut store = open_datastore(&config)?;
    let fighter = store_profile(store.as_mut(), profile, stats)?;
    println!("Stored as fighter #{}", fighter.id);
    Ok(())
}

fn parse_db_path_arg(args: &[String]) -> Option<PathBuf> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--db=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--db" {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}
