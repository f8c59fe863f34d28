use std::collections::{HashSet, VecDeque};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use reqwest::blocking::Client;
use tracing::{error, info, warn};

use crate::datastore::Datastore;
use crate::extract::{self, FighterProfile};
use crate::fighter::{Fighter, FighterStats};
use crate::http_client::fetch_html;

pub const DEFAULT_IMPORT_URLS: &[&str] = &[
    "https://en.wikipedia.org/wiki/Category:Glory_kickboxers",
    "https://en.wikipedia.org/wiki/Category:K-1_kickboxers",
    "https://en.wikipedia.org/wiki/Category:Dutch_kickboxers",
    "https://en.wikipedia.org/wiki/Category:ONE_Championship_kickboxers",
    "https://en.wikipedia.org/wiki/Category:Kunlun_Fight_kickboxers",
    "https://en.wikipedia.org/wiki/Category:SUPERKOMBAT_kickboxers",
    "https://en.wikipedia.org/wiki/Category:It%27s_Showtime_(kickboxing)_kickboxers",
    "https://en.wikipedia.org/wiki/Category:Enfusion_kickboxers",
];

pub trait PageSource {
    fn fetch_page(&self, url: &str) -> Result<String>;
}

pub struct HttpPageSource {
    client: Client,
}

impl HttpPageSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl PageSource for HttpPageSource {
    fn fetch_page(&self, url: &str) -> Result<String> {
        fetch_html(&self.client, url)
    }
}

// Called once before every fetch but the first.
pub trait Throttle {
    fn pause(&mut self);
}

#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Default for FixedDelay {
    fn default() -> Self {
        Self(Duration::from_secs(1))
    }
}

impl Throttle for FixedDelay {
    fn pause(&mut self) {
        if !self.0.is_zero() {
            thread::sleep(self.0);
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    pub expand_categories: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub urls_attempted: usize,
    pub fighters_upserted: usize,
    pub fetch_failures: usize,
    pub persist_failures: usize,
    pub categories_expanded: usize,
    pub imported: Vec<String>,
    pub errors: Vec<String>,
}

pub fn read_url_list(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| seen.insert(line.to_string()))
        .map(str::to_string)
        .collect()
}

pub fn scrape_page<S, R>(source: &S, url: &str, rng: &mut R) -> Result<(FighterProfile, FighterStats)>
where
    S: PageSource + ?Sized,
    R: Rng,
{
    let html = source.fetch_page(url).context("fetch failed")?;
    let profile = extract::extract_fighter(&html, url).context("parse failed")?;
    let stats = FighterStats::roll(rng);
    Ok((profile, stats))
}

pub fn store_profile(
    store: &mut dyn Datastore,
    profile: FighterProfile,
    stats: FighterStats,
) -> Result<Fighter> {
    let new = profile.into_new_fighter(stats);
    store.upsert_fighter(&new)
}

/// Sequential import: one request in flight, `throttle` between requests,
/// failures logged and skipped.
pub fn run_import<S, T, R>(
    source: &S,
    store: &mut dyn Datastore,
    throttle: &mut T,
    rng: &mut R,
    urls: &[String],
    options: ImportOptions,
) -> ImportSummary
where
    S: PageSource + ?Sized,
    T: Throttle + ?Sized,
    R: Rng,
{
    let mut summary = ImportSummary::default();
    // Every URL queued so far; a fighter listed in several categories is fetched once.
    let mut seen: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = urls
        .iter()
        .filter(|url| seen.insert(url.to_string()))
        .cloned()
        .collect();
    let mut first = true;

    while let Some(url) = queue.pop_front() {
        if !first {
            throttle.pause();
        }
        first = false;
        summary.urls_attempted += 1;
        info!(%url, "scanning");

        if extract::is_category_url(&url) {
            if options.expand_categories {
                match source.fetch_page(&url) {
                    Ok(html) => {
                        let members = extract::category_members(&html, &url);
                        let fresh: Vec<String> = members
                            .into_iter()
                            .filter(|member| seen.insert(member.clone()))
                            .collect();
                        info!(%url, members = fresh.len(), "expanded category");
                        summary.categories_expanded += 1;
                        for member in fresh.into_iter().rev() {
                            queue.push_front(member);
                        }
                    }
                    Err(err) => {
                        error!(%url, error = %err, "category fetch failed");
                        summary.fetch_failures += 1;
                        summary.errors.push(format!("{url}: {err:#}"));
                    }
                }
                continue;
            }
            warn!(%url, "category listing imported as a single page");
        }

        let (profile, stats) = match scrape_page(source, &url, rng) {
            Ok(parsed) => parsed,
            Err(err) => {
                let msg = format!("{err:#}");
                error!(%url, error = %msg, "import failed");
                summary.fetch_failures += 1;
                summary.errors.push(format!("{url}: {msg}"));
                continue;
            }
        };

        let name = profile.name.clone();
        let age = profile.age_label();
        let division = profile.division.clone();
        let record = profile.record;
        match store_profile(store, profile, stats) {
            Ok(_) => {
                info!(
                    %name, %age, %division,
                    wins = record.wins, losses = record.losses, kos = record.kos,
                    "stored"
                );
                summary.fighters_upserted += 1;
                summary.imported.push(name);
            }
            Err(err) => {
                let msg = format!("{err:#}");
                error!(%name, error = %msg, "store failed");
                summary.persist_failures += 1;
                summary.errors.push(format!("{name}: {msg}"));
            }
        }
    }

    summary
}
