use anyhow::Result;

use crate::datastore::Datastore;
use crate::fighter::Fighter;

pub const ALL_DIVISIONS: &str = "All";

pub const DIVISIONS: &[&str] = &[
    ALL_DIVISIONS,
    "Heavyweight",
    "Light Heavyweight",
    "Middleweight",
    "Welterweight",
    "Lightweight",
    "Featherweight",
    "Bantamweight",
    "Flyweight",
];

pub const QUICK_SEARCH_MIN_CHARS: usize = 2;
pub const QUICK_SEARCH_LIMIT: usize = 5;

pub fn quick_search(store: &mut dyn Datastore, query: &str) -> Result<Vec<Fighter>> {
    if query.chars().count() < QUICK_SEARCH_MIN_CHARS {
        return Ok(Vec::new());
    }
    store.search_fighters(query, QUICK_SEARCH_LIMIT)
}

/// Exact division (unless "All") and a case-insensitive substring over name
/// or division.
pub fn filter_roster<'a>(fighters: &'a [Fighter], query: &str, division: &str) -> Vec<&'a Fighter> {
    let needle = query.trim().to_lowercase();
    fighters
        .iter()
        .filter(|f| division == ALL_DIVISIONS || f.division.as_deref() == Some(division))
        .filter(|f| {
            needle.is_empty()
                || f.name.to_lowercase().contains(&needle)
                || f
                    .division
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
        })
        .collect()
}

pub fn canonical_division(raw: &str) -> Option<&'static str> {
    let raw = raw.trim();
    DIVISIONS.iter().copied().find(|d| d.eq_ignore_ascii_case(raw))
}
