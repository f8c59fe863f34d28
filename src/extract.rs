use anyhow::{Result, anyhow};
use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::fighter::{FighterStats, NO_DIVISION, NewFighter, Record};

static HEADING: Lazy<Selector> = Lazy::new(|| selector("h1"));
static INFOBOX_IMAGE: Lazy<Selector> = Lazy::new(|| selector(".infobox img"));
static INFOBOX_ROW: Lazy<Selector> = Lazy::new(|| selector(".infobox tr"));
static WIKITABLE: Lazy<Selector> = Lazy::new(|| selector("table.wikitable"));
static ROW: Lazy<Selector> = Lazy::new(|| selector("tr"));
static HEADER_CELL: Lazy<Selector> = Lazy::new(|| selector("th"));
static DATA_CELL: Lazy<Selector> = Lazy::new(|| selector("td"));
static CATEGORY_LINK: Lazy<Selector> = Lazy::new(|| selector("#mw-pages li a"));

static FOOTNOTE: Lazy<Regex> = Lazy::new(|| regex(r"\[.*?\]"));
static ASIDE: Lazy<Regex> = Lazy::new(|| regex(r"\(.*?\)"));
static YEAR: Lazy<Regex> = Lazy::new(|| regex(r"\d{4}"));
static WINS_SUMMARY: Lazy<Regex> = Lazy::new(|| regex(r"(\d+)\s*wins"));
static LOSSES_SUMMARY: Lazy<Regex> = Lazy::new(|| regex(r"(\d+)\s*losses"));

const RECORD_TABLE_MARKERS: &[&str] = &["res", "result", "record", "opponent"];

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector")
}

fn regex(pattern: &'static str) -> Regex {
    Regex::new(pattern).expect("static regex")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FighterProfile {
    pub name: String,
    pub image_url: Option<String>,
    pub gym: Option<String>,
    pub height: Option<String>,
    pub weight: Option<String>,
    pub division: String,
    pub age: Option<i32>,
    pub record: Record,
}

impl FighterProfile {
    fn empty(name: String) -> Self {
        Self {
            name,
            image_url: None,
            gym: None,
            height: None,
            weight: None,
            division: NO_DIVISION.to_string(),
            age: None,
            record: Record::default(),
        }
    }

    pub fn age_label(&self) -> String {
        self.age
            .map(|a| a.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }

    pub fn into_new_fighter(self, stats: FighterStats) -> NewFighter {
        NewFighter {
            name: self.name,
            image_url: self.image_url,
            gym: self.gym,
            height: self.height,
            weight: self.weight,
            division: Some(self.division),
            record: self.record,
            stats,
        }
    }

    fn apply(&mut self, update: FieldUpdate, current_year: i32) {
        match update {
            FieldUpdate::Gym(v) => self.gym = Some(v),
            FieldUpdate::Height(v) => self.height = Some(v),
            FieldUpdate::Weight(v) => self.weight = Some(v),
            FieldUpdate::Division(v) => self.division = v,
            FieldUpdate::BirthYear(year) => self.age = Some(current_year - year),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoboxRow {
    pub header: String,
    pub raw_value: String,
    pub value: String,
}

impl InfoboxRow {
    pub fn new(header: &str, raw_value: &str) -> Self {
        let raw_value = raw_value.trim().to_string();
        Self {
            header: header.to_lowercase(),
            value: clean_value(&raw_value),
            raw_value,
        }
    }

    fn from_element(row: ElementRef<'_>) -> Self {
        Self::new(&cell_text(row, &HEADER_CELL), &cell_text(row, &DATA_CELL))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Gym(String),
    Height(String),
    Weight(String),
    Division(String),
    BirthYear(i32),
}

pub struct InfoboxRule {
    pub name: &'static str,
    pub apply: fn(&InfoboxRow) -> Option<FieldUpdate>,
}

// Evaluated top to bottom for every row; every matching rule contributes,
// so "Weight class" feeds both `weight` and `division`.
pub const INFOBOX_RULES: &[InfoboxRule] = &[
    InfoboxRule {
        name: "gym",
        apply: gym_rule,
    },
    InfoboxRule {
        name: "height",
        apply: height_rule,
    },
    InfoboxRule {
        name: "weight",
        apply: weight_rule,
    },
    InfoboxRule {
        name: "division",
        apply: division_rule,
    },
    InfoboxRule {
        name: "born",
        apply: born_rule,
    },
];

fn gym_rule(row: &InfoboxRow) -> Option<FieldUpdate> {
    (row.header.contains("team") || row.header.contains("gym"))
        .then(|| FieldUpdate::Gym(row.value.clone()))
}

fn height_rule(row: &InfoboxRow) -> Option<FieldUpdate> {
    row.header
        .contains("height")
        .then(|| FieldUpdate::Height(row.value.clone()))
}

fn weight_rule(row: &InfoboxRow) -> Option<FieldUpdate> {
    row.header
        .contains("weight")
        .then(|| FieldUpdate::Weight(row.value.clone()))
}

fn division_rule(row: &InfoboxRow) -> Option<FieldUpdate> {
    (row.header.contains("division") || row.header.contains("weight class"))
        .then(|| FieldUpdate::Division(row.value.clone()))
}

fn born_rule(row: &InfoboxRow) -> Option<FieldUpdate> {
    if !row.header.contains("born") {
        return None;
    }
    // Raw value: the year often sits inside the parenthetical.
    let year = YEAR.find(&row.raw_value)?.as_str().parse::<i32>().ok()?;
    Some(FieldUpdate::BirthYear(year))
}

pub fn clean_value(raw: &str) -> String {
    let without_notes = FOOTNOTE.replace_all(raw, "");
    ASIDE.replace_all(&without_notes, "").trim().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoutOutcome {
    Win,
    Loss,
    Draw,
}

impl BoutOutcome {
    fn from_cell(cell: &str) -> Option<Self> {
        match cell {
            "win" => Some(Self::Win),
            "loss" => Some(Self::Loss),
            "draw" => Some(Self::Draw),
            _ => None,
        }
    }
}

pub fn bout_outcome(first_cell: &str, second_cell: &str) -> Option<BoutOutcome> {
    let first = first_cell.trim().to_lowercase();
    let second = second_cell.trim().to_lowercase();
    BoutOutcome::from_cell(&first).or_else(|| BoutOutcome::from_cell(&second))
}

pub fn tally_bout(record: &mut Record, outcome: BoutOutcome, row_text: &str) {
    match outcome {
        BoutOutcome::Win => {
            record.wins += 1;
            // "tko" contains "ko".
            if row_text.to_lowercase().contains("ko") {
                record.kos += 1;
            }
        }
        BoutOutcome::Loss => record.losses += 1,
        BoutOutcome::Draw => record.draws += 1,
    }
}

pub fn extract_fighter(html: &str, page_url: &str) -> Result<FighterProfile> {
    extract_fighter_at(html, page_url, Utc::now().year())
}

pub fn extract_fighter_at(html: &str, page_url: &str, current_year: i32) -> Result<FighterProfile> {
    let doc = Html::parse_document(html);

    let name = doc
        .select(&HEADING)
        .next()
        .map(|h| element_text(h).trim().to_string())
        .unwrap_or_default();
    if name.is_empty() {
        return Err(anyhow!("no page heading at {page_url}"));
    }

    let mut profile = FighterProfile::empty(name);
    profile.image_url = doc
        .select(&INFOBOX_IMAGE)
        .next()
        .and_then(|img| img.value().attr("src"))
        .and_then(|src| absolute_url(src, page_url));

    let infobox: Vec<InfoboxRow> = doc.select(&INFOBOX_ROW).map(InfoboxRow::from_element).collect();
    for row in &infobox {
        for rule in INFOBOX_RULES {
            if let Some(update) = (rule.apply)(row) {
                profile.apply(update, current_year);
            }
        }
    }

    // Summary rows only matter when the bout tables gave nothing.
    profile.record = scan_record_tables(&doc);
    if profile.record.wins == 0 {
        apply_summary_fallback(&mut profile.record, &infobox);
    }

    Ok(profile)
}

fn scan_record_tables(doc: &Html) -> Record {
    let mut record = Record::default();
    for table in doc.select(&WIKITABLE) {
        let headers = cell_text(table, &HEADER_CELL).to_lowercase();
        if !RECORD_TABLE_MARKERS.iter().any(|m| headers.contains(m)) {
            continue;
        }
        for row in table.select(&ROW) {
            let mut cells = row.select(&DATA_CELL);
            let first = cells.next().map(element_text).unwrap_or_default();
            let second = cells.next().map(element_text).unwrap_or_default();
            if let Some(outcome) = bout_outcome(&first, &second) {
                tally_bout(&mut record, outcome, &element_text(row));
            }
        }
    }
    record
}

fn apply_summary_fallback(record: &mut Record, infobox: &[InfoboxRow]) {
    for row in infobox.iter().filter(|r| r.header.contains("total fights")) {
        let value = row.raw_value.to_lowercase();
        let whole_row = format!("{} {}", row.header, value);
        let wins = summary_count(&WINS_SUMMARY, &value).or_else(|| summary_count(&WINS_SUMMARY, &whole_row));
        let losses =
            summary_count(&LOSSES_SUMMARY, &value).or_else(|| summary_count(&LOSSES_SUMMARY, &whole_row));
        if let Some(wins) = wins {
            record.wins = wins;
        }
        if let Some(losses) = losses {
            record.losses = losses;
        }
    }
}

fn summary_count(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

pub fn category_members(html: &str, page_url: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let mut out: Vec<String> = Vec::new();
    for link in doc.select(&CATEGORY_LINK) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(url) = absolute_url(href, page_url) else {
            continue;
        };
        if !out.contains(&url) {
            out.push(url);
        }
    }
    out
}

pub fn is_category_url(url: &str) -> bool {
    url.contains("/wiki/Category:")
}

fn absolute_url(src: &str, page_url: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    if let Some(rest) = src.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    if let Ok(url) = Url::parse(src) {
        return Some(url.to_string());
    }
    let base = Url::parse(page_url).ok()?;
    base.join(src).ok().map(|u| u.to_string())
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

fn cell_text(el: ElementRef<'_>, cells: &Selector) -> String {
    el.select(cells).map(element_text).collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_value_strips_notes_and_asides() {
        assert_eq!(clean_value("185 cm[1] (6'1\")"), "185 cm");
        assert_eq!(clean_value("  Golden Glory[2][3] "), "Golden Glory");
        assert_eq!(clean_value("plain"), "plain");
    }

    #[test]
    fn born_rule_reads_year_from_raw_value() {
        let row = InfoboxRow::new("Born", "Rico Verhoeven (1989-04-10) April 10, 1989");
        assert_eq!(born_rule(&row), Some(FieldUpdate::BirthYear(1989)));
        let row = InfoboxRow::new("Born", "unknown");
        assert_eq!(born_rule(&row), None);
    }

    #[test]
    fn weight_class_header_hits_two_rules() {
        let row = InfoboxRow::new("Weight class", "Heavyweight");
        let hits: Vec<&str> = INFOBOX_RULES
            .iter()
            .filter(|r| (r.apply)(&row).is_some())
            .map(|r| r.name)
            .collect();
        assert_eq!(hits, vec!["weight", "division"]);
    }

    #[test]
    fn first_cell_wins_ties() {
        assert_eq!(bout_outcome("Win", "Loss"), Some(BoutOutcome::Win));
        assert_eq!(bout_outcome("2019-01-01", " Draw "), Some(BoutOutcome::Draw));
        assert_eq!(bout_outcome("Winner", "Lost"), None);
    }

    #[test]
    fn knockout_wins_count_kos() {
        let mut record = Record::default();
        tally_bout(&mut record, BoutOutcome::Win, "Win | Opponent | TKO (punches)");
        tally_bout(&mut record, BoutOutcome::Win, "Win | Opponent | Decision");
        tally_bout(&mut record, BoutOutcome::Loss, "Loss | Opponent | KO");
        assert_eq!(record.wins, 2);
        assert_eq!(record.kos, 1);
        assert_eq!(record.losses, 1);
    }

    #[test]
    fn protocol_relative_images_get_https() {
        assert_eq!(
            absolute_url("//upload.wikimedia.org/a.jpg", "https://en.wikipedia.org/wiki/X").as_deref(),
            Some("https://upload.wikimedia.org/a.jpg")
        );
        assert_eq!(
            absolute_url("/wiki/Y", "https://en.wikipedia.org/wiki/Category:Z").as_deref(),
            Some("https://en.wikipedia.org/wiki/Y")
        );
    }
}
