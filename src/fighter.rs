use rand::Rng;
use serde::{Deserialize, Serialize};

pub const STAT_MIN: i32 = 60;
pub const STAT_MAX: i32 = 98;

pub const NO_DIVISION: &str = "No Division";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
    #[serde(default)]
    pub draws: u32,
    #[serde(default)]
    pub kos: u32,
}

impl Record {
    pub fn fights(&self) -> u32 {
        // Scraped summaries can carry absurd totals.
        self.wins.saturating_add(self.losses).saturating_add(self.draws)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FighterStats {
    #[serde(rename = "stat_power", default)]
    pub power: i32,
    #[serde(rename = "stat_speed", default)]
    pub speed: i32,
    #[serde(rename = "stat_stamina", default)]
    pub stamina: i32,
    #[serde(rename = "stat_technique", default)]
    pub technique: i32,
    #[serde(rename = "stat_chin", default)]
    pub chin: i32,
}

impl FighterStats {
    /// Placeholder "hype" numbers; they say nothing about real performance.
    pub fn roll<R: Rng>(rng: &mut R) -> Self {
        let mut stat = || rng.gen_range(STAT_MIN..=STAT_MAX);
        Self {
            power: stat(),
            speed: stat(),
            stamina: stat(),
            technique: stat(),
            chin: stat(),
        }
    }

    pub fn as_pairs(&self) -> [(&'static str, i32); 5] {
        [
            ("Power", self.power),
            ("Speed", self.speed),
            ("Stamina", self.stamina),
            ("Technique", self.technique),
            ("Chin", self.chin),
        ]
    }
}

// Ownership and price are left to the datastore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewFighter {
    pub name: String,
    pub image_url: Option<String>,
    pub gym: Option<String>,
    pub height: Option<String>,
    pub weight: Option<String>,
    pub division: Option<String>,
    #[serde(flatten)]
    pub record: Record,
    #[serde(flatten)]
    pub stats: FighterStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fighter {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub gym: Option<String>,
    #[serde(default)]
    pub height: Option<String>,
    #[serde(default)]
    pub weight: Option<String>,
    #[serde(default)]
    pub division: Option<String>,
    #[serde(flatten)]
    pub record: Record,
    #[serde(flatten)]
    pub stats: FighterStats,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub value: i64,
}

impl Fighter {
    pub fn division_label(&self) -> &str {
        self.division
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(NO_DIVISION)
    }

    pub fn on_market(&self) -> bool {
        self.owner_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub manager_name: Option<String>,
    #[serde(default)]
    pub gym_name: Option<String>,
    #[serde(default)]
    pub cash: i64,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user: User,
}
