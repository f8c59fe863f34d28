use anyhow::{Context, Result};

use crate::config::{Backend, Config};
use crate::fighter::{Fighter, NewFighter, Profile, Session, User};
use crate::rest_store::RestStore;
use crate::sqlite_store::SqliteStore;

pub const DEFAULT_FIGHTER_VALUE: i64 = 100;
pub const STARTING_CASH: i64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDraft {
    pub id: String,
    pub manager_name: String,
    pub gym_name: String,
    pub updated_at: String,
}

// A purchase the caller already validated against a fresh read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub buyer_id: String,
    pub fighter_id: i64,
    pub price: i64,
    pub expected_cash: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed { cash_left: i64 },
    /// Balance or ownership changed underneath; nothing was kept.
    Conflict,
}

pub trait Datastore {
    /// Insert or replace the scraped fields of the fighter with this name.
    /// `owner_id` and `value` of an existing row are left alone.
    fn upsert_fighter(&mut self, fighter: &NewFighter) -> Result<Fighter>;
    fn fighter(&mut self, id: i64) -> Result<Option<Fighter>>;
    fn fighter_by_name(&mut self, name: &str) -> Result<Option<Fighter>>;
    fn fighters_by_wins(&mut self) -> Result<Vec<Fighter>>;
    fn search_fighters(&mut self, needle: &str, limit: usize) -> Result<Vec<Fighter>>;
    fn market_listings(&mut self) -> Result<Vec<Fighter>>;
    fn fighters_owned_by(&mut self, owner_id: &str) -> Result<Vec<Fighter>>;

    fn profile(&mut self, id: &str) -> Result<Option<Profile>>;
    fn upsert_profile(&mut self, draft: &ProfileDraft) -> Result<Profile>;
    fn update_profile_names(&mut self, id: &str, manager_name: &str, gym_name: &str) -> Result<()>;

    fn transfer_fighter(&mut self, transfer: &Transfer) -> Result<TransferOutcome>;

    fn sign_up(&mut self, email: &str, password: &str) -> Result<Session>;
    fn sign_in(&mut self, email: &str, password: &str) -> Result<Session>;
    fn session_user(&mut self, access_token: &str) -> Result<Option<User>>;
    fn sign_out(&mut self, access_token: &str) -> Result<()>;

    /// Scope later requests to a signed-in user. Stores without
    /// per-request credentials ignore it.
    fn attach_session(&mut self, _session: &Session) {}
}

pub fn open_datastore(config: &Config) -> Result<Box<dyn Datastore>> {
    match &config.backend {
        Backend::Sqlite { path } => {
            let store = SqliteStore::open(path)
                .with_context(|| format!("open datastore {}", path.display()))?;
            Ok(Box::new(store))
        }
        Backend::Rest { url, key } => {
            let store = RestStore::new(config, url, key)?;
            Ok(Box::new(store))
        }
    }
}
