use anyhow::Result;

use strikebase::datastore::{
    DEFAULT_FIGHTER_VALUE, Datastore, ProfileDraft, STARTING_CASH, Transfer, TransferOutcome,
};
use strikebase::fighter::{Fighter, FighterStats, NewFighter, Profile, Record, Session, User};
use strikebase::market::{MarketError, listings, purchase};
use strikebase::sqlite_store::SqliteStore;

/// Counts transfer calls and can pretend another writer got there first.
struct RecordingStore {
    inner: SqliteStore,
    transfers: usize,
    force_conflict: bool,
}

impl RecordingStore {
    fn new() -> Self {
        Self {
            inner: SqliteStore::in_memory().expect("in-memory store"),
            transfers: 0,
            force_conflict: false,
        }
    }
}

impl Datastore for RecordingStore {
    fn upsert_fighter(&mut self, fighter: &NewFighter) -> Result<Fighter> {
        self.inner.upsert_fighter(fighter)
    }
    fn fighter(&mut self, id: i64) -> Result<Option<Fighter>> {
        self.inner.fighter(id)
    }
    fn fighter_by_name(&mut self, name: &str) -> Result<Option<Fighter>> {
        self.inner.fighter_by_name(name)
    }
    fn fighters_by_wins(&mut self) -> Result<Vec<Fighter>> {
        self.inner.fighters_by_wins()
    }
    fn search_fighters(&mut self, needle: &str, limit: usize) -> Result<Vec<Fighter>> {
        self.inner.search_fighters(needle, limit)
    }
    fn market_listings(&mut self) -> Result<Vec<Fighter>> {
        self.inner.market_listings()
    }
    fn fighters_owned_by(&mut self, owner_id: &str) -> Result<Vec<Fighter>> {
        self.inner.fighters_owned_by(owner_id)
    }
    fn profile(&mut self, id: &str) -> Result<Option<Profile>> {
        self.inner.profile(id)
    }
    fn upsert_profile(&mut self, draft: &ProfileDraft) -> Result<Profile> {
        self.inner.upsert_profile(draft)
    }
    fn update_profile_names(&mut self, id: &str, manager_name: &str, gym_name: &str) -> Result<()> {
        self.inner.update_profile_names(id, manager_name, gym_name)
    }
    fn transfer_fighter(&mut self, transfer: &Transfer) -> Result<TransferOutcome> {
        self.transfers += 1;
        if self.force_conflict {
            return Ok(TransferOutcome::Conflict);
        }
        self.inner.transfer_fighter(transfer)
    }
    fn sign_up(&mut self, email: &str, password: &str) -> Result<Session> {
        self.inner.sign_up(email, password)
    }
    fn sign_in(&mut self, email: &str, password: &str) -> Result<Session> {
        self.inner.sign_in(email, password)
    }
    fn session_user(&mut self, access_token: &str) -> Result<Option<User>> {
        self.inner.session_user(access_token)
    }
    fn sign_out(&mut self, access_token: &str) -> Result<()> {
        self.inner.sign_out(access_token)
    }
}

fn seed_fighter(store: &mut dyn Datastore, name: &str) -> Fighter {
    store
        .upsert_fighter(&NewFighter {
            name: name.to_string(),
            image_url: None,
            gym: None,
            height: None,
            weight: None,
            division: None,
            record: Record::default(),
            stats: FighterStats::default(),
        })
        .expect("seed fighter")
}

fn seed_profile(store: &mut RecordingStore, id: &str, cash: i64) {
    store
        .upsert_profile(&ProfileDraft {
            id: id.to_string(),
            manager_name: "Manager".to_string(),
            gym_name: "Gym".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        })
        .expect("seed profile");
    store
        .inner
        .connection()
        .execute(
            "UPDATE profiles SET cash = ?1 WHERE id = ?2",
            rusqlite::params![cash, id],
        )
        .expect("set cash");
}

#[test]
fn purchase_moves_fighter_and_cash() {
    let mut store = RecordingStore::new();
    let fighter = seed_fighter(&mut store, "Rico Verhoeven");
    seed_profile(&mut store, "buyer", STARTING_CASH);

    let bought = purchase(&mut store, "buyer", fighter.id).expect("purchase");
    assert_eq!(bought.price, DEFAULT_FIGHTER_VALUE);
    assert_eq!(bought.cash_left, STARTING_CASH - DEFAULT_FIGHTER_VALUE);
    assert_eq!(bought.fighter.owner_id.as_deref(), Some("buyer"));

    assert!(listings(&mut store).expect("listings").is_empty());
    let owned = store.fighters_owned_by("buyer").expect("owned");
    assert_eq!(owned.len(), 1);
    assert_eq!(
        store.profile("buyer").expect("read").expect("present").cash,
        STARTING_CASH - DEFAULT_FIGHTER_VALUE
    );
}

#[test]
fn short_cash_is_rejected_without_writes() {
    let mut store = RecordingStore::new();
    let fighter = seed_fighter(&mut store, "Rico Verhoeven");
    seed_profile(&mut store, "buyer", 50);

    let err = purchase(&mut store, "buyer", fighter.id).expect_err("too poor");
    assert!(matches!(
        err,
        MarketError::InsufficientFunds { cash: 50, price: DEFAULT_FIGHTER_VALUE }
    ));
    assert!(err.is_rejection());
    assert_eq!(store.transfers, 0);
    assert_eq!(store.profile("buyer").expect("read").expect("present").cash, 50);
    assert!(store.fighter(fighter.id).expect("read").expect("present").on_market());
}

#[test]
fn exact_cash_is_enough() {
    let mut store = RecordingStore::new();
    let fighter = seed_fighter(&mut store, "Rico Verhoeven");
    seed_profile(&mut store, "buyer", DEFAULT_FIGHTER_VALUE);

    let bought = purchase(&mut store, "buyer", fighter.id).expect("purchase");
    assert_eq!(bought.cash_left, 0);
}

#[test]
fn owned_fighter_cannot_be_bought_again() {
    let mut store = RecordingStore::new();
    let fighter = seed_fighter(&mut store, "Rico Verhoeven");
    seed_profile(&mut store, "first", STARTING_CASH);
    seed_profile(&mut store, "second", STARTING_CASH);

    purchase(&mut store, "first", fighter.id).expect("first purchase");
    let err = purchase(&mut store, "second", fighter.id).expect_err("already owned");
    assert!(matches!(err, MarketError::AlreadyOwned(ref name) if name == "Rico Verhoeven"));
    assert_eq!(store.transfers, 1);
    assert_eq!(store.profile("second").expect("read").expect("present").cash, STARTING_CASH);
}

#[test]
fn missing_profile_and_fighter_are_rejections() {
    let mut store = RecordingStore::new();
    let fighter = seed_fighter(&mut store, "Rico Verhoeven");

    let err = purchase(&mut store, "ghost", fighter.id).expect_err("no profile");
    assert!(matches!(err, MarketError::NoProfile(_)));

    seed_profile(&mut store, "buyer", STARTING_CASH);
    let err = purchase(&mut store, "buyer", fighter.id + 100).expect_err("no fighter");
    assert!(matches!(err, MarketError::UnknownFighter(_)));
    assert!(err.is_rejection());
    assert_eq!(store.transfers, 0);
}

#[test]
fn lost_race_reports_conflict() {
    let mut store = RecordingStore::new();
    let fighter = seed_fighter(&mut store, "Rico Verhoeven");
    seed_profile(&mut store, "buyer", STARTING_CASH);
    store.force_conflict = true;

    let err = purchase(&mut store, "buyer", fighter.id).expect_err("conflict");
    assert!(matches!(err, MarketError::Conflict));
    assert!(!err.is_rejection());
    assert_eq!(store.transfers, 1);
    assert_eq!(store.profile("buyer").expect("read").expect("present").cash, STARTING_CASH);
}
