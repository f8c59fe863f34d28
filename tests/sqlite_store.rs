use strikebase::datastore::{
    DEFAULT_FIGHTER_VALUE, Datastore, ProfileDraft, STARTING_CASH, Transfer, TransferOutcome,
};
use strikebase::fighter::{FighterStats, NewFighter, Record};
use strikebase::sqlite_store::SqliteStore;

fn new_fighter(name: &str, wins: u32) -> NewFighter {
    NewFighter {
        name: name.to_string(),
        image_url: None,
        gym: Some("Test Gym".to_string()),
        height: None,
        weight: None,
        division: Some("Heavyweight".to_string()),
        record: Record {
            wins,
            losses: 1,
            draws: 0,
            kos: 0,
        },
        stats: FighterStats {
            power: 70,
            speed: 70,
            stamina: 70,
            technique: 70,
            chin: 70,
        },
    }
}

fn draft(id: &str) -> ProfileDraft {
    ProfileDraft {
        id: id.to_string(),
        manager_name: "Manager".to_string(),
        gym_name: "Gym".to_string(),
        updated_at: "2024-01-01T00:00:00Z".to_string(),
    }
}

#[test]
fn upsert_is_keyed_by_name() {
    let mut store = SqliteStore::in_memory().expect("in-memory store");
    let first = store.upsert_fighter(&new_fighter("Rico Verhoeven", 10)).expect("insert");
    let second = store.upsert_fighter(&new_fighter("Rico Verhoeven", 12)).expect("update");

    assert_eq!(first.id, second.id);
    assert_eq!(second.record.wins, 12);
    assert_eq!(second.value, DEFAULT_FIGHTER_VALUE);
    assert!(second.on_market());
    assert_eq!(store.fighters_by_wins().expect("list").len(), 1);
}

#[test]
fn reimport_keeps_owner_and_value() {
    let mut store = SqliteStore::in_memory().expect("in-memory store");
    let fighter = store.upsert_fighter(&new_fighter("Badr Hari", 5)).expect("insert");
    store.upsert_profile(&draft("buyer")).expect("profile");
    store
        .connection()
        .execute("UPDATE fighters SET value = 250 WHERE id = ?1", [fighter.id])
        .expect("set value");

    let outcome = store
        .transfer_fighter(&Transfer {
            buyer_id: "buyer".to_string(),
            fighter_id: fighter.id,
            price: 250,
            expected_cash: STARTING_CASH,
        })
        .expect("transfer");
    assert_eq!(outcome, TransferOutcome::Completed { cash_left: STARTING_CASH - 250 });

    let again = store.upsert_fighter(&new_fighter("Badr Hari", 6)).expect("re-import");
    assert_eq!(again.owner_id.as_deref(), Some("buyer"));
    assert_eq!(again.value, 250);
    assert_eq!(again.record.wins, 6);
}

#[test]
fn roster_and_market_ordering() {
    let mut store = SqliteStore::in_memory().expect("in-memory store");
    store.upsert_fighter(&new_fighter("Alpha", 3)).expect("insert");
    store.upsert_fighter(&new_fighter("Bravo", 9)).expect("insert");
    store.upsert_fighter(&new_fighter("Charlie", 3)).expect("insert");
    store
        .connection()
        .execute("UPDATE fighters SET value = 500 WHERE name = 'Charlie'", [])
        .expect("set value");

    let by_wins = store.fighters_by_wins().expect("roster");
    let names = by_wins.iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["Bravo", "Alpha", "Charlie"]);

    let market = store.market_listings().expect("market");
    assert_eq!(market[0].name, "Charlie");
    assert_eq!(market.len(), 3);
}

#[test]
fn search_is_case_insensitive_and_limited() {
    let mut store = SqliteStore::in_memory().expect("in-memory store");
    for name in ["Rico Verhoeven", "Ricardo Silva", "Erico Dias", "Semmy Schilt"] {
        store.upsert_fighter(&new_fighter(name, 1)).expect("insert");
    }

    let hits = store.search_fighters("RIC", 5).expect("search");
    let names = hits.iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["Erico Dias", "Ricardo Silva", "Rico Verhoeven"]);

    assert_eq!(store.search_fighters("ric", 2).expect("search").len(), 2);
    assert!(store.search_fighters("%", 5).expect("search").is_empty());
}

#[test]
fn new_profiles_start_with_cash() {
    let mut store = SqliteStore::in_memory().expect("in-memory store");
    let profile = store.upsert_profile(&draft("u1")).expect("profile");
    assert_eq!(profile.cash, STARTING_CASH);
    assert_eq!(profile.manager_name.as_deref(), Some("Manager"));

    store.update_profile_names("u1", "Cor", "Mike's Gym").expect("update");
    let profile = store.profile("u1").expect("read").expect("present");
    assert_eq!(profile.gym_name.as_deref(), Some("Mike's Gym"));
    assert_eq!(profile.cash, STARTING_CASH);

    assert!(store.update_profile_names("nobody", "a", "b").is_err());
}

#[test]
fn stale_balance_is_a_conflict() {
    let mut store = SqliteStore::in_memory().expect("in-memory store");
    let fighter = store.upsert_fighter(&new_fighter("Alpha", 1)).expect("insert");
    store.upsert_profile(&draft("buyer")).expect("profile");

    let outcome = store
        .transfer_fighter(&Transfer {
            buyer_id: "buyer".to_string(),
            fighter_id: fighter.id,
            price: 100,
            expected_cash: STARTING_CASH + 1,
        })
        .expect("transfer");
    assert_eq!(outcome, TransferOutcome::Conflict);
    assert_eq!(store.profile("buyer").expect("read").expect("present").cash, STARTING_CASH);
    assert!(store.fighter(fighter.id).expect("read").expect("present").on_market());
}

#[test]
fn lost_claim_rolls_back_the_debit() {
    let mut store = SqliteStore::in_memory().expect("in-memory store");
    let fighter = store.upsert_fighter(&new_fighter("Alpha", 1)).expect("insert");
    store.upsert_profile(&draft("first")).expect("profile");
    store.upsert_profile(&draft("second")).expect("profile");

    let buy = |buyer: &str| Transfer {
        buyer_id: buyer.to_string(),
        fighter_id: fighter.id,
        price: 100,
        expected_cash: STARTING_CASH,
    };
    assert!(matches!(
        store.transfer_fighter(&buy("first")).expect("transfer"),
        TransferOutcome::Completed { .. }
    ));
    assert_eq!(
        store.transfer_fighter(&buy("second")).expect("transfer"),
        TransferOutcome::Conflict
    );
    assert_eq!(store.profile("second").expect("read").expect("present").cash, STARTING_CASH);
    assert_eq!(store.fighters_owned_by("first").expect("owned").len(), 1);
    assert!(store.fighters_owned_by("second").expect("owned").is_empty());
}

#[test]
fn sign_up_sign_in_and_sign_out() {
    let mut store = SqliteStore::in_memory().expect("in-memory store");
    let session = store.sign_up("Coach@Example.com", "hunter22").expect("sign up");
    assert_eq!(session.user.email, "coach@example.com");

    assert!(store.sign_up("coach@example.com", "hunter22").is_err());
    assert!(store.sign_in("coach@example.com", "wrong-password").is_err());

    let again = store.sign_in("coach@example.com", "hunter22").expect("sign in");
    assert_eq!(again.user.id, session.user.id);
    assert_ne!(again.access_token, session.access_token);

    let user = store.session_user(&again.access_token).expect("lookup");
    assert_eq!(user.map(|u| u.id), Some(session.user.id.clone()));

    store.sign_out(&again.access_token).expect("sign out");
    assert!(store.session_user(&again.access_token).expect("lookup").is_none());
    assert!(store.session_user(&session.access_token).expect("lookup").is_some());
}

#[test]
fn open_creates_the_db_dir_and_reports_failures() {
    let root = std::env::temp_dir().join(format!("strikebase-open-{}", std::process::id()));
    let path = root.join("nested").join("strikebase.sqlite");
    let mut store = SqliteStore::open(&path).expect("open in a fresh dir");
    store.upsert_fighter(&new_fighter("Alpha", 1)).expect("insert");
    assert!(path.exists());

    // A regular file where the parent dir should be.
    let blocker = root.join("blocker");
    std::fs::write(&blocker, "x").expect("write blocker");
    let err = SqliteStore::open(&blocker.join("db.sqlite")).err().expect("dir creation fails");
    assert!(format!("{err:#}").contains("create db dir"));

    drop(store);
    let _ = std::fs::remove_dir_all(root);
}
