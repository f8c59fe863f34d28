use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::auth::{self, PasswordHash};
use crate::datastore::{
    DEFAULT_FIGHTER_VALUE, Datastore, ProfileDraft, STARTING_CASH, Transfer, TransferOutcome,
};
use crate::fighter::{Fighter, FighterStats, NewFighter, Profile, Record, Session, User};

const FIGHTER_COLUMNS: &str = "id, name, image_url, gym, height, weight, division,
    wins, losses, draws, kos,
    stat_power, stat_speed, stat_stamina, stat_technique, stat_chin,
    owner_id, value";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create db dir {}", parent.display()))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn select_fighters(&self, tail: &str, args: impl rusqlite::Params) -> Result<Vec<Fighter>> {
        let sql = format!("SELECT {FIGHTER_COLUMNS} FROM fighters {tail}");
        let mut stmt = self.conn.prepare(&sql).context("prepare fighters query")?;
        let rows = stmt
            .query_map(args, fighter_from_row)
            .context("query fighters")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode fighter row")?);
        }
        Ok(out)
    }

    fn select_fighter(&self, tail: &str, args: impl rusqlite::Params) -> Result<Option<Fighter>> {
        let sql = format!("SELECT {FIGHTER_COLUMNS} FROM fighters {tail}");
        self.conn
            .query_row(&sql, args, fighter_from_row)
            .optional()
            .context("query fighter")
    }

    fn issue_session(&self, user: User) -> Result<Session> {
        let token = auth::new_token();
        self.conn
            .execute(
                "INSERT INTO sessions(token, user_id, created_at) VALUES (?1, ?2, ?3)",
                params![token, user.id, Utc::now().to_rfc3339()],
            )
            .context("insert session")?;
        Ok(Session {
            access_token: token,
            user,
        })
    }
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    let sql = format!(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_salt TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            manager_name TEXT NULL,
            gym_name TEXT NULL,
            cash INTEGER NOT NULL DEFAULT {STARTING_CASH},
            updated_at TEXT NULL
        );
        CREATE TABLE IF NOT EXISTS fighters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            image_url TEXT NULL,
            gym TEXT NULL,
            height TEXT NULL,
            weight TEXT NULL,
            division TEXT NULL,
            wins INTEGER NOT NULL DEFAULT 0,
            losses INTEGER NOT NULL DEFAULT 0,
            draws INTEGER NOT NULL DEFAULT 0,
            kos INTEGER NOT NULL DEFAULT 0,
            stat_power INTEGER NOT NULL DEFAULT 0,
            stat_speed INTEGER NOT NULL DEFAULT 0,
            stat_stamina INTEGER NOT NULL DEFAULT 0,
            stat_technique INTEGER NOT NULL DEFAULT 0,
            stat_chin INTEGER NOT NULL DEFAULT 0,
            owner_id TEXT NULL REFERENCES profiles(id),
            value INTEGER NOT NULL DEFAULT {DEFAULT_FIGHTER_VALUE},
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_fighters_owner ON fighters(owner_id);
        CREATE INDEX IF NOT EXISTS idx_fighters_wins ON fighters(wins);
        "#
    );
    conn.execute_batch(&sql).context("create sqlite schema")?;
    Ok(())
}

fn fighter_from_row(row: &Row<'_>) -> rusqlite::Result<Fighter> {
    Ok(Fighter {
        id: row.get(0)?,
        name: row.get(1)?,
        image_url: row.get(2)?,
        gym: row.get(3)?,
        height: row.get(4)?,
        weight: row.get(5)?,
        division: row.get(6)?,
        record: Record {
            wins: row.get(7)?,
            losses: row.get(8)?,
            draws: row.get(9)?,
            kos: row.get(10)?,
        },
        stats: FighterStats {
            power: row.get(11)?,
            speed: row.get(12)?,
            stamina: row.get(13)?,
            technique: row.get(14)?,
            chin: row.get(15)?,
        },
        owner_id: row.get(16)?,
        value: row.get(17)?,
    })
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        manager_name: row.get(1)?,
        gym_name: row.get(2)?,
        cash: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

// `%` and `_` in user input match literally.
fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

impl Datastore for SqliteStore {
    fn upsert_fighter(&mut self, f: &NewFighter) -> Result<Fighter> {
        self.conn
            .execute(
                r#"
                INSERT INTO fighters (
                    name, image_url, gym, height, weight, division,
                    wins, losses, draws, kos,
                    stat_power, stat_speed, stat_stamina, stat_technique, stat_chin,
                    updated_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6,
                    ?7, ?8, ?9, ?10,
                    ?11, ?12, ?13, ?14, ?15,
                    ?16
                )
                ON CONFLICT(name) DO UPDATE SET
                    image_url = excluded.image_url,
                    gym = excluded.gym,
                    height = excluded.height,
                    weight = excluded.weight,
                    division = excluded.division,
                    wins = excluded.wins,
                    losses = excluded.losses,
                    draws = excluded.draws,
                    kos = excluded.kos,
                    stat_power = excluded.stat_power,
                    stat_speed = excluded.stat_speed,
                    stat_stamina = excluded.stat_stamina,
                    stat_technique = excluded.stat_technique,
                    stat_chin = excluded.stat_chin,
                    updated_at = excluded.updated_at
                "#,
                params![
                    f.name,
                    f.image_url,
                    f.gym,
                    f.height,
                    f.weight,
                    f.division,
                    f.record.wins,
                    f.record.losses,
                    f.record.draws,
                    f.record.kos,
                    f.stats.power,
                    f.stats.speed,
                    f.stats.stamina,
                    f.stats.technique,
                    f.stats.chin,
                    Utc::now().to_rfc3339(),
                ],
            )
            .with_context(|| format!("upsert fighter {}", f.name))?;
        self.fighter_by_name(&f.name)?
            .ok_or_else(|| anyhow!("fighter {} missing after upsert", f.name))
    }

    fn fighter(&mut self, id: i64) -> Result<Option<Fighter>> {
        self.select_fighter("WHERE id = ?1", params![id])
    }

    fn fighter_by_name(&mut self, name: &str) -> Result<Option<Fighter>> {
        self.select_fighter("WHERE name = ?1", params![name])
    }

    fn fighters_by_wins(&mut self) -> Result<Vec<Fighter>> {
        self.select_fighters("ORDER BY wins DESC, name ASC", [])
    }

    fn search_fighters(&mut self, needle: &str, limit: usize) -> Result<Vec<Fighter>> {
        // SQLite LIKE is case-insensitive for ASCII.
        self.select_fighters(
            "WHERE name LIKE ?1 ESCAPE '\\' ORDER BY name ASC LIMIT ?2",
            params![like_pattern(needle), limit as i64],
        )
    }

    fn market_listings(&mut self) -> Result<Vec<Fighter>> {
        self.select_fighters("WHERE owner_id IS NULL ORDER BY value DESC, name ASC", [])
    }

    fn fighters_owned_by(&mut self, owner_id: &str) -> Result<Vec<Fighter>> {
        self.select_fighters(
            "WHERE owner_id = ?1 ORDER BY wins DESC, name ASC",
            params![owner_id],
        )
    }

    fn profile(&mut self, id: &str) -> Result<Option<Profile>> {
        self.conn
            .query_row(
                "SELECT id, manager_name, gym_name, cash, updated_at FROM profiles WHERE id = ?1",
                params![id],
                profile_from_row,
            )
            .optional()
            .context("query profile")
    }

    fn upsert_profile(&mut self, draft: &ProfileDraft) -> Result<Profile> {
        self.conn
            .execute(
                r#"
                INSERT INTO profiles (id, manager_name, gym_name, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    manager_name = excluded.manager_name,
                    gym_name = excluded.gym_name,
                    updated_at = excluded.updated_at
                "#,
                params![draft.id, draft.manager_name, draft.gym_name, draft.updated_at],
            )
            .context("upsert profile")?;
        self.profile(&draft.id)?
            .ok_or_else(|| anyhow!("profile {} missing after upsert", draft.id))
    }

    fn update_profile_names(&mut self, id: &str, manager_name: &str, gym_name: &str) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE profiles SET manager_name = ?1, gym_name = ?2, updated_at = ?3 WHERE id = ?4",
                params![manager_name, gym_name, Utc::now().to_rfc3339(), id],
            )
            .context("update profile")?;
        if changed == 0 {
            return Err(anyhow!("no profile with id {id}"));
        }
        Ok(())
    }

    fn transfer_fighter(&mut self, t: &Transfer) -> Result<TransferOutcome> {
        let tx = self.conn.transaction().context("begin transfer transaction")?;
        let debited = tx
            .execute(
                "UPDATE profiles SET cash = cash - ?1 WHERE id = ?2 AND cash = ?3 AND cash >= ?1",
                params![t.price, t.buyer_id, t.expected_cash],
            )
            .context("debit buyer")?;
        if debited != 1 {
            // Dropping the transaction rolls it back.
            return Ok(TransferOutcome::Conflict);
        }
        let claimed = tx
            .execute(
                "UPDATE fighters SET owner_id = ?1 WHERE id = ?2 AND owner_id IS NULL",
                params![t.buyer_id, t.fighter_id],
            )
            .context("claim fighter")?;
        if claimed != 1 {
            return Ok(TransferOutcome::Conflict);
        }
        let cash_left = tx
            .query_row(
                "SELECT cash FROM profiles WHERE id = ?1",
                params![t.buyer_id],
                |row| row.get::<_, i64>(0),
            )
            .context("read balance")?;
        tx.commit().context("commit transfer transaction")?;
        Ok(TransferOutcome::Completed { cash_left })
    }

    fn sign_up(&mut self, email: &str, password: &str) -> Result<Session> {
        auth::validate_credentials(email, password)?;
        let email = email.trim().to_lowercase();
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM users WHERE email = ?1",
                params![email],
                |_| Ok(()),
            )
            .optional()
            .context("query user")?
            .is_some();
        if exists {
            return Err(anyhow!("user already registered: {email}"));
        }
        let stored = auth::hash_password(password);
        let user = User {
            id: auth::new_token(),
            email,
        };
        self.conn
            .execute(
                "INSERT INTO users(id, email, password_salt, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id,
                    user.email,
                    stored.salt,
                    stored.hash,
                    Utc::now().to_rfc3339()
                ],
            )
            .context("insert user")?;
        self.issue_session(user)
    }

    fn sign_in(&mut self, email: &str, password: &str) -> Result<Session> {
        let email = email.trim().to_lowercase();
        let row = self
            .conn
            .query_row(
                "SELECT id, password_salt, password_hash FROM users WHERE email = ?1",
                params![email],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        PasswordHash {
                            salt: row.get(1)?,
                            hash: row.get(2)?,
                        },
                    ))
                },
            )
            .optional()
            .context("query user")?;
        let Some((id, stored)) = row else {
            return Err(anyhow!("invalid login credentials"));
        };
        if !auth::verify_password(password, &stored)? {
            return Err(anyhow!("invalid login credentials"));
        }
        self.issue_session(User { id, email })
    }

    fn session_user(&mut self, access_token: &str) -> Result<Option<User>> {
        self.conn
            .query_row(
                "SELECT u.id, u.email FROM sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.token = ?1",
                params![access_token],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        email: row.get(1)?,
                    })
                },
            )
            .optional()
            .context("query session")
    }

    fn sign_out(&mut self, access_token: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM sessions WHERE token = ?1", params![access_token])
            .context("delete session")?;
        Ok(())
    }
}
