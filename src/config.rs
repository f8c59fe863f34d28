use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};
use reqwest::Url;

const APP_DIR: &str = "strikebase";
const DB_FILE: &str = "strikebase.sqlite";

pub const DEFAULT_USER_AGENT: &str = "StrikeBaseBot/1.0 (info@strikebase.com)";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
const DEFAULT_IMPORT_DELAY_MS: u64 = 1000;

const URL_KEYS: &[&str] = &["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"];
const KEY_KEYS: &[&str] = &["SUPABASE_SERVICE_ROLE_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Sqlite { path: PathBuf },
    Rest { url: String, key: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: Backend,
    pub user_agent: String,
    pub http_timeout: Duration,
    pub import_delay: Duration,
}

/// Loads `.env.local` then `.env`; values already in the process environment win.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let url = first_env(URL_KEYS);
        let key = first_env(KEY_KEYS);

        let backend_choice = env::var("STRIKEBASE_BACKEND")
            .ok()
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty());

        let backend = match backend_choice.as_deref() {
            Some("rest") => {
                let (Some(url), Some(key)) = (url, key) else {
                    return Err(anyhow!(
                        "STRIKEBASE_BACKEND=rest needs SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY (or the NEXT_PUBLIC_ variants)"
                    ));
                };
                Backend::Rest { url, key }
            }
            Some("sqlite") => Backend::Sqlite {
                path: db_path_from_env()?,
            },
            Some(other) => return Err(anyhow!("unknown STRIKEBASE_BACKEND {other:?}")),
            None => match (url, key) {
                (Some(url), Some(key)) => Backend::Rest { url, key },
                _ => Backend::Sqlite {
                    path: db_path_from_env()?,
                },
            },
        };

        let user_agent = env::var("STRIKEBASE_USER_AGENT")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        Ok(Self {
            backend,
            user_agent,
            http_timeout: Duration::from_secs(env_u64(
                "STRIKEBASE_HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )),
            import_delay: Duration::from_millis(env_u64(
                "STRIKEBASE_IMPORT_DELAY_MS",
                DEFAULT_IMPORT_DELAY_MS,
            )),
        })
    }

    pub fn with_sqlite_path(mut self, path: PathBuf) -> Self {
        self.backend = Backend::Sqlite { path };
        self
    }
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(APP_DIR));
        }
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(APP_DIR))
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(DB_FILE))
}

fn db_path_from_env() -> Result<PathBuf> {
    if let Ok(raw) = env::var("STRIKEBASE_DB") {
        if !raw.trim().is_empty() {
            return Ok(PathBuf::from(raw.trim()));
        }
    }
    default_db_path().ok_or_else(|| anyhow!("unable to resolve sqlite path; set STRIKEBASE_DB"))
}

fn first_env(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| env::var(key).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckLevel {
    Ok,
    Warning,
    Missing,
}

#[derive(Debug, Clone)]
pub struct EnvCheck {
    pub name: &'static str,
    pub level: CheckLevel,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct EnvReport {
    pub checks: Vec<EnvCheck>,
}

impl EnvReport {
    pub fn has_errors(&self) -> bool {
        self.checks.iter().any(|c| c.level == CheckLevel::Missing)
    }
}

/// Inspects the backend URL and key the app needs. `lookup` abstracts the
/// environment so the check can run against fixed values.
pub fn check_env_with<F>(lookup: F) -> EnvReport
where
    F: Fn(&str) -> Option<String>,
{
    let find = |keys: &[&str]| {
        keys.iter()
            .filter_map(|k| lookup(k))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
    };

    let mut report = EnvReport::default();

    match find(URL_KEYS) {
        None => report.checks.push(EnvCheck {
            name: "SUPABASE_URL",
            level: CheckLevel::Missing,
            detail: "not set".to_string(),
        }),
        Some(url) => {
            let (level, detail) = match Url::parse(&url) {
                Ok(_) => (CheckLevel::Ok, "set, valid URL format".to_string()),
                Err(err) => (CheckLevel::Warning, format!("set, invalid URL format ({err})")),
            };
            report.checks.push(EnvCheck {
                name: "SUPABASE_URL",
                level,
                detail,
            });
        }
    }

    match find(KEY_KEYS) {
        None => report.checks.push(EnvCheck {
            name: "SUPABASE_KEY",
            level: CheckLevel::Missing,
            detail: "not set".to_string(),
        }),
        Some(key) => {
            let (level, detail) = if key.starts_with("eyJ") {
                (CheckLevel::Ok, "set, valid key format".to_string())
            } else {
                (
                    CheckLevel::Warning,
                    "set, unexpected key format (should start with \"eyJ\")".to_string(),
                )
            };
            report.checks.push(EnvCheck {
                name: "SUPABASE_KEY",
                level,
                detail,
            });
        }
    }

    report
}

pub fn check_env() -> EnvReport {
    check_env_with(|key| env::var(key).ok())
}
