use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use crate::config::app_cache_dir;
use crate::fighter::Session;

const PBKDF2_ITERATIONS: u32 = 20_000;
const SALT_LEN: usize = 16;
const TOKEN_LEN: usize = 32;
const SESSION_FILE: &str = "session.json";
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    pub salt: String,
    pub hash: String,
}

pub fn hash_password(password: &str) -> PasswordHash {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    PasswordHash {
        salt: BASE64.encode(salt),
        hash: BASE64.encode(derive(password, &salt)),
    }
}

pub fn verify_password(password: &str, stored: &PasswordHash) -> Result<bool> {
    let salt = BASE64
        .decode(stored.salt.as_bytes())
        .context("stored salt is not base64")?;
    let expected = BASE64
        .decode(stored.hash.as_bytes())
        .context("stored hash is not base64")?;
    let actual = derive(password, &salt);
    // Constant-time compare.
    let diff = actual
        .iter()
        .zip(expected.iter())
        .fold(actual.len() ^ expected.len(), |acc, (a, b)| acc | usize::from(a ^ b));
    Ok(diff == 0)
}

fn derive(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

pub fn new_token() -> String {
    let mut raw = [0u8; TOKEN_LEN];
    rand::thread_rng().fill_bytes(&mut raw);
    raw.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn validate_credentials(email: &str, password: &str) -> Result<()> {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(anyhow!("invalid email address {email:?}"));
    };
    if local.is_empty() || !domain.contains('.') {
        return Err(anyhow!("invalid email address {email:?}"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(anyhow!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    Ok(())
}

pub fn default_session_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(SESSION_FILE))
}

pub fn load_session(path: &Path) -> Option<Session> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str::<Session>(&raw).ok()
}

pub fn save_session(path: &Path, session: &Session) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("create session dir {}", dir.display()))?;
    }
    let json = serde_json::to_string(session).context("serialize session")?;
    let tmp = path.with_extension("json.tmp");
    write_private(&tmp, json.as_bytes()).context("write session")?;
    fs::rename(&tmp, path).context("swap session")?;
    Ok(())
}

// The file holds a bearer token: owner read/write only.
#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation; a leftover tmp file keeps its old bits.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(bytes)
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::write(path, bytes)
}

pub fn clear_session(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).context("remove session file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fighter::User;

    #[test]
    fn password_round_trip() {
        let stored = hash_password("hunter22");
        assert!(verify_password("hunter22", &stored).expect("verify"));
        assert!(!verify_password("hunter23", &stored).expect("verify"));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let a = hash_password("same-password");
        let b = hash_password("same-password");
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn credential_shapes() {
        assert!(validate_credentials("dana@ufc.com", "secret1").is_ok());
        assert!(validate_credentials("dana", "secret1").is_err());
        assert!(validate_credentials("dana@ufc.com", "123").is_err());
    }

    #[test]
    fn session_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("strikebase-session-{}", new_token()));
        let path = dir.join(SESSION_FILE);
        let session = Session {
            access_token: "tok".to_string(),
            user: User {
                id: "u1".to_string(),
                email: "a@b.co".to_string(),
            },
        };
        save_session(&path, &session).expect("save");
        assert_eq!(load_session(&path), Some(session));
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).expect("metadata").permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
        clear_session(&path).expect("clear");
        assert_eq!(load_session(&path), None);
        clear_session(&path).expect("clearing twice is fine");
        let _ = fs::remove_dir_all(dir);
    }
}
