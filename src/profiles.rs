use anyhow::{Result, anyhow};
use chrono::Utc;

use crate::datastore::{Datastore, ProfileDraft};
use crate::fighter::{Fighter, Profile, Session, User};

#[derive(Debug, Clone)]
pub enum Dashboard {
    // Signed in but no profile yet.
    NeedsSetup,
    Ready {
        profile: Profile,
        fighters: Vec<Fighter>,
    },
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("{field} is required"));
    }
    Ok(trimmed.to_string())
}

pub fn setup_profile(
    store: &mut dyn Datastore,
    user: &User,
    manager_name: &str,
    gym_name: &str,
) -> Result<Profile> {
    let draft = ProfileDraft {
        id: user.id.clone(),
        manager_name: required("manager name", manager_name)?,
        gym_name: required("gym name", gym_name)?,
        updated_at: Utc::now().to_rfc3339(),
    };
    store.upsert_profile(&draft)
}

pub fn update_settings(
    store: &mut dyn Datastore,
    user: &User,
    manager_name: &str,
    gym_name: &str,
) -> Result<Profile> {
    let manager_name = required("manager name", manager_name)?;
    let gym_name = required("gym name", gym_name)?;
    store.update_profile_names(&user.id, &manager_name, &gym_name)?;
    store
        .profile(&user.id)?
        .ok_or_else(|| anyhow!("profile {} vanished after update", user.id))
}

pub fn dashboard(store: &mut dyn Datastore, user: &User) -> Result<Dashboard> {
    let Some(profile) = store.profile(&user.id)? else {
        return Ok(Dashboard::NeedsSetup);
    };
    let fighters = store.fighters_owned_by(&user.id)?;
    Ok(Dashboard::Ready { profile, fighters })
}

/// Checks a stored session against the backend and scopes the store to it.
/// Expired or revoked sessions yield `None`.
pub fn resume_session(store: &mut dyn Datastore, session: &Session) -> Result<Option<User>> {
    let Some(user) = store.session_user(&session.access_token)? else {
        return Ok(None);
    };
    store.attach_session(session);
    Ok(Some(user))
}
