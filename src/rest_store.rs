use anyhow::{Context, Result, anyhow};
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use crate::auth;
use crate::config::Config;
use crate::datastore::{Datastore, ProfileDraft, Transfer, TransferOutcome};
use crate::fighter::{Fighter, NewFighter, Profile, Session, User};
use crate::http_client::build_http_client;

const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=representation";
const PREFER_RETURN: &str = "return=representation";

/// Row and auth access to the hosted backend (PostgREST + GoTrue endpoints).
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl RestStore {
    pub fn new(config: &Config, url: &str, key: &str) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            base_url: url.trim().trim_end_matches('/').to_string(),
            api_key: key.trim().to_string(),
            access_token: None,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn request(&self, method: Method, url: &str, bearer: Option<&str>) -> RequestBuilder {
        let bearer = bearer
            .or(self.access_token.as_deref())
            .unwrap_or(self.api_key.as_str());
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    fn select<T: DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<T>> {
        let mut params: Vec<(&str, String)> = vec![("select", "*".to_string())];
        params.extend(query.iter().cloned());
        let resp = self
            .request(Method::GET, &self.table_url(table), None)
            .query(&params)
            .send()
            .with_context(|| format!("select from {table}"))?;
        read_rows(resp)
    }

    fn write<T: DeserializeOwned>(
        &self,
        method: Method,
        table: &str,
        query: &[(&str, String)],
        prefer: &str,
        body: &Value,
    ) -> Result<Vec<T>> {
        let resp = self
            .request(method, &self.table_url(table), None)
            .query(query)
            .header("Prefer", prefer)
            .json(body)
            .send()
            .with_context(|| format!("write to {table}"))?;
        read_rows(resp)
    }

    fn auth_post(&self, path: &str, body: &Value) -> Result<Value> {
        let resp = self
            .request(Method::POST, &self.auth_url(path), Some(self.api_key.as_str()))
            .json(body)
            .send()
            .with_context(|| format!("auth request {path}"))?;
        read_json(resp)
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

/// PostgREST `ilike` filter; `*` is its wildcard, so it is dropped from input.
pub fn ilike_filter(needle: &str) -> String {
    let cleaned: String = needle.chars().filter(|c| !matches!(c, '*' | '%')).collect();
    format!("ilike.*{cleaned}*")
}

fn read_json(resp: Response) -> Result<Value> {
    let status = resp.status();
    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow!("http {}: {}", status, body));
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str::<Value>(body.trim()).context("invalid json body")
}

fn read_rows<T: DeserializeOwned>(resp: Response) -> Result<Vec<T>> {
    let value = read_json(resp)?;
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value::<Vec<T>>(value).context("decode rows")
}

pub fn parse_user(v: &Value) -> Option<User> {
    let id = v.get("id")?.as_str()?.to_string();
    let email = v
        .get("email")
        .and_then(|e| e.as_str())
        .unwrap_or_default()
        .to_string();
    Some(User { id, email })
}

/// Session out of a sign-up or token response; `None` when the backend
/// created the user but withheld a session (email confirmation pending).
pub fn parse_session(v: &Value) -> Option<Session> {
    let access_token = v.get("access_token")?.as_str()?.to_string();
    let user = parse_user(v.get("user")?)?;
    Some(Session { access_token, user })
}

// Row operations a REST purchase is assembled from.
trait TransferRows {
    fn set_cash_if(&self, buyer_id: &str, expected: i64, new_cash: i64) -> Result<bool>;
    fn claim_fighter(&self, fighter_id: i64, buyer_id: &str) -> Result<bool>;
    fn fighter_owner(&self, fighter_id: i64) -> Result<Option<String>>;
}

impl TransferRows for RestStore {
    fn set_cash_if(&self, buyer_id: &str, expected: i64, new_cash: i64) -> Result<bool> {
        let rows: Vec<Profile> = self.write(
            Method::PATCH,
            "profiles",
            &[("id", eq(buyer_id)), ("cash", eq(expected))],
            PREFER_RETURN,
            &json!({ "cash": new_cash }),
        )?;
        Ok(!rows.is_empty())
    }

    fn claim_fighter(&self, fighter_id: i64, buyer_id: &str) -> Result<bool> {
        let rows: Vec<Fighter> = self.write(
            Method::PATCH,
            "fighters",
            &[("id", eq(fighter_id)), ("owner_id", "is.null".to_string())],
            PREFER_RETURN,
            &json!({ "owner_id": buyer_id }),
        )?;
        Ok(!rows.is_empty())
    }

    fn fighter_owner(&self, fighter_id: i64) -> Result<Option<String>> {
        let rows: Vec<Fighter> = self.select("fighters", &[("id", eq(fighter_id))])?;
        Ok(rows.into_iter().next().and_then(|f| f.owner_id))
    }
}

// No cross-table transaction over REST: compare-and-set the balance, then
// claim the fighter, and give the money back only once the claim is known
// not to have landed.
fn run_transfer<R: TransferRows + ?Sized>(rows: &R, t: &Transfer) -> Result<TransferOutcome> {
    let cash_left = t.expected_cash - t.price;
    if !rows.set_cash_if(&t.buyer_id, t.expected_cash, cash_left)? {
        debug!(buyer = %t.buyer_id, "balance changed before debit");
        return Ok(TransferOutcome::Conflict);
    }

    let claim_err = match rows.claim_fighter(t.fighter_id, &t.buyer_id) {
        Ok(true) => return Ok(TransferOutcome::Completed { cash_left }),
        Ok(false) => {
            warn!(fighter = t.fighter_id, "fighter already claimed, refunding buyer");
            refund(rows, t)?;
            return Ok(TransferOutcome::Conflict);
        }
        Err(err) => err,
    };

    // The claim may have been applied before the error came back.
    match rows.fighter_owner(t.fighter_id) {
        Ok(Some(owner)) if owner == t.buyer_id => {
            warn!(fighter = t.fighter_id, error = %claim_err, "claim reported an error but landed");
            Ok(TransferOutcome::Completed { cash_left })
        }
        Ok(owner) => {
            if let Err(refund_err) = refund(rows, t) {
                error!(buyer = %t.buyer_id, error = %refund_err, "refund after failed claim failed");
                return Err(claim_err.context(format!("refund failed: {refund_err}")));
            }
            if owner.is_some() {
                return Ok(TransferOutcome::Conflict);
            }
            Err(claim_err)
        }
        Err(read_err) => {
            error!(
                buyer = %t.buyer_id,
                fighter = t.fighter_id,
                error = %read_err,
                "claim outcome unknown, buyer left debited"
            );
            Err(claim_err.context(format!(
                "claim outcome unknown ({read_err}); {} left debited by {}",
                t.buyer_id, t.price
            )))
        }
    }
}

fn refund<R: TransferRows + ?Sized>(rows: &R, t: &Transfer) -> Result<()> {
    let restored = rows.set_cash_if(&t.buyer_id, t.expected_cash - t.price, t.expected_cash)?;
    if !restored {
        return Err(anyhow!(
            "refund of {} to {} found an unexpected balance",
            t.price,
            t.buyer_id
        ));
    }
    Ok(())
}

impl Datastore for RestStore {
    fn upsert_fighter(&mut self, fighter: &NewFighter) -> Result<Fighter> {
        let body = serde_json::to_value([fighter]).context("serialize fighter")?;
        let rows: Vec<Fighter> = self.write(
            Method::POST,
            "fighters",
            &[("on_conflict", "name".to_string())],
            PREFER_UPSERT,
            &body,
        )?;
        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("upsert of {} returned no row", fighter.name))
    }

    fn fighter(&mut self, id: i64) -> Result<Option<Fighter>> {
        Ok(self.select::<Fighter>("fighters", &[("id", eq(id))])?.into_iter().next())
    }

    fn fighter_by_name(&mut self, name: &str) -> Result<Option<Fighter>> {
        Ok(self
            .select::<Fighter>("fighters", &[("name", eq(name))])?
            .into_iter()
            .next())
    }

    fn fighters_by_wins(&mut self) -> Result<Vec<Fighter>> {
        self.select("fighters", &[("order", "wins.desc".to_string())])
    }

    fn search_fighters(&mut self, needle: &str, limit: usize) -> Result<Vec<Fighter>> {
        self.select(
            "fighters",
            &[("name", ilike_filter(needle)), ("limit", limit.to_string())],
        )
    }

    fn market_listings(&mut self) -> Result<Vec<Fighter>> {
        self.select(
            "fighters",
            &[
                ("owner_id", "is.null".to_string()),
                ("order", "value.desc".to_string()),
            ],
        )
    }

    fn fighters_owned_by(&mut self, owner_id: &str) -> Result<Vec<Fighter>> {
        self.select(
            "fighters",
            &[("owner_id", eq(owner_id)), ("order", "wins.desc".to_string())],
        )
    }

    fn profile(&mut self, id: &str) -> Result<Option<Profile>> {
        Ok(self.select::<Profile>("profiles", &[("id", eq(id))])?.into_iter().next())
    }

    fn upsert_profile(&mut self, draft: &ProfileDraft) -> Result<Profile> {
        let body = json!([{
            "id": draft.id,
            "manager_name": draft.manager_name,
            "gym_name": draft.gym_name,
            "updated_at": draft.updated_at,
        }]);
        let rows: Vec<Profile> = self.write(Method::POST, "profiles", &[], PREFER_UPSERT, &body)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("profile upsert for {} returned no row", draft.id))
    }

    fn update_profile_names(&mut self, id: &str, manager_name: &str, gym_name: &str) -> Result<()> {
        let rows: Vec<Profile> = self.write(
            Method::PATCH,
            "profiles",
            &[("id", eq(id))],
            PREFER_RETURN,
            &json!({ "manager_name": manager_name, "gym_name": gym_name }),
        )?;
        if rows.is_empty() {
            return Err(anyhow!("no profile with id {id}"));
        }
        Ok(())
    }

    fn transfer_fighter(&mut self, t: &Transfer) -> Result<TransferOutcome> {
        run_transfer(&*self, t)
    }

    fn sign_up(&mut self, email: &str, password: &str) -> Result<Session> {
        auth::validate_credentials(email, password)?;
        let value = self.auth_post("signup", &json!({ "email": email.trim(), "password": password }))?;
        parse_session(&value).ok_or_else(|| {
            anyhow!("account created; confirm the email address, then sign in")
        })
    }

    fn sign_in(&mut self, email: &str, password: &str) -> Result<Session> {
        let value = self.auth_post(
            "token?grant_type=password",
            &json!({ "email": email.trim(), "password": password }),
        )?;
        parse_session(&value).ok_or_else(|| anyhow!("sign-in response carried no session"))
    }

    fn session_user(&mut self, access_token: &str) -> Result<Option<User>> {
        let resp = self
            .request(Method::GET, &self.auth_url("user"), Some(access_token))
            .send()
            .context("fetch session user")?;
        if matches!(resp.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Ok(None);
        }
        let value = read_json(resp)?;
        Ok(parse_user(&value))
    }

    fn sign_out(&mut self, access_token: &str) -> Result<()> {
        let resp = self
            .request(Method::POST, &self.auth_url("logout"), Some(access_token))
            .send()
            .context("sign out")?;
        read_json(resp)?;
        if self.access_token.as_deref() == Some(access_token) {
            self.access_token = None;
        }
        Ok(())
    }

    fn attach_session(&mut self, session: &Session) {
        self.access_token = Some(session.access_token.clone());
    }
}
