//! Token-based authentication backed by the protected store.
//!
//! Users live in the `users` collection and sessions in `sessions`, both in
//! the protected store. Passwords are stored only as `hashedPassword`; the
//! access token handed to clients is the hash of the session id.

mod hash;
mod session;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ServiceError, ServiceResult};
use crate::store::{DocumentStore, Record};

pub use hash::hash;
pub use session::{find_by_token, save_session, session_id, SESSIONS};

pub const USERS: &str = "users";

/// A resolved access token.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub session_id: String,
    pub user: Record,
}

/// Register, login and logout against the protected store.
#[derive(Clone)]
pub struct Auth {
    identity: String,
    store: Arc<dyn DocumentStore>,
}

impl Auth {
    /// `identity` names the unique login field, `email` by default.
    pub fn new(identity: impl Into<String>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            identity: identity.into(),
            store,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Create a user and a first session for it.
    ///
    /// Fails with `Request` when the identity or password is missing or empty
    /// and with `Conflict` when the identity is already taken.
    pub fn register(&self, body: &Value) -> ServiceResult<Record> {
        let fields = body.as_object().cloned().unwrap_or_default();
        let (Some(identity), Some(password)) = (
            present(&fields, &self.identity),
            present(&fields, "password"),
        ) else {
            return Err(ServiceError::Request("Missing fields".into()));
        };
        let password = as_text(password);

        let mut query = Record::new();
        query.insert(self.identity.clone(), identity.clone());
        if !self.store.query(USERS, &query).unwrap_or_default().is_empty() {
            return Err(ServiceError::Conflict(format!(
                "A user with the same {} already exists",
                self.identity
            )));
        }

        let mut user = fields.clone();
        user.shift_remove("password");
        user.insert("hashedPassword".into(), Value::String(hash(&password)?));

        let mut created = self.store.add(USERS, &user)?;
        created.shift_remove("hashedPassword");
        info!(identity = %as_text(identity), "registered new user");

        self.attach_session(created)
    }

    /// Start a new session for the user matching identity and password.
    ///
    /// Prior sessions of the same user stay valid.
    pub fn login(&self, body: &Value) -> ServiceResult<Record> {
        let mismatch = || ServiceError::Credential("Login or password don't match".into());

        let identity = body.get(&self.identity).cloned().unwrap_or(Value::Null);
        let mut query = Record::new();
        query.insert(self.identity.clone(), identity);
        let mut found = self.store.query(USERS, &query).unwrap_or_default();
        if found.len() != 1 {
            return Err(mismatch());
        }
        let mut user = found.remove(0);

        let password = body.get("password").ok_or_else(mismatch)?;
        let stored = user.get("hashedPassword").and_then(Value::as_str);
        if stored != Some(hash(&as_text(password))?.as_str()) {
            return Err(mismatch());
        }

        user.shift_remove("hashedPassword");
        self.attach_session(user)
    }

    /// End the session the request was authenticated with.
    ///
    /// Other sessions of the same user stay valid.
    pub fn logout(&self, session_id: Option<&str>) -> ServiceResult<()> {
        let missing = || ServiceError::Credential("User session does not exist".into());
        let session_id = session_id.ok_or_else(missing)?;
        self.store.delete(SESSIONS, session_id).map_err(|_| missing())?;
        debug!(session_id = %session_id, "session closed");
        Ok(())
    }

    /// Resolve an access token to its session and user record.
    pub fn resolve_token(&self, token: &str) -> ServiceResult<Authenticated> {
        let invalid = || ServiceError::Credential("Invalid access token".into());

        let session = find_by_token(self.store.as_ref(), token).ok_or_else(invalid)?;
        let user_id = session
            .get("userId")
            .and_then(Value::as_str)
            .ok_or_else(invalid)?;
        let user = self.store.get(USERS, user_id).map_err(|_| invalid())?;

        debug!(identity = %user.get(&self.identity).map(as_text).unwrap_or_default(), "authorized");
        Ok(Authenticated {
            session_id: session_id(&session),
            user,
        })
    }

    fn attach_session(&self, mut user: Record) -> ServiceResult<Record> {
        let user_id = user
            .get("_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let session = save_session(self.store.as_ref(), &user_id)?;
        let token = session.get("accessToken").cloned().unwrap_or(Value::Null);
        user.insert("accessToken".into(), token);
        Ok(user)
    }
}

/// A field counts as present when it exists, is not null and is not an empty string.
fn present<'a>(fields: &'a Record, name: &str) -> Option<&'a Value> {
    match fields.get(name) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(value) => Some(value),
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
