//! Session records in the protected store.
//!
//! A session is `{ userId, accessToken }` where the token is the hash of the
//! session's own id, computed once when the session is created.

use serde_json::Value;

use crate::error::ServiceResult;
use crate::store::{DocumentStore, Record};

use super::hash::hash;

pub const SESSIONS: &str = "sessions";

/// Create a session for `user_id` and return it with its access token.
pub fn save_session(store: &dyn DocumentStore, user_id: &str) -> ServiceResult<Record> {
    let mut fields = Record::new();
    fields.insert("userId".into(), Value::String(user_id.to_string()));
    let session = store.add(SESSIONS, &fields)?;

    let id = session_id(&session);
    let mut with_token = Record::new();
    with_token.insert("accessToken".into(), Value::String(hash(&id)?));
    with_token.extend(session);

    Ok(store.set(SESSIONS, &id, &with_token)?)
}

/// First session whose token matches.
pub fn find_by_token(store: &dyn DocumentStore, token: &str) -> Option<Record> {
    find_one(store, "accessToken", token)
}

pub fn session_id(session: &Record) -> String {
    session
        .get("_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn find_one(store: &dyn DocumentStore, field: &str, value: &str) -> Option<Record> {
    let mut query = Record::new();
    query.insert(field.to_string(), Value::String(value.to_string()));
    store
        .query(SESSIONS, &query)
        .ok()
        .and_then(|found| found.into_iter().next())
}
