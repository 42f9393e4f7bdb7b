//! Context passed to service handlers.
//!
//! Starts empty for every request; plugins fill in the store handles, the
//! authenticated user, the shared util flags and the access guard. Handlers
//! reach everything they need through it.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::plugin::Flags;
use crate::auth::Auth;
use crate::error::{ServiceError, ServiceResult};
use crate::rules::AccessGuard;
use crate::store::{DocumentStore, Record};

#[derive(Default)]
pub struct Context {
    storage: Option<Arc<dyn DocumentStore>>,
    protected: Option<Arc<dyn DocumentStore>>,
    auth: Option<Auth>,
    user: Option<Record>,
    /// Id of the session the access token resolved to.
    session: Option<String>,
    util: Option<Flags>,
    guard: Option<AccessGuard>,
    /// Path parameters captured by `:name` action patterns.
    params: HashMap<String, Option<String>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// The general document store.
    pub fn storage(&self) -> ServiceResult<&dyn DocumentStore> {
        self.storage
            .as_deref()
            .ok_or_else(|| missing("storage"))
    }

    /// The store holding `users` and `sessions`.
    pub fn protected_storage(&self) -> ServiceResult<&dyn DocumentStore> {
        self.protected
            .as_deref()
            .ok_or_else(|| missing("protected storage"))
    }

    pub fn auth(&self) -> ServiceResult<&Auth> {
        self.auth.as_ref().ok_or_else(|| missing("auth"))
    }

    pub fn util(&self) -> ServiceResult<&Flags> {
        self.util.as_ref().ok_or_else(|| missing("util"))
    }

    /// The authenticated user, if the request carried a valid token.
    pub fn user(&self) -> Option<&Record> {
        self.user.as_ref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user
            .as_ref()
            .and_then(|user| user.get("_id"))
            .and_then(Value::as_str)
    }

    /// A captured path parameter. `None` when absent or not captured.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(|value| value.as_deref())
    }

    /// Authorize the current request against the `collection` parameter.
    ///
    /// See [`AccessGuard::check`]. Without a rules plugin every request is
    /// allowed.
    pub fn can_access(&self, data: Option<&mut Value>, new_data: Option<&mut Value>) -> ServiceResult<()> {
        match &self.guard {
            Some(guard) => guard.check(self.user(), self.param("collection"), data, new_data),
            None => Ok(()),
        }
    }

    pub fn set_storage(&mut self, storage: Arc<dyn DocumentStore>, protected: Arc<dyn DocumentStore>) {
        self.storage = Some(storage);
        self.protected = Some(protected);
    }

    pub fn set_auth(&mut self, auth: Auth) {
        self.auth = Some(auth);
    }

    pub fn set_user(&mut self, user: Record) {
        self.user = Some(user);
    }

    pub fn set_session(&mut self, session_id: String) {
        self.session = Some(session_id);
    }

    pub fn set_util(&mut self, util: Flags) {
        self.util = Some(util);
    }

    pub fn set_guard(&mut self, guard: AccessGuard) {
        self.guard = Some(guard);
    }

    pub fn set_param(&mut self, name: &str, value: Option<&str>) {
        self.params
            .insert(name.to_string(), value.map(|v| v.to_string()));
    }

    /// Whether the util `throttle` flag is on.
    pub fn throttled(&self) -> bool {
        self.util
            .as_ref()
            .is_some_and(|flags| flags.enabled("throttle"))
    }
}

fn missing(what: &str) -> ServiceError {
    ServiceError::Internal(format!("{} plugin is not installed", what))
}
