//! Context decorators run, in order, before every service call.

use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};

use super::context::Context;
use super::request::Request;
use crate::auth::Auth;
use crate::error::{ServiceError, ServiceResult};
use crate::rules::{truthy, AccessGuard, Action, RuleTable};
use crate::store::DocumentStore;

/// Header carrying the session access token.
pub const AUTH_HEADER: &str = "x-authorization";
/// Header whose presence overrides rule denials.
pub const ADMIN_HEADER: &str = "x-admin";

/// A step that decorates the request context.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn decorate(&self, context: &mut Context, request: &Request) -> ServiceResult<()>;
}

/// Attaches both document stores.
pub struct StoragePlugin {
    storage: Arc<dyn DocumentStore>,
    protected: Arc<dyn DocumentStore>,
}

impl StoragePlugin {
    pub fn new(storage: Arc<dyn DocumentStore>, protected: Arc<dyn DocumentStore>) -> Self {
        Self { storage, protected }
    }
}

impl Plugin for StoragePlugin {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn decorate(&self, context: &mut Context, _request: &Request) -> ServiceResult<()> {
        context.set_storage(self.storage.clone(), self.protected.clone());
        Ok(())
    }
}

/// Attaches the auth operations and resolves the access token, when sent.
///
/// A missing header leaves the request anonymous. A header that does not
/// resolve to a live session fails the request.
pub struct AuthPlugin {
    auth: Auth,
}

impl AuthPlugin {
    pub fn new(auth: Auth) -> Self {
        Self { auth }
    }
}

impl Plugin for AuthPlugin {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn decorate(&self, context: &mut Context, request: &Request) -> ServiceResult<()> {
        context.set_auth(self.auth.clone());
        if let Some(token) = request.header_value(AUTH_HEADER) {
            let authenticated = self.auth.resolve_token(token)?;
            context.set_user(authenticated.user);
            context.set_session(authenticated.session_id);
        }
        Ok(())
    }
}

/// Runtime toggles shared by every request, such as `throttle`.
#[derive(Debug, Clone, Default)]
pub struct Flags {
    values: Arc<RwLock<Map<String, Value>>>,
}

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: Map<String, Value>) -> Self {
        Self {
            values: Arc::new(RwLock::new(values)),
        }
    }

    pub fn get(&self, name: &str) -> ServiceResult<Option<Value>> {
        let values = self
            .values
            .read()
            .map_err(|_| ServiceError::Internal("util flags lock poisoned".into()))?;
        Ok(values.get(name).cloned())
    }

    pub fn set(&self, name: &str, value: Value) -> ServiceResult<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| ServiceError::Internal("util flags lock poisoned".into()))?;
        values.insert(name.to_string(), value);
        Ok(())
    }

    /// Whether `name` is set to a truthy value.
    pub fn enabled(&self, name: &str) -> bool {
        matches!(self.get(name), Ok(Some(value)) if truthy(&value))
    }
}

pub struct UtilPlugin {
    flags: Flags,
}

impl UtilPlugin {
    pub fn new(flags: Flags) -> Self {
        Self { flags }
    }
}

impl Plugin for UtilPlugin {
    fn name(&self) -> &'static str {
        "util"
    }

    fn decorate(&self, context: &mut Context, _request: &Request) -> ServiceResult<()> {
        context.set_util(self.flags.clone());
        Ok(())
    }
}

/// Binds an access guard for the request's method and admin header.
pub struct RulesPlugin {
    rules: Arc<RuleTable>,
}

impl RulesPlugin {
    pub fn new(rules: Arc<RuleTable>) -> Self {
        Self { rules }
    }
}

impl Plugin for RulesPlugin {
    fn name(&self) -> &'static str {
        "rules"
    }

    fn decorate(&self, context: &mut Context, request: &Request) -> ServiceResult<()> {
        let action = Action::from_method(&request.method);
        let is_admin = request.header_value(ADMIN_HEADER).is_some();
        context.set_guard(AccessGuard::new(self.rules.clone(), action, is_admin));
        Ok(())
    }
}
