use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::{Action, Expr, Role, Rule, RuleTable, Scope};
use crate::error::{ServiceError, ServiceResult};
use crate::store::Record;

/// Per-request access checker bound to the request's action and admin flag.
#[derive(Debug, Clone)]
pub struct AccessGuard {
    rules: Arc<RuleTable>,
    action: Option<Action>,
    is_admin: bool,
}

impl AccessGuard {
    pub fn new(rules: Arc<RuleTable>, action: Option<Action>, is_admin: bool) -> Self {
        Self {
            rules,
            action,
            is_admin,
        }
    }

    pub fn action(&self) -> Option<Action> {
        self.action
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// Authorize an operation on `collection` and redact guarded properties.
    ///
    /// `data` is the stored record (or list of records) being read or
    /// modified, `new_data` the incoming payload. A denied decision fails with
    /// `Credential` unless the request carries the admin header; a role check
    /// without any user fails with `Authorization`. Properties whose own rule
    /// fails are removed from `new_data` on create/update and from `data` on
    /// read.
    pub fn check(
        &self,
        user: Option<&Record>,
        collection: Option<&str>,
        mut data: Option<&mut Value>,
        mut new_data: Option<&mut Value>,
    ) -> ServiceResult<()> {
        let Some(action) = self.action else {
            return Ok(());
        };

        let record_id = data
            .as_deref()
            .and_then(|d| d.get("_id"))
            .map(|id| match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        let resolved = self.rules.resolve(action, collection, record_id.as_deref());
        let user = user.map(|u| Value::Object(u.clone()));

        let allowed = match resolved.rule {
            None => true,
            Some(rule) => {
                let scope = Scope {
                    user: user.as_ref(),
                    data: data.as_deref(),
                    new_data: new_data.as_deref(),
                };
                self.decide(rule, &scope)?
            }
        };
        if !allowed {
            if !self.is_admin {
                debug!(action = %action, collection = ?collection, "access denied");
                return Err(ServiceError::forbidden());
            }
            debug!(action = %action, collection = ?collection, "access granted by admin override");
        }

        for (prop, rule) in resolved.props {
            if action.writes() {
                let scope = Scope {
                    user: user.as_ref(),
                    data: data.as_deref(),
                    new_data: new_data.as_deref(),
                };
                if !self.prop_allowed(rule, &scope) {
                    if let Some(Value::Object(fields)) = new_data.as_deref_mut() {
                        fields.shift_remove(prop);
                    }
                }
            } else if action == Action::Read {
                match data.as_deref_mut() {
                    Some(Value::Array(items)) => {
                        for item in items.iter_mut() {
                            self.redact(item, prop, rule, user.as_ref(), new_data.as_deref());
                        }
                    }
                    Some(item) => self.redact(item, prop, rule, user.as_ref(), new_data.as_deref()),
                    None => {}
                }
            }
        }

        Ok(())
    }

    fn redact(&self, item: &mut Value, prop: &str, rule: &Rule, user: Option<&Value>, new_data: Option<&Value>) {
        let scope = Scope {
            user,
            data: Some(&*item),
            new_data,
        };
        if !self.prop_allowed(rule, &scope) {
            if let Value::Object(fields) = item {
                fields.shift_remove(prop);
            }
        }
    }

    fn decide(&self, rule: &Rule, scope: &Scope<'_>) -> ServiceResult<bool> {
        match rule {
            Rule::Allow(allow) => Ok(*allow),
            Rule::Expr(expr) => Ok(expr.test(scope)),
            Rule::Roles(roles) => self.check_roles(roles, scope),
        }
    }

    /// Property rules never fail the request; anything but a clear allow redacts.
    fn prop_allowed(&self, rule: &Rule, scope: &Scope<'_>) -> bool {
        self.decide(rule, scope).unwrap_or(false)
    }

    fn check_roles(&self, roles: &[Role], scope: &Scope<'_>) -> ServiceResult<bool> {
        if roles.contains(&Role::Guest) {
            return Ok(true);
        }
        if scope.user.is_none() && !self.is_admin {
            return Err(ServiceError::unauthorized());
        }
        if roles.contains(&Role::User) {
            return Ok(true);
        }
        if roles.contains(&Role::Owner) {
            return Ok(Expr::IsOwner.test(scope));
        }
        Ok(false)
    }
}
