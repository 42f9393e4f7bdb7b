//! Declarative access rules.
//!
//! A [`RuleTable`] is built once from JSON settings. For every request the
//! [`AccessGuard`] resolves the rule that applies to the action, collection
//! and record, evaluates it, and redacts properties whose own rules fail.

mod expr;
mod guard;

use std::collections::HashMap;
use std::fmt;

use serde_json::{json, Map, Value};
use thiserror::Error;

pub use expr::{truthy, CmpOp, Expr, Root, Scope};
pub use guard::AccessGuard;

/// Key used for the wildcard collection and the wildcard property set.
pub const WILDCARD: &str = "*";

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid rule expression '{expr}': {message}")]
    Syntax { expr: String, message: String },

    #[error("unknown role '{0}'")]
    UnknownRole(String),

    #[error("unknown rule action '{0}'")]
    UnknownAction(String),

    #[error("invalid rule at {path}: {reason}")]
    Invalid { path: String, reason: String },
}

/// Operation a request performs, derived from its HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    /// `OPTIONS` and unknown methods have no action and are never checked.
    pub fn from_method(method: &str) -> Option<Action> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Some(Action::Read),
            "POST" => Some(Action::Create),
            "PUT" | "PATCH" => Some(Action::Update),
            "DELETE" => Some(Action::Delete),
            _ => None,
        }
    }

    pub fn from_key(key: &str) -> Option<Action> {
        match key {
            ".create" => Some(Action::Create),
            ".read" => Some(Action::Read),
            ".update" => Some(Action::Update),
            ".delete" => Some(Action::Delete),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Action::Create => ".create",
            Action::Read => ".read",
            Action::Update => ".update",
            Action::Delete => ".delete",
        }
    }

    /// Whether property redaction applies to the incoming payload.
    pub fn writes(&self) -> bool {
        matches!(self, Action::Create | Action::Update)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Guest,
    User,
    Owner,
}

impl Role {
    fn parse(name: &str) -> Result<Role, RuleError> {
        match name {
            "Guest" => Ok(Role::Guest),
            "User" => Ok(Role::User),
            "Owner" => Ok(Role::Owner),
            other => Err(RuleError::UnknownRole(other.to_string())),
        }
    }
}

/// A single authorization decision source.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Allow(bool),
    Roles(Vec<Role>),
    Expr(Expr),
}

impl Rule {
    /// Parse a rule value. `null`, an empty role list and an empty expression
    /// all mean "not set" and yield `None`.
    pub fn from_json(value: &Value, path: &str) -> Result<Option<Rule>, RuleError> {
        match value {
            Value::Null => Ok(None),
            Value::Bool(allow) => Ok(Some(Rule::Allow(*allow))),
            Value::Array(items) if items.is_empty() => Ok(None),
            Value::Array(items) => {
                let roles = items
                    .iter()
                    .map(|item| match item {
                        Value::String(name) => Role::parse(name),
                        other => Err(RuleError::Invalid {
                            path: path.to_string(),
                            reason: format!("role must be a string, got {}", other),
                        }),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Some(Rule::Roles(roles)))
            }
            Value::String(source) if source.trim().is_empty() => Ok(None),
            Value::String(source) => Expr::parse(source).map(|e| Some(Rule::Expr(e))),
            other => Err(RuleError::Invalid {
                path: path.to_string(),
                reason: format!("expected boolean, role list or expression, got {}", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ActionRules(HashMap<Action, Rule>);

impl ActionRules {
    fn get(&self, action: Action) -> Option<&Rule> {
        self.0.get(&action)
    }

    fn set(&mut self, key: &str, value: &Value, path: &str) -> Result<(), RuleError> {
        let action = Action::from_key(key).ok_or_else(|| RuleError::UnknownAction(key.to_string()))?;
        if let Some(rule) = Rule::from_json(value, &format!("{}.{}", path, key))? {
            self.0.insert(action, rule);
        }
        Ok(())
    }
}

/// Per-property rules in declaration order.
#[derive(Debug, Clone, Default)]
struct PropRules(Vec<(String, ActionRules)>);

impl PropRules {
    fn parse(value: &Value, path: &str) -> Result<PropRules, RuleError> {
        let mut props = Vec::new();
        for (prop, rules) in object(value, path)? {
            let prop_path = format!("{}.{}", path, prop);
            let mut actions = ActionRules::default();
            for (key, rule) in object(rules, &prop_path)? {
                actions.set(key, rule, &prop_path)?;
            }
            props.push((prop.clone(), actions));
        }
        Ok(PropRules(props))
    }

    fn for_action(&self, action: Action) -> Vec<(&str, &Rule)> {
        self.0
            .iter()
            .filter_map(|(prop, rules)| rules.get(action).map(|rule| (prop.as_str(), rule)))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
struct RecordRules {
    actions: ActionRules,
    props: PropRules,
}

#[derive(Debug, Clone, Default)]
struct CollectionRules {
    actions: ActionRules,
    props: PropRules,
    records: HashMap<String, RecordRules>,
}

impl CollectionRules {
    fn parse(value: &Value, path: &str) -> Result<CollectionRules, RuleError> {
        let mut rules = CollectionRules::default();
        for (key, entry) in object(value, path)? {
            if key.starts_with('.') {
                rules.actions.set(key, entry, path)?;
            } else if key == WILDCARD {
                rules.props = PropRules::parse(entry, &format!("{}.*", path))?;
            } else {
                let record_path = format!("{}.{}", path, key);
                let mut record = RecordRules::default();
                let mut props = Map::new();
                for (field, rule) in object(entry, &record_path)? {
                    if field.starts_with('.') {
                        record.actions.set(field, rule, &record_path)?;
                    } else {
                        props.insert(field.clone(), rule.clone());
                    }
                }
                record.props = PropRules::parse(&Value::Object(props), &record_path)?;
                rules.records.insert(key.clone(), record);
            }
        }
        Ok(rules)
    }
}

/// Rule applicable to one check, plus the property rules to enforce after it.
#[derive(Debug)]
pub struct Resolved<'a> {
    /// `None` means allowed.
    pub rule: Option<&'a Rule>,
    pub props: Vec<(&'a str, &'a Rule)>,
}

/// Authorization rules keyed by collection, record and property.
#[derive(Debug, Clone)]
pub struct RuleTable {
    collections: HashMap<String, CollectionRules>,
}

impl Default for RuleTable {
    fn default() -> Self {
        // The built-in defaults are static and always valid.
        match Self::from_json(&Value::Null) {
            Ok(table) => table,
            Err(_) => RuleTable {
                collections: HashMap::new(),
            },
        }
    }
}

impl RuleTable {
    /// Built-in rules every table starts from.
    pub fn defaults() -> Value {
        json!({
            "*": {
                ".create": ["User"],
                ".update": ["Owner"],
                ".delete": ["Owner"]
            }
        })
    }

    /// Build a table from configured rules laid over the defaults.
    ///
    /// Top-level entries replace the default entry of the same name wholesale.
    pub fn from_json(configured: &Value) -> Result<RuleTable, RuleError> {
        let mut merged = match Self::defaults() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        match configured {
            Value::Null => {}
            Value::Object(entries) => {
                for (name, entry) in entries {
                    merged.insert(name.clone(), entry.clone());
                }
            }
            other => {
                return Err(RuleError::Invalid {
                    path: "rules".into(),
                    reason: format!("expected an object, got {}", other),
                })
            }
        }

        let collections = merged
            .iter()
            .map(|(name, entry)| {
                CollectionRules::parse(entry, name).map(|rules| (name.clone(), rules))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(RuleTable { collections })
    }

    /// Resolve the rule for `action` on `collection`, optionally narrowed to a record.
    ///
    /// The wildcard rule is overridden by the collection rule, which is
    /// overridden by the record rule. Record-level property rules replace the
    /// collection's wildcard property rules when any apply.
    pub fn resolve(&self, action: Action, collection: Option<&str>, record_id: Option<&str>) -> Resolved<'_> {
        let mut rule = self
            .collections
            .get(WILDCARD)
            .and_then(|wildcard| wildcard.actions.get(action));
        let mut props = Vec::new();

        if let Some(rules) = collection.and_then(|name| self.collections.get(name)) {
            rule = rules.actions.get(action).or(rule);
            props = rules.props.for_action(action);

            if let Some(record) = record_id.and_then(|id| rules.records.get(id)) {
                rule = record.actions.get(action).or(rule);
                let record_props = record.props.for_action(action);
                if !record_props.is_empty() {
                    props = record_props;
                }
            }
        }

        Resolved { rule, props }
    }
}

fn object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, RuleError> {
    value.as_object().ok_or_else(|| RuleError::Invalid {
        path: path.to_string(),
        reason: format!("expected an object, got {}", value),
    })
}
