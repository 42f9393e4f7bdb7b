//! Server settings.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use crate::rules::RuleError;
use crate::store::SeedData;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid access rules: {0}")]
    Rules(#[from] RuleError),
}

/// Start-up configuration for a [`Server`](crate::Server).
///
/// Every field is optional in JSON form:
///
/// ```json
/// {
///   "identity": "email",
///   "seedData": { "recipes": { "r1": { "_ownerId": "u1", "name": "Soup" } } },
///   "protectedData": { "users": { "u1": { "email": "a@b.c", "hashedPassword": "..." } } },
///   "rules": { "users": { ".create": false, ".read": ["Owner"] } },
///   "throttle": false
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Name of the unique login field on user records.
    pub identity: String,
    /// Records loaded into the general store.
    pub seed_data: SeedData,
    /// Records loaded into the protected store (`users`, `sessions`).
    pub protected_data: SeedData,
    /// Access rules laid over the built-in defaults.
    pub rules: Value,
    /// Initial tree served by the `jsonstore` service.
    pub json_store: Map<String, Value>,
    /// Initial state of the artificial response delay.
    pub throttle: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            identity: "email".to_string(),
            seed_data: SeedData::new(),
            protected_data: SeedData::new(),
            rules: Value::Object(Map::new()),
            json_store: Map::new(),
            throttle: false,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let settings = Self::from_json_str(&fs::read_to_string(path)?)?;
        info!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn with_seed_data(mut self, seed: SeedData) -> Self {
        self.seed_data = seed;
        self
    }

    pub fn with_protected_data(mut self, seed: SeedData) -> Self {
        self.protected_data = seed;
        self
    }

    pub fn with_rules(mut self, rules: Value) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_json_store(mut self, tree: Map<String, Value>) -> Self {
        self.json_store = tree;
        self
    }

    pub fn with_throttle(mut self, throttle: bool) -> Self {
        self.throttle = throttle;
        self
    }
}
