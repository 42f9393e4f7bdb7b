//! In-memory REST backend for front-end practice.
//!
//! A request passes the plugin pipeline (storage, auth, util, rules) and is
//! then handled by the service named in its first path segment. Everything
//! lives in memory and is seeded from [`Settings`].

pub mod auth;
pub mod config;
pub mod error;
pub mod rules;
pub mod server;
pub mod services;
pub mod store;

#[cfg(feature = "http")]
pub mod http;

pub use auth::{Auth, Authenticated};
pub use config::{ConfigError, Settings};
pub use error::{ServiceError, ServiceResult};
pub use rules::{AccessGuard, Action, Role, Rule, RuleError, RuleTable};
pub use server::{Context, Flags, Plugin, Reply, Request, Response, Server, Service};
pub use store::{DocumentStore, InMemoryStore, Record, SeedData, StoreError};
