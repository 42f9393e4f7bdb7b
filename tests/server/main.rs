//! Server integration tests.

mod support;
mod crud;
mod query;
mod rules;
mod users;

#[cfg(feature = "http")]
mod http;
