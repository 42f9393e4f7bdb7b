//! Service - named action table dispatched on method and first path token.
//!
//! Actions are tried in registration order. A pattern of `*` matches any
//! token, `:name` matches any token (or none) and captures it into the
//! context params, anything else must equal the token. The handler receives
//! the tokens after the matched one.
//!
//! ## Example
//!
//! ```ignore
//! let service = Service::new("util")
//!     .post("*", |ctx, _tokens, request| { /* ... */ })
//!     .get(":flag", |ctx, _tokens, _request| {
//!         let flag = ctx.param("flag");
//!         // ...
//!     });
//! ```

use serde_json::Value;

use super::context::Context;
use super::request::Request;
use crate::error::ServiceResult;

/// Successful handler result.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Json(Value),
    /// No result; rendered as 204 without a body.
    Empty,
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Json(value)
    }
}

impl From<Option<Value>> for Reply {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Reply::Empty, Reply::Json)
    }
}

type Handler = Box<dyn Fn(&Context, &[&str], &Request) -> ServiceResult<Reply> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Any,
    Param(String),
    Literal(String),
}

impl Pattern {
    fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            Pattern::Any
        } else if let Some(name) = pattern.strip_prefix(':') {
            Pattern::Param(name.to_string())
        } else {
            Pattern::Literal(pattern.to_string())
        }
    }
}

struct Action {
    method: &'static str,
    pattern: Pattern,
    handle: Handler,
}

/// A named group of actions.
pub struct Service {
    name: String,
    actions: Vec<Action>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register an action for `method` under `pattern`.
    pub fn on<F>(mut self, method: &'static str, pattern: &str, handler: F) -> Self
    where
        F: Fn(&Context, &[&str], &Request) -> ServiceResult<Reply> + Send + Sync + 'static,
    {
        self.actions.push(Action {
            method,
            pattern: Pattern::parse(pattern),
            handle: Box::new(handler),
        });
        self
    }

    pub fn get<F>(self, pattern: &str, handler: F) -> Self
    where
        F: Fn(&Context, &[&str], &Request) -> ServiceResult<Reply> + Send + Sync + 'static,
    {
        self.on("GET", pattern, handler)
    }

    pub fn post<F>(self, pattern: &str, handler: F) -> Self
    where
        F: Fn(&Context, &[&str], &Request) -> ServiceResult<Reply> + Send + Sync + 'static,
    {
        self.on("POST", pattern, handler)
    }

    pub fn put<F>(self, pattern: &str, handler: F) -> Self
    where
        F: Fn(&Context, &[&str], &Request) -> ServiceResult<Reply> + Send + Sync + 'static,
    {
        self.on("PUT", pattern, handler)
    }

    pub fn patch<F>(self, pattern: &str, handler: F) -> Self
    where
        F: Fn(&Context, &[&str], &Request) -> ServiceResult<Reply> + Send + Sync + 'static,
    {
        self.on("PATCH", pattern, handler)
    }

    pub fn delete<F>(self, pattern: &str, handler: F) -> Self
    where
        F: Fn(&Context, &[&str], &Request) -> ServiceResult<Reply> + Send + Sync + 'static,
    {
        self.on("DELETE", pattern, handler)
    }

    /// Run the first action matching the request. No match yields `Reply::Empty`.
    pub fn dispatch(&self, context: &mut Context, tokens: &[&str], request: &Request) -> ServiceResult<Reply> {
        let first = tokens.first().copied();
        for action in &self.actions {
            if action.method != request.method {
                continue;
            }
            let matched = match &action.pattern {
                Pattern::Any => true,
                Pattern::Param(name) => {
                    context.set_param(name, first);
                    true
                }
                Pattern::Literal(literal) => first == Some(literal.as_str()),
            };
            if matched {
                let rest = tokens.get(1..).unwrap_or(&[]);
                return (action.handle)(context, rest, request);
            }
        }
        Ok(Reply::Empty)
    }
}
