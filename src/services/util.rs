//! Runtime toggles: `POST /util` sets flags from the body, `GET /util/:flag` reads one.

use serde_json::Value;
use tracing::info;

use crate::error::ServiceResult;
use crate::server::{Context, Reply, Request, Service};
use crate::rules::truthy;

pub const NAME: &str = "util";

pub fn service() -> Service {
    Service::new(NAME).post("*", set_flags).get(":flag", flag)
}

fn set_flags(context: &Context, _tokens: &[&str], request: &Request) -> ServiceResult<Reply> {
    let flags = context.util()?;
    if let Value::Object(entries) = &request.body {
        for (name, value) in entries {
            let state = if truthy(value) { "enabled" } else { "disabled" };
            info!("{} {}", name, state);
            flags.set(name, value.clone())?;
        }
    }
    Ok(Value::String(String::new()).into())
}

fn flag(context: &Context, _tokens: &[&str], _request: &Request) -> ServiceResult<Reply> {
    let Some(name) = context.param("flag") else {
        return Ok(Reply::Empty);
    };
    Ok(context.util()?.get(name)?.into())
}
