//! Account endpoints: `me`, `register`, `login` and `logout`.

use serde_json::Value;

use crate::error::{ServiceError, ServiceResult};
use crate::server::{Context, Reply, Request, Service};

pub const NAME: &str = "users";

pub fn service() -> Service {
    Service::new(NAME)
        .get("me", me)
        .post("register", register)
        .post("login", login)
        .get("logout", logout)
}

fn me(context: &Context, _tokens: &[&str], _request: &Request) -> ServiceResult<Reply> {
    let mut user = context.user().cloned().ok_or_else(ServiceError::unauthorized)?;
    user.shift_remove("hashedPassword");
    Ok(Value::Object(user).into())
}

fn register(context: &Context, _tokens: &[&str], request: &Request) -> ServiceResult<Reply> {
    let user = context.auth()?.register(&request.body)?;
    Ok(Value::Object(user).into())
}

fn login(context: &Context, _tokens: &[&str], request: &Request) -> ServiceResult<Reply> {
    let user = context.auth()?.login(&request.body)?;
    Ok(Value::Object(user).into())
}

fn logout(context: &Context, _tokens: &[&str], _request: &Request) -> ServiceResult<Reply> {
    context.auth()?.logout(context.session_id())?;
    Ok(Reply::Empty)
}
