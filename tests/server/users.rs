//! Registration, login, sessions and `/users/me`.

use serde_json::json;

use crate::support::{login, send, server, PASSWORD, PETER_ID};

#[test]
fn login_token_resolves_to_the_same_user() {
    let server = server();
    let login = send(
        &server,
        "POST",
        "/users/login",
        None,
        Some(json!({ "email": "peter@abv.bg", "password": PASSWORD })),
    );
    assert_eq!(login.status, 200);
    let user = login.body_json().unwrap();
    assert_eq!(user["_id"], PETER_ID);
    assert!(user.get("hashedPassword").is_none());
    let token = user["accessToken"].as_str().unwrap();

    let me = send(&server, "GET", "/users/me", Some(token), None).body_json().unwrap();
    assert_eq!(me["_id"], PETER_ID);
    assert_eq!(me["email"], "peter@abv.bg");
    assert_eq!(me["username"], "Peter");
    assert!(me.get("hashedPassword").is_none());
}

#[test]
fn me_requires_a_session() {
    let server = server();
    let response = send(&server, "GET", "/users/me", None, None);
    assert_eq!(response.status, 401);
}

#[test]
fn register_then_conflict() {
    let server = server();
    let body = json!({ "email": "maria@abv.bg", "password": "secret", "username": "Maria" });

    let first = send(&server, "POST", "/users/register", None, Some(body.clone()));
    assert_eq!(first.status, 200);
    let user = first.body_json().unwrap();
    assert_eq!(user["username"], "Maria");
    assert!(user["accessToken"].is_string());
    assert!(user.get("password").is_none());
    assert!(user.get("hashedPassword").is_none());

    let second = send(&server, "POST", "/users/register", None, Some(body));
    assert_eq!(second.status, 409);
    assert_eq!(
        second.body_json().unwrap()["message"],
        "A user with the same email already exists"
    );

    // The registered account can log in with its password
    login(&server, "maria@abv.bg");
}

#[test]
fn register_requires_identity_and_password() {
    let server = server();
    let response = send(&server, "POST", "/users/register", None, Some(json!({ "email": "x@y.z" })));
    assert_eq!(response.status, 400);
    assert_eq!(response.body_json().unwrap()["message"], "Missing fields");
}

#[test]
fn wrong_credentials_are_forbidden() {
    let server = server();
    for email in ["peter@abv.bg", "nobody@abv.bg"] {
        let response = send(
            &server,
            "POST",
            "/users/login",
            None,
            Some(json!({ "email": email, "password": "wrong" })),
        );
        assert_eq!(response.status, 403);
        assert_eq!(response.body_json().unwrap()["message"], "Login or password don't match");
    }
}

#[test]
fn logout_ends_the_session() {
    let server = server();
    let token = login(&server, "peter@abv.bg");

    let logout = send(&server, "GET", "/users/logout", Some(&token), None);
    assert_eq!(logout.status, 204);
    assert!(logout.body.is_none());

    let me = send(&server, "GET", "/users/me", Some(&token), None);
    assert_eq!(me.status, 403);
    assert_eq!(me.body_json().unwrap()["message"], "Invalid access token");
}

#[test]
fn logout_without_a_session_is_forbidden() {
    let server = server();
    let response = send(&server, "GET", "/users/logout", None, None);
    assert_eq!(response.status, 403);
    assert_eq!(response.body_json().unwrap()["message"], "User session does not exist");
}

#[test]
fn earlier_sessions_survive_a_new_login() {
    let server = server();
    let first = login(&server, "john@abv.bg");
    let second = login(&server, "john@abv.bg");
    assert_ne!(first, second);
    assert_eq!(send(&server, "GET", "/users/me", Some(&first), None).status, 200);
    assert_eq!(send(&server, "GET", "/users/me", Some(&second), None).status, 200);
}

#[test]
fn logout_ends_only_the_calling_session() {
    let server = server();
    let first = login(&server, "john@abv.bg");
    let second = login(&server, "john@abv.bg");

    assert_eq!(send(&server, "GET", "/users/logout", Some(&second), None).status, 204);
    assert_eq!(send(&server, "GET", "/users/me", Some(&second), None).status, 403);
    assert_eq!(send(&server, "GET", "/users/me", Some(&first), None).status, 200);
}
