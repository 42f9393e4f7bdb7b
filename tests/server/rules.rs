//! Access rules through the full pipeline.

use serde_json::json;
use sups_rust::{Request, Server};

use crate::support::{login, send, server, settings, PETER_ID};

const DUCK: &str = "8f414b4f-ab39-4d36-bedb-2ad69da9c830";

#[test]
fn only_the_owner_may_patch() {
    let server = server();
    let target = format!("/data/recipes/{DUCK}");
    let john = login(&server, "john@abv.bg");
    let peter = login(&server, "peter@abv.bg");

    let denied = send(&server, "PATCH", &target, Some(&john), Some(json!({ "steps": 1 })));
    assert_eq!(denied.status, 403);
    assert_eq!(denied.body_json(), Some(json!({ "code": 403, "message": "Forbidden" })));

    let allowed = send(&server, "PATCH", &target, Some(&peter), Some(json!({ "steps": 1 })));
    assert_eq!(allowed.status, 200);
    assert_eq!(allowed.body_json().unwrap()["steps"], 1);
}

#[test]
fn admin_header_overrides_denials() {
    let server = server();
    let john = login(&server, "john@abv.bg");
    let response = server.handle(
        Request::new("PATCH", &format!("/data/recipes/{DUCK}"))
            .header("X-Authorization", john.as_str())
            .header("X-Admin", "")
            .json(json!({ "steps": 9 })),
    );
    assert_eq!(response.status, 200);
    assert_eq!(response.body_json().unwrap()["steps"], 9);
}

#[test]
fn anonymous_owner_checks_are_unauthorized() {
    let server = server();
    let response = send(&server, "DELETE", &format!("/data/recipes/{DUCK}"), None, None);
    assert_eq!(response.status, 401);
}

#[test]
fn read_prop_rules_redact_each_record() {
    let settings = settings().with_rules(json!({
        "recipes": {
            "*": { "steps": { ".read": ["Owner"] } }
        }
    }));
    let server = Server::new(settings).unwrap();
    let john = login(&server, "john@abv.bg");

    let body = send(&server, "GET", "/data/recipes", Some(&john), None).body_json().unwrap();
    let steps: Vec<bool> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|recipe| recipe.get("steps").is_some())
        .collect();
    // Only John's own recipe keeps its steps
    assert_eq!(steps, vec![false, false, true]);

    let anonymous = send(&server, "GET", &format!("/data/recipes/{DUCK}"), None, None)
        .body_json()
        .unwrap();
    assert!(anonymous.get("steps").is_none());
    assert_eq!(anonymous["name"], "Grilled Duck Fillet");
}

#[test]
fn write_prop_rules_drop_fields() {
    let settings = settings().with_rules(json!({
        "recipes": {
            "*": { "featured": { ".create": false } }
        }
    }));
    let server = Server::new(settings).unwrap();
    let peter = login(&server, "peter@abv.bg");

    let created = send(
        &server,
        "POST",
        "/data/recipes",
        Some(&peter),
        Some(json!({ "name": "Toast", "featured": true })),
    )
    .body_json()
    .unwrap();
    assert_eq!(created["name"], "Toast");
    assert!(created.get("featured").is_none());
}

#[test]
fn expression_and_record_rules() {
    let settings = settings().with_rules(json!({
        "recipes": {
            ".update": "newData.steps < 10 && isOwner(user, data)",
            DUCK: { ".read": false }
        }
    }));
    let server = Server::new(settings).unwrap();
    let peter = login(&server, "peter@abv.bg");

    assert_eq!(send(&server, "GET", &format!("/data/recipes/{DUCK}"), None, None).status, 403);

    let target = "/data/recipes/3987279d-0ad4-4afb-8ca9-5b256ae3b298";
    let small = send(&server, "PUT", target, Some(&peter), Some(json!({ "steps": 4 })));
    assert_eq!(small.status, 200);
    let large = send(&server, "PUT", target, Some(&peter), Some(json!({ "steps": 40 })));
    assert_eq!(large.status, 403);
}

#[test]
fn collection_rules_replace_the_wildcard() {
    let settings = settings().with_rules(json!({
        "comments": { ".create": ["Guest"] }
    }));
    let server = Server::new(settings).unwrap();
    let response = send(
        &server,
        "POST",
        "/data/comments",
        None,
        Some(json!({ "content": "anon", "_ownerId": PETER_ID })),
    );
    assert_eq!(response.status, 200);
    let created = response.body_json().unwrap();
    assert!(created.get("_ownerId").is_none());

    // Peter does not own what an anonymous caller created
    let peter = login(&server, "peter@abv.bg");
    let id = created["_id"].as_str().unwrap();
    let patch = send(&server, "PATCH", &format!("/data/comments/{id}"), Some(&peter), Some(json!({ "content": "x" })));
    assert_eq!(patch.status, 403);
}

#[test]
fn counting_passes_the_read_rule() {
    let settings = settings().with_rules(json!({
        "recipes": { ".read": ["User"] }
    }));
    let server = Server::new(settings).unwrap();

    let anonymous = send(&server, "GET", "/data/recipes?count=true", None, None);
    assert_eq!(anonymous.status, 401);

    let john = login(&server, "john@abv.bg");
    let counted = send(&server, "GET", "/data/recipes?count=true", Some(&john), None);
    assert_eq!(counted.body_json(), Some(json!(3)));
}
