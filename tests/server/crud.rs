//! CRUD over `/data` - system fields, not-found handling and the empty result.

use serde_json::json;
use sups_rust::Request;

use crate::support::{login, send, server, JOHN_ID, PETER_ID};

const LASAGNA: &str = "3987279d-0ad4-4afb-8ca9-5b256ae3b298";

#[test]
fn lists_collection_names() {
    let server = server();
    let response = send(&server, "GET", "/data", None, None);
    assert_eq!(response.status, 200);
    assert_eq!(response.body_json(), Some(json!(["recipes", "comments"])));
}

#[test]
fn create_then_read_back() {
    let server = server();
    let token = login(&server, "john@abv.bg");

    let created = send(
        &server,
        "POST",
        "/data/recipes",
        Some(&token),
        Some(json!({ "name": "Pancakes", "steps": 2 })),
    );
    assert_eq!(created.status, 200);
    let created = created.body_json().unwrap();
    let id = created["_id"].as_str().unwrap();
    assert_eq!(created["_ownerId"], JOHN_ID);
    assert!(created["_createdOn"].is_u64());
    assert!(created.get("_updatedOn").is_none());

    let read = send(&server, "GET", &format!("/data/recipes/{id}"), None, None);
    assert_eq!(read.status, 200);
    assert_eq!(read.body_json().unwrap(), created);
}

#[test]
fn create_requires_a_user() {
    let server = server();
    let response = send(&server, "POST", "/data/recipes", None, Some(json!({ "name": "x" })));
    assert_eq!(response.status, 401);
    assert_eq!(response.body_json(), Some(json!({ "code": 401, "message": "Unauthorized" })));
}

#[test]
fn post_with_an_id_is_rejected() {
    let server = server();
    let token = login(&server, "peter@abv.bg");
    let response = send(
        &server,
        "POST",
        &format!("/data/recipes/{LASAGNA}"),
        Some(&token),
        Some(json!({ "name": "x" })),
    );
    assert_eq!(response.status, 400);
    assert_eq!(response.body_json().unwrap()["message"], "Use PUT to update records");
}

#[test]
fn put_and_patch_keep_system_fields() {
    let server = server();
    let token = login(&server, "peter@abv.bg");
    let original = send(&server, "GET", &format!("/data/recipes/{LASAGNA}"), None, None)
        .body_json()
        .unwrap();

    let forged = json!({
        "_id": "forged",
        "_ownerId": JOHN_ID,
        "_createdOn": 1,
        "name": "Lasagna Deluxe"
    });
    let replaced = send(&server, "PUT", &format!("/data/recipes/{LASAGNA}"), Some(&token), Some(forged.clone()))
        .body_json()
        .unwrap();
    assert_eq!(replaced["_id"], LASAGNA);
    assert_eq!(replaced["_ownerId"], PETER_ID);
    assert_eq!(replaced["_createdOn"], original["_createdOn"]);
    assert_eq!(replaced["name"], "Lasagna Deluxe");
    // PUT replaces: fields not in the payload are gone
    assert!(replaced.get("steps").is_none());
    assert!(replaced["_updatedOn"].is_u64());

    let merged = send(
        &server,
        "PATCH",
        &format!("/data/recipes/{LASAGNA}"),
        Some(&token),
        Some(json!({ "_ownerId": JOHN_ID, "steps": 7 })),
    )
    .body_json()
    .unwrap();
    assert_eq!(merged["_ownerId"], PETER_ID);
    assert_eq!(merged["name"], "Lasagna Deluxe");
    assert_eq!(merged["steps"], 7);
}

#[test]
fn delete_then_missing() {
    let server = server();
    let token = login(&server, "peter@abv.bg");
    let target = format!("/data/recipes/{LASAGNA}");

    let deleted = send(&server, "DELETE", &target, Some(&token), None);
    assert_eq!(deleted.status, 200);
    assert!(deleted.body_json().unwrap()["_deletedOn"].is_u64());

    assert_eq!(send(&server, "GET", &target, None, None).status, 404);
    let again = send(&server, "DELETE", &target, Some(&token), None);
    assert_eq!(again.status, 404);
    assert_eq!(again.body_json().unwrap()["message"], "Resource not found");
}

#[test]
fn missing_collection_and_entry_are_not_found() {
    let server = server();
    assert_eq!(send(&server, "GET", "/data/nothing", None, None).status, 404);
    assert_eq!(send(&server, "GET", "/data/recipes/nope", None, None).status, 404);
}

#[test]
fn writes_need_an_entry_id() {
    let server = server();
    let token = login(&server, "peter@abv.bg");
    let response = send(&server, "PATCH", "/data/recipes", Some(&token), Some(json!({})));
    assert_eq!(response.status, 400);
    assert_eq!(response.body_json().unwrap()["message"], "Missing entry ID");
}

#[test]
fn too_many_tokens_is_a_request_error() {
    let server = server();
    let response = send(&server, "GET", &format!("/data/recipes/{LASAGNA}/extra"), None, None);
    assert_eq!(response.status, 400);
    assert_eq!(response.body_json().unwrap()["message"], "Request error");
}

#[test]
fn every_response_allows_any_origin() {
    let server = server();
    let ok = server.handle(Request::new("GET", "/data"));
    let failed = server.handle(Request::new("GET", "/data/nothing"));
    assert_eq!(ok.header("Access-Control-Allow-Origin"), Some("*"));
    assert_eq!(failed.header("Access-Control-Allow-Origin"), Some("*"));
    assert_eq!(ok.header("Content-Type"), Some("application/json"));
}
