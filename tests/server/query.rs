//! Query operators on `GET /data/:collection`.

use serde_json::{json, Map, Value};
use sups_rust::{Server, Settings};

use crate::support::{send, server};

fn numbered() -> Server {
    let mut items = Map::new();
    for (id, title, n) in [("i1", "a", 5), ("i2", "b", 15), ("i3", "C", 2)] {
        items.insert(id.into(), json!({ "title": title, "n": n, "_ownerId": "u1" }));
    }
    let mut seed = Map::new();
    seed.insert("items".into(), Value::Object(items));
    Server::new(Settings::default().with_seed_data(seed)).unwrap()
}

fn titles(body: &Value) -> Vec<&str> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|item| item["title"].as_str().unwrap())
        .collect()
}

#[test]
fn where_compares_numbers() {
    let server = numbered();
    let body = send(&server, "GET", "/data/items?where=n%3E10", None, None).body_json().unwrap();
    assert_eq!(titles(&body), vec!["b"]);
}

#[test]
fn where_like_is_case_insensitive() {
    let server = numbered();
    let body = send(&server, "GET", "/data/items?where=title%20like%20%22A%22", None, None)
        .body_json()
        .unwrap();
    assert_eq!(titles(&body), vec!["a"]);
}

#[test]
fn where_combines_and_before_or() {
    let server = numbered();
    let target = "/data/items?where=n%3E1%20and%20n%3C5%20or%20title%3D%22a%22";
    let body = send(&server, "GET", target, None, None).body_json().unwrap();
    assert_eq!(titles(&body), vec!["a", "C"]);
}

#[test]
fn malformed_where_is_a_request_error() {
    let server = numbered();
    let response = send(&server, "GET", "/data/items?where=title%3Dnot-json", None, None);
    assert_eq!(response.status, 400);
    assert_eq!(
        response.body_json().unwrap()["message"],
        "Could not parse WHERE clause, check your syntax."
    );
}

#[test]
fn sort_then_page() {
    let server = numbered();
    let body = send(&server, "GET", "/data/items?sortBy=n%20desc&offset=0&pageSize=1", None, None)
        .body_json()
        .unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["n"], 15);

    let body = send(&server, "GET", "/data/items?sortBy=title&offset=1", None, None)
        .body_json()
        .unwrap();
    assert_eq!(titles(&body), vec!["b", "C"]);
}

#[test]
fn count_select_and_distinct() {
    let server = numbered();
    let count = send(&server, "GET", "/data/items?where=n%3E3&count=true", None, None);
    assert_eq!(count.body_json(), Some(json!(2)));

    let selected = send(&server, "GET", "/data/items?select=title,n&pageSize=1", None, None)
        .body_json()
        .unwrap();
    assert_eq!(selected, json!([{ "title": "a", "n": 5 }]));

    let distinct = send(&server, "GET", "/data/items?distinct=_ownerId", None, None)
        .body_json()
        .unwrap();
    assert_eq!(distinct.as_array().unwrap().len(), 1);
}

#[test]
fn load_embeds_related_users() {
    let server = server();
    let body = send(
        &server,
        "GET",
        "/data/comments?load=author%3D_ownerId%3Ausers",
        None,
        None,
    )
    .body_json()
    .unwrap();
    let author = &body[0]["author"];
    assert_eq!(author["email"], "john@abv.bg");
    assert!(author.get("hashedPassword").is_none());
}

#[test]
fn load_applies_to_single_records() {
    let server = server();
    let target = "/data/comments/0a272c58-b7ea-4e09-a000-7ec988248f66?load=recipe%3DrecipeId%3Arecipes&select=content,recipeId";
    let body = send(&server, "GET", target, None, None).body_json().unwrap();
    assert_eq!(body["content"], "Great recipe!");
    assert_eq!(body["recipe"]["name"], "Grilled Duck Fillet");
}
