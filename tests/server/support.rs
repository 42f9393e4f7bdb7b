//! Shared fixtures: two seeded users and a few owned recipes.

use serde_json::{json, Map, Value};
use sups_rust::{Request, Response, Server, Settings};

/// Password of both seed users.
pub const PASSWORD: &str = "123456";

pub const PETER_ID: &str = "35c62d76-8152-4626-8712-eeb96381bea8";
pub const JOHN_ID: &str = "847ec027-f659-4086-8032-5173e2f9c93a";

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn settings() -> Settings {
    Settings::default()
        .with_protected_data(object(json!({
            "users": {
                PETER_ID: {
                    "email": "peter@abv.bg",
                    "username": "Peter",
                    "hashedPassword": "83313014ed3e2391aa1332615d2f053cf5c1bfe05ca1cbcb5582443822df6eb1"
                },
                JOHN_ID: {
                    "email": "john@abv.bg",
                    "username": "John",
                    "hashedPassword": "83313014ed3e2391aa1332615d2f053cf5c1bfe05ca1cbcb5582443822df6eb1"
                }
            },
            "sessions": {}
        })))
        .with_seed_data(object(json!({
            "recipes": {
                "3987279d-0ad4-4afb-8ca9-5b256ae3b298": {
                    "_ownerId": PETER_ID,
                    "name": "Easy Lasagna",
                    "steps": 3,
                    "_createdOn": 1613551279012u64
                },
                "8f414b4f-ab39-4d36-bedb-2ad69da9c830": {
                    "_ownerId": PETER_ID,
                    "name": "Grilled Duck Fillet",
                    "steps": 5,
                    "_createdOn": 1613551344360u64
                },
                "985d9eab-ad2e-4622-a5c8-116261fb1fd2": {
                    "_ownerId": JOHN_ID,
                    "name": "Roast Trout",
                    "steps": 4,
                    "_createdOn": 1613551388703u64
                }
            },
            "comments": {
                "0a272c58-b7ea-4e09-a000-7ec988248f66": {
                    "_ownerId": JOHN_ID,
                    "content": "Great recipe!",
                    "recipeId": "8f414b4f-ab39-4d36-bedb-2ad69da9c830",
                    "_createdOn": 1614260681375u64
                }
            }
        })))
        .with_rules(json!({
            "users": {
                ".create": false,
                ".read": ["Owner"],
                ".update": false,
                ".delete": false
            }
        }))
}

pub fn server() -> Server {
    Server::new(settings()).unwrap()
}

/// Log a seed user in and return the access token.
pub fn login(server: &Server, email: &str) -> String {
    let response = server.handle(
        Request::new("POST", "/users/login").json(json!({ "email": email, "password": PASSWORD })),
    );
    assert_eq!(response.status, 200, "login failed for {email}");
    let body = response.body_json().unwrap();
    body["accessToken"].as_str().unwrap().to_string()
}

/// Send a request, optionally authenticated.
pub fn send(server: &Server, method: &str, target: &str, token: Option<&str>, body: Option<Value>) -> Response {
    let mut request = Request::new(method, target);
    if let Some(token) = token {
        request = request.header("X-Authorization", token);
    }
    if let Some(body) = body {
        request = request.json(body);
    }
    server.handle(request)
}
