//! Built-in services registered by [`Server::new`](crate::Server::new).
//!
//! | name        | purpose                                        |
//! |-------------|------------------------------------------------|
//! | `jsonstore` | schemaless tree, no rules                      |
//! | `users`     | register, login, logout and the current user   |
//! | `data`      | rule-guarded CRUD with query operators         |
//! | `util`      | runtime flags such as `throttle`               |

pub mod data;
pub mod jsonstore;
pub mod query;
pub mod users;
pub mod util;
