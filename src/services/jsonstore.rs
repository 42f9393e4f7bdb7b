//! Schemaless JSON tree addressed by path tokens.
//!
//! Unlike `data`, this tree has no owners, rules or system fields beyond the
//! `_id` given to posted children.

use std::sync::{Arc, RwLock, RwLockWriteGuard};

use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::server::{Context, Reply, Request, Service};

pub const NAME: &str = "jsonstore";

/// Shared handle to the tree. Clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct JsonTree {
    root: Arc<RwLock<Map<String, Value>>>,
}

impl JsonTree {
    pub fn new(root: Map<String, Value>) -> Self {
        Self {
            root: Arc::new(RwLock::new(root)),
        }
    }

    fn lock(&self) -> ServiceResult<RwLockWriteGuard<'_, Map<String, Value>>> {
        self.root
            .write()
            .map_err(|_| ServiceError::Internal("json store lock poisoned".into()))
    }

    /// The node at `path`, if every step exists.
    pub fn get(&self, path: &[&str]) -> ServiceResult<Option<Value>> {
        let root = self.lock()?;
        Ok(walk(&root, path).cloned())
    }

    /// Add `body` as a new child of the node at `path`, creating missing nodes.
    pub fn post(&self, path: &[&str], body: &Value) -> ServiceResult<Value> {
        let mut root = self.lock()?;
        let mut node = &mut *root;
        for token in path {
            let child = node
                .entry(token.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            node = child
                .as_object_mut()
                .ok_or_else(|| ServiceError::Request(format!("Cannot add entries under \"{}\"", token)))?;
        }

        let id = loop {
            let candidate = Uuid::new_v4().to_string();
            if !node.contains_key(&candidate) {
                break candidate;
            }
        };
        let mut entry = body.as_object().cloned().unwrap_or_default();
        entry.insert("_id".into(), Value::String(id.clone()));
        let entry = Value::Object(entry);
        node.insert(id, entry.clone());
        Ok(entry)
    }

    /// Replace the existing node at `path`. Missing nodes are left alone.
    pub fn put(&self, path: &[&str], body: &Value) -> ServiceResult<Option<Value>> {
        let Some((leaf, parents)) = path.split_last() else {
            return Ok(None);
        };
        let mut root = self.lock()?;
        let Some(parent) = walk_mut(&mut root, parents) else {
            return Ok(None);
        };
        match parent.get_mut(*leaf) {
            Some(slot) => {
                *slot = body.clone();
                Ok(Some(slot.clone()))
            }
            None => Ok(None),
        }
    }

    /// Shallow-merge `body` into the existing object at `path`.
    pub fn patch(&self, path: &[&str], body: &Value) -> ServiceResult<Option<Value>> {
        let Some((leaf, parents)) = path.split_last() else {
            return Ok(None);
        };
        let mut root = self.lock()?;
        let Some(node) = walk_mut(&mut root, parents).and_then(|parent| parent.get_mut(*leaf)) else {
            return Ok(None);
        };
        if let (Value::Object(target), Value::Object(fields)) = (&mut *node, body) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(Some(node.clone()))
    }

    /// Remove and return the node at `path`; `null` when it does not exist.
    pub fn delete(&self, path: &[&str]) -> ServiceResult<Value> {
        let Some((leaf, parents)) = path.split_last() else {
            return Ok(Value::Null);
        };
        let mut root = self.lock()?;
        Ok(walk_mut(&mut root, parents)
            .and_then(|parent| parent.shift_remove(*leaf))
            .unwrap_or(Value::Null))
    }
}

fn walk<'a>(root: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    rest.iter().try_fold(root.get(*first)?, |node, token| node.get(*token))
}

fn walk_mut<'a>(root: &'a mut Map<String, Value>, path: &[&str]) -> Option<&'a mut Map<String, Value>> {
    path.iter()
        .try_fold(root, |node, token| node.get_mut(*token)?.as_object_mut())
}

pub fn service(tree: JsonTree) -> Service {
    let (get, post, put, patch, delete) = (tree.clone(), tree.clone(), tree.clone(), tree.clone(), tree);
    Service::new(NAME)
        .get(":collection", move |ctx, tokens, _| Ok(get.get(&path(ctx, tokens))?.into()))
        .post(":collection", move |ctx, tokens, request| {
            let path = path(ctx, tokens);
            if path.is_empty() {
                return Ok(Reply::Empty);
            }
            debug!(path = ?path, "jsonstore post");
            Ok(post.post(&path, &request.body)?.into())
        })
        .put(":collection", move |ctx, tokens, request| {
            Ok(put.put(&path(ctx, tokens), &request.body)?.into())
        })
        .patch(":collection", move |ctx, tokens, request| {
            Ok(patch.patch(&path(ctx, tokens), &request.body)?.into())
        })
        .delete(":collection", move |ctx, tokens, _| Ok(delete.delete(&path(ctx, tokens))?.into()))
}

/// The captured collection followed by the remaining tokens.
fn path<'a>(context: &'a Context, tokens: &[&'a str]) -> Vec<&'a str> {
    context
        .param("collection")
        .into_iter()
        .chain(tokens.iter().copied())
        .collect()
}
