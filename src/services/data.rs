//! Generic CRUD over the general store, one collection per path token.
//!
//! `GET /data` lists collection names, `GET /data/:collection` lists records
//! (with query operators), `GET /data/:collection/:id` reads one record.
//! `POST` creates at the collection root; `PUT`, `PATCH` and `DELETE` address
//! a single record. Every operation passes the access guard first.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use super::query::{self, Filter, QueryError};
use crate::error::{ServiceError, ServiceResult};
use crate::server::{Context, Reply, Request, Service};
use crate::store::{DocumentStore, Record};

pub const NAME: &str = "data";

pub fn service() -> Service {
    Service::new(NAME)
        .get(":collection", get)
        .post(":collection", post)
        .put(":collection", put)
        .patch(":collection", patch)
        .delete(":collection", delete)
}

fn validate(tokens: &[&str]) -> ServiceResult<()> {
    if tokens.len() > 1 {
        return Err(ServiceError::request());
    }
    Ok(())
}

fn collection(context: &Context) -> ServiceResult<&str> {
    context
        .param("collection")
        .ok_or_else(|| ServiceError::Request("Missing collection name".into()))
}

/// Store failures mentioning a missing collection or entry become 404.
fn reclassify(err: impl std::fmt::Display) -> ServiceError {
    let message = err.to_string();
    if message.contains("does not exist") {
        ServiceError::not_found()
    } else {
        ServiceError::Request(message)
    }
}

fn body_record(request: &Request) -> Record {
    request.body.as_object().cloned().unwrap_or_default()
}

fn get(context: &Context, tokens: &[&str], request: &Request) -> ServiceResult<Reply> {
    validate(tokens)?;
    let storage = context.storage()?;

    let Some(collection) = context.param("collection") else {
        let names = storage.collection_names().map_err(reclassify)?;
        return Ok(Value::from(names).into());
    };

    let protected = context.protected_storage()?;
    let listing = match read(storage, protected, collection, tokens.first().copied(), &request.query) {
        Ok(listing) => listing,
        Err(err) => {
            debug!(collection = %collection, error = %err, "query failed");
            return Err(reclassify(err));
        }
    };

    match listing {
        Listing::Data(mut data) => {
            context.can_access(Some(&mut data), None)?;
            Ok(data.into())
        }
        Listing::Count(records) => {
            let mut data = Value::Array(records);
            context.can_access(Some(&mut data), None)?;
            let count = data.as_array().map_or(0, Vec::len);
            Ok(Value::from(count).into())
        }
    }
}

/// A read result: records to return, or the records a `count` covers.
enum Listing {
    Data(Value),
    Count(Vec<Value>),
}

fn read(
    storage: &dyn DocumentStore,
    protected: &dyn DocumentStore,
    collection: &str,
    id: Option<&str>,
    params: &HashMap<String, String>,
) -> Result<Listing, QueryError> {
    let param = |name: &str| params.get(name).map(String::as_str).filter(|v| !v.is_empty());

    let mut data = match (param("where"), id) {
        (Some(clause), _) => {
            let filter = Filter::parse(clause)?;
            let records = storage.get_all(collection)?;
            Value::Array(
                records
                    .into_iter()
                    .map(Value::Object)
                    .filter(|record| filter.matches(record))
                    .collect(),
            )
        }
        (None, Some(id)) => Value::Object(storage.get(collection, id)?),
        (None, None) => Value::Array(storage.get_all(collection)?.into_iter().map(Value::Object).collect()),
    };

    if let Value::Array(records) = &mut data {
        if let Some(spec) = param("sortBy") {
            query::sort_by(records, spec);
        }
        let mut list = std::mem::take(records);
        if let Some(offset) = param("offset") {
            list = query::offset(list, offset);
        }
        if let Some(size) = param("pageSize") {
            list = query::page(list, size);
        }
        if let Some(spec) = param("distinct") {
            list = query::distinct(list, spec);
        }
        if param("count").is_some() {
            return Ok(Listing::Count(list));
        }
        *records = list;
    }

    if let Some(spec) = param("select") {
        data = query::select(data, spec);
    }
    if let Some(spec) = param("load") {
        data = query::load(data, spec, storage, protected)?;
    }

    Ok(Listing::Data(data))
}

fn post(context: &Context, tokens: &[&str], request: &Request) -> ServiceResult<Reply> {
    validate(tokens)?;
    if !tokens.is_empty() {
        return Err(ServiceError::Request("Use PUT to update records".into()));
    }
    let collection = collection(context)?;

    let mut body = Value::Object(body_record(request));
    context.can_access(None, Some(&mut body))?;

    let mut record = body.as_object().cloned().unwrap_or_default();
    match context.user_id() {
        Some(user_id) => {
            record.insert("_ownerId".into(), Value::String(user_id.to_string()));
        }
        None => {
            record.shift_remove("_ownerId");
            warn!(collection = %collection, "creating record without an owner");
        }
    }

    let created = context.storage()?.add(collection, &record).map_err(|err| {
        debug!(error = %err, "add failed");
        ServiceError::request()
    })?;
    Ok(Value::Object(created).into())
}

/// Resolve the single record a write addresses, 404 when absent.
fn existing(context: &Context, tokens: &[&str]) -> ServiceResult<(String, String, Value)> {
    validate(tokens)?;
    let [id] = tokens else {
        return Err(ServiceError::Request("Missing entry ID".into()));
    };
    let collection = collection(context)?;
    let record = context
        .storage()?
        .get(collection, id)
        .map_err(|_| ServiceError::not_found())?;
    Ok((collection.to_string(), id.to_string(), Value::Object(record)))
}

fn put(context: &Context, tokens: &[&str], request: &Request) -> ServiceResult<Reply> {
    let (collection, id, mut current) = existing(context, tokens)?;
    let mut body = Value::Object(body_record(request));
    context.can_access(Some(&mut current), Some(&mut body))?;

    let record = body.as_object().cloned().unwrap_or_default();
    let updated = context
        .storage()?
        .set(&collection, &id, &record)
        .map_err(|_| ServiceError::request())?;
    Ok(Value::Object(updated).into())
}

fn patch(context: &Context, tokens: &[&str], request: &Request) -> ServiceResult<Reply> {
    let (collection, id, mut current) = existing(context, tokens)?;
    let mut body = Value::Object(body_record(request));
    context.can_access(Some(&mut current), Some(&mut body))?;

    let record = body.as_object().cloned().unwrap_or_default();
    let merged = context
        .storage()?
        .merge(&collection, &id, &record)
        .map_err(|_| ServiceError::request())?;
    Ok(Value::Object(merged).into())
}

fn delete(context: &Context, tokens: &[&str], _request: &Request) -> ServiceResult<Reply> {
    let (collection, id, mut current) = existing(context, tokens)?;
    context.can_access(Some(&mut current), None)?;

    let deleted = context
        .storage()?
        .delete(&collection, &id)
        .map_err(|_| ServiceError::request())?;
    Ok(Value::Object(deleted).into())
}
