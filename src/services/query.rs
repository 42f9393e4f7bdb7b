//! Query-string operators of the `data` service.
//!
//! Operators run in a fixed order: `where` → `sortBy` → `offset` →
//! `pageSize` → `distinct` → `count` → `select` → `load`.

use std::cmp::Ordering;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::auth::USERS;
use crate::store::{loose_eq, DocumentStore, StoreError};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Could not parse WHERE clause, check your syntax.")]
    Where,

    #[error("Invalid load specification: {0}")]
    Load(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// =============================================================================
// where
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Le,
    Lt,
    Ge,
    Gt,
    Eq,
    Like,
    In,
}

/// Operators in matching priority: at any position the first listed wins.
const OPERATORS: [(&str, Op); 7] = [
    ("<=", Op::Le),
    ("<", Op::Lt),
    (">=", Op::Ge),
    (">", Op::Gt),
    ("=", Op::Eq),
    (" like ", Op::Like),
    (" in ", Op::In),
];

#[derive(Debug, Clone, PartialEq)]
struct Condition {
    prop: String,
    op: Op,
    value: Value,
}

/// A parsed `where` clause: any group matches when all its conditions hold.
///
/// ` or ` binds looser than ` and `; both are matched case-insensitively.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    groups: Vec<Vec<Condition>>,
}

impl Filter {
    pub fn parse(clause: &str) -> Result<Filter, QueryError> {
        let groups = split_keyword(clause.trim(), " or ")
            .into_iter()
            .map(|group| {
                split_keyword(group, " and ")
                    .into_iter()
                    .map(parse_condition)
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Filter { groups })
    }

    pub fn matches(&self, record: &Value) -> bool {
        self.groups
            .iter()
            .any(|group| group.iter().all(|condition| condition.matches(record)))
    }
}

impl Condition {
    fn matches(&self, record: &Value) -> bool {
        let field = record.get(&self.prop);
        match self.op {
            Op::Eq => loose_eq(field.unwrap_or(&Value::Null), &self.value),
            Op::Lt => compare(field, &self.value) == Some(Ordering::Less),
            Op::Le => matches!(compare(field, &self.value), Some(Ordering::Less | Ordering::Equal)),
            Op::Gt => compare(field, &self.value) == Some(Ordering::Greater),
            Op::Ge => matches!(compare(field, &self.value), Some(Ordering::Greater | Ordering::Equal)),
            Op::Like => match (field, &self.value) {
                (Some(Value::String(text)), Value::String(needle)) => {
                    text.to_lowercase().contains(&needle.to_lowercase())
                }
                _ => false,
            },
            Op::In => match (&self.value, field) {
                (Value::Array(options), Some(field)) => options.iter().any(|o| strict_eq(o, field)),
                _ => false,
            },
        }
    }
}

/// Split on `keyword`, ignoring ASCII case.
fn split_keyword<'a>(text: &'a str, keyword: &str) -> Vec<&'a str> {
    let lower = text.to_ascii_lowercase();
    let mut parts = Vec::new();
    let mut start = 0;
    while let Some(found) = lower[start..].find(keyword) {
        parts.push(&text[start..start + found]);
        start += found + keyword.len();
    }
    parts.push(&text[start..]);
    parts
}

fn parse_condition(clause: &str) -> Result<Condition, QueryError> {
    let clause = clause.trim();
    let lower = clause.to_ascii_lowercase();

    // Shortest non-empty property first, then operator priority.
    for index in 1..clause.len() {
        if !clause.is_char_boundary(index) {
            continue;
        }
        for (symbol, op) in OPERATORS {
            if !lower[index..].starts_with(symbol) {
                continue;
            }
            let prop = clause[..index].trim();
            let raw = clause[index + symbol.len()..].trim();
            if raw.is_empty() || prop.is_empty() {
                continue;
            }
            let value = match op {
                Op::In => parse_list(raw)?,
                _ => serde_json::from_str(raw).map_err(|_| QueryError::Where)?,
            };
            return Ok(Condition {
                prop: prop.to_string(),
                op,
                value,
            });
        }
    }
    Err(QueryError::Where)
}

/// `("a", "b", 3)` → `["a", "b", 3]`
fn parse_list(raw: &str) -> Result<Value, QueryError> {
    let open = raw.find('(').ok_or(QueryError::Where)?;
    let close = raw[open..].find(')').ok_or(QueryError::Where)? + open;
    let inner = &raw[open + 1..close];
    if inner.is_empty() {
        return Err(QueryError::Where);
    }
    serde_json::from_str(&format!("[{}]", inner)).map_err(|_| QueryError::Where)
}

fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Relational comparison: same-kind values directly, mixed primitives as numbers.
fn compare(field: Option<&Value>, value: &Value) -> Option<Ordering> {
    let field = field?;
    match (field, value) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Null, _) | (_, Value::Null) => None,
        _ => as_number(field)?.partial_cmp(&as_number(value)?),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// =============================================================================
// sortBy, offset, pageSize
// =============================================================================

/// Stable multi-key sort from a `prop [desc], prop [desc]` spec.
pub fn sort_by(records: &mut [Value], spec: &str) {
    let keys: Vec<(&str, bool)> = spec
        .split(',')
        .filter_map(|part| {
            let mut words = part.split(' ').filter(|w| !w.is_empty());
            let prop = words.next()?;
            Some((prop, words.next().is_some()))
        })
        .collect();

    // Last key first so the first listed key dominates.
    for (prop, desc) in keys.into_iter().rev() {
        records.sort_by(|a, b| {
            let ordering = sort_order(a.get(prop), b.get(prop));
            if desc {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }
}

fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => {
            let (x, y) = (text(a), text(b));
            // Case-insensitive first; on a tie lowercase sorts before uppercase.
            x.to_lowercase().cmp(&y.to_lowercase()).then_with(|| y.cmp(&x))
        }
    }
}

/// Drop the first `offset` records. Negative values count from the end.
pub fn offset(records: Vec<Value>, offset: &str) -> Vec<Value> {
    let len = records.len();
    let start = relative_index(to_integer(offset).unwrap_or(0), len);
    records.into_iter().skip(start).collect()
}

/// Keep the first `size` records, 10 when `size` is not a number.
pub fn page(records: Vec<Value>, size: &str) -> Vec<Value> {
    let len = records.len();
    let end = match to_integer(size) {
        Some(0) | None => 10.min(len),
        Some(n) => relative_index(n, len),
    };
    records.into_iter().take(end).collect()
}

fn to_integer(text: &str) -> Option<i64> {
    let number: f64 = text.trim().parse().ok()?;
    if number.is_finite() {
        Some(number.trunc() as i64)
    } else {
        None
    }
}

fn relative_index(index: i64, len: usize) -> usize {
    if index < 0 {
        len.saturating_sub(index.unsigned_abs() as usize)
    } else {
        (index as usize).min(len)
    }
}

// =============================================================================
// distinct, select
// =============================================================================

/// Keep the first record of every distinct combination of `props`.
pub fn distinct(records: Vec<Value>, spec: &str) -> Vec<Value> {
    let props = list(spec);
    let mut seen = std::collections::HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            let key = props
                .iter()
                .map(|prop| text(record.get(*prop)))
                .collect::<Vec<_>>()
                .join("::");
            seen.insert(key)
        })
        .collect()
}

/// Project a record, or every record of a list, onto `props`.
pub fn select(data: Value, spec: &str) -> Value {
    let props = list(spec);
    let project = |record: Value| {
        let fields: Map<String, Value> = props
            .iter()
            .filter_map(|prop| record.get(*prop).map(|v| (prop.to_string(), v.clone())))
            .collect();
        Value::Object(fields)
    };
    match data {
        Value::Array(records) => Value::Array(records.into_iter().map(project).collect()),
        record => project(record),
    }
}

// =============================================================================
// load
// =============================================================================

/// Hydrate relations from `prop=idField:collection` specs.
///
/// Each record gets `prop` set to the record of `collection` whose `_id`
/// equals the record's `idField`. `users` come from the protected store and
/// lose their `hashedPassword`.
pub fn load(
    data: Value,
    spec: &str,
    storage: &dyn DocumentStore,
    protected: &dyn DocumentStore,
) -> Result<Value, QueryError> {
    let mut data = data;
    for relation in list(spec) {
        let (prop, source) = relation
            .split_once('=')
            .ok_or_else(|| QueryError::Load(relation.to_string()))?;
        let (id_field, collection) = source
            .split_once(':')
            .ok_or_else(|| QueryError::Load(relation.to_string()))?;
        debug!(collection = %collection, prop = %prop, id_field = %id_field, "loading related records");

        let store = if collection == USERS { protected } else { storage };
        let hydrate = |record: &mut Value| -> Result<(), QueryError> {
            let seek = text(record.get(id_field));
            let mut related = store.get(collection, &seek)?;
            related.shift_remove("hashedPassword");
            if let Value::Object(fields) = record {
                fields.insert(prop.to_string(), Value::Object(related));
            }
            Ok(())
        };

        match &mut data {
            Value::Array(records) => records.iter_mut().try_for_each(hydrate)?,
            record => hydrate(record)?,
        }
    }
    Ok(data)
}

fn list(spec: &str) -> Vec<&str> {
    spec.split(',').filter(|p| !p.is_empty()).collect()
}

/// String form of a field used for keys and text ordering.
fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
