//! The query engine
//!
//! `filter` evaluates ad-hoc structured queries over a resource's cached
//! collection: predicate matching, stable multi-key ordering and pagination.
//! It is fully synchronous and read-only; it never touches the network.
//!
//! Query shape (JSON):
//!
//! ```json
//! {
//!   "query": {
//!     "where":   { "age": { ">": 31 }, "author": "John" },
//!     "orderBy": [["age", "DESC"], "author"],
//!     "skip":    1,
//!     "limit":   2
//!   }
//! }
//! ```

use crate::registry::ResourceRegistry;
use lodestore_core::{value_type_name, Fields, Record, Result, SharedRecord, StoreError};
use serde_json::Value;
use std::cmp::Ordering;

/// Sort direction for one ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortDirection {
    Ascending,
    Descending,
}

/// A validated query: where clause, ordering keys, pagination bounds.
#[derive(Debug, Default)]
struct ParsedQuery {
    where_clause: Option<Fields>,
    order_by: Vec<(String, SortDirection)>,
    skip: Option<usize>,
    limit: Option<usize>,
}

impl ParsedQuery {
    fn parse(params: &Value) -> Result<ParsedQuery> {
        let params = params.as_object().ok_or_else(|| {
            StoreError::illegal_argument_with_detail(
                "params: must be an object",
                format!("expected object, actual {}", value_type_name(params)),
            )
        })?;

        let mut parsed = ParsedQuery::default();
        let query = match params.get("query") {
            None => return Ok(parsed),
            Some(query) => query.as_object().ok_or_else(|| {
                StoreError::illegal_argument("params.query: must be an object")
            })?,
        };

        if let Some(where_clause) = query.get("where") {
            parsed.where_clause = Some(
                where_clause
                    .as_object()
                    .cloned()
                    .ok_or_else(|| {
                        StoreError::illegal_argument_with_detail(
                            "params.query.where: must be an object",
                            format!("expected object, actual {}", value_type_name(where_clause)),
                        )
                    })?,
            );
        }
        if let Some(order_by) = query.get("orderBy") {
            parsed.order_by = parse_order_by(order_by)?;
        }
        parsed.skip = parse_page_bound(query.get("skip"), "skip")?;
        parsed.limit = parse_page_bound(query.get("limit"), "limit")?;
        Ok(parsed)
    }
}

fn parse_page_bound(value: Option<&Value>, name: &str) -> Result<Option<usize>> {
    match value {
        None => Ok(None),
        Some(value) => match value.as_u64() {
            Some(n) => Ok(Some(n as usize)),
            None => Err(StoreError::illegal_argument_with_detail(
                format!("params.query.{name}: must be a non-negative integer"),
                format!("expected integer, actual {}", value_type_name(value)),
            )),
        },
    }
}

fn parse_order_by(value: &Value) -> Result<Vec<(String, SortDirection)>> {
    match value {
        Value::String(field) => Ok(vec![(field.clone(), SortDirection::Ascending)]),
        Value::Array(entries) => entries
            .iter()
            .enumerate()
            .map(|(i, entry)| parse_order_entry(i, entry))
            .collect(),
        other => Err(StoreError::illegal_argument_with_detail(
            "params.query.orderBy: must be a string or an array",
            format!("expected string|array, actual {}", value_type_name(other)),
        )),
    }
}

fn parse_order_entry(i: usize, entry: &Value) -> Result<(String, SortDirection)> {
    match entry {
        Value::String(field) => Ok((field.clone(), SortDirection::Ascending)),
        Value::Array(pair) => {
            let field = pair.first().and_then(Value::as_str).ok_or_else(|| {
                StoreError::illegal_argument(format!(
                    "params.query.orderBy[{i}][0]: must be a string"
                ))
            })?;
            let direction = match pair.get(1) {
                None => SortDirection::Ascending,
                Some(Value::String(dir)) if dir.eq_ignore_ascii_case("desc") => {
                    SortDirection::Descending
                }
                Some(Value::String(_)) => SortDirection::Ascending,
                Some(_) => {
                    return Err(StoreError::illegal_argument(format!(
                        "params.query.orderBy[{i}][1]: must be a string"
                    )))
                }
            };
            Ok((field.to_string(), direction))
        }
        other => Err(StoreError::illegal_argument_with_detail(
            format!("params.query.orderBy[{i}]: must be a string or an array"),
            format!("expected string|array, actual {}", value_type_name(other)),
        )),
    }
}

// ============================================================================
// Predicate evaluation
// ============================================================================

/// Built-in where evaluation: fields are ANDed, and so are the operators
/// under one field. A bare literal means implicit `==`.
fn matches_where(where_clause: &Fields, record: &Record) -> bool {
    where_clause.iter().all(|(field, clause)| {
        let actual = record.get(field);
        match clause {
            Value::Object(operators) => operators
                .iter()
                .all(|(op, expected)| apply_operator(op, actual, expected)),
            literal => loose_eq(actual.unwrap_or(&Value::Null), literal),
        }
    })
}

fn apply_operator(op: &str, actual: Option<&Value>, expected: &Value) -> bool {
    let actual = actual.unwrap_or(&Value::Null);
    match op {
        "==" => loose_eq(actual, expected),
        "===" => actual == expected,
        "!=" => !loose_eq(actual, expected),
        "!==" => actual != expected,
        ">" => matches!(compare(actual, expected), Some(Ordering::Greater)),
        ">=" => matches!(
            compare(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        "<" => matches!(compare(actual, expected), Some(Ordering::Less)),
        "<=" => matches!(
            compare(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        "in" => match expected {
            Value::Array(set) => set.iter().any(|member| loose_eq(actual, member)),
            _ => false,
        },
        // Unknown operators have no filtering effect.
        _ => true,
    }
}

/// Loose equality: strict JSON equality, or numeric equality after
/// coercing numbers and numeric strings.
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    matches!((as_number(a), as_number(b)), (Some(x), Some(y)) if x == y)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Relational comparison: numeric when both sides coerce to numbers,
/// lexicographic for strings, undefined otherwise.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }
    if let (Value::String(x), Value::String(y)) = (a, b) {
        return Some(x.cmp(y));
    }
    None
}

// ============================================================================
// Ordering
// ============================================================================

fn compare_rows(a: &Record, b: &Record, keys: &[(String, SortDirection)]) -> Ordering {
    for (field, direction) in keys {
        let left = a.get(field).unwrap_or(&Value::Null);
        let right = b.get(field).unwrap_or(&Value::Null);
        let ord = match direction {
            SortDirection::Ascending => order_values(left, right),
            SortDirection::Descending => order_values(left, right).reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: fixed type rank across types, natural
/// order within a type. Keeps multi-key sorting deterministic for mixed
/// collections.
fn order_values(a: &Value, b: &Value) -> Ordering {
    let (rank_a, rank_b) = (type_rank(a), type_rank(b));
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or(f64::NAN)
            .partial_cmp(&y.as_f64().unwrap_or(f64::NAN))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

// ============================================================================
// filter
// ============================================================================

impl ResourceRegistry {
    /// Evaluate a structured query over the resource's cached collection.
    ///
    /// Returns matching records in query order: the where clause filters,
    /// `orderBy` applies a stable multi-key sort (left-to-right precedence,
    /// ascending default, `"DESC"` descending), then `skip` and `limit`
    /// paginate. Without a query the insertion order is returned.
    ///
    /// A resource registered with a custom filter has its predicate applied
    /// in place of built-in where evaluation.
    ///
    /// # Errors
    ///
    /// - `Runtime`: unregistered resource
    /// - `IllegalArgument`: malformed `params`
    /// - `Unhandled`: a failing custom filter
    pub fn filter(&self, resource_name: &str, params: &Value) -> Result<Vec<SharedRecord>> {
        let resource = self.resource(resource_name)?;
        let query = ParsedQuery::parse(params)?;

        // Snapshot handles and fields once; evaluation never re-locks.
        let mut rows: Vec<(SharedRecord, Record)> = {
            let state = resource.state.read();
            state
                .collection
                .iter()
                .map(|record| (record.clone(), record.snapshot()))
                .collect()
        };

        if let Some(where_clause) = &query.where_clause {
            match &resource.definition.custom_filter {
                Some(custom) => {
                    let where_value = Value::Object(where_clause.clone());
                    let mut kept = Vec::with_capacity(rows.len());
                    for (handle, fields) in rows {
                        let keep = custom(&resource.definition.name, &where_value, &fields)
                            .map_err(StoreError::into_unhandled)?;
                        if keep {
                            kept.push((handle, fields));
                        }
                    }
                    rows = kept;
                }
                None => rows.retain(|(_, fields)| matches_where(where_clause, fields)),
            }
        }

        if !query.order_by.is_empty() {
            // Vec::sort_by is stable; equal keys keep insertion order.
            rows.sort_by(|a, b| compare_rows(&a.1, &b.1, &query.order_by));
        }

        let skipped = rows.into_iter().skip(query.skip.unwrap_or(0));
        let rows: Vec<(SharedRecord, Record)> = match query.limit {
            Some(limit) => skipped.take(limit).collect(),
            None => skipped.collect(),
        };

        Ok(rows.into_iter().map(|(handle, _)| handle).collect())
    }
}
