//! Conversion of arbitrary context values into JSON-safe trees.
//!
//! A [`Sanitizer`] lives for one encoding pass. It remembers the identity
//! of every [`Value::Object`] it has expanded; a second encounter of the
//! same object collapses to a `{ "type": ... }` stub, which breaks cycles.
//! Sanitizing never fails: values without a JSON form become `null`, and
//! containers nested deeper than [`MAX_DEPTH`] are cut off the same way.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Number, Value as Json};

use crate::value::{ErrorDetails, Loggable, Value};

/// Key carrying the type name in every sanitized object.
pub const TYPE_KEY: &str = "type";

/// Deepest container level that is still expanded.
///
/// Sequences and maps below it become `null`, objects become their type stub.
pub const MAX_DEPTH: usize = 512;

/// Identity-tracking converter from [`Value`] to JSON.
#[derive(Default)]
pub struct Sanitizer {
    visited: HashSet<usize>,
    depth: usize,
    // Visited objects stay alive for the whole pass, so an address seen
    // once can never be reused by a temporary created later in the pass.
    retained: Vec<Arc<dyn Loggable>>,
}

impl Sanitizer {
    /// Creates a sanitizer with an empty identity set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct objects expanded so far.
    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Converts `value` into a JSON-safe tree.
    pub fn sanitize(&mut self, value: &Value) -> Json {
        match value {
            Value::Null | Value::Unsupported => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::UInt(u) => Json::from(*u),
            Value::Float(x) => Number::from_f64(*x).map_or(Json::Null, Json::Number),
            Value::String(s) => Json::String(s.clone()),
            Value::Seq(_) | Value::Map(_) if self.depth >= MAX_DEPTH => Json::Null,
            Value::Seq(items) => Json::Array(items.iter().map(|item| self.nested(item)).collect()),
            Value::Map(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, item) in entries {
                    let item = self.nested(item);
                    map.insert(key.clone(), item);
                }
                Json::Object(map)
            }
            Value::Resource(resource) => {
                let id = match resource.id() {
                    crate::value::ResourceId::Number(n) => Json::from(*n),
                    crate::value::ResourceId::Name(name) => Json::String(name.clone()),
                };
                let mut map = Map::new();
                map.insert(TYPE_KEY.to_string(), Json::String(resource.type_tag()));
                map.insert("id".to_string(), id);
                Json::Object(map)
            }
            Value::Object(object) => self.sanitize_object(object),
        }
    }

    fn nested(&mut self, value: &Value) -> Json {
        self.depth += 1;
        let json = self.sanitize(value);
        self.depth -= 1;
        json
    }

    fn sanitize_object(&mut self, object: &Arc<dyn Loggable>) -> Json {
        let mut map = Map::new();
        map.insert(
            TYPE_KEY.to_string(),
            Json::String(object.type_name().to_string()),
        );
        if self.depth >= MAX_DEPTH {
            return Json::Object(map);
        }

        let identity = Arc::as_ptr(object).cast::<()>() as usize;
        if !self.visited.insert(identity) {
            return Json::Object(map);
        }
        self.retained.push(Arc::clone(object));

        if let Some(shape) = object.to_log_value() {
            match self.nested(&shape) {
                Json::Object(fields) => {
                    for (key, item) in fields {
                        if key != TYPE_KEY {
                            map.insert(key, item);
                        }
                    }
                }
                other => {
                    map.insert("value".to_string(), other);
                }
            }
        } else if let Some(datetime) = object.as_datetime() {
            map.insert("datetime".to_string(), Json::String(datetime.format_utc()));
            map.insert("timezone".to_string(), Json::String(datetime.timezone));
        } else if let Some(details) = object.as_error() {
            map.extend(error_fields(&details));
        } else {
            for field in object.fields() {
                let item = self.nested(&field.value);
                let key = match field.key() {
                    key if key == TYPE_KEY => format!("{}::{TYPE_KEY}", object.type_name()),
                    key => key,
                };
                map.insert(key, item);
            }
        }

        Json::Object(map)
    }
}

/// Sanitizes a single value with a fresh identity set.
pub fn sanitize(value: &Value) -> Json {
    Sanitizer::new().sanitize(value)
}

/// Extracts `message`, `file`, `code`, `line` and `previous` from an error,
/// following the cause chain to its end.
#[must_use]
pub fn error_fields(details: &ErrorDetails) -> Map<String, Json> {
    let mut map = Map::new();
    map.insert("message".to_string(), Json::String(details.message.clone()));
    map.insert("file".to_string(), Json::String(details.file.clone()));
    map.insert("code".to_string(), Json::from(details.code));
    map.insert("line".to_string(), Json::from(details.line));
    map.insert(
        "previous".to_string(),
        details
            .previous
            .as_deref()
            .map_or(Json::Null, |previous| Json::Object(error_fields(previous))),
    );
    map
}
