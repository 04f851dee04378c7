//! Core types for captured log entries.
//!
//! This module provides:
//! - [`Level`] — The fixed eight-level severity enumeration
//! - [`RowType`] — Console method a wire row is rendered with
//! - [`Context`] — Ordered context map with named and positional keys
//! - [`LogEntry`] — One captured logging call

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Severity levels, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Detailed debugging information
    Debug,
    /// Interesting events
    Info,
    /// Normal but significant events
    Notice,
    /// Exceptional occurrences that are not errors
    Warning,
    /// Runtime errors that do not require immediate action
    Error,
    /// Critical conditions
    Critical,
    /// Action must be taken immediately
    Alert,
    /// System is unusable
    Emergency,
}

impl Level {
    /// All levels, least severe first.
    pub const ALL: [Self; 8] = [
        Self::Debug,
        Self::Info,
        Self::Notice,
        Self::Warning,
        Self::Error,
        Self::Critical,
        Self::Alert,
        Self::Emergency,
    ];

    /// Returns the severity name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Alert => "alert",
            Self::Emergency => "emergency",
        }
    }

    /// Returns the row type this severity is rendered with.
    #[must_use]
    pub const fn row_type(&self) -> RowType {
        match self {
            Self::Debug => RowType::Log,
            Self::Info | Self::Notice => RowType::Info,
            Self::Warning => RowType::Warn,
            Self::Error | Self::Critical | Self::Alert | Self::Emergency => RowType::Error,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown severity name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLevel(pub String);

impl fmt::Display for UnknownLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown log level: {}", self.0)
    }
}

impl std::error::Error for UnknownLevel {}

impl FromStr for Level {
    type Err = UnknownLevel;

    /// Parses a severity name. Matching is case-sensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| UnknownLevel(s.to_string()))
    }
}

/// Console method a wire row is rendered with by the browser extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowType {
    /// `console.log`, the default and omittable type
    #[serde(rename = "log")]
    Log,
    /// `console.info`
    #[serde(rename = "info")]
    Info,
    /// `console.warn`
    #[serde(rename = "warn")]
    Warn,
    /// `console.error`
    #[serde(rename = "error")]
    Error,
    /// `console.group`
    #[serde(rename = "group")]
    Group,
    /// `console.groupCollapsed`
    #[serde(rename = "groupCollapsed")]
    GroupCollapsed,
    /// `console.groupEnd`
    #[serde(rename = "groupEnd")]
    GroupEnd,
    /// `console.table`
    #[serde(rename = "table")]
    Table,
}

impl RowType {
    /// Returns the wire name of this row type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Group => "group",
            Self::GroupCollapsed => "groupCollapsed",
            Self::GroupEnd => "groupEnd",
            Self::Table => "table",
        }
    }

    /// Resolves an arbitrary severity name; unknown names render as [`RowType::Log`].
    #[must_use]
    pub fn from_severity(name: &str) -> Self {
        name.parse::<Level>().map_or(Self::Log, |level| level.row_type())
    }

    /// Returns true for the type that can be left off the wire.
    #[must_use]
    pub const fn is_default(&self) -> bool {
        matches!(self, Self::Log)
    }
}

/// Key of a context entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContextKey {
    /// Implicit positional key; never rendered as a label.
    Index(usize),
    /// Explicit string label.
    Name(String),
}

impl ContextKey {
    /// Returns true if this is the named key `name`.
    #[must_use]
    pub fn is_name(&self, name: &str) -> bool {
        matches!(self, Self::Name(n) if n == name)
    }

    /// Returns the label, if this key is named.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Index(_) => None,
        }
    }
}

/// Ordered context attached to a log entry.
///
/// Named entries keep their label; positional entries receive the next
/// free index, like a list appended to a keyed map.
#[derive(Debug, Clone, Default)]
pub struct Context {
    entries: Vec<(ContextKey, Value)>,
    next_index: usize,
}

impl Context {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named entry, replacing any earlier entry with the same name in place.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds a positional entry.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.push(value);
        self
    }

    /// Inserts a named entry, replacing any earlier entry with the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| key.is_name(&name)) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((ContextKey::Name(name), value)),
        }
    }

    /// Appends a positional entry.
    pub fn push(&mut self, value: impl Into<Value>) {
        let index = self.next_index;
        self.next_index += 1;
        self.entries.push((ContextKey::Index(index), value.into()));
    }

    /// Gets the value of a named entry.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key.is_name(name))
            .map(|(_, value)| value)
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&ContextKey, &Value)> {
        self.entries.iter().map(|(key, value)| (key, value))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Context
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut context = Self::new();
        for (key, value) in iter {
            context.insert(key, value);
        }
        context
    }
}

/// One captured logging call.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity level
    pub level: Level,
    /// The log message, as given by the caller
    pub message: String,
    /// Additional context values
    pub context: Context,
}

impl LogEntry {
    /// Creates a new log entry.
    #[must_use]
    pub fn new(level: Level, message: impl Into<String>, context: Context) -> Self {
        Self {
            level,
            message: message.into(),
            context,
        }
    }

    /// Returns the message with every `%` doubled, so the console does not
    /// treat it as a format string.
    #[must_use]
    pub fn escaped_message(&self) -> String {
        escape_message(&self.message)
    }
}

/// Doubles every `%` in `message`.
#[must_use]
pub fn escape_message(message: &str) -> String {
    message.replace('%', "%%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    // ===========================================
    // Level Tests
    // ===========================================

    #[test]
    fn level_ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Notice < Level::Warning);
        assert!(Level::Critical < Level::Emergency);
    }

    #[test_case(Level::Debug, RowType::Log ; "debug is default")]
    #[test_case(Level::Info, RowType::Info ; "info")]
    #[test_case(Level::Notice, RowType::Info ; "notice")]
    #[test_case(Level::Warning, RowType::Warn ; "warning")]
    #[test_case(Level::Error, RowType::Error ; "error")]
    #[test_case(Level::Critical, RowType::Error ; "critical")]
    #[test_case(Level::Alert, RowType::Error ; "alert")]
    #[test_case(Level::Emergency, RowType::Error ; "emergency")]
    fn level_row_type(level: Level, expected: RowType) {
        assert_eq!(level.row_type(), expected);
    }

    #[test]
    fn level_parse_roundtrip() {
        for level in Level::ALL {
            assert_eq!(level.as_str().parse::<Level>(), Ok(level));
        }
    }

    #[test]
    fn level_parse_is_case_sensitive() {
        assert!("Warning".parse::<Level>().is_err());
        assert!("ERROR".parse::<Level>().is_err());
    }

    #[test]
    fn level_serialization() {
        let json = serde_json::to_string(&Level::Critical).expect("serialize");
        assert_eq!(json, "\"critical\"");
        let level: Level = serde_json::from_str("\"notice\"").expect("deserialize");
        assert_eq!(level, Level::Notice);
    }

    // ===========================================
    // RowType Tests
    // ===========================================

    #[test_case("warning", RowType::Warn ; "known severity")]
    #[test_case("emergency", RowType::Error ; "most severe")]
    #[test_case("verbose", RowType::Log ; "unknown severity")]
    #[test_case("Info", RowType::Log ; "wrong case")]
    fn row_type_from_severity(name: &str, expected: RowType) {
        assert_eq!(RowType::from_severity(name), expected);
    }

    #[test]
    fn row_type_wire_names() {
        assert_eq!(RowType::GroupCollapsed.as_str(), "groupCollapsed");
        assert_eq!(RowType::GroupEnd.as_str(), "groupEnd");
        let json = serde_json::to_string(&RowType::GroupCollapsed).expect("serialize");
        assert_eq!(json, "\"groupCollapsed\"");
        assert!(RowType::Log.is_default());
        assert!(!RowType::Table.is_default());
    }

    // ===========================================
    // Context Tests
    // ===========================================

    #[test]
    fn context_preserves_insertion_order() {
        let context = Context::new()
            .with_value(123)
            .with("label", "hello")
            .with_value(true);

        let keys: Vec<_> = context.iter().map(|(key, _)| key.clone()).collect();
        assert_eq!(
            keys,
            vec![
                ContextKey::Index(0),
                ContextKey::Name("label".to_string()),
                ContextKey::Index(1),
            ]
        );
    }

    #[test]
    fn context_named_insert_replaces_in_place() {
        let context = Context::new()
            .with("a", 1)
            .with("b", 2)
            .with("a", 3);

        assert_eq!(context.len(), 2);
        let first = context.iter().next().map(|(key, _)| key.clone());
        assert_eq!(first, Some(ContextKey::Name("a".to_string())));
        assert!(matches!(context.get("a"), Some(Value::Int(3))));
    }

    #[test]
    fn context_from_iterator() {
        let context: Context = vec![("x", 1), ("y", 2)].into_iter().collect();
        assert_eq!(context.len(), 2);
        assert!(context.get("y").is_some());
        assert!(context.get("z").is_none());
    }

    #[test]
    fn context_key_helpers() {
        assert!(ContextKey::Name("exception".to_string()).is_name("exception"));
        assert!(!ContextKey::Index(0).is_name("exception"));
        assert_eq!(ContextKey::Index(3).name(), None);
    }

    // ===========================================
    // LogEntry Tests
    // ===========================================

    #[test]
    fn log_entry_escapes_percent() {
        let entry = LogEntry::new(Level::Debug, "DE%BUG 100%", Context::new());
        assert_eq!(entry.escaped_message(), "DE%%BUG 100%%");
        assert_eq!(entry.message, "DE%BUG 100%");
    }

    #[test]
    fn escape_message_without_percent_is_unchanged() {
        assert_eq!(escape_message("plain"), "plain");
        assert_eq!(escape_message("%%"), "%%%%");
    }
}
