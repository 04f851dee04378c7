//! Entry encoding into wire rows.
//!
//! This module provides:
//! - [`Row`] — One positional wire row with the trailing-slot omission rules
//! - [`WirePayload`] — The `{version, columns, rows}` envelope
//! - [`EntryEncoder`] — Turns a [`LogEntry`] into its primary row plus any
//!   exception or table groups

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde_json::Value as Json;

use crate::config::ExceptionStyle;
use crate::error::Result;
use crate::sanitize::Sanitizer;
use crate::types::{ContextKey, LogEntry, RowType};
use crate::value::Value;

/// Context key reserved for an error whose trace is expanded into a group.
pub const EXCEPTION_KEY: &str = "exception";

/// Column names announced in every payload.
pub const COLUMNS: [&str; 3] = ["log", "type", "backtrace"];

/// Title used for a table logged under the bare `table` key.
pub const DEFAULT_TABLE_TITLE: &str = "Table";

static TABLE_KEY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^table:\s*(.+)$").unwrap_or_else(|_| unreachable!()));

/// One wire row: `[data, type?, backtrace?]`.
///
/// A default-typed row without backtrace drops the type slot entirely; a
/// default-typed row with a backtrace keeps the slot as an empty string.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Console arguments
    pub data: Vec<Json>,
    /// Console method
    pub row_type: RowType,
    /// Optional trace text
    pub backtrace: Option<String>,
}

impl Row {
    /// Creates a row without backtrace.
    #[must_use]
    pub const fn new(data: Vec<Json>, row_type: RowType) -> Self {
        Self {
            data,
            row_type,
            backtrace: None,
        }
    }

    /// Attaches trace text in the third slot.
    #[must_use]
    pub fn with_backtrace(mut self, backtrace: impl Into<String>) -> Self {
        self.backtrace = Some(backtrace.into());
        self
    }

    /// Number of slots this row occupies on the wire.
    #[must_use]
    pub const fn slot_count(&self) -> usize {
        match (&self.backtrace, self.row_type.is_default()) {
            (Some(_), _) => 3,
            (None, false) => 2,
            (None, true) => 1,
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.slot_count()))?;
        seq.serialize_element(&self.data)?;
        match &self.backtrace {
            Some(backtrace) => {
                let row_type = if self.row_type.is_default() {
                    ""
                } else {
                    self.row_type.as_str()
                };
                seq.serialize_element(row_type)?;
                seq.serialize_element(backtrace)?;
            }
            None if !self.row_type.is_default() => {
                seq.serialize_element(self.row_type.as_str())?;
            }
            None => {}
        }
        seq.end()
    }
}

/// The envelope the browser extension decodes.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct WirePayload {
    /// Library version
    pub version: &'static str,
    /// Column names, always `log`, `type`, `backtrace`
    pub columns: [&'static str; 3],
    /// Rows, oldest first
    pub rows: Vec<Row>,
}

impl WirePayload {
    /// Wraps rows in an envelope.
    #[must_use]
    pub const fn new(rows: Vec<Row>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            columns: COLUMNS,
            rows,
        }
    }

    /// Serializes to JSON. Slashes and non-ASCII text are left unescaped.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serializes to base64-encoded JSON, the header form.
    pub fn to_header_value(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_json()?))
    }
}

/// Converts log entries into rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryEncoder {
    exception_style: ExceptionStyle,
}

impl EntryEncoder {
    /// Creates an encoder with the given exception rendering.
    #[must_use]
    pub const fn new(exception_style: ExceptionStyle) -> Self {
        Self { exception_style }
    }

    /// Returns the exception rendering.
    #[must_use]
    pub const fn exception_style(&self) -> ExceptionStyle {
        self.exception_style
    }

    /// Encodes one entry: the primary row first, then any groups in
    /// context order.
    #[must_use]
    pub fn encode(&self, entry: &LogEntry) -> Vec<Row> {
        let mut sanitizer = Sanitizer::new();
        let mut groups = Vec::new();
        let mut data = vec![Json::String(entry.escaped_message())];
        let mut backtrace = None;

        let exception = entry
            .context
            .get(EXCEPTION_KEY)
            .and_then(Value::error_details);

        if let Some(details) = &exception {
            let trace = details.trace_string();
            match self.exception_style {
                ExceptionStyle::Group => {
                    let (title, rest) = trace.split_once('\n').unwrap_or((trace.as_str(), ""));
                    groups.push(Row::new(vec![Json::from(title)], RowType::GroupCollapsed));
                    groups.push(Row::new(vec![Json::from(rest)], RowType::Info));
                    groups.push(Row::new(Vec::new(), RowType::GroupEnd));
                }
                ExceptionStyle::Backtrace => backtrace = Some(trace),
            }
        }

        for (key, value) in entry.context.iter() {
            if exception.is_some() && key.is_name(EXCEPTION_KEY) {
                continue;
            }

            if let Some(title) = table_title(key, value) {
                groups.push(Row::new(vec![Json::String(title)], RowType::GroupCollapsed));
                groups.push(Row::new(vec![sanitizer.sanitize(value)], RowType::Table));
                groups.push(Row::new(Vec::new(), RowType::GroupEnd));
                continue;
            }

            if let Some(name) = key.name() {
                data.push(Json::String(format!("{name}:")));
            }
            data.push(sanitizer.sanitize(value));
        }

        let mut primary = Row::new(data, entry.level.row_type());
        primary.backtrace = backtrace;

        let mut rows = Vec::with_capacity(groups.len() + 1);
        rows.push(primary);
        rows.extend(groups);
        rows
    }

    /// Encodes entries in order into one row list.
    #[must_use]
    pub fn encode_all(&self, entries: &[LogEntry]) -> Vec<Row> {
        entries.iter().flat_map(|entry| self.encode(entry)).collect()
    }
}

/// Returns the group title if this entry renders as a table.
fn table_title(key: &ContextKey, value: &Value) -> Option<String> {
    let name = key.name()?;
    let Value::Seq(records) = value else {
        return None;
    };
    if records.is_empty() || !records.iter().all(Value::is_record) {
        return None;
    }

    if name.eq_ignore_ascii_case("table") {
        return Some(DEFAULT_TABLE_TITLE.to_string());
    }
    TABLE_KEY_REGEX
        .captures(name)
        .and_then(|captures| captures.get(1))
        .map(|title| title.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Context, Level};
    use crate::value::ErrorDetails;
    use serde_json::json;
    use test_case::test_case;

    fn encode(level: Level, message: &str, context: Context) -> Json {
        let rows = EntryEncoder::default().encode(&LogEntry::new(level, message, context));
        serde_json::to_value(&rows).expect("serialize rows")
    }

    fn exception() -> ErrorDetails {
        ErrorDetails::new("RuntimeError", "ouch!")
            .with_location("src/app.rs", 42)
            .with_frame("app::handler()")
    }

    // ===========================================
    // Row Tests
    // ===========================================

    #[test]
    fn row_default_type_is_omitted() {
        let row = Row::new(vec![json!("hello")], RowType::Log);
        assert_eq!(serde_json::to_value(&row).expect("serialize"), json!([["hello"]]));
        assert_eq!(row.slot_count(), 1);
    }

    #[test]
    fn row_default_type_with_backtrace_is_empty_string() {
        let row = Row::new(vec![json!("hello")], RowType::Log).with_backtrace("trace");
        assert_eq!(
            serde_json::to_value(&row).expect("serialize"),
            json!([["hello"], "", "trace"])
        );
    }

    #[test]
    fn row_non_default_type_is_kept() {
        let row = Row::new(Vec::new(), RowType::GroupEnd);
        assert_eq!(serde_json::to_value(&row).expect("serialize"), json!([[], "groupEnd"]));

        let row = Row::new(vec![json!(1)], RowType::Warn).with_backtrace("t");
        assert_eq!(serde_json::to_value(&row).expect("serialize"), json!([[1], "warn", "t"]));
    }

    // ===========================================
    // Payload Tests
    // ===========================================

    #[test]
    fn payload_header_value_decodes_to_schema() {
        let payload = WirePayload::new(vec![Row::new(vec![json!("a/b ø")], RowType::Info)]);
        let encoded = payload.to_header_value().expect("encode");
        let decoded = STANDARD.decode(encoded).expect("base64");
        let text = String::from_utf8(decoded).expect("utf-8");

        assert!(text.contains("a/b ø"));
        let json: Json = serde_json::from_str(&text).expect("json");
        assert_eq!(json["version"], json!(env!("CARGO_PKG_VERSION")));
        assert_eq!(json["columns"], json!(["log", "type", "backtrace"]));
        assert_eq!(json["rows"], json!([[["a/b ø"], "info"]]));
    }

    #[test]
    fn payload_key_order() {
        let text = WirePayload::new(Vec::new()).to_json().expect("json");
        let version = text.find("\"version\"").expect("version");
        let columns = text.find("\"columns\"").expect("columns");
        let rows = text.find("\"rows\"").expect("rows");
        assert!(version < columns && columns < rows);
    }

    // ===========================================
    // Encoder Tests
    // ===========================================

    #[test]
    fn encode_error_with_label() {
        let json = encode(Level::Error, "boom", Context::new().with("other", 42));
        assert_eq!(json, json!([[["boom", "other:", 42], "error"]]));
    }

    #[test_case(Level::Debug, json!([[["m"]]]) ; "debug omits type")]
    #[test_case(Level::Info, json!([[["m"], "info"]]) ; "info")]
    #[test_case(Level::Notice, json!([[["m"], "info"]]) ; "notice")]
    #[test_case(Level::Warning, json!([[["m"], "warn"]]) ; "warning")]
    #[test_case(Level::Alert, json!([[["m"], "error"]]) ; "alert")]
    fn encode_severity_map(level: Level, expected: Json) {
        assert_eq!(encode(level, "m", Context::new()), expected);
    }

    #[test]
    fn encode_escapes_percent() {
        let json = encode(Level::Debug, "DE%BUG", Context::new());
        assert_eq!(json, json!([[["DE%%BUG"]]]));
    }

    #[test]
    fn encode_positional_values_have_no_label() {
        let context = Context::new().with_value(123).with("x", "y").with_value(true);
        let json = encode(Level::Info, "mixed", context);
        assert_eq!(json, json!([[["mixed", 123, "x:", "y", true], "info"]]));
    }

    #[test]
    fn encode_exception_group_follows_primary_row() {
        let context = Context::new().with(EXCEPTION_KEY, exception()).with("id", 7);
        let json = encode(Level::Warning, "failed", context);

        assert_eq!(
            json,
            json!([
                [["failed", "id:", 7], "warn"],
                [["RuntimeError: ouch! in src/app.rs:42"], "groupCollapsed"],
                [["Stack trace:\n#0 app::handler()\n#1 {main}"], "info"],
                [[], "groupEnd"],
            ])
        );
    }

    #[test]
    fn encode_exception_key_without_error_is_plain_context() {
        let context = Context::new().with(EXCEPTION_KEY, "not an error");
        let json = encode(Level::Info, "m", context);
        assert_eq!(json, json!([[["m", "exception:", "not an error"], "info"]]));
    }

    #[test]
    fn encode_exception_as_backtrace_keeps_empty_type_slot() {
        let encoder = EntryEncoder::new(ExceptionStyle::Backtrace);
        let entry = LogEntry::new(
            Level::Debug,
            "m",
            Context::new().with(EXCEPTION_KEY, exception()),
        );
        let rows = encoder.encode(&entry);
        assert_eq!(rows.len(), 1);

        let json = serde_json::to_value(&rows).expect("serialize");
        assert_eq!(json[0][0], json!(["m"]));
        assert_eq!(json[0][1], json!(""));
        assert!(
            json[0][2]
                .as_str()
                .is_some_and(|trace| trace.starts_with("RuntimeError: ouch!"))
        );
    }

    #[test_case("table: Users", "Users" ; "prefixed")]
    #[test_case("TABLE:Users", "Users" ; "any case no space")]
    #[test_case("table", "Table" ; "bare key")]
    fn encode_table_group(key: &str, title: &str) {
        let records = Value::seq([
            Value::map([("id", 1), ("age", 30)]),
            Value::map([("id", 2), ("age", 41)]),
        ]);
        let context = Context::new().with(key, records).with("n", 2);
        let json = encode(Level::Info, "people", context);

        assert_eq!(
            json,
            json!([
                [["people", "n:", 2], "info"],
                [[title], "groupCollapsed"],
                [[[{"id": 1, "age": 30}, {"id": 2, "age": 41}]], "table"],
                [[], "groupEnd"],
            ])
        );
    }

    #[test]
    fn encode_table_key_with_non_records_is_plain_context() {
        let context = Context::new().with("table: nums", Value::seq([1, 2]));
        let json = encode(Level::Debug, "m", context);
        assert_eq!(json, json!([[["m", "table: nums:", [1, 2]]]]));
    }

    #[test]
    fn encode_empty_table_is_plain_context() {
        let context = Context::new().with("table: none", Value::Seq(Vec::new()));
        let json = encode(Level::Debug, "m", context);
        assert_eq!(json, json!([[["m", "table: none:", []]]]));
    }

    #[test]
    fn encode_all_preserves_entry_order() {
        let entries = vec![
            LogEntry::new(Level::Debug, "first", Context::new()),
            LogEntry::new(Level::Error, "second", Context::new()),
        ];
        let rows = EntryEncoder::default().encode_all(&entries);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].data, vec![json!("first")]);
        assert_eq!(rows[1].row_type, RowType::Error);
    }

    #[test]
    fn encode_scopes_identity_to_one_entry() {
        let shared = Value::from(ErrorDetails::new("E", "m"));
        let entries = vec![
            LogEntry::new(Level::Debug, "a", Context::new().with_value(shared.clone())),
            LogEntry::new(Level::Debug, "b", Context::new().with_value(shared)),
        ];
        let rows = EntryEncoder::default().encode_all(&entries);
        assert_eq!(rows[0].data[1]["message"], json!("m"));
        assert_eq!(rows[1].data[1]["message"], json!("m"));
    }
}
