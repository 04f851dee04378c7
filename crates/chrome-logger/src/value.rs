//! Application values that can be attached to a log entry's context.
//!
//! [`Value`] is a closed enumeration over value kinds. Structured values
//! with identity are [`Value::Object`]s holding an `Arc<dyn Loggable>`;
//! the [`Loggable`] capabilities decide how the sanitizer expands them.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::Serialize;

/// Format used for UTC timestamps on the wire (second precision).
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// An arbitrary application value captured in a log context.
#[derive(Clone, Default)]
pub enum Value {
    /// Absent value.
    #[default]
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Signed integer scalar.
    Int(i64),
    /// Unsigned integer scalar.
    UInt(u64),
    /// Floating point scalar; non-finite values sanitize to null.
    Float(f64),
    /// String scalar.
    String(String),
    /// Ordered sequence.
    Seq(Vec<Value>),
    /// Ordered mapping with string keys.
    Map(Vec<(String, Value)>),
    /// Shared structured value with identity.
    Object(Arc<dyn Loggable>),
    /// Opaque runtime handle.
    Resource(Resource),
    /// A value with no JSON representation; always sanitizes to null.
    Unsupported,
}

impl Value {
    /// Wraps a loggable object, giving it a fresh identity.
    pub fn object(object: impl Loggable + 'static) -> Self {
        Self::Object(Arc::new(object))
    }

    /// Builds an ordered mapping.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Self>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Builds an ordered sequence.
    pub fn seq<V: Into<Self>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::Seq(items.into_iter().map(Into::into).collect())
    }

    /// Captures an error, recording the caller's location.
    #[track_caller]
    pub fn error<E: std::error::Error + 'static>(err: &E) -> Self {
        ErrorDetails::capture(err).into()
    }

    /// Converts anything serde can serialize. Values serde rejects become
    /// [`Value::Unsupported`].
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Self {
        serde_json::to_value(value).map_or(Self::Unsupported, Self::from)
    }

    /// Returns true for a mapping, the shape of one table record.
    #[must_use]
    pub const fn is_record(&self) -> bool {
        matches!(self, Self::Map(_))
    }

    /// Returns the error details if this value has the error capability.
    #[must_use]
    pub fn error_details(&self) -> Option<ErrorDetails> {
        match self {
            Self::Object(object) => object.as_error(),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::UInt(u) => f.debug_tuple("UInt").field(u).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::Seq(items) => f.debug_tuple("Seq").field(items).finish(),
            Self::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Self::Object(object) => f.debug_tuple("Object").field(&object.type_name()).finish(),
            Self::Resource(resource) => f.debug_tuple("Resource").field(resource).finish(),
            Self::Unsupported => f.write_str("Unsupported"),
        }
    }
}

/// Capabilities a structured value can offer to the sanitizer.
///
/// The sanitizer checks them in order: [`to_log_value`](Self::to_log_value),
/// [`as_datetime`](Self::as_datetime), [`as_error`](Self::as_error), and
/// finally falls back to [`fields`](Self::fields).
pub trait Loggable: Send + Sync {
    /// Concrete type name, used as the `type` tag.
    fn type_name(&self) -> &str;

    /// Custom JSON shape for this value.
    fn to_log_value(&self) -> Option<Value> {
        None
    }

    /// Date/time view of this value.
    fn as_datetime(&self) -> Option<LogDateTime> {
        None
    }

    /// Error view of this value.
    fn as_error(&self) -> Option<ErrorDetails> {
        None
    }

    /// Instance fields, own fields first, then fields declared by ancestors.
    fn fields(&self) -> Vec<Field> {
        Vec::new()
    }
}

/// One instance field of a generic object.
#[derive(Debug, Clone)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Declaring ancestor type, for fields not declared by the concrete type
    pub declared_by: Option<String>,
    /// Field value
    pub value: Value,
}

impl Field {
    /// Creates a field declared by the concrete type.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            declared_by: None,
            value: value.into(),
        }
    }

    /// Creates a field declared by an ancestor type.
    pub fn inherited(
        declared_by: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            declared_by: Some(declared_by.into()),
            value: value.into(),
        }
    }

    /// Key used in the sanitized mapping.
    #[must_use]
    pub fn key(&self) -> String {
        match &self.declared_by {
            Some(owner) => format!("{owner}::{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// A point in time together with the name of its original timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDateTime {
    /// The instant, normalized to UTC
    pub utc: DateTime<Utc>,
    /// Name of the timezone the value was expressed in
    pub timezone: String,
}

impl LogDateTime {
    /// Captures a date/time, naming its timezone by its offset's display form.
    pub fn from_datetime<Tz>(datetime: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        Self {
            utc: datetime.with_timezone(&Utc),
            timezone: datetime.offset().to_string(),
        }
    }

    /// Overrides the timezone name (e.g. with an IANA name).
    #[must_use]
    pub fn with_timezone_name(mut self, name: impl Into<String>) -> Self {
        self.timezone = name.into();
        self
    }

    /// Formats the instant as `YYYY-MM-DDTHH:MM:SSZ`.
    #[must_use]
    pub fn format_utc(&self) -> String {
        self.utc.format(DATETIME_FORMAT).to_string()
    }
}

/// Structured description of an error and its cause chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetails {
    /// Error type name
    pub type_name: String,
    /// Error message
    pub message: String,
    /// Source file where the error was captured
    pub file: String,
    /// Source line where the error was captured
    pub line: u32,
    /// Application-specific error code
    pub code: i64,
    /// Rendered call-site frames, innermost first
    pub frames: Vec<String>,
    /// The error that caused this one
    pub previous: Option<Box<ErrorDetails>>,
}

impl ErrorDetails {
    /// Creates error details with no location, frames or cause.
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            file: String::new(),
            line: 0,
            code: 0,
            frames: Vec::new(),
            previous: None,
        }
    }

    /// Captures `err` with its `source()` chain, the caller's location and a
    /// backtrace when backtraces are enabled.
    #[track_caller]
    pub fn capture<E: std::error::Error + 'static>(err: &E) -> Self {
        let location = Location::caller();
        let mut details = Self::from_dyn(err);
        details.type_name = std::any::type_name::<E>().to_string();
        details.file = location.file().to_string();
        details.line = location.line();
        details.frames = captured_frames();
        details
    }

    /// Describes a type-erased error and its `source()` chain.
    pub fn from_dyn(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut details = Self::new("Error", err.to_string());
        details.previous = err.source().map(|source| Box::new(Self::from_dyn(source)));
        details
    }

    /// Sets the source location.
    #[must_use]
    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = file.into();
        self.line = line;
        self
    }

    /// Sets the error code.
    #[must_use]
    pub const fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    /// Appends a call-site frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.frames.push(frame.into());
        self
    }

    /// Sets the causing error.
    #[must_use]
    pub fn with_previous(mut self, previous: Self) -> Self {
        self.previous = Some(Box::new(previous));
        self
    }

    /// First line of the trace: type name, message and location.
    #[must_use]
    pub fn title(&self) -> String {
        let mut title = format!("{}: {}", self.type_name, self.message);
        if !self.file.is_empty() {
            title.push_str(&format!(" in {}:{}", self.file, self.line));
        }
        title.replace('\n', " ")
    }

    /// Full trace text: the title line, the numbered frames, then one
    /// `Caused by:` line per error in the cause chain.
    #[must_use]
    pub fn trace_string(&self) -> String {
        let mut lines = vec![self.title(), "Stack trace:".to_string()];
        for (index, frame) in self.frames.iter().enumerate() {
            lines.push(format!("#{index} {frame}"));
        }
        lines.push(format!("#{} {{main}}", self.frames.len()));

        let mut cause = self.previous.as_deref();
        while let Some(previous) = cause {
            lines.push(format!("Caused by: {}", previous.title()));
            cause = previous.previous.as_deref();
        }
        lines.join("\n")
    }
}

fn captured_frames() -> Vec<String> {
    let backtrace = Backtrace::capture();
    if backtrace.status() != BacktraceStatus::Captured {
        return Vec::new();
    }
    backtrace
        .to_string()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Numeric or named id of an opaque handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceId {
    /// Numeric handle (e.g. a file descriptor)
    Number(i64),
    /// Named handle
    Name(String),
}

impl From<i64> for ResourceId {
    fn from(id: i64) -> Self {
        Self::Number(id)
    }
}

impl From<i32> for ResourceId {
    fn from(id: i32) -> Self {
        Self::Number(i64::from(id))
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::Name(id.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self::Name(id)
    }
}

/// An opaque runtime handle such as a file or socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    kind: String,
    id: ResourceId,
}

impl Resource {
    /// Creates a resource of the given kind.
    pub fn new(kind: impl Into<String>, id: impl Into<ResourceId>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Describes a file descriptor backed handle.
    #[cfg(unix)]
    pub fn from_fd(kind: impl Into<String>, handle: &impl std::os::fd::AsRawFd) -> Self {
        Self::new(kind, handle.as_raw_fd())
    }

    /// Kind of handle (e.g. `stream`).
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Handle id.
    #[must_use]
    pub const fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Type tag used on the wire: `resource<kind>`.
    #[must_use]
    pub fn type_tag(&self) -> String {
        format!("resource<{}>", self.kind)
    }
}

// ============================================================================
// Built-in loggable wrappers
// ============================================================================

struct DateTimeObject(LogDateTime);

impl Loggable for DateTimeObject {
    fn type_name(&self) -> &str {
        "DateTime"
    }

    fn as_datetime(&self) -> Option<LogDateTime> {
        Some(self.0.clone())
    }
}

struct ErrorObject(ErrorDetails);

impl Loggable for ErrorObject {
    fn type_name(&self) -> &str {
        &self.0.type_name
    }

    fn as_error(&self) -> Option<ErrorDetails> {
        Some(self.0.clone())
    }
}

// ============================================================================
// Conversions
// ============================================================================

macro_rules! impl_from_signed {
    ($($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::Int(i64::from(v))
            }
        }
    )*};
}

impl_from_signed!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Self::UInt(v as u64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::seq(v)
    }
}

impl From<LogDateTime> for Value {
    fn from(v: LogDateTime) -> Self {
        Self::object(DateTimeObject(v))
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        LogDateTime::from_datetime(&v).into()
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        LogDateTime::from_datetime(&v).into()
    }
}

impl From<ErrorDetails> for Value {
    fn from(v: ErrorDetails) -> Self {
        Self::object(ErrorObject(v))
    }
}

impl From<Resource> for Value {
    fn from(v: Resource) -> Self {
        Self::Resource(v)
    }
}

impl<T: Loggable + 'static> From<Arc<T>> for Value {
    fn from(v: Arc<T>) -> Self {
        Self::Object(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::UInt(u)
                } else {
                    n.as_f64().map_or(Self::Unsupported, Self::Float)
                }
            }
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => Self::seq(items),
            serde_json::Value::Object(map) => Self::map(map),
        }
    }
}
