//! # chrome-logger
//!
//! Request-scoped logging for the ChromeLogger browser extension.
//!
//! This crate provides:
//!
//! - [`ChromeLogger`] — Buffers entries for one request and flushes them into
//!   an `X-ChromeLogger-Data` header or a persisted `log-*.json` file
//! - [`Value`] / [`Loggable`] — Arbitrary context values, including cyclic
//!   object graphs, errors, dates and resources
//! - [`Sanitizer`] — Cycle-safe conversion of values into JSON
//! - [`EntryEncoder`] — Wire rows with exception and table groups
//! - [`BudgetEnforcer`] — Keeps the header under a byte limit by dropping the
//!   oldest rows
//! - [`ChromeLoggerLayer`] — Tower middleware with a per-request logger
//! - [`CaptureLayer`] — Tracing layer feeding a request logger
//!
//! ## Example
//!
//! ```rust
//! use chrome_logger::{ChromeLogger, Context, DATA_HEADER};
//!
//! let mut logger = ChromeLogger::new();
//! logger.error("boom", Context::new().with("other", 42));
//!
//! let response = logger
//!     .write_to_response(http::Response::new(()))
//!     .expect("valid header");
//! assert!(response.headers().contains_key(DATA_HEADER));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod budget;
pub mod capture;
pub mod config;
pub mod emit;
pub mod encoder;
pub mod error;
pub mod logger;
pub mod middleware;
pub mod persist;
pub mod sanitize;
pub mod types;
pub mod value;

// Re-export main types
pub use budget::{BoundedPayload, BudgetEnforcer, LIMIT_WARNING, bounded_encode};
pub use capture::{CaptureLayer, level_from_tracing};
pub use config::{ChromeLoggerConfig, DEFAULT_LIMIT, ExceptionStyle, PersistenceConfig};
pub use emit::{DATA_HEADER, HeaderSink, LOCATION_HEADER, ResponseHeaders};
pub use encoder::{EXCEPTION_KEY, EntryEncoder, Row, WirePayload};
pub use error::{ChromeLogError, Result};
pub use logger::{ChromeLogger, Emission, LoggerState};
pub use middleware::{ChromeLoggerLayer, ChromeLoggerService, RequestLogger};
pub use persist::{Clock, FilePersistence, ManualClock, RETENTION, SystemClock};
pub use sanitize::{MAX_DEPTH, Sanitizer, sanitize};
pub use types::{Context, ContextKey, Level, LogEntry, RowType, UnknownLevel};
pub use value::{ErrorDetails, Field, LogDateTime, Loggable, Resource, ResourceId, Value};
