//! Request-scoped logger.
//!
//! This module provides:
//! - [`ChromeLogger`] — Entry buffer that flushes into a header or a file
//! - [`LoggerState`] — Flush lifecycle
//! - [`Emission`] — What a flush produced

use std::mem;
use std::sync::Arc;

use tracing::debug;

use crate::budget::bounded_encode;
use crate::config::ChromeLoggerConfig;
use crate::emit::{DATA_HEADER, HeaderSink, LOCATION_HEADER, ResponseHeaders};
use crate::encoder::{EntryEncoder, WirePayload};
use crate::error::{ChromeLogError, Result};
use crate::persist::{Clock, FilePersistence};
use crate::types::{Context, Level, LogEntry};

/// Flush lifecycle of a logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerState {
    /// Entries are being appended.
    Accumulating,
    /// A flush is encoding the buffer.
    Encoding,
    /// The last flush emitted a header or file; the buffer is empty.
    Flushed,
}

/// The header a flush produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission {
    /// Base64 payload for [`DATA_HEADER`].
    Header {
        /// Header value
        value: String,
    },
    /// Persisted file URL for [`LOCATION_HEADER`].
    Location {
        /// Public path of the written file
        path: String,
    },
}

impl Emission {
    /// Returns the header name this emission is sent under.
    #[must_use]
    pub const fn header_name(&self) -> &'static str {
        match self {
            Self::Header { .. } => DATA_HEADER,
            Self::Location { .. } => LOCATION_HEADER,
        }
    }

    /// Returns the header value.
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Header { value } => value,
            Self::Location { path } => path,
        }
    }
}

/// Collects log entries for one request and flushes them to the client.
///
/// Not meant to be shared between threads without external locking; the
/// middleware wraps one per request in a mutex.
#[derive(Debug)]
pub struct ChromeLogger {
    config: ChromeLoggerConfig,
    encoder: EntryEncoder,
    persistence: Option<FilePersistence>,
    entries: Vec<LogEntry>,
    state: LoggerState,
}

impl Default for ChromeLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl ChromeLogger {
    /// Creates a header-mode logger with the default limit.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(ChromeLoggerConfig::default(), None)
    }

    /// Creates a logger from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the limit cannot hold the truncation warning or the
    /// persistence directory is unusable.
    pub fn with_config(config: ChromeLoggerConfig) -> Result<Self> {
        config.validate()?;
        let persistence = config
            .persistence
            .as_ref()
            .map(FilePersistence::new)
            .transpose()?;
        Ok(Self::from_parts(config, persistence))
    }

    fn from_parts(config: ChromeLoggerConfig, persistence: Option<FilePersistence>) -> Self {
        Self {
            encoder: EntryEncoder::new(config.exception_style),
            config,
            persistence,
            entries: Vec::new(),
            state: LoggerState::Accumulating,
        }
    }

    /// Replaces the clock used for persisted-file garbage collection.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.persistence = self.persistence.map(|p| p.with_clock(clock));
        self
    }

    /// Returns an empty logger sharing this logger's configuration.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self::from_parts(self.config.clone(), self.persistence.clone())
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ChromeLoggerConfig {
        &self.config
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LoggerState {
        self.state
    }

    /// Returns the buffered entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Returns the number of buffered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Buffers one entry.
    pub fn log(&mut self, level: Level, message: impl Into<String>, context: Context) {
        self.entries.push(LogEntry::new(level, message, context));
        self.state = LoggerState::Accumulating;
    }

    /// Logs at [`Level::Debug`].
    pub fn debug(&mut self, message: impl Into<String>, context: Context) {
        self.log(Level::Debug, message, context);
    }

    /// Logs at [`Level::Info`].
    pub fn info(&mut self, message: impl Into<String>, context: Context) {
        self.log(Level::Info, message, context);
    }

    /// Logs at [`Level::Notice`].
    pub fn notice(&mut self, message: impl Into<String>, context: Context) {
        self.log(Level::Notice, message, context);
    }

    /// Logs at [`Level::Warning`].
    pub fn warning(&mut self, message: impl Into<String>, context: Context) {
        self.log(Level::Warning, message, context);
    }

    /// Logs at [`Level::Error`].
    pub fn error(&mut self, message: impl Into<String>, context: Context) {
        self.log(Level::Error, message, context);
    }

    /// Logs at [`Level::Critical`].
    pub fn critical(&mut self, message: impl Into<String>, context: Context) {
        self.log(Level::Critical, message, context);
    }

    /// Logs at [`Level::Alert`].
    pub fn alert(&mut self, message: impl Into<String>, context: Context) {
        self.log(Level::Alert, message, context);
    }

    /// Logs at [`Level::Emergency`].
    pub fn emergency(&mut self, message: impl Into<String>, context: Context) {
        self.log(Level::Emergency, message, context);
    }

    /// Encodes and clears the buffer.
    ///
    /// Returns `None` without side effects when nothing is buffered. The
    /// buffer is cleared even if the persisted write fails; the logger then
    /// goes back to [`LoggerState::Accumulating`] instead of `Flushed`.
    pub fn flush(&mut self) -> Result<Option<Emission>> {
        if self.entries.is_empty() {
            return Ok(None);
        }

        let entries = mem::take(&mut self.entries);
        self.state = LoggerState::Encoding;
        match self.encode(&entries) {
            Ok(emission) => {
                self.state = LoggerState::Flushed;
                Ok(Some(emission))
            }
            Err(err) => {
                self.state = LoggerState::Accumulating;
                Err(err)
            }
        }
    }

    fn encode(&self, entries: &[LogEntry]) -> Result<Emission> {
        if let Some(persistence) = &self.persistence {
            let payload = WirePayload::new(self.encoder.encode_all(entries));
            let path = persistence.write(&payload)?;
            return Ok(Emission::Location { path });
        }

        let bounded = bounded_encode(&self.encoder, entries, self.config.limit)?;
        debug!(
            entries = entries.len(),
            rows = bounded.rows.len(),
            bytes = bounded.header_value.len(),
            "encoded log header"
        );
        Ok(Emission::Header {
            value: bounded.header_value,
        })
    }

    /// Flushes into `response`, returning it with the log header added.
    ///
    /// An empty buffer returns the response unchanged.
    pub fn write_to_response<R: ResponseHeaders>(&mut self, response: R) -> Result<R> {
        match self.flush()? {
            Some(emission) => response.with_header(emission.header_name(), emission.value()),
            None => Ok(response),
        }
    }

    /// Flushes through raw header emission.
    ///
    /// # Errors
    ///
    /// Returns [`ChromeLogError::HeadersAlreadySent`] if the sink already sent
    /// its headers; the buffer is kept in that case.
    pub fn emit_header<S: HeaderSink + ?Sized>(&mut self, sink: &mut S) -> Result<()> {
        if self.entries.is_empty() {
            return Ok(());
        }
        if sink.headers_sent() {
            return Err(ChromeLogError::HeadersAlreadySent);
        }
        if let Some(emission) = self.flush()? {
            sink.set_header(emission.header_name(), emission.value())?;
        }
        Ok(())
    }
}
