//! Tracing layer that records events into a request logger.

use std::fmt;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context as LayerContext;

use crate::middleware::RequestLogger;
use crate::types::{Context, Level};
use crate::value::ErrorDetails;

const MESSAGE_FIELD: &str = "message";

/// A tracing [`Layer`] that buffers events in a [`RequestLogger`].
///
/// Each event becomes one entry: the `message` field is the message, every
/// other field a named context entry. Error-valued fields keep their cause
/// chain, so a field named `exception` expands into a trace group. Events
/// emitted by this crate are skipped.
#[derive(Debug, Clone)]
pub struct CaptureLayer {
    logger: RequestLogger,
}

impl CaptureLayer {
    /// Creates a layer feeding `logger`.
    #[must_use]
    pub const fn new(logger: RequestLogger) -> Self {
        Self { logger }
    }

    /// Returns the logger events are recorded into.
    #[must_use]
    pub const fn logger(&self) -> &RequestLogger {
        &self.logger
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: LayerContext<'_, S>) {
        let metadata = event.metadata();
        if is_internal(metadata.target()) {
            return;
        }

        let mut visitor = ContextVisitor::default();
        event.record(&mut visitor);

        self.logger.log(
            level_from_tracing(metadata.level()),
            visitor.message.unwrap_or_default(),
            visitor.context,
        );
    }
}

/// Maps a tracing level onto a severity.
#[must_use]
pub fn level_from_tracing(level: &tracing::Level) -> Level {
    match *level {
        tracing::Level::ERROR => Level::Error,
        tracing::Level::WARN => Level::Warning,
        tracing::Level::INFO => Level::Info,
        _ => Level::Debug,
    }
}

const CRATE_TARGET: &str = env!("CARGO_CRATE_NAME");

// the logger holds its lock while it emits its own events
fn is_internal(target: &str) -> bool {
    target
        .strip_prefix(CRATE_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

#[derive(Default)]
struct ContextVisitor {
    message: Option<String>,
    context: Context,
}

impl Visit for ContextVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let text = format!("{value:?}");
        if field.name() == MESSAGE_FIELD {
            self.message = Some(text);
        } else {
            self.context.insert(field.name(), text);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == MESSAGE_FIELD {
            self.message = Some(value.to_string());
        } else {
            self.context.insert(field.name(), value);
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.context.insert(field.name(), value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.context.insert(field.name(), value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.context.insert(field.name(), value);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.context.insert(field.name(), value);
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.context.insert(field.name(), ErrorDetails::from_dyn(value));
    }
}
