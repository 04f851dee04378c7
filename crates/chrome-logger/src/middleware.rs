//! Tower middleware giving every request its own logger.
//!
//! [`ChromeLoggerLayer`] forks a fresh [`ChromeLogger`] per request and
//! exposes it to handlers as a [`RequestLogger`] request extension. Once the
//! inner service responds, the buffer is flushed into the response headers.
//! Flush failures are logged; the response is returned either way.

use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use futures::future::BoxFuture;
use http::{Request, Response};
use parking_lot::Mutex;
use tower::{Layer, Service};
use tracing::error;

use crate::config::ChromeLoggerConfig;
use crate::emit::HeaderSink;
use crate::error::Result;
use crate::logger::{ChromeLogger, Emission};
use crate::persist::Clock;
use crate::types::{Context, Level};

/// Shared handle to the logger of the current request.
#[derive(Debug, Clone)]
pub struct RequestLogger(Arc<Mutex<ChromeLogger>>);

impl RequestLogger {
    /// Wraps a logger.
    #[must_use]
    pub fn new(logger: ChromeLogger) -> Self {
        Self(Arc::new(Mutex::new(logger)))
    }

    /// Buffers one entry.
    pub fn log(&self, level: Level, message: impl Into<String>, context: Context) {
        self.0.lock().log(level, message, context);
    }

    /// Runs `f` with exclusive access to the logger.
    pub fn with<R>(&self, f: impl FnOnce(&mut ChromeLogger) -> R) -> R {
        f(&mut *self.0.lock())
    }

    /// Returns the number of buffered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Encodes and clears the buffer.
    pub fn flush(&self) -> Result<Option<Emission>> {
        self.0.lock().flush()
    }

    /// Flushes through raw header emission.
    pub fn emit_header<S: HeaderSink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        self.0.lock().emit_header(sink)
    }
}

/// Layer installing a per-request [`RequestLogger`].
#[derive(Debug, Clone)]
pub struct ChromeLoggerLayer {
    prototype: Arc<ChromeLogger>,
}

impl ChromeLoggerLayer {
    /// Creates a layer from a validated configuration.
    pub fn new(config: ChromeLoggerConfig) -> Result<Self> {
        Ok(Self::from_logger(ChromeLogger::with_config(config)?))
    }

    /// Creates a layer whose requests fork `logger`'s configuration.
    #[must_use]
    pub fn from_logger(logger: ChromeLogger) -> Self {
        Self {
            prototype: Arc::new(logger),
        }
    }

    /// Replaces the clock used for persisted-file garbage collection.
    #[must_use]
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self::from_logger(self.prototype.fork().with_clock(clock))
    }
}

impl<S> Layer<S> for ChromeLoggerLayer {
    type Service = ChromeLoggerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ChromeLoggerService {
            inner,
            prototype: Arc::clone(&self.prototype),
        }
    }
}

/// Service wrapper for [`ChromeLoggerLayer`].
#[derive(Debug, Clone)]
pub struct ChromeLoggerService<S> {
    inner: S,
    prototype: Arc<ChromeLogger>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ChromeLoggerService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let logger = RequestLogger::new(self.prototype.fork());
        req.extensions_mut().insert(logger.clone());

        // the clone that was polled ready must be the one that is called
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            if let Err(e) = logger.emit_header(response.headers_mut()) {
                error!(error = %e, "failed to flush request log");
            }
            Ok(response)
        })
    }
}
