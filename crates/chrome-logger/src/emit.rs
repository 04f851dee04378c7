//! Header emission seams.
//!
//! This module provides the two ways a flushed log reaches the client:
//! - [`ResponseHeaders`] — Builder-style responses that return themselves with
//!   an extra header
//! - [`HeaderSink`] — Raw header emission that can fail once the body started

use http::header::{HeaderName, HeaderValue};

use crate::error::{ChromeLogError, Result};

/// Header carrying the base64 payload in header mode.
pub const DATA_HEADER: &str = "X-ChromeLogger-Data";

/// Header carrying the persisted file URL in file mode.
pub const LOCATION_HEADER: &str = "X-ServerLog-Location";

/// A response that can be rebuilt with an additional header.
pub trait ResponseHeaders: Sized {
    /// Returns the response with `name: value` set, replacing earlier values.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or value is not a valid header.
    fn with_header(self, name: &str, value: &str) -> Result<Self>;
}

/// A destination for raw header emission.
pub trait HeaderSink {
    /// Returns true once the response body has started.
    fn headers_sent(&self) -> bool;

    /// Sets `name: value`, replacing earlier values.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or value is not a valid header, or if
    /// headers were already sent.
    fn set_header(&mut self, name: &str, value: &str) -> Result<()>;
}

/// Converts a name/value pair into typed header parts.
pub fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| ChromeLogError::InvalidHeaderValue(format!("{name}: {e}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| ChromeLogError::InvalidHeaderValue(e.to_string()))?;
    Ok((name, value))
}

impl<B> ResponseHeaders for http::Response<B> {
    fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        self.headers_mut().set_header(name, value)?;
        Ok(self)
    }
}

impl HeaderSink for http::HeaderMap {
    fn headers_sent(&self) -> bool {
        false
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let (name, value) = header_pair(name, value)?;
        self.insert(name, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_with_header_replaces_value() {
        let response = http::Response::new(());
        let response = response
            .with_header(DATA_HEADER, "first")
            .and_then(|r| r.with_header(DATA_HEADER, "second"))
            .expect("valid header");

        let values: Vec<_> = response
            .headers()
            .get_all("x-chromelogger-data")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert_eq!(values, vec!["second"]);
    }

    #[test]
    fn header_map_accepts_mixed_case_names() {
        let mut headers = http::HeaderMap::new();
        assert!(!headers.headers_sent());
        headers
            .set_header(LOCATION_HEADER, "/log/log-1.json")
            .expect("valid header");
        assert_eq!(
            headers.get("x-serverlog-location").and_then(|v| v.to_str().ok()),
            Some("/log/log-1.json")
        );
    }

    #[test]
    fn header_value_with_newline_is_rejected() {
        let err = header_pair(DATA_HEADER, "bad\nvalue").expect_err("newline");
        assert!(matches!(err, ChromeLogError::InvalidHeaderValue(_)));
    }

    #[test]
    fn header_name_with_space_is_rejected() {
        let err = header_pair("X Bad", "value").expect_err("space");
        assert!(matches!(err, ChromeLogError::InvalidHeaderValue(_)));
    }
}
