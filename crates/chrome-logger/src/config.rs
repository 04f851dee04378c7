//! Logger configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::budget::minimum_limit;
use crate::error::{ChromeLogError, Result};
use crate::persist::validate_dir;

/// Default header size limit: 240 KiB.
pub const DEFAULT_LIMIT: usize = 245_760;

/// How an `exception` context entry is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExceptionStyle {
    /// Collapsed group holding the trace text, after the primary row.
    #[default]
    Group,
    /// Trace text in the primary row's backtrace slot.
    Backtrace,
}

/// Where persisted log files go and how browsers reach them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Writable local directory for `log-*.json` files.
    pub local_dir: PathBuf,
    /// Public URL prefix of `local_dir`.
    pub public_path: String,
}

impl PersistenceConfig {
    /// Creates a persistence target.
    #[must_use]
    pub fn new(local_dir: impl Into<PathBuf>, public_path: impl Into<String>) -> Self {
        Self {
            local_dir: local_dir.into(),
            public_path: public_path.into(),
        }
    }
}

/// Configuration for a [`ChromeLogger`](crate::ChromeLogger).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromeLoggerConfig {
    /// Header size limit in bytes (header mode only).
    pub limit: usize,
    /// Persisted-file target; when set, no data header is emitted.
    pub persistence: Option<PersistenceConfig>,
    /// Rendering of the `exception` context entry.
    pub exception_style: ExceptionStyle,
}

impl Default for ChromeLoggerConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            persistence: None,
            exception_style: ExceptionStyle::default(),
        }
    }
}

impl ChromeLoggerConfig {
    /// Creates a header-mode configuration with the default limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the header size limit in bytes.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the header size limit in kibibytes.
    #[must_use]
    pub const fn with_limit_kb(mut self, kb: usize) -> Self {
        self.limit = kb.saturating_mul(1024);
        self
    }

    /// Switches to persisted-file mode.
    #[must_use]
    pub fn with_persistence(
        mut self,
        local_dir: impl Into<PathBuf>,
        public_path: impl Into<String>,
    ) -> Self {
        self.persistence = Some(PersistenceConfig::new(local_dir, public_path));
        self
    }

    /// Sets the exception rendering.
    #[must_use]
    pub const fn with_exception_style(mut self, style: ExceptionStyle) -> Self {
        self.exception_style = style;
        self
    }

    /// Returns true if logs are written to files instead of a header.
    #[must_use]
    pub const fn is_persistent(&self) -> bool {
        self.persistence.is_some()
    }

    /// Checks the limit and, in persisted-file mode, the target directory.
    pub fn validate(&self) -> Result<()> {
        if let Some(persistence) = &self.persistence {
            return validate_dir(&persistence.local_dir);
        }

        let minimum = minimum_limit()?;
        if self.limit < minimum {
            return Err(ChromeLogError::LimitTooSmall {
                limit: self.limit,
                minimum,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChromeLoggerConfig::default();
        assert_eq!(config.limit, 245_760);
        assert!(config.persistence.is_none());
        assert_eq!(config.exception_style, ExceptionStyle::Group);
        assert!(!config.is_persistent());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_builder() {
        let config = ChromeLoggerConfig::new()
            .with_limit_kb(100)
            .with_exception_style(ExceptionStyle::Backtrace)
            .with_persistence("/tmp", "/logs");

        assert_eq!(config.limit, 102_400);
        assert_eq!(ChromeLoggerConfig::new().with_limit_kb(usize::MAX).limit, usize::MAX);
        assert_eq!(config.exception_style, ExceptionStyle::Backtrace);
        assert!(config.is_persistent());
        assert_eq!(
            config.persistence,
            Some(PersistenceConfig::new("/tmp", "/logs"))
        );
    }

    #[test]
    fn limit_below_warning_row_is_rejected() {
        let err = ChromeLoggerConfig::new()
            .with_limit(16)
            .validate()
            .expect_err("limit too small");
        assert!(matches!(err, ChromeLogError::LimitTooSmall { limit: 16, .. }));
    }

    #[test]
    fn persistent_mode_ignores_limit() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = ChromeLoggerConfig::new()
            .with_limit(0)
            .with_persistence(dir.path(), "/logs");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_persistence_dir_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = ChromeLoggerConfig::new().with_persistence(dir.path().join("missing"), "/logs");
        let err = config.validate().expect_err("missing directory");
        assert!(matches!(err, ChromeLogError::InvalidPersistenceDir { .. }));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: ChromeLoggerConfig =
            serde_json::from_str(r#"{"exception_style": "backtrace"}"#).expect("deserialize");
        assert_eq!(config.limit, DEFAULT_LIMIT);
        assert_eq!(config.exception_style, ExceptionStyle::Backtrace);

        let config: ChromeLoggerConfig = serde_json::from_str(
            r#"{"limit": 4096, "persistence": {"local_dir": "/var/log/app", "public_path": "/log"}}"#,
        )
        .expect("deserialize");
        assert_eq!(config.limit, 4096);
        assert_eq!(
            config.persistence.map(|p| p.public_path),
            Some("/log".to_string())
        );
    }
}
