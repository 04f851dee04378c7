//! Size budget for the header transport.
//!
//! When the encoded header would exceed the byte limit, a warning row is
//! appended and the oldest rows are dropped in batches sized from the
//! average row length, until the header fits.

use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::encoder::{EntryEncoder, Row, WirePayload};
use crate::error::Result;
use crate::types::{Level, LogEntry};

/// Message of the row appended when older rows are dropped.
pub const LIMIT_WARNING: &str =
    "Beginning of log entries omitted - total header size over Chrome's internal limit!";

/// Share of the limit each trimming round aims for.
const SAFETY_MARGIN: f64 = 0.95;

/// Builds the truncation warning row.
#[must_use]
pub fn warning_row() -> Row {
    Row::new(vec![Json::from(LIMIT_WARNING)], Level::Warning.row_type())
}

/// Header length of a payload holding only the warning row.
pub fn minimum_limit() -> Result<usize> {
    Ok(WirePayload::new(vec![warning_row()]).to_header_value()?.len())
}

/// Result of fitting rows under a limit.
#[derive(Debug, Clone)]
pub struct BoundedPayload {
    /// Base64 header value
    pub header_value: String,
    /// Rows that made it into the header, warning row included
    pub rows: Vec<Row>,
    /// Number of data rows before trimming
    pub total_rows: usize,
    /// Number of data rows dropped
    pub dropped_rows: usize,
    /// Whether the warning row was appended
    pub truncated: bool,
}

/// Trims rows until the encoded header fits.
#[derive(Debug, Clone, Copy)]
pub struct BudgetEnforcer {
    limit: usize,
}

impl BudgetEnforcer {
    /// Creates an enforcer for the given header length in bytes.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Returns the limit in bytes.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Encodes `rows` and drops the oldest ones until the header fits.
    ///
    /// If even the warning row alone exceeds the limit, the warning-only
    /// payload is returned.
    pub fn enforce(&self, rows: Vec<Row>) -> Result<BoundedPayload> {
        let total_rows = rows.len();
        let mut payload = WirePayload::new(rows);
        let mut header_value = payload.to_header_value()?;

        if header_value.len() <= self.limit {
            return Ok(BoundedPayload {
                header_value,
                rows: payload.rows,
                total_rows,
                dropped_rows: 0,
                truncated: false,
            });
        }

        payload.rows.push(warning_row());
        header_value = payload.to_header_value()?;

        while header_value.len() > self.limit {
            let count = payload.rows.len();
            if count <= 1 {
                warn!(
                    limit = self.limit,
                    size = header_value.len(),
                    "header limit cannot hold the truncation warning"
                );
                break;
            }

            let average = header_value.len() as f64 / count as f64;
            let max_rows = (self.limit as f64 * SAFETY_MARGIN / average).floor() as usize;
            let excess = count.saturating_sub(max_rows).max(1).min(count - 1);

            payload.rows.drain(..excess);
            header_value = payload.to_header_value()?;
            debug!(excess, remaining = payload.rows.len(), "dropped oldest rows");
        }

        let dropped_rows = total_rows + 1 - payload.rows.len();
        warn!(
            dropped = dropped_rows,
            total = total_rows,
            limit = self.limit,
            "log rows dropped to fit header limit"
        );

        Ok(BoundedPayload {
            header_value,
            rows: payload.rows,
            total_rows,
            dropped_rows,
            truncated: true,
        })
    }
}

/// Encodes entries and fits them under `limit` bytes of header.
pub fn bounded_encode(
    encoder: &EntryEncoder,
    entries: &[LogEntry],
    limit: usize,
) -> Result<BoundedPayload> {
    BudgetEnforcer::new(limit).enforce(encoder.encode_all(entries))
}
