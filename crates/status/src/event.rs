use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Point-in-time progress of one transfer.
///
/// Fraction and throughput are derived on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Bytes handed to the transport so far.
    pub transferred_bytes: i64,
    /// Total body size in bytes, or -1 when unknown.
    pub total_bytes: i64,
    /// Captured once, before the first chunk was written.
    pub started_at: Instant,
}

impl ProgressSnapshot {
    pub fn new(transferred_bytes: i64, total_bytes: i64, started_at: Instant) -> Self {
        Self {
            transferred_bytes,
            total_bytes,
            started_at,
        }
    }

    /// Completed fraction, 0.0 to 1.0. An unknown or zero total reads as
    /// complete.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes <= 0 {
            return 1.0;
        }
        self.transferred_bytes as f64 / self.total_bytes as f64
    }

    /// Average throughput since `started_at`, in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        let elapsed_ms = self.started_at.elapsed().as_millis() as i64;
        self.transferred_bytes as f64 * 1000.0 / elapsed_ms.max(1) as f64
    }
}

/// Final outcome of a transfer as reported by the remote endpoint.
///
/// A non-success outcome is ordinary data, not an error: the presentation
/// layer decides how to surface it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub success: bool,
    pub code: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl TransferOutcome {
    /// A successful outcome with the given response code.
    pub fn ok(code: i32, message: impl Into<String>) -> Self {
        Self {
            success: true,
            code,
            message: message.into(),
        }
    }

    /// A failed outcome with the given response code.
    pub fn failed(code: i32, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code,
            message: message.into(),
        }
    }
}

/// One status event: a progress update or the terminal result.
///
/// Exactly one of the two is ever populated, by construction. A `Result` is
/// terminal *in intent* only — the channel mechanically keeps accepting
/// events after one, and consumers stop themselves on receipt rather than
/// waiting for any completion signal.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferStatus {
    Progress(ProgressSnapshot),
    Result(TransferOutcome),
}

impl TransferStatus {
    /// Whether this is the terminal result event.
    pub fn is_result(&self) -> bool {
        matches!(self, TransferStatus::Result(_))
    }
}
