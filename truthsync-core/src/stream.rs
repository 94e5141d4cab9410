//! Streaming primitives for article generation.
//!
//! Contract for one attempt:
//! - The callback receives 0..n `processing` events with a cumulative `text`
//!   accumulator and a non-decreasing `progress_percent`.
//! - The attempt **must** end with exactly one terminal event (`completed`
//!   or `error`) that agrees with the returned `AnalysisOutcome`, except on
//!   cancellation, where no further events are emitted at all. The error
//!   event keeps the accumulator and the last reported percent, so the
//!   monotonicity rules above hold for the whole sequence.
//! - Status only moves forward through `loading → processing → {completed | error}`.

use serde::{Deserialize, Serialize};

/// Phase of an analysis attempt, as surfaced to the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Loading,
    Processing,
    Completed,
    Error,
}

/// What the caller's progress callback receives. `text` is the full
/// accumulator so far, not a delta.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisProgress {
    pub text: String,
    pub progress_percent: u8,
    pub status: AnalysisStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AnalysisProgress {
    pub fn processing(text: impl Into<String>, progress_percent: u8) -> Self {
        Self {
            text: text.into(),
            progress_percent,
            status: AnalysisStatus::Processing,
            error_message: None,
        }
    }

    pub fn completed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            progress_percent: 100,
            status: AnalysisStatus::Completed,
            error_message: None,
        }
    }

    /// Terminal error event. Takes the accumulator so far and the last
    /// reported percent so `text` and `progress_percent` stay non-decreasing
    /// through failure.
    pub fn error(
        text: impl Into<String>,
        progress_percent: u8,
        message: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            progress_percent,
            status: AnalysisStatus::Error,
            error_message: Some(message.into()),
        }
    }

    /// Returns true if this event terminates the attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            AnalysisStatus::Completed | AnalysisStatus::Error
        )
    }
}

/// Progress estimate while deltas are still arriving: starts at the 50%
/// baseline set when the connection opens and asymptotically approaches 90,
/// reserving 100 exclusively for true completion.
pub(crate) fn estimate_progress(accumulated_len: usize) -> u8 {
    std::cmp::min(90, 50 + accumulated_len / 20) as u8
}

/// One decoded `data: <json>` payload from the stream. The backend sends
/// exactly one meaningful field per line in practice, but all are optional
/// so a combined payload still decodes.
#[derive(Debug, Deserialize)]
pub(crate) struct StreamPayload {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl StreamPayload {
    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some("completed")
    }
}
