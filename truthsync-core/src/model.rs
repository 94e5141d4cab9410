use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::TruthSyncError;

/// One attempt's input: a captured JPEG plus the free-text context the
/// caller composed from the user note, location, and device orientation.
/// Constructed once per attempt and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub image_bytes: Bytes,
    pub context_text: String,
}

impl AnalysisRequest {
    pub fn new(image_bytes: impl Into<Bytes>, context_text: impl Into<String>) -> Self {
        Self {
            image_bytes: image_bytes.into(),
            context_text: context_text.into(),
        }
    }
}

/// Terminal value of one attempt. Exactly one is produced per call, and it
/// agrees with the last progress event delivered to the callback.
#[derive(Debug)]
pub enum AnalysisOutcome {
    Completed { final_text: String },
    Failed { reason: TruthSyncError },
}

impl AnalysisOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Final article text, if the attempt completed.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Completed { final_text } => Some(final_text.as_str()),
            Self::Failed { .. } => None,
        }
    }

    /// Stable failure code, if the attempt failed (see `TruthSyncError::code`).
    pub fn failure_code(&self) -> Option<&'static str> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { reason } => Some(reason.code()),
        }
    }
}

/// Backend health probe response. Replaces the original module-level
/// "model loaded" flag: callers cache this value and refresh explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: Option<String>,
    pub model_loaded: bool,
}

impl HealthStatus {
    /// Whether the backend can serve generation requests right now.
    pub fn ready(&self) -> bool {
        self.model_loaded
    }
}

/// Server-side record for a previously fired request, polled by callers
/// that used the non-streaming path. `status: "not_found"` when the backend
/// no longer (or never) tracked the id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisStatusInfo {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub article: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_helpers() {
        let done = AnalysisOutcome::Completed {
            final_text: "article".into(),
        };
        assert!(done.is_completed());
        assert_eq!(done.text(), Some("article"));
        assert_eq!(done.failure_code(), None);

        let failed = AnalysisOutcome::Failed {
            reason: TruthSyncError::EmptyStream,
        };
        assert!(!failed.is_completed());
        assert_eq!(failed.text(), None);
        assert_eq!(failed.failure_code(), Some("empty-stream"));
    }

    #[test]
    fn health_status_deserializes_backend_shape() {
        let h: HealthStatus =
            serde_json::from_str(r#"{"status":"healthy","model_loaded":true}"#).unwrap();
        assert!(h.ready());
        assert_eq!(h.status.as_deref(), Some("healthy"));

        // status field is optional
        let h2: HealthStatus = serde_json::from_str(r#"{"model_loaded":false}"#).unwrap();
        assert!(!h2.ready());
    }

    #[test]
    fn analysis_status_tolerates_sparse_fields() {
        let s: AnalysisStatusInfo = serde_json::from_str(r#"{"status":"not_found"}"#).unwrap();
        assert_eq!(s.status, "not_found");
        assert_eq!(s.progress, None);
        assert_eq!(s.article, None);

        let s2: AnalysisStatusInfo = serde_json::from_str(
            r#"{"status":"completed","message":"done","progress":100,"article":"text"}"#,
        )
        .unwrap();
        assert_eq!(s2.progress, Some(100));
        assert_eq!(s2.article.as_deref(), Some("text"));
    }
}
