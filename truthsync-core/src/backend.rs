use async_trait::async_trait;

use crate::model::{AnalysisOutcome, AnalysisRequest};
use crate::stream::AnalysisProgress;

/// Progress callback handed to a backend for one attempt. Receives events
/// in byte-arrival order; the terminal event agrees with the returned
/// outcome.
pub type ProgressFn<'a> = &'a mut (dyn FnMut(&AnalysisProgress) + Send);

/// Seam between the analysis flow and whatever produces articles. The HTTP
/// client implements this; the retry decorator wraps any implementation;
/// tests substitute scripted doubles.
#[async_trait]
pub trait ArticleBackend: Send + Sync {
    fn name(&self) -> &str;

    /// One streaming attempt. Exactly one terminal `AnalysisOutcome` per call.
    async fn analyze(
        &self,
        req: &AnalysisRequest,
        on_progress: ProgressFn<'_>,
    ) -> AnalysisOutcome;

    /// Non-streaming attempt: no incremental events, same outcome contract.
    async fn analyze_once(&self, req: &AnalysisRequest) -> AnalysisOutcome {
        // default: run the streaming path and discard progress
        self.analyze(req, &mut |_| {}).await
    }
}

/// A dummy backend that always returns a canned article.
/// Useful for tests or as a placeholder when no backend is reachable.
pub struct NullBackend;

#[async_trait]
impl ArticleBackend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    async fn analyze(
        &self,
        _req: &AnalysisRequest,
        on_progress: ProgressFn<'_>,
    ) -> AnalysisOutcome {
        let text = "[null backend article]";
        on_progress(&AnalysisProgress::processing("", 10));
        on_progress(&AnalysisProgress::completed(text));
        AnalysisOutcome::Completed {
            final_text: text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn mk_req() -> AnalysisRequest {
        AnalysisRequest::new(Bytes::from_static(&[0xFF, 0xD8]), "ctx")
    }

    #[tokio::test]
    async fn null_backend_completes() {
        let backend = NullBackend;
        let mut events = Vec::new();
        let outcome = backend.analyze(&mk_req(), &mut |p| events.push(p.clone())).await;
        assert_eq!(outcome.text(), Some("[null backend article]"));
        assert!(events.last().unwrap().is_terminal());
        assert_eq!(events.last().unwrap().progress_percent, 100);
    }

    #[tokio::test]
    async fn analyze_once_default_delegates() {
        let backend = NullBackend;
        let outcome = backend.analyze_once(&mk_req()).await;
        assert!(outcome.is_completed());
    }
}
