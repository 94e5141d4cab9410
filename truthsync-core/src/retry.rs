//! Caller-level retry policy. The client itself never retries; this
//! decorator wraps any `ArticleBackend` with bounded attempts and a
//! progressive delay, retrying only failures worth retrying
//! (`transport-error`, `timeout`). Cancellations and backend errors pass
//! through untouched.

use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{ArticleBackend, ProgressFn};
use crate::config::RetryCfg;
use crate::model::{AnalysisOutcome, AnalysisRequest};

pub struct Retrying<B> {
    inner: B,
    cfg: RetryCfg,
}

impl<B: ArticleBackend> Retrying<B> {
    pub fn new(inner: B, cfg: RetryCfg) -> Self {
        Self { inner, cfg }
    }

    pub fn into_inner(self) -> B {
        self.inner
    }

    fn delay_before(&self, attempt: u32) -> Duration {
        // Progressive ladder: 1x, 2x, 3x the base delay.
        Duration::from_millis(self.cfg.base_delay_ms.saturating_mul(attempt as u64))
    }

    fn wants_retry(&self, outcome: &AnalysisOutcome, attempt: u32) -> bool {
        match outcome {
            AnalysisOutcome::Failed { reason } => {
                reason.is_retryable() && attempt < self.cfg.max_attempts.max(1)
            }
            AnalysisOutcome::Completed { .. } => false,
        }
    }

    async fn pause(&self, attempt: u32, outcome: &AnalysisOutcome) {
        let delay = self.delay_before(attempt);
        if let AnalysisOutcome::Failed { reason } = outcome {
            tracing::debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                code = reason.code(),
                "retrying analysis after failure"
            );
        }
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl<B: ArticleBackend> ArticleBackend for Retrying<B> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn analyze(
        &self,
        req: &AnalysisRequest,
        on_progress: ProgressFn<'_>,
    ) -> AnalysisOutcome {
        // Each retried attempt restarts its own event sequence; the
        // monotonicity invariants hold per attempt.
        let mut attempt = 1;
        loop {
            let outcome = self.inner.analyze(req, &mut *on_progress).await;
            if !self.wants_retry(&outcome, attempt) {
                return outcome;
            }
            self.pause(attempt, &outcome).await;
            attempt += 1;
        }
    }

    async fn analyze_once(&self, req: &AnalysisRequest) -> AnalysisOutcome {
        let mut attempt = 1;
        loop {
            let outcome = self.inner.analyze_once(req).await;
            if !self.wants_retry(&outcome, attempt) {
                return outcome;
            }
            self.pause(attempt, &outcome).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TruthSyncError;
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        outcomes: Mutex<VecDeque<AnalysisOutcome>>,
    }

    impl Scripted {
        fn new(outcomes: Vec<AnalysisOutcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
            }
        }

        fn remaining(&self) -> usize {
            self.outcomes.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ArticleBackend for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn analyze(
            &self,
            _req: &AnalysisRequest,
            _on_progress: ProgressFn<'_>,
        ) -> AnalysisOutcome {
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .expect("script exhausted")
        }
    }

    fn mk_req() -> AnalysisRequest {
        AnalysisRequest::new(Bytes::from_static(&[0xFF, 0xD8]), "ctx")
    }

    fn transport() -> AnalysisOutcome {
        AnalysisOutcome::Failed {
            reason: TruthSyncError::Transport {
                message: "connection refused".into(),
            },
        }
    }

    fn completed(text: &str) -> AnalysisOutcome {
        AnalysisOutcome::Completed {
            final_text: text.into(),
        }
    }

    fn cfg(max_attempts: u32) -> RetryCfg {
        RetryCfg {
            max_attempts,
            base_delay_ms: 1_000,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transport_failures_until_success() {
        let backend = Retrying::new(
            Scripted::new(vec![transport(), transport(), completed("third time")]),
            cfg(3),
        );
        let outcome = backend.analyze(&mk_req(), &mut |_| {}).await;
        assert_eq!(outcome.text(), Some("third time"));
        assert_eq!(backend.into_inner().remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let backend = Retrying::new(
            Scripted::new(vec![transport(), transport(), transport()]),
            cfg(3),
        );
        let outcome = backend.analyze(&mk_req(), &mut |_| {}).await;
        assert_eq!(outcome.failure_code(), Some("transport-error"));
        assert_eq!(backend.into_inner().remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn backend_errors_are_not_retried() {
        let backend = Retrying::new(
            Scripted::new(vec![
                AnalysisOutcome::Failed {
                    reason: TruthSyncError::Backend {
                        message: "model overloaded".into(),
                    },
                },
                completed("unreached"),
            ]),
            cfg(3),
        );
        let outcome = backend.analyze(&mk_req(), &mut |_| {}).await;
        assert_eq!(outcome.failure_code(), Some("backend-error"));
        assert_eq!(backend.into_inner().remaining(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_is_never_retried() {
        let backend = Retrying::new(
            Scripted::new(vec![
                AnalysisOutcome::Failed {
                    reason: TruthSyncError::Cancelled,
                },
                completed("unreached"),
            ]),
            cfg(3),
        );
        let outcome = backend.analyze(&mk_req(), &mut |_| {}).await;
        assert_eq!(outcome.failure_code(), Some("cancelled"));
        assert_eq!(backend.into_inner().remaining(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_config_never_retries() {
        let backend = Retrying::new(
            Scripted::new(vec![transport(), completed("unreached")]),
            cfg(1),
        );
        let outcome = backend.analyze(&mk_req(), &mut |_| {}).await;
        assert_eq!(outcome.failure_code(), Some("transport-error"));
        assert_eq!(backend.into_inner().remaining(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_grows_with_attempt_number() {
        let start = tokio::time::Instant::now();
        let backend = Retrying::new(
            Scripted::new(vec![transport(), transport(), completed("ok")]),
            cfg(3),
        );
        let _ = backend.analyze(&mk_req(), &mut |_| {}).await;
        // 1000ms after attempt 1 + 2000ms after attempt 2
        assert_eq!(start.elapsed(), Duration::from_millis(3_000));
    }

    #[tokio::test(start_paused = true)]
    async fn analyze_once_uses_same_policy() {
        let backend = Retrying::new(
            Scripted::new(vec![transport(), completed("recovered")]),
            cfg(2),
        );
        let outcome = backend.analyze_once(&mk_req()).await;
        assert_eq!(outcome.text(), Some("recovered"));
    }
}
