use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::backend::{ArticleBackend, ProgressFn};
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{CoreResult, TruthSyncError};
use crate::http_client::{HttpClient, RequestCtx};
use crate::model::{AnalysisOutcome, AnalysisRequest, AnalysisStatusInfo, HealthStatus};
use crate::normalizer::normalize_request;
use crate::stream::{AnalysisProgress, StreamPayload, estimate_progress};

/// Sole line filter for the event stream; anything else is ignored.
const EVENT_PREFIX: &str = "data: ";

/// Percent reported by the first event of an attempt. A UX convenience,
/// not a contract; only `0 < initial < stream-open` is relied upon.
const INITIAL_PROGRESS: u8 = 10;
/// Percent reported once the response stream is established; also the
/// baseline of the delta-driven estimate.
const STREAM_OPEN_PROGRESS: u8 = 50;

/// Client for one-attempt article generation against the inference backend.
/// Stateless across attempts: every call owns its own accumulator and body
/// stream, and nothing is cached or persisted.
#[derive(Debug, Clone)]
pub struct ArticleClient {
    http: HttpClient,
    base: String,
    api_key: Option<SecretString>,
    default_context: String,
    health_timeout: Duration,
    name: String,
}

impl ArticleClient {
    pub fn new(http: HttpClient, base: String, api_key: Option<SecretString>) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            api_key,
            default_context: crate::config::BackendCfg::default().default_context,
            health_timeout: Duration::from_millis(5_000),
            name: "truthsync".into(),
        }
    }

    /// Build a client from configuration, resolving the optional API key
    /// from the environment variable the config names.
    pub fn from_config(cfg: &Config) -> CoreResult<Self> {
        let http = HttpClient::new(&cfg.http)?;
        let api_key = cfg
            .backend
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .map(SecretString::from);
        Ok(Self {
            http,
            base: cfg.backend.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_context: cfg.backend.default_context.clone(),
            health_timeout: Duration::from_millis(cfg.http.health_timeout_ms),
            name: "truthsync".into(),
        })
    }

    #[cfg(test)]
    pub fn new_for_tests(server_base: &str) -> Self {
        ArticleClient::new(
            HttpClient::new_default().unwrap(),
            server_base.to_string(),
            None,
        )
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut h = Vec::new();
        if let Some(key) = &self.api_key {
            h.push((
                "Authorization".to_string(),
                format!("Bearer {}", key.expose_secret()),
            ));
        }
        h
    }

    fn form(&self, req: &AnalysisRequest) -> CoreResult<reqwest::multipart::Form> {
        let image = reqwest::multipart::Part::bytes(req.image_bytes.to_vec())
            .file_name("captured_image.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| TruthSyncError::Other(anyhow::anyhow!("multipart build failed: {e}")))?;
        Ok(reqwest::multipart::Form::new()
            .part("image", image)
            .text("submessage", req.context_text.clone()))
    }

    fn prepare(&self, req: &AnalysisRequest) -> CoreResult<AnalysisRequest> {
        if req.image_bytes.is_empty() {
            return Err(TruthSyncError::Validation(
                "image payload is empty".to_string(),
            ));
        }
        Ok(normalize_request(req.clone(), &self.default_context))
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// Probe the backend's availability with a short bounded wait.
    /// Callers cache the result and refresh explicitly; the client never
    /// polls on its own.
    pub async fn health(&self) -> CoreResult<HealthStatus> {
        let url = format!("{}/health", self.base);
        let owned = self.headers();
        let hdrs: Vec<(&str, &str)> = owned.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        self.http
            .get_json(&url, &hdrs, &RequestCtx::default(), Some(self.health_timeout))
            .await
    }

    /// Fetch the server-side record of a previously fired request.
    pub async fn analysis_status(&self, request_id: &str) -> CoreResult<AnalysisStatusInfo> {
        let url = format!("{}/analysis-status/{}", self.base, request_id);
        let owned = self.headers();
        let hdrs: Vec<(&str, &str)> = owned.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        self.http
            .get_json(&url, &hdrs, &RequestCtx::default(), Some(self.health_timeout))
            .await
    }

    /// Streaming attempt with cancellation. On cancel the body stream is
    /// dropped (releasing the connection), no further progress events are
    /// emitted, and the outcome is `Failed` with code `cancelled`.
    pub async fn analyze_with_cancel(
        &self,
        req: &AnalysisRequest,
        on_progress: ProgressFn<'_>,
        mut cancel: CancelToken,
    ) -> AnalysisOutcome {
        let started = Instant::now();
        let mut stats = AttemptStats::default();
        let outcome = match self
            .run_stream(req, &mut *on_progress, &mut cancel, &mut stats)
            .await
        {
            Ok(text) => {
                on_progress(&AnalysisProgress::completed(text.clone()));
                AnalysisOutcome::Completed { final_text: text }
            }
            Err(TruthSyncError::Cancelled) => AnalysisOutcome::Failed {
                reason: TruthSyncError::Cancelled,
            },
            Err(reason) => {
                // The terminal error event carries the accumulator and the
                // last reported percent so neither regresses at failure.
                on_progress(&AnalysisProgress::error(
                    std::mem::take(&mut stats.text),
                    stats.percent,
                    reason.to_string(),
                ));
                AnalysisOutcome::Failed { reason }
            }
        };
        self.log_attempt("/generate-article-stream", started, &stats, &outcome);
        outcome
    }

    async fn run_stream(
        &self,
        req: &AnalysisRequest,
        on_progress: ProgressFn<'_>,
        cancel: &mut CancelToken,
        stats: &mut AttemptStats,
    ) -> CoreResult<String> {
        let req = self.prepare(req)?;
        if cancel.is_cancelled() {
            return Err(TruthSyncError::Cancelled);
        }
        on_progress(&AnalysisProgress::processing("", INITIAL_PROGRESS));
        stats.percent = INITIAL_PROGRESS;

        let url = format!("{}/generate-article-stream", self.base);
        let owned = self.headers();
        let hdrs: Vec<(&str, &str)> = owned.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let form = self.form(&req)?;
        let ctx = RequestCtx::default();
        // Cancellation must also interrupt connection establishment, not
        // just the reads that follow.
        let send = self.http.post_multipart_sse(&url, form, &hdrs, &ctx);
        let mut lines = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TruthSyncError::Cancelled),
            resp = send => resp?,
        };
        on_progress(&AnalysisProgress::processing("", STREAM_OPEN_PROGRESS));
        stats.percent = STREAM_OPEN_PROGRESS;

        let mut accumulator = String::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    drop(lines);
                    return Err(TruthSyncError::Cancelled);
                }
                next = lines.next() => match next {
                    Some(Ok(sse)) => {
                        let Some(raw) = sse.line.strip_prefix(EVENT_PREFIX) else {
                            continue;
                        };
                        let payload: StreamPayload = match serde_json::from_str(raw) {
                            Ok(p) => p,
                            Err(e) => {
                                // A single corrupt line must not abort the attempt.
                                tracing::warn!(error = %e, line = %sse.line, "skipping malformed stream line");
                                continue;
                            }
                        };
                        if let Some(rid) = payload.request_id.as_deref() {
                            stats.request_id.get_or_insert_with(|| rid.to_string());
                        }
                        if let Some(delta) = payload.text.as_deref() {
                            accumulator.push_str(delta);
                            stats.deltas += 1;
                            stats.chars = accumulator.len();
                            let event = AnalysisProgress::processing(
                                accumulator.clone(),
                                estimate_progress(accumulator.len()),
                            );
                            on_progress(&event);
                            stats.percent = event.progress_percent;
                            stats.text = event.text;
                        }
                        if payload.is_completed() {
                            return Ok(accumulator);
                        }
                        if let Some(message) = payload.error {
                            return Err(TruthSyncError::Backend { message });
                        }
                    }
                    Some(Err(e)) => return Err(e),
                    None => {
                        // Stream closed without an explicit marker. A non-empty
                        // accumulator is treated as implicit success; whether the
                        // backend guarantees this framing is an inherited
                        // assumption, not a verified contract.
                        return if accumulator.is_empty() {
                            Err(TruthSyncError::EmptyStream)
                        } else {
                            Ok(accumulator)
                        };
                    }
                }
            }
        }
    }

    async fn run_once(&self, req: &AnalysisRequest) -> CoreResult<GenerateArticleResp> {
        let req = self.prepare(req)?;
        let url = format!("{}/generate-article", self.base);
        let owned = self.headers();
        let hdrs: Vec<(&str, &str)> = owned.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        self.http
            .post_multipart_json(&url, self.form(&req)?, &hdrs, &RequestCtx::default())
            .await
    }

    fn log_attempt(
        &self,
        endpoint: &str,
        started: Instant,
        stats: &AttemptStats,
        outcome: &AnalysisOutcome,
    ) {
        let (code, error_message) = match outcome {
            AnalysisOutcome::Completed { .. } => ("completed", None),
            AnalysisOutcome::Failed { reason } => (reason.code(), Some(reason.to_string())),
        };
        let log = crate::telemetry::AttemptLog::new()
            .endpoint(endpoint)
            .backend_request_id_opt(stats.request_id.as_deref())
            .created_at_ms(Self::now_ms())
            .latency_ms(started.elapsed().as_millis() as u64)
            .outcome(code)
            .error_message_opt(error_message.as_deref())
            .chars(match outcome {
                AnalysisOutcome::Completed { final_text } => final_text.len(),
                AnalysisOutcome::Failed { .. } => stats.chars,
            })
            .deltas(stats.deltas);
        crate::telemetry::emit_attempt(log);
    }
}

#[derive(Default)]
struct AttemptStats {
    deltas: u32,
    chars: usize,
    request_id: Option<String>,
    // Last event delivered to the callback; the terminal error event must
    // not fall behind it.
    text: String,
    percent: u8,
}

// ---- Wire structs (minimal) ----
#[derive(Deserialize)]
struct GenerateArticleResp {
    article: String,
    #[serde(default)]
    request_id: Option<String>,
    #[allow(dead_code)]
    #[serde(default)]
    saved_to_db: Option<bool>,
}

#[async_trait]
impl ArticleBackend for ArticleClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(
        &self,
        req: &AnalysisRequest,
        on_progress: ProgressFn<'_>,
    ) -> AnalysisOutcome {
        self.analyze_with_cancel(req, on_progress, CancelToken::never())
            .await
    }

    async fn analyze_once(&self, req: &AnalysisRequest) -> AnalysisOutcome {
        let started = Instant::now();
        let mut stats = AttemptStats::default();
        let outcome = match self.run_once(req).await {
            Ok(resp) => {
                stats.request_id = resp.request_id;
                stats.chars = resp.article.len();
                AnalysisOutcome::Completed {
                    final_text: resp.article,
                }
            }
            Err(reason) => AnalysisOutcome::Failed { reason },
        };
        self.log_attempt("/generate-article", started, &stats, &outcome);
        outcome
    }
}
