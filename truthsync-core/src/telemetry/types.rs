use serde::Serialize;

/// Structured record of one analysis attempt, streaming or one-shot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AttemptLog {
    /// Endpoint path the attempt used, e.g. "/generate-article-stream".
    pub endpoint: Option<String>,
    /// Correlation id returned by the backend inside stream payloads.
    pub backend_request_id: Option<String>,
    pub created_at_ms: Option<u64>,
    pub latency_ms: Option<u64>,

    /// Terminal outcome: "completed" or a failure reason code.
    pub outcome: Option<String>,
    pub error_message: Option<String>,

    /// Accumulated article length in characters.
    pub chars: Option<usize>,
    /// Number of text deltas received.
    pub deltas: Option<u32>,
}

impl AttemptLog {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn endpoint(mut self, v: &str) -> Self {
        self.endpoint = Some(v.to_string());
        self
    }
    pub fn backend_request_id_opt(mut self, v: Option<&str>) -> Self {
        self.backend_request_id = v.map(|s| s.to_string());
        self
    }
    pub fn created_at_ms(mut self, v: u64) -> Self {
        self.created_at_ms = Some(v);
        self
    }
    pub fn latency_ms(mut self, v: u64) -> Self {
        self.latency_ms = Some(v);
        self
    }
    pub fn outcome(mut self, v: &str) -> Self {
        self.outcome = Some(v.to_string());
        self
    }
    pub fn error_message_opt(mut self, v: Option<&str>) -> Self {
        self.error_message = v.map(|s| s.to_string());
        self
    }
    pub fn chars(mut self, v: usize) -> Self {
        self.chars = Some(v);
        self
    }
    pub fn deltas(mut self, v: u32) -> Self {
        self.deltas = Some(v);
        self
    }
}
