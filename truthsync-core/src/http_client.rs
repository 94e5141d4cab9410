use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::HttpCfg;
use crate::error::{CoreResult, TruthSyncError};

/// Request context carries the caller's correlation id.
#[derive(Clone, Copy, Default)]
pub struct RequestCtx<'a> {
    pub request_id: Option<&'a str>,
}

/// Represents a single line of the event stream (already split on `\n`).
#[derive(Debug, Clone)]
pub struct SseLine {
    pub line: String,
}

/// A boxed stream of `SseLine` results.
pub type SseStream = std::pin::Pin<
    Box<dyn futures_util::stream::Stream<Item = crate::error::CoreResult<SseLine>> + Send>,
>;

/// Thin wrapper around reqwest::Client with defaults and helpers.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    user_agent: String,
}

impl HttpClient {
    pub fn new(cfg: &HttpCfg) -> CoreResult<Self> {
        let inner = Client::builder()
            .connect_timeout(Duration::from_millis(cfg.connect_timeout_ms))
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| TruthSyncError::Other(anyhow::anyhow!("http client build failed: {e}")))?;
        Ok(Self {
            inner,
            user_agent: "truthsync/0.1".to_string(),
        })
    }

    pub fn new_default() -> CoreResult<Self> {
        Self::new(&HttpCfg::default())
    }

    /// GET a JSON document. `timeout` overrides the client-wide bound for
    /// short probes like the health check.
    pub async fn get_json<R: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        ctx: &RequestCtx<'_>,
        timeout: Option<Duration>,
    ) -> CoreResult<R> {
        let mut req = self.inner.get(url).header("User-Agent", &self.user_agent);
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        if let Some(rid) = ctx.request_id {
            req = req.header("X-Request-Id", rid);
        }
        if let Some(t) = timeout {
            req = req.timeout(t);
        }

        let resp = req.send().await.map_err(map_send_error)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(map_http_error(status, &text));
        }
        resp.json::<R>().await.map_err(|e| TruthSyncError::Transport {
            message: format!("json decode error: {e}"),
        })
    }

    /// POST a multipart form and parse a single JSON response body.
    pub async fn post_multipart_json<R: DeserializeOwned>(
        &self,
        url: &str,
        form: reqwest::multipart::Form,
        headers: &[(&str, &str)],
        ctx: &RequestCtx<'_>,
    ) -> CoreResult<R> {
        let resp = self.post_multipart(url, form, headers, ctx, None).await?;
        let status = resp.status();
        resp.json::<R>().await.map_err(|e| TruthSyncError::Transport {
            message: format!("json decode error ({status}): {e}"),
        })
    }

    /// POST a multipart form and return the response body as a line stream.
    /// Each yielded item is one raw line (trim not applied) from the channel.
    pub async fn post_multipart_sse(
        &self,
        url: &str,
        form: reqwest::multipart::Form,
        headers: &[(&str, &str)],
        ctx: &RequestCtx<'_>,
    ) -> CoreResult<SseStream> {
        let resp = self
            .post_multipart(url, form, headers, ctx, Some("text/event-stream"))
            .await?;
        let byte_stream = resp.bytes_stream();
        let line_stream = LineStream::new(Box::pin(byte_stream));
        Ok(Box::pin(line_stream))
    }

    async fn post_multipart(
        &self,
        url: &str,
        form: reqwest::multipart::Form,
        headers: &[(&str, &str)],
        ctx: &RequestCtx<'_>,
        accept: Option<&str>,
    ) -> CoreResult<reqwest::Response> {
        let mut req = self
            .inner
            .post(url)
            .multipart(form)
            .header("User-Agent", &self.user_agent);
        if let Some(a) = accept {
            req = req.header("Accept", a);
        }
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        if let Some(rid) = ctx.request_id {
            req = req.header("X-Request-Id", rid);
        }

        let resp = req.send().await.map_err(map_send_error)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body));
        }
        Ok(resp)
    }
}

fn map_send_error(e: reqwest::Error) -> TruthSyncError {
    if e.is_timeout() {
        TruthSyncError::Timeout
    } else {
        TruthSyncError::Transport {
            message: e.to_string(),
        }
    }
}

fn map_http_error(status: StatusCode, body: &str) -> TruthSyncError {
    TruthSyncError::Transport {
        message: format!("HTTP {}: {}", status.as_u16(), truncate(body, 300)),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    // Back off to a char boundary; byte-slicing inside a multibyte
    // character would panic.
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut t = s[..end].to_string();
    t.push_str("...");
    t
}

/// Internal line splitter over a bytes stream; yields `SseLine`s separated
/// by '\n'. Chunk boundaries may fall mid-line, so partial lines are
/// buffered until their newline arrives; a non-empty tail at end-of-stream
/// is flushed as a final line.
struct LineStream {
    inner: std::pin::Pin<
        Box<dyn futures_util::stream::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>,
    >,
    buf: String,
    flushed_tail: bool,
}

impl LineStream {
    fn new(
        inner: std::pin::Pin<
            Box<dyn futures_util::stream::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>,
        >,
    ) -> Self {
        Self {
            inner,
            buf: String::new(),
            flushed_tail: false,
        }
    }
}

impl futures_util::stream::Stream for LineStream {
    type Item = CoreResult<SseLine>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;
        loop {
            // If we already have a newline in the buffer, split and yield immediately.
            if let Some(idx) = self.buf.find('\n') {
                let mut line = self.buf.drain(..=idx).collect::<String>();
                if line.ends_with('\n') {
                    if line.ends_with("\r\n") {
                        line.truncate(line.len() - 2);
                    } else {
                        line.truncate(line.len() - 1);
                    }
                }
                return Poll::Ready(Some(Ok(SseLine { line })));
            }

            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    let s = String::from_utf8_lossy(&chunk);
                    self.buf.push_str(&s);
                    continue;
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(map_send_error(e))));
                }
                Poll::Ready(None) => {
                    if !self.flushed_tail && !self.buf.is_empty() {
                        self.flushed_tail = true;
                        let line = std::mem::take(&mut self.buf);
                        return Poll::Ready(Some(Ok(SseLine { line })));
                    } else {
                        return Poll::Ready(None);
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
