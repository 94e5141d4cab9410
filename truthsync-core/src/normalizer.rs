use crate::model::AnalysisRequest;
use unicode_normalization::UnicodeNormalization;

fn clean_text(s: &str) -> String {
    // Unicode NFC normalization + BOM strip + CRLF -> LF + trim
    let mut t = s.nfc().collect::<String>();
    if t.starts_with('\u{FEFF}') {
        t.remove(0);
    }
    if t.contains("\r\n") {
        t = t.replace("\r\n", "\n");
    }
    t.trim().to_string()
}

/// Compose the context text sent alongside the image from whatever the
/// collaborating components supplied. Empty parts are skipped; the label
/// survives round-trips through the backend, which extracts the location
/// and orientation sections back out of the submessage.
pub fn compose_context(
    note: Option<&str>,
    location: Option<&str>,
    orientation: Option<&str>,
) -> String {
    let mut parts = Vec::new();
    if let Some(n) = note {
        let n = clean_text(n);
        if !n.is_empty() {
            parts.push(n);
        }
    }
    if let Some(l) = location {
        let l = clean_text(l);
        if !l.is_empty() {
            parts.push(format!("Location: {l}"));
        }
    }
    if let Some(o) = orientation {
        let o = clean_text(o);
        if !o.is_empty() {
            parts.push(format!("Orientation: {o}"));
        }
    }
    parts.join("\n")
}

/// Normalize a request before it goes on the wire: clean the context text
/// and substitute `default_context` when the caller supplied nothing.
pub fn normalize_request(mut req: AnalysisRequest, default_context: &str) -> AnalysisRequest {
    req.context_text = clean_text(&req.context_text);
    if req.context_text.is_empty() {
        req.context_text = default_context.to_string();
    }
    req
}
