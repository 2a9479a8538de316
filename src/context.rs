use axum::http::{HeaderMap, HeaderValue};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Identifiers correlating the request and response records of one call.
///
/// One context is created per intercepted call and owned by that call's
/// pipeline scope. The pipeline clones it into the request extensions so
/// handlers can read it with `Extension<CorrelationContext>`; nothing is
/// stored globally, so concurrent calls cannot observe each other's ids
/// and cleanup is simply scope exit.
#[derive(Clone, Debug)]
pub struct CorrelationContext {
    pub request_id: String,
    pub correlation_id: String,
    pub operation_name: Option<String>,
}

impl CorrelationContext {
    /// Reuse inbound identifiers when the caller already carries them,
    /// else mint fresh ones.
    pub fn init(headers: &HeaderMap) -> Self {
        Self {
            request_id: header_value(headers, REQUEST_ID_HEADER)
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            correlation_id: header_value(headers, CORRELATION_ID_HEADER)
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            operation_name: None,
        }
    }

    /// Best-effort enrichment; absence of a resolvable handler name is
    /// never an error.
    pub fn set_operation_name(&mut self, name: impl Into<String>) {
        self.operation_name = Some(name.into());
    }

    pub fn operation_name(&self) -> &str {
        self.operation_name.as_deref().unwrap_or("unknown")
    }

    /// Writes both correlation headers onto a response. Values that do not
    /// form a valid header are skipped silently rather than failing the
    /// request over a logging concern.
    pub fn apply_to(&self, headers: &mut HeaderMap) {
        write_header(headers, REQUEST_ID_HEADER, &self.request_id);
        write_header(headers, CORRELATION_ID_HEADER, &self.correlation_id);
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn write_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}
