use crate::wrapper::{RequestView, ResponseView};
use axum::http::{HeaderMap, StatusCode};
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::info;

/// One structured audit entry, emitted whole or not at all.
///
/// Every record carries `audit: true` so downstream pipelines can filter
/// audit-grade lines out of general application logs.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum AuditRecord {
    Request {
        method: String,
        uri: String,
        payload: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        headers: Option<IndexMap<String, String>>,
        audit: bool,
    },
    Response {
        duration_ms: u64,
        status: u16,
        payload: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        headers: Option<IndexMap<String, String>>,
        audit: bool,
    },
}

impl AuditRecord {
    pub fn is_audit(&self) -> bool {
        match self {
            AuditRecord::Request { audit, .. } | AuditRecord::Response { audit, .. } => *audit,
        }
    }
}

/// Destination for finished records. The transport representation (JSON,
/// plaintext, shipping) is the sink's concern, not the pipeline's.
pub trait AuditSink: Send + Sync {
    fn emit(&self, record: &AuditRecord);
}

/// Default sink: one `tracing` event per record with named fields.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn emit(&self, record: &AuditRecord) {
        match record {
            AuditRecord::Request {
                method,
                uri,
                payload,
                headers: Some(headers),
                ..
            } => info!(%method, %uri, %payload, headers = ?headers, audit = true, "Request"),
            AuditRecord::Request {
                method,
                uri,
                payload,
                headers: None,
                ..
            } => info!(%method, %uri, %payload, audit = true, "Request"),
            AuditRecord::Response {
                duration_ms,
                status,
                payload,
                headers: Some(headers),
                ..
            } => info!(duration_ms, status, %payload, headers = ?headers, audit = true, "Response"),
            AuditRecord::Response {
                duration_ms,
                status,
                payload,
                headers: None,
                ..
            } => info!(duration_ms, status, %payload, audit = true, "Response"),
        }
    }
}

/// In-memory sink for tests and local inspection.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl AuditSink for RecordingSink {
    fn emit(&self, record: &AuditRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

/// Assembles the request and response records, with or without header maps
/// depending on one flag that covers both directions.
pub struct AuditLogger {
    log_headers: bool,
    sink: Arc<dyn AuditSink>,
}

impl AuditLogger {
    pub fn new(log_headers: bool, sink: Arc<dyn AuditSink>) -> Self {
        Self { log_headers, sink }
    }

    pub fn log_request(&self, request: &RequestView) {
        let record = AuditRecord::Request {
            method: request.method().to_string(),
            uri: request.uri().to_string(),
            payload: request.body_text(),
            headers: self.log_headers.then(|| header_map(request.headers())),
            audit: true,
        };
        self.sink.emit(&record);
    }

    /// Emits the response record. The status is passed explicitly so the
    /// failure path can force 500 independently of the view.
    pub fn log_response(&self, start: Instant, response: &mut ResponseView, status: StatusCode) {
        let duration_ms = start.elapsed().as_millis() as u64;
        // Buffered bytes go out as-is; advertise and decode them as UTF-8.
        response.set_character_encoding("utf-8");
        let record = AuditRecord::Response {
            duration_ms,
            status: status.as_u16(),
            payload: response.body_text(),
            headers: self.log_headers.then(|| header_map(response.headers())),
            audit: true,
        };
        self.sink.emit(&record);
    }
}

/// Header map in arrival order; repeated names collapse to one
/// comma-separated entry.
fn header_map(headers: &HeaderMap) -> IndexMap<String, String> {
    let mut map = IndexMap::new();
    for name in headers.keys() {
        let values: Vec<&str> = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        map.insert(name.as_str().to_string(), values.join(", "));
    }
    map
}
