//! Request/response audit logging for axum services.
//!
//! One structured record per request and one per response, both tagged
//! `audit=true` and correlated through `X-Request-ID` / `X-Correlation-ID`.
//!
//! ```rust,no_run
//! use axum::{routing::get, Router};
//! use http_audit_log::{audit_middleware, AuditConfig, AuditFilter};
//!
//! let filter = AuditFilter::new(AuditConfig::new().with_log_headers(true));
//! let app: Router = Router::new()
//!     .route("/health", get(|| async { "OK" }))
//!     .route_layer(axum::middleware::from_fn_with_state(filter, audit_middleware));
//! ```

pub mod body;
pub mod config;
pub mod context;
pub mod logger;
pub mod middleware;
pub mod wrapper;

pub use body::{CaptureBody, CaptureBuffer};
pub use config::AuditConfig;
pub use context::{CORRELATION_ID_HEADER, CorrelationContext, REQUEST_ID_HEADER};
pub use logger::{AuditLogger, AuditRecord, AuditSink, RecordingSink, TracingSink};
pub use middleware::{AuditFilter, PipelineError, audit_middleware};
pub use wrapper::{RequestView, ResponseView};
