use crate::body::CaptureBody;
use crate::config::AuditConfig;
use crate::context::CorrelationContext;
use crate::logger::{AuditLogger, AuditSink, TracingSink};
use crate::wrapper::{RequestView, ResponseView};
use axum::body::Body;
use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http_body_util::BodyExt;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, error, info_span, trace};

/// Failure surfaced by [`AuditFilter::intercept`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError<E> {
    /// The downstream handler failed; the original error is carried
    /// unchanged, never converted or suppressed.
    #[error(transparent)]
    Handler(E),
    /// Reading the request body from the transport failed while buffering.
    #[error("failed to buffer the request body: {0}")]
    RequestBody(#[source] axum::Error),
    /// The response body stream failed mid-read. A forced-500 response
    /// record has already been emitted by the time this surfaces.
    #[error("failed to buffer the response body: {0}")]
    ResponseBody(#[source] axum::Error),
}

/// The audit interceptor: skip check, correlation context, body capture,
/// one request record, one response record, correlation headers, cleanup.
///
/// Cheap to clone; clones share the config and sink.
#[derive(Clone)]
pub struct AuditFilter {
    config: Arc<AuditConfig>,
    logger: Arc<AuditLogger>,
}

impl AuditFilter {
    /// Filter emitting records through `tracing`.
    pub fn new(config: AuditConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    pub fn with_sink(config: AuditConfig, sink: Arc<dyn AuditSink>) -> Self {
        let logger = Arc::new(AuditLogger::new(config.log_headers, sink));
        Self {
            config: Arc::new(config),
            logger,
        }
    }

    /// Runs one call through the pipeline. The handler is invoked exactly
    /// once; on handler failure a response record with status 500 is still
    /// emitted before the error is returned unchanged.
    pub async fn intercept<F, Fut, E>(
        &self,
        req: Request,
        handler: F,
    ) -> Result<Response, PipelineError<E>>
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Result<Response, E>>,
    {
        if self.config.ignores(req.uri().path()) {
            // Exempt call: no context, no capture, no records.
            return handler(req).await.map_err(PipelineError::Handler);
        }

        let mut context = CorrelationContext::init(req.headers());
        match req.extensions().get::<MatchedPath>() {
            Some(path) => context.set_operation_name(path.as_str()),
            None => trace!("no matched route to resolve an operation name"),
        }

        let span = info_span!(
            "http_audit",
            request_id = %context.request_id,
            correlation_id = %context.correlation_id,
            operation = context.operation_name(),
        );

        // Context and span live exactly as long as this call; dropping them
        // on any exit path below is the cleanup.
        self.process(req, handler, context).instrument(span).await
    }

    async fn process<F, Fut, E>(
        &self,
        req: Request,
        handler: F,
        context: CorrelationContext,
    ) -> Result<Response, PipelineError<E>>
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Result<Response, E>>,
    {
        let (parts, body) = req.into_parts();
        let wrapped = CaptureBody::new(body);
        let buffer = wrapped.buffer();
        // The one real read of the request body; the logger reads the buffer.
        let delivered = wrapped
            .collect()
            .await
            .map_err(PipelineError::RequestBody)?
            .to_bytes();

        let request_view = RequestView::new(&parts, buffer);
        self.logger.log_request(&request_view);

        let start = Instant::now();
        let mut req = Request::from_parts(parts, Body::from(delivered));
        req.extensions_mut().insert(context.clone());

        match handler(req).await {
            Ok(response) => {
                let (parts, body) = response.into_parts();
                let wrapped = CaptureBody::new(body);
                let buffer = wrapped.buffer();
                let delivered = match wrapped.collect().await {
                    Ok(collected) => collected.to_bytes(),
                    Err(err) => {
                        // The response died mid-read; its record is still
                        // owed, with whatever the wrapper saw as payload.
                        let mut view = ResponseView::new(parts, buffer);
                        self.logger.log_response(
                            start,
                            &mut view,
                            StatusCode::INTERNAL_SERVER_ERROR,
                        );
                        return Err(PipelineError::ResponseBody(err));
                    }
                };

                let mut view = ResponseView::new(parts, buffer);
                let status = view.status();
                self.logger.log_response(start, &mut view, status);
                // Correlation headers go on after logging, before any byte
                // reaches the transport.
                context.apply_to(view.headers_mut());
                Ok(view.into_response(delivered))
            }
            Err(err) => {
                // The response record is still owed; there is no response,
                // so the status is forced to 500.
                let mut view = ResponseView::detached(StatusCode::INTERNAL_SERVER_ERROR);
                self.logger
                    .log_response(start, &mut view, StatusCode::INTERNAL_SERVER_ERROR);
                Err(PipelineError::Handler(err))
            }
        }
    }
}

/// Axum adapter for [`AuditFilter::intercept`], in the
/// `middleware::from_fn_with_state` style.
///
/// Add it with `Router::route_layer` when operation names should be
/// resolved from the matched route; with `Router::layer` the lookup finds
/// nothing and the field is simply absent.
pub async fn audit_middleware(
    State(filter): State<AuditFilter>,
    req: Request,
    next: Next,
) -> Response {
    let outcome = filter
        .intercept(req, |req| async move {
            Ok::<_, Infallible>(next.run(req).await)
        })
        .await;
    match outcome {
        Ok(response) => response,
        Err(PipelineError::RequestBody(err)) => {
            error!(error = %err, "failed to buffer the request body for audit logging");
            StatusCode::BAD_REQUEST.into_response()
        }
        Err(PipelineError::ResponseBody(err)) => {
            error!(error = %err, "failed to buffer the response body for audit logging");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(PipelineError::Handler(err)) => match err {},
    }
}
