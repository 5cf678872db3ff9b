//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the Axum router: one fallback route feeding the dispatcher
//! - Wire up tower-http layers (tracing, request ID, timeout, body limit,
//!   security response headers)
//! - Buffer the body and resolve the client IP into a `RequestContext`
//! - Run housekeeping for rate windows and stale uploads
//! - Serve until the shutdown coordinator fires

use axum::{
    body::to_bytes,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{AppConfig, ServerConfig};
use crate::dispatch::{DispatchError, Dispatcher};
use crate::http::request::{client_ip, RequestContext};
use crate::http::response::ResponseEntity;
use crate::lifecycle::Shutdown;

const UPLOAD_SWEEP: Duration = Duration::from_secs(60 * 60);

fn upload_max_age() -> chrono::Duration {
    chrono::Duration::hours(24)
}

/// State injected into the fallback handler.
#[derive(Clone)]
struct ServerState {
    dispatcher: Arc<Dispatcher>,
    max_body_bytes: usize,
    trust_forwarded_headers: bool,
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn router(config: &ServerConfig, dispatcher: Arc<Dispatcher>) -> Router {
    let state = ServerState {
        dispatcher,
        max_body_bytes: config.max_body_bytes,
        trust_forwarded_headers: config.trust_forwarded_headers,
    };

    let layers = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .map_response(|res: Response<_>| res.map(axum::body::Body::new))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("permissions-policy"),
            HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
        ));

    Router::new()
        .fallback(dispatch_request)
        .with_state(state)
        .layer(layers)
}

/// HTTP front end for a [`Dispatcher`].
pub struct HttpServer {
    router: Router,
    dispatcher: Arc<Dispatcher>,
    sweep_interval: Duration,
}

impl HttpServer {
    pub fn new(config: &AppConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            router: router(&config.server, Arc::clone(&dispatcher)),
            dispatcher,
            sweep_interval: Duration::from_secs(config.rate_limit.sweep_interval_secs.max(1)),
        }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        tokio::spawn(housekeeping(
            Arc::clone(&self.dispatcher),
            self.sweep_interval,
            shutdown.clone(),
        ));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Convert the Axum request and hand it to the dispatcher.
async fn dispatch_request(State(state): State<ServerState>, request: Request) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let (parts, body) = request.into_parts();

    let body = match to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %parts.uri.path(), error = %e, "Request body rejected");
            return ResponseEntity::error(parts.uri.path(), &DispatchError::PayloadTooLarge).into_response();
        }
    };

    let ip = client_ip(&parts.headers, remote, state.trust_forwarded_headers);
    let mut builder = RequestContext::builder(parts.method, "/")
        .uri(parts.uri)
        .headers(parts.headers)
        .body(body)
        .client_ip(ip);
    if let Some(addr) = remote {
        builder = builder.remote_addr(addr);
    }

    state.dispatcher.dispatch(builder.build()).await
}

async fn housekeeping(dispatcher: Arc<Dispatcher>, sweep: Duration, shutdown: Shutdown) {
    let mut rate_tick = tokio::time::interval(sweep);
    let mut upload_tick = tokio::time::interval(UPLOAD_SWEEP);

    loop {
        tokio::select! {
            _ = rate_tick.tick() => {
                let purged = dispatcher.rate_limiter().purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "Expired rate windows removed");
                }
            }
            _ = upload_tick.tick() => {
                let purged = dispatcher.uploads().purge_stale(upload_max_age());
                if purged > 0 {
                    tracing::info!(purged, "Stale uploads removed");
                }
            }
            _ = shutdown.wait() => break,
        }
    }
    tracing::debug!("Housekeeping stopped");
}
