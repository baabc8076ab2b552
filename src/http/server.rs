//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the single entry handler
//! - Wire up middleware (request ID, tracing, panics, limits, timeout)
//! - Classify each request and dispatch to preflight, relay, API or assets
//! - Bind server to listener, plain or TLS
//! - Stop accepting on shutdown

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::api::{ApiDelegate, ForwardingDelegate, UnconfiguredDelegate};
use crate::assets::StaticAssets;
use crate::config::RelayConfig;
use crate::http::request::{request_id_header, request_id_of, RequestUuid};
use crate::http::response::{self, panic_response, AppError};
use crate::http::websocket::{self, RelayContext};
use crate::lifecycle::Shutdown;
use crate::net::{tls, SessionTracker};
use crate::observability::metrics;
use crate::relay::{RelayOptions, UpstreamEndpoint, UpstreamError};
use crate::routing::{RequestRouter, RouteKind};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<RequestRouter>,
    pub relay: RelayContext,
    pub assets: Arc<StaticAssets>,
    pub api: Arc<dyn ApiDelegate>,
}

/// HTTP server for the edge relay.
pub struct HttpServer {
    router: Router,
    config: RelayConfig,
    sessions: SessionTracker,
    shutdown: Shutdown,
}

impl HttpServer {
    /// Create a server whose API delegate follows `config.api`.
    pub fn new(config: RelayConfig, shutdown: Shutdown) -> Result<Self, UpstreamError> {
        let api: Arc<dyn ApiDelegate> = match &config.api.forward_to {
            Some(base) => Arc::new(ForwardingDelegate::new(base)),
            None => Arc::new(UnconfiguredDelegate),
        };
        Self::with_api_delegate(config, shutdown, api)
    }

    /// Create a server with an explicit API delegate.
    pub fn with_api_delegate(
        config: RelayConfig,
        shutdown: Shutdown,
        api: Arc<dyn ApiDelegate>,
    ) -> Result<Self, UpstreamError> {
        let endpoint = UpstreamEndpoint::parse(&config.upstream.endpoint)?;
        let sessions = SessionTracker::new(config.relay.max_sessions);

        let state = AppState {
            router: Arc::new(RequestRouter::new()),
            relay: RelayContext {
                endpoint,
                options: RelayOptions {
                    max_pending_frames: config.relay.max_pending_frames,
                    handshake_timeout: Duration::from_secs(config.upstream.handshake_timeout_secs),
                    send_timeout: Duration::from_secs(config.relay.send_timeout_secs),
                },
                sessions: sessions.clone(),
                shutdown: shutdown.clone(),
            },
            assets: Arc::new(StaticAssets::new(&config.assets.root)),
            api,
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            sessions,
            shutdown,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(entry_handler))
            .route("/", any(entry_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(request_id_header(), RequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(request_id_header()))
                    .layer(CatchPanicLayer::custom(panic_response)),
            )
    }

    /// The assembled router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Live relay sessions.
    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    /// Run the server, accepting connections on the given listener until
    /// the shutdown signal fires.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let mut stop = self.shutdown.subscribe();
        tls::install_crypto_provider();

        let app = self.router.into_make_service();

        match &self.config.listener.tls {
            None => {
                tracing::info!(address = %addr, "HTTP server starting");
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        stop.recv().await;
                        tracing::info!("Shutdown signal received");
                    })
                    .await?;
            }
            Some(tls_config) => {
                let rustls_config = tls::load_tls_config(
                    Path::new(&tls_config.cert_path),
                    Path::new(&tls_config.key_path),
                )
                .await?;
                tracing::info!(address = %addr, "HTTPS server starting");

                let handle = axum_server::Handle::new();
                let stopper = handle.clone();
                let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
                tokio::spawn(async move {
                    stop.recv().await;
                    tracing::info!("Shutdown signal received");
                    stopper.graceful_shutdown(Some(grace));
                });

                axum_server::from_tcp_rustls(listener.into_std()?, rustls_config)
                    .handle(handle)
                    .serve(app)
                    .await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

/// Single entry point: classify, then serve.
async fn entry_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id_of(request.headers()).to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let route = state.router.classify(&method, request.headers(), &path);
    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        route = route.as_str(),
        "Routing request"
    );

    let result: Result<Response, AppError> = match route {
        RouteKind::CorsPreflight => Ok(response::cors_preflight()),
        RouteKind::WebSocketRelay => {
            websocket::relay_upgrade(&state.relay, request, &request_id).await
        }
        RouteKind::ApiDelegate => Ok(match state.api.handle(request).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }),
        RouteKind::StaticAsset => state.assets.serve(&path).await.map_err(AppError::from),
    };

    let response = result.unwrap_or_else(IntoResponse::into_response);
    metrics::record_request(
        method.as_str(),
        response.status().as_u16(),
        route.as_str(),
        start_time,
    );
    response
}
