//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all operation handlers
//! - Wire up middleware (tracing, timeout, request ID, CORS, metrics)
//! - Bind the server to a listener and serve with graceful shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::core::client::CoreClient;
use crate::core::session::SessionGate;
use crate::http::handlers;
use crate::lifecycle::ShutdownListener;
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// The shared core connection.
    pub client: Arc<CoreClient>,
    /// Exclusive gate for the connection's identity binding.
    pub session: Arc<SessionGate>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a new HTTP server over an established core connection.
    pub fn new(config: GatewayConfig, client: Arc<CoreClient>) -> Self {
        let state = AppState {
            client: client.clone(),
            session: Arc::new(SessionGate::new(client)),
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/domain_setup", post(handlers::domain_setup))
            .route("/domain_close/{domain_id}", get(handlers::domain_close))
            .route(
                "/insert_transaction/{domain_id}",
                post(handlers::insert_transaction),
            )
            .route(
                "/search_transaction/{domain_id}",
                post(handlers::search_transaction),
            )
            .route(
                "/search_transaction_with_condition/{domain_id}",
                post(handlers::search_transaction_with_condition),
            )
            .route(
                "/traverse_transactions/{domain_id}",
                post(handlers::traverse_transactions),
            )
            .route("/gather_signatures", post(handlers::not_implemented))
            .route("/sendback_signature", post(handlers::not_implemented))
            .route(
                "/sendback_denial_of_sign",
                post(handlers::not_implemented),
            )
            .with_state(state)
            .layer(middleware::from_fn(track_request))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownListener,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    () = shutdown.recv() => {
                        tracing::info!("Shutdown trigger received");
                    }
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Shutdown signal received");
                    }
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Record one counter/histogram sample per completed request.
async fn track_request(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let operation = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());

    let response = next.run(request).await;
    metrics::record_request(&operation, response.status().as_u16(), start);
    response
}
