//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: status, admin API, proxy fallback
//! - Wire up middleware (tracing, request ID, CORS, timeout)
//! - Own the shared application state (policy, limiter, stores, client)
//! - Apply hot-reloaded runtime policy
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{http::StatusCode, middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin;
use crate::config::{AccessMode, GuardrailConfig, ProxyConfig};
use crate::http::forward::{build_client, OriginClient};
use crate::http::proxy::proxy_handler;
use crate::http::request::RequestIdLayer;
use crate::http::response::cors_middleware;
use crate::observability::ExchangeLogger;
use crate::security::{Authorizer, OpenAccess, RateLimiter, SessionAccess};
use crate::store::Stores;

/// Policy that may change on config reload.
#[derive(Debug, Clone)]
pub struct RuntimePolicy {
    pub guardrails: GuardrailConfig,
    pub reserved_prefixes: Vec<String>,
    pub upstream_timeout: Duration,
}

impl RuntimePolicy {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            guardrails: config.guardrails.clone(),
            reserved_prefixes: config.routing.reserved_prefixes.clone(),
            upstream_timeout: Duration::from_secs(config.timeouts.upstream_secs),
        }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub policy: Arc<ArcSwap<RuntimePolicy>>,
    pub limiter: Arc<RateLimiter>,
    pub stores: Stores,
    pub authorizer: Arc<dyn Authorizer>,
    pub exchanges: ExchangeLogger,
    pub client: OriginClient,
    pub access_mode: AccessMode,
}

impl AppState {
    /// Swap in reloadable policy from `config`. The access mode is fixed at startup.
    pub fn apply_config(&self, config: &ProxyConfig) {
        if config.access.mode != self.access_mode {
            tracing::warn!(
                current = self.access_mode.as_str(),
                requested = config.access.mode.as_str(),
                "Access mode cannot change at runtime; restart to apply"
            );
        }
        self.limiter.reconfigure(&config.rate_limit);
        self.policy.store(Arc::new(RuntimePolicy::from_config(config)));
        tracing::info!(
            max_body_bytes = config.guardrails.max_body_bytes,
            rate_limit_enabled = config.rate_limit.enabled,
            max_requests = config.rate_limit.max_requests,
            upstream_timeout_secs = config.timeouts.upstream_secs,
            "Runtime policy reloaded"
        );
    }
}

/// HTTP server for the intercepting proxy.
pub struct HttpServer {
    state: AppState,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a server over `stores`, with the authorizer chosen by `access.mode`.
    pub fn new(config: ProxyConfig, stores: Stores) -> Self {
        let authorizer: Arc<dyn Authorizer> = match config.access.mode {
            AccessMode::Open => Arc::new(OpenAccess),
            AccessMode::Session => Arc::new(SessionAccess::new(stores.sessions.clone())),
        };

        let state = AppState {
            policy: Arc::new(ArcSwap::from_pointee(RuntimePolicy::from_config(&config))),
            limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            exchanges: ExchangeLogger::new(stores.exchanges.clone()),
            client: build_client(&config.timeouts),
            access_mode: config.access.mode,
            authorizer,
            stores,
        };

        Self { state, config }
    }

    /// Replace the authorizer, e.g. with an external session service.
    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.state.authorizer = authorizer;
        self
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        let mut app = Router::new().route("/status", get(admin::handlers::get_status));
        if self.config.admin.enabled {
            app = app.merge(admin::router(self.state.clone()));
        }

        app.fallback(proxy_handler)
            .with_state(self.state.clone())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(self.config.timeouts.request_secs),
            ))
            .layer(middleware::from_fn(cors_middleware))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            access_mode = self.state.access_mode.as_str(),
            admin_enabled = self.config.admin.enabled,
            "HTTP server starting"
        );

        let reload_state = self.state.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                reload_state.apply_config(&config);
            }
        });

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
