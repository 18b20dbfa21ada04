use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use notify::RecommendedWatcher;
use notify_debouncer_mini::Debouncer;
use routeguard_authz::{Evaluator, GateState, PolicyStore, authorization_gate};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::AppConfig,
    handlers::{self, AppState},
    items::ItemStore,
    middleware as app_middleware,
    verifier::TokenVerifier,
    watch,
};

pub struct RouteguardServer {
    addr: SocketAddr,
    app: Router,
    // Dropping the debouncer stops hot reload, so the server owns it.
    _watcher: Option<Debouncer<RecommendedWatcher>>,
}

/// Builds the router with the full middleware stack. Outermost first:
/// trace and CORS, then the request id, then authentication (attach
/// identity, never reject), then the authorization gate, then routes.
/// CORS sits outside the gate so preflight requests are answered without
/// credentials.
pub fn build_app(cfg: &AppConfig) -> (Router, AppState) {
    let store = Arc::new(PolicyStore::load(&cfg.authz));
    let evaluator = Arc::new(Evaluator::new(store, cfg.authz.client_id.clone()));
    let state = AppState {
        evaluator: Arc::clone(&evaluator),
        items: Arc::new(ItemStore::with_demo_data()),
    };
    let authn = app_middleware::AuthnState::new(TokenVerifier::new(&cfg.auth));
    let gate = GateState::new(evaluator);

    let app = Router::new()
        // Public endpoints (per the shipped public path list)
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        // Gate-settled endpoints
        .route("/dashboard", get(handlers::dashboard))
        .route("/admin/stats", get(handlers::admin_stats))
        .route("/admin/reload", post(handlers::admin_reload))
        // Deferred ownership checks
        .route(
            "/items/{id}",
            get(handlers::get_item).delete(handlers::delete_item),
        )
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(gate, authorization_gate))
        .layer(middleware::from_fn_with_state(
            authn,
            app_middleware::authentication_middleware,
        ))
        .layer(middleware::from_fn(app_middleware::request_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    (app, state)
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn build(self) -> RouteguardServer {
        let (app, state) = build_app(&self.config);

        let watcher = if self.config.authz.watch {
            match watch::spawn_policy_watcher(&self.config.authz, Arc::clone(state.evaluator.store()))
            {
                Ok(watcher) => Some(watcher),
                Err(error) => {
                    tracing::warn!(%error, "policy watcher failed to start, hot reload disabled");
                    None
                }
            }
        } else {
            None
        };

        RouteguardServer {
            addr: self.addr,
            app,
            _watcher: watcher,
        }
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteguardServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
