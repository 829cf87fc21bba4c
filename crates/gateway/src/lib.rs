use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use shelf_client_sdk::ProductApi;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod crypto;
pub mod form;
pub mod guard;
pub mod handlers;
pub mod models;
pub mod probe;
pub mod session;
pub mod tables;

use config::GatewayConfig;
use guard::GuardConfig;
use session::SessionCodec;
use tables::TableRegistry;

// Room for one product image plus the text fields.
const MAX_BODY_BYTES: usize = 6 * 1024 * 1024;

pub struct AppState {
    pub config: GatewayConfig,
    pub api: Arc<dyn ProductApi>,
    pub sessions: SessionCodec,
    pub tables: TableRegistry,
    pub guard: GuardConfig,
}

impl AppState {
    pub fn new(config: GatewayConfig, api: Arc<dyn ProductApi>) -> Self {
        let sessions = SessionCodec::new(&config.session_secret, config.session_ttl_secs);
        let tables = TableRegistry::new(config.table_idle_secs);
        Self {
            config,
            api,
            sessions,
            tables,
            guard: GuardConfig::default(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .route("/", get(handlers::auth::landing))
        .route("/readyz", get(health_check))
        .route("/auth/login", get(handlers::auth::login_page).post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/dashboard", get(handlers::dashboard::show))
        .route("/dashboard/profile", get(handlers::dashboard::profile))
        .route("/dashboard/products", post(handlers::dashboard::create_product))
        .route(
            "/dashboard/products/:id",
            put(handlers::dashboard::update_product).delete(handlers::dashboard::delete_product),
        )
        .route("/dashboard/reorder", post(handlers::dashboard::reorder))
        .route("/dashboard/selection", post(handlers::dashboard::selection))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), guard::route_guard))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "shelf-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
