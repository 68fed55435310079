use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{grants, health, navigation, pages};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, event_bus: EventBus) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            event_bus,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let (event_bus, event_rx) = init_event_bus();
    tokio::spawn(start_activity_listener(event_rx, pool.clone()));

    let state = AppState::new(pool, jwt_config, event_bus);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let admin_routes = Router::new()
        .route("/pages", get(pages::list_pages).post(pages::create_page))
        .route("/pages/catalog", get(pages::page_catalog))
        .route("/pages/:id", put(pages::update_page).delete(pages::delete_page))
        .route(
            "/roles/:role_id/grants",
            get(grants::get_role_grants).put(grants::replace_role_grants),
        )
        .route("/roles/:role_id/matrix", get(grants::get_role_matrix))
        .route("/roles/:role_id/pages/:page_id/grants", put(grants::replace_page_grants));

    let router = Router::new()
        .route("/api/health", get(health::health))
        .route("/navigation", get(navigation::navigation))
        .route("/permissions/check", get(navigation::check_permission))
        .nest("/admin", admin_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
