mod handlers;
pub mod middleware;

use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::db::Database;
use middleware::{auth_middleware, SecurityConfig};

/// Router without authentication, for local use and tests.
pub fn create_router(db: Database) -> Router {
    create_router_with_security(db, SecurityConfig::disabled())
}

pub fn create_router_with_security(db: Database, security: SecurityConfig) -> Router {
    let api = Router::new()
        // Collections
        .route(
            "/collections/{name}",
            get(handlers::get_collection).put(handlers::replace_collection),
        )
        // Messages
        .route("/messages", post(handlers::send_message))
        .layer(from_fn_with_state(security.clone(), auth_middleware))
        // Health stays reachable without a key
        .route("/health", get(handlers::health));

    let cors = if security.cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new().allow_origin(AllowOrigin::list(
            security
                .cors_origins
                .iter()
                .filter_map(|o| o.parse::<HeaderValue>().ok()),
        ))
    };

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(db)
}
