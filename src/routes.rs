use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use axum::{middleware as layers, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config;
use crate::handlers;
use crate::middleware::logging::log_failures;
use crate::store::Store;

/// Shared request state. The store is an injected trait object so the
/// binary and the tests can wire different backends.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api", api_routes())
        .layer(layers::from_fn(log_failures))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(auth_routes())
        .merge(post_routes())
        .merge(comment_routes())
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/me", get(handlers::auth::me))
        .route("/auth/logout", post(handlers::auth::logout))
}

fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(handlers::posts::list).post(handlers::posts::create))
        .route(
            "/posts/:id",
            get(handlers::posts::detail)
                .put(handlers::posts::update)
                .delete(handlers::posts::delete),
        )
}

fn comment_routes() -> Router<AppState> {
    Router::new()
        .route("/comments", post(handlers::comments::create))
        .route("/comments/post/:post_id", get(handlers::comments::list_for_post))
        .route(
            "/comments/:id",
            put(handlers::comments::update).delete(handlers::comments::delete),
        )
}

fn cors_layer() -> CorsLayer {
    let api = &config::config().api;
    if !api.enable_cors {
        // No CORS headers at all
        return CorsLayer::new();
    }
    if api.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Blog API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "auth": "/api/auth/register, /api/auth/login (public); /api/auth/me, /api/auth/logout (bearer)",
                "posts": "/api/posts[/:id] (GET public; mutations bearer)",
                "comments": "/api/comments/post/:postId (GET public); /api/comments[/:id] (bearer)",
                "health": "/health"
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            axum::http::StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "message": "store unavailable",
                "data": { "status": "degraded", "timestamp": now, "detail": e.to_string() }
            })),
        ),
    }
}
