//! Bug Tracker Backend
//!
//! REST backend for projects, bugs and their discussion, with SQLite
//! persistence and a per-attribute change history.

mod api;
mod audit;
mod auth;
mod cache;
mod config;
mod db;
mod errors;
mod models;
mod storage;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cache::ResponseCache;
use config::Config;
use db::Repository;
use storage::DocumentStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub cache: Arc<ResponseCache>,
    pub documents: Arc<DocumentStore>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Bug Tracker Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Document directory: {:?}", config.document_dir);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.jwt_secret_generated {
        tracing::warn!(
            "No token secret configured (BUGTRACKER_JWT_SECRET). Sessions will not survive a restart!"
        );
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Initialize document storage
    let documents = Arc::new(DocumentStore::new(&config.document_dir));
    if config.storage_enabled {
        documents.init().await?;
    } else {
        tracing::info!("Document storage disabled");
    }

    let cache = Arc::new(ResponseCache::new(config.cache_enabled, config.cache_ttl));

    // Create application state
    let state = AppState {
        repo,
        cache,
        documents,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    let api_routes = Router::new()
        // Auth
        .route("/auth/users", get(api::list_users))
        .route("/auth/login", post(api::login))
        .route("/auth/logout", post(api::logout))
        .route("/auth/register", post(api::register))
        // Projects
        .route(
            "/projects",
            get(api::get_projects)
                .post(api::save_project)
                .delete(api::delete_projects),
        )
        .route(
            "/projects/badges",
            get(api::list_badges).post(api::attach_badge),
        )
        .route(
            "/projects/clients",
            get(api::list_clients)
                .post(api::save_client)
                .delete(api::delete_clients),
        )
        .route("/projects/audit_trails", get(api::audit_trails))
        // Bugs
        .route(
            "/projects/bugs",
            post(api::save_bug).delete(api::close_bugs),
        )
        .route("/projects/bugs/comments", get(api::bug_comments))
        .route("/projects/bugs/threads", get(api::bug_threads))
        // Discussion
        .route("/projects/comments", post(api::create_comment))
        .route("/projects/threads", post(api::create_thread))
        .route(
            "/projects/threads/replies",
            get(api::thread_replies).post(api::create_thread_reply),
        )
        // Documents
        .route("/projects/documents/upload", post(api::upload_document));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .merge(health_routes);

    if state.config.storage_enabled {
        router = router.nest_service("/public", ServeDir::new(state.documents.root()));
    }

    router
        .layer(middleware::from_fn_with_state(state.clone(), cache::cache_layer))
        .layer(middleware::from_fn_with_state(state.clone(), auth::cookie_auth))
        .layer(middleware::from_fn(api::timing_layer))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Credentialed CORS for the configured origins; any origin otherwise.
fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}: {}", origin, e);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::COOKIE])
        .expose_headers([
            header::HeaderName::from_static("x-process-time"),
            header::HeaderName::from_static("x-route-name"),
        ])
        .allow_credentials(true)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
