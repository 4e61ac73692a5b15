//! In-process response cache for listing routes.
//!
//! Successful GET responses on cacheable paths are stored for a fixed TTL,
//! keyed by path and query. Any successful write under a cached path's
//! resource prefix drops every entry with that prefix.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::RwLock;

use crate::AppState;

/// Paths whose GET responses are cached, and the prefix whose writes
/// invalidate them.
const CACHED_ROUTES: &[(&str, &str)] = &[
    ("/api/v1/projects", "/api/v1/projects"),
    ("/api/v1/auth/users", "/api/v1/auth"),
];

const MAX_CACHED_BODY: usize = 8 * 1024 * 1024;

#[derive(Clone)]
struct CachedResponse {
    body: Bytes,
    content_type: Option<HeaderValue>,
    stored_at: Instant,
}

/// TTL cache of serialized responses.
pub struct ResponseCache {
    enabled: bool,
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedResponse>>,
}

impl ResponseCache {
    pub fn new(enabled: bool, ttl: Duration) -> Self {
        Self {
            enabled,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn get(&self, key: &str) -> Option<CachedResponse> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .cloned()
    }

    async fn put(&self, key: String, body: Bytes, content_type: Option<HeaderValue>) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        entries.insert(
            key,
            CachedResponse {
                body,
                content_type,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop every entry whose key starts with `prefix`.
    pub async fn invalidate_prefix(&self, prefix: &str) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let dropped = before - entries.len();
        if dropped > 0 {
            tracing::debug!("Invalidated {} cached responses under {}", dropped, prefix);
        }
    }
}

/// Serve cacheable GETs from the cache and invalidate on writes.
pub async fn cache_layer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let cache = &state.cache;
    if !cache.is_enabled() {
        return next.run(request).await;
    }

    let path = request.uri().path().trim_end_matches('/').to_string();
    let key = match request.uri().query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.clone(),
    };

    if request.method() != Method::GET {
        let response = next.run(request).await;
        if response.status().is_success() {
            for (_, prefix) in CACHED_ROUTES.iter().filter(|(_, p)| path.starts_with(p)) {
                cache.invalidate_prefix(prefix).await;
            }
        }
        return response;
    }

    if !CACHED_ROUTES.iter().any(|(route, _)| *route == path) {
        return next.run(request).await;
    }

    if let Some(hit) = cache.get(&key).await {
        tracing::debug!("Cache hit for {}", key);
        return cached_response(hit.body, hit.content_type);
    }

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    match to_bytes(body, MAX_CACHED_BODY).await {
        Ok(bytes) => {
            let content_type = parts.headers.get(header::CONTENT_TYPE).cloned();
            cache.put(key, bytes.clone(), content_type).await;
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            tracing::warn!("Failed to buffer response for caching: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn cached_response(body: Bytes, content_type: Option<HeaderValue>) -> Response {
    let mut response = Response::new(Body::from(body));
    if let Some(content_type) = content_type {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type);
    }
    response
}
