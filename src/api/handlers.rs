//! API Handlers
//!
//! HTTP request handlers for the cache admin endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use tracing::debug;

use crate::cache::{CacheInfo, CacheManager, CachePolicy, SetOptions, DEFAULT_POLICY};
use crate::error::{CacheError, Result};
use crate::models::{
    validate_key, DeleteResponse, ExistsResponse, GetResponse, HealthResponse, InvalidateRequest,
    InvalidateResponse, MessageResponse, SetRequest, SetResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Process-wide cache handle
    pub manager: CacheManager,
}

impl AppState {
    pub fn new(manager: CacheManager) -> Self {
        Self { manager }
    }
}

/// Handler for PUT /cache
///
/// Stores a JSON value. Without an explicit TTL the `default` policy TTL applies.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let ttl = match req.ttl {
        Some(ttl) => ttl,
        None => state.manager.policy(DEFAULT_POLICY)?.ttl,
    };
    let options = SetOptions::new(ttl)
        .with_l1(req.use_l1)
        .with_compression(req.compress);

    if !state.manager.cache().set(&req.key, &req.value, options).await {
        return Err(CacheError::Transport(format!(
            "key '{}' was not stored in any tier",
            req.key
        )));
    }

    Ok(Json(SetResponse::new(req.key, ttl)))
}

/// Handler for GET /cache/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.manager.cache().get::<Value>(&key).await {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /cache/:key
///
/// Returns 404 when neither tier held the key.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if state.manager.cache().delete(&key).await {
        Ok(Json(DeleteResponse::new(key)))
    } else {
        Err(CacheError::NotFound(key))
    }
}

/// Handler for GET /cache/:key/exists
pub async fn exists_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ExistsResponse>> {
    if let Some(error_msg) = validate_key(&key) {
        return Err(CacheError::InvalidRequest(error_msg));
    }
    let exists = state.manager.cache().exists(&key).await;
    Ok(Json(ExistsResponse { key, exists }))
}

/// Handler for POST /cache/invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }
    let removed = state.manager.cache().invalidate_pattern(&req.pattern).await;
    Ok(Json(InvalidateResponse {
        pattern: req.pattern,
        removed,
    }))
}

/// Handler for GET /stats
///
/// Returns L2 introspection plus L1 size and per-tier counters.
pub async fn stats_handler(State(state): State<AppState>) -> Json<CacheInfo> {
    Json(state.manager.cache().info().await)
}

/// Handler for POST /stats/reset
pub async fn reset_stats_handler(State(state): State<AppState>) -> Json<MessageResponse> {
    state.manager.cache().reset_stats();
    debug!("Cache statistics reset");
    Json(MessageResponse::new("Statistics reset"))
}

/// Handler for GET /policies
pub async fn policies_handler(State(state): State<AppState>) -> Json<Vec<CachePolicy>> {
    let policies = state
        .manager
        .registry()
        .all()
        .into_iter()
        .map(|policy| CachePolicy::clone(&policy))
        .collect();
    Json(policies)
}

/// Handler for GET /health
///
/// Reports "degraded" rather than failing when L2 is unreachable.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = state.manager.cache().l2().connect().await.is_ok();
    Json(HealthResponse::new(connected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryBackend, PolicyRegistry};
    use crate::config::Config;
    use serde_json::json;
    use std::sync::Arc;

    fn test_state() -> (AppState, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let manager = CacheManager::with_backend(
            Config::default(),
            PolicyRegistry::with_defaults(),
            backend.clone(),
        )
        .unwrap();
        (AppState::new(manager), backend)
    }

    fn set_request(key: &str, value: Value, ttl: Option<u64>) -> SetRequest {
        SetRequest {
            key: key.to_string(),
            value,
            ttl,
            compress: false,
            use_l1: true,
        }
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let (state, _) = test_state();

        let req = set_request("test_key", json!({"title": "hello"}), None);
        let response = set_handler(State(state.clone()), Json(req)).await.unwrap();
        assert_eq!(response.ttl, 300);

        let response = get_handler(State(state.clone()), Path("test_key".to_string()))
            .await
            .unwrap();
        assert_eq!(response.value, json!({"title": "hello"}));
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let (state, _) = test_state();

        let result = get_handler(State(state), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let (state, _) = test_state();

        let req = set_request("to_delete", json!("value"), Some(60));
        set_handler(State(state.clone()), Json(req)).await.unwrap();

        let result = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(result.is_ok());

        let result = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));

        let result = get_handler(State(state), Path("to_delete".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_exists_handler() {
        let (state, _) = test_state();
        let req = set_request("present", json!(1), Some(3600));
        set_handler(State(state.clone()), Json(req)).await.unwrap();

        let response = exists_handler(State(state.clone()), Path("present".to_string()))
            .await
            .unwrap();
        assert!(response.exists);

        let response = exists_handler(State(state), Path("absent".to_string()))
            .await
            .unwrap();
        assert!(!response.exists);
    }

    #[tokio::test]
    async fn test_invalidate_handler() {
        let (state, _) = test_state();
        for key in ["kw:a", "kw:b", "title:a"] {
            let req = set_request(key, json!(key), Some(60));
            set_handler(State(state.clone()), Json(req)).await.unwrap();
        }

        let req = InvalidateRequest {
            pattern: "kw:*".to_string(),
        };
        let response = invalidate_handler(State(state.clone()), Json(req)).await.unwrap();
        assert_eq!(response.removed, 2);

        let response = get_handler(State(state), Path("title:a".to_string())).await.unwrap();
        assert_eq!(response.value, json!("title:a"));
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let (state, _) = test_state();

        let response = stats_handler(State(state)).await;
        assert_eq!(response.status, "healthy");
        assert_eq!(response.l1_stats.hits, 0);
        assert_eq!(response.l1_stats.misses, 0);
    }

    #[tokio::test]
    async fn test_reset_stats_handler() {
        let (state, _) = test_state();
        let _ = get_handler(State(state.clone()), Path("missing".to_string())).await;
        assert_eq!(state.manager.cache().stats().l1.misses, 1);

        reset_stats_handler(State(state.clone())).await;
        assert_eq!(state.manager.cache().stats().l1.misses, 0);
    }

    #[tokio::test]
    async fn test_policies_handler() {
        let (state, _) = test_state();

        let response = policies_handler(State(state)).await;
        let names: Vec<_> = response.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["api-response", "default", "keyword-analysis", "title-generation", "trending"]
        );
    }

    #[tokio::test]
    async fn test_health_handler() {
        let (state, backend) = test_state();

        let response = health_handler(State(state.clone())).await;
        assert_eq!(response.status, "healthy");

        backend.set_available(false);
        let _ = state.manager.cache().exists("probe").await;
        let response = health_handler(State(state)).await;
        assert_eq!(response.status, "degraded");
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let (state, _) = test_state();

        let req = set_request("", json!("value"), None);
        let result = set_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_set_fails_when_no_tier_accepts() {
        let (state, backend) = test_state();
        backend.set_available(false);

        // TTL 0 is never mirrored into L1, so nothing stores it.
        let req = set_request("forever", json!(1), Some(0));
        let result = set_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err(CacheError::Transport(_))));
    }
}
