use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{AppConfig, Environment};
use crate::error::ApiError;
use crate::jsonapi::handler::ModelHandler;
use crate::jsonapi::routing::{create_model_router_with_options, RouterOptions};

#[derive(Clone)]
struct ServiceInfo {
    prefix: Arc<str>,
    types: Arc<[String]>,
}

/// Assemble the HTTP app: one JSON:API router per resource type under the
/// configured prefix, plus `/` and `/health`.
pub fn app(config: &AppConfig, handler: Arc<dyn ModelHandler>, types: Vec<String>) -> Router {
    let options = RouterOptions::from(config);

    let mut router = Router::new();
    for resource_type in &types {
        tracing::debug!("Mounting {}/{}", config.api.prefix, resource_type);
        router = router.merge(create_model_router_with_options(
            resource_type,
            handler.clone(),
            &config.api.prefix,
            options.clone(),
        ));
    }

    let info = ServiceInfo {
        prefix: Arc::from(config.api.prefix.as_str()),
        types: Arc::from(types),
    };

    let mut app = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(info)
        .merge(router)
        .fallback(not_found);

    // Global middleware
    if config.security.enable_cors {
        app = app.layer(cors_layer(config));
    }
    if config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    app
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.environment == Environment::Development {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

async fn root(State(info): State<ServiceInfo>) -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    let resources: Vec<String> = info
        .types
        .iter()
        .map(|resource_type| format!("{}/{}", info.prefix, resource_type))
        .collect();

    Json(json!({
        "name": "Moderator JSON:API",
        "version": version,
        "description": "JSON:API resource routing over the moderator model handlers",
        "resources": resources,
        "endpoints": {
            "collection": format!("{}/:type", info.prefix),
            "item": format!("{}/:type/:id", info.prefix),
            "related": format!("{}/:type/:id/:relationship", info.prefix),
            "relationships": format!("{}/:type/:id/relationships/:relationship", info.prefix),
            "health": "/health",
        }
    }))
}

async fn health() -> impl IntoResponse {
    let now = chrono::Utc::now();

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "timestamp": now,
        })),
    )
}

async fn not_found() -> ApiError {
    ApiError::not_found("Not Found")
}
