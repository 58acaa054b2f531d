//! Gesture Classification Server
//!
//! Serves a pretrained hand-gesture classifier over HTTP.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  GESTURE SERVER                     │
//! ├─────────────────────────────────────────────────────┤
//! │  GET  /health  ──┐                                  │
//! │  POST /predict ──┼──► Router (Axum) ──► AppState    │
//! │                  │                        │         │
//! │                  │        ┌───────────────┴──────┐  │
//! │                  │        ▼                      ▼  │
//! │                  │  ┌────────────┐      ┌─────────┐ │
//! │                  │  │ Classifier │      │ Labels  │ │
//! │                  │  │ (ONNX RT)  │      │ (JSON)  │ │
//! │                  │  └────────────┘      └─────────┘ │
//! └─────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod handlers;
mod model;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{AppError, AppResult};
use model::{Classifier, LabelMap, OnnxClassifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    // Initialize logging
    init_tracing(config.log_json);

    tracing::info!("Gesture Server starting...");

    // A missing model keeps the server up; /health reports it
    let model: Option<Arc<dyn Classifier>> =
        match OnnxClassifier::load(&config.model_path, config.inference_threads) {
            Ok(classifier) => {
                tracing::info!("Model loaded successfully from {}", config.model_path.display());
                Some(Arc::new(classifier))
            }
            Err(e) => {
                tracing::error!("Error loading model: {}", e);
                None
            }
        };

    let labels = match LabelMap::load(&config.labels_path) {
        Ok(labels) if labels.is_empty() => {
            tracing::warn!("Labels file is empty; every prediction will be labelled Unknown");
            labels
        }
        Ok(labels) => {
            tracing::info!("Labels loaded successfully: {} classes", labels.len());
            labels
        }
        Err(e) => {
            tracing::error!("Error loading labels: {}", e);
            LabelMap::default()
        }
    };

    // Build application state
    let state = AppState {
        model,
        labels: Arc::new(labels),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "gesture_server=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Shared application state. Both fields are read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub model: Option<Arc<dyn Classifier>>,
    pub labels: Arc<LabelMap>,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/predict", post(handlers::predict::predict))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
