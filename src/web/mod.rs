use anyhow::{Context, Result};
use axum::{response::Json, routing::get, Router};
use log::info;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

/// Liveness endpoint for hosting platforms. Carries no bot state.
pub struct HealthServer;

impl HealthServer {
    pub async fn start_server(port: u16) -> Result<()> {
        info!("Binding health endpoint to 0.0.0.0:{}...", port);
        let listener = TcpListener::bind(format!("0.0.0.0:{}", port))
            .await
            .with_context(|| format!("Failed to bind health endpoint on port {}", port))?;

        Self::serve(listener).await
    }

    pub async fn serve(listener: TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!("Health endpoint available at http://{}/health", addr);
        }

        axum::serve(listener, Self::create_routes())
            .await
            .context("Health endpoint stopped")?;
        Ok(())
    }

    fn create_routes() -> Router {
        Router::new()
            .route("/", get(alive))
            .route("/health", get(health))
            .layer(CorsLayer::permissive())
    }
}

async fn alive() -> Json<Value> {
    Json(json!({
        "status": "alive",
        "service": "telegram-bot"
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
