//! services/audit/src/bin/sandbox.rs
//!
//! Serves an in-memory scan service behind the admin-ajax endpoint so the
//! scan client can be developed and exercised without a live site.

use audit_lib::{
    adapters::SandboxScanService,
    config::Config,
    error::AuditError,
    web::{self, ApiDoc, AppState},
};
use axum::http::{header::CONTENT_TYPE, HeaderValue, Method};
use site_audit_core::ScanTarget;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), AuditError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting sandbox...");

    // --- 2. Seed the Sandbox Services ---
    let app_state = Arc::new(AppState {
        links: Arc::new(SandboxScanService::demo(
            ScanTarget::BrokenLinks,
            config.sandbox_pages,
            config.sandbox_batch_size,
        )),
        images: Arc::new(SandboxScanService::demo(
            ScanTarget::ImageAlt,
            config.sandbox_pages,
            config.sandbox_batch_size,
        )),
        nonce: config.ajax_nonce.clone(),
    });
    info!(
        pages = config.sandbox_pages,
        batch_size = config.sandbox_batch_size,
        "Sandbox catalog seeded."
    );

    // --- 3. Create the Web Router ---
    let mut app = web::router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    if let Some(origin) = &config.cors_origin {
        let origin = origin.parse::<HeaderValue>().map_err(|e| {
            AuditError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", origin, e))
        })?;
        let cors = CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::POST, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE]);
        app = app.layer(cors);
    }

    // --- 4. Start the Server ---
    info!("Starting sandbox on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
