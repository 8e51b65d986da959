pub mod ajax;
pub mod protocol;
pub mod state;

pub use ajax::{admin_ajax_handler, ApiDoc, AJAX_PATH};
pub use state::AppState;

use axum::{routing::post, Router};
use std::sync::Arc;

/// Builds the sandbox router. Shared by the binary and the integration tests.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route(AJAX_PATH, post(admin_ajax_handler))
        .with_state(app_state)
}
