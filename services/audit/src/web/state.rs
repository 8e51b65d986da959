//! services/audit/src/web/state.rs
//!
//! Defines the shared state of the sandbox endpoint.

use site_audit_core::ports::ScanService;
use site_audit_core::ScanTarget;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub links: Arc<dyn ScanService>,
    pub images: Arc<dyn ScanService>,
    /// The token every call must carry. `None` accepts any caller.
    pub nonce: Option<String>,
}

impl AppState {
    pub fn service_for(&self, target: ScanTarget) -> &Arc<dyn ScanService> {
        match target {
            ScanTarget::BrokenLinks => &self.links,
            ScanTarget::ImageAlt => &self.images,
        }
    }

    /// Compares the presented token with the configured one.
    pub fn accepts_nonce(&self, presented: Option<&str>) -> bool {
        match &self.nonce {
            Some(expected) => presented == Some(expected.as_str()),
            None => true,
        }
    }
}
