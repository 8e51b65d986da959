//! services/audit/src/web/ajax.rs
//!
//! Contains the Axum handler for the single admin-ajax endpoint and the
//! master definition for the OpenAPI specification.

use crate::web::protocol::{
    AjaxAction, BatchData, Envelope, FixData, ResultRow, ResultsData, StartScanData,
};
use crate::web::state::AppState;
use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::Json,
};
use site_audit_core::ports::{PortError, ScanService};
use site_audit_core::{ResultFilter, ResultsQuery, ScanId, DEFAULT_PER_PAGE};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};

pub const AJAX_PATH: &str = "/wp-admin/admin-ajax.php";

const MAX_PER_PAGE: u32 = 100;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        admin_ajax_handler,
    ),
    components(
        schemas(AjaxForm, Envelope, StartScanData, BatchData, ResultsData, ResultRow, FixData)
    ),
    tags(
        (name = "Site Audit Sandbox", description = "Scan, list and fix broken links and missing alt text.")
    )
)]
pub struct ApiDoc;

/// The form fields the endpoint understands. Which ones are required depends
/// on `action`.
#[derive(ToSchema)]
pub struct AjaxForm {
    /// `<blc|alt>_<start_scan|process_batch|get_results|update_suggestion|delete_entry|apply_fixes>`
    pub action: String,
    pub nonce: Option<String>,
    pub scan_id: Option<String>,
    /// `all`, `internal` or `external`.
    pub filter: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub id: Option<u64>,
    /// Replacement URL, or alt text for image findings.
    pub new_url: Option<String>,
    #[schema(rename = "ids[]")]
    pub ids: Option<Vec<u64>>,
}

//=========================================================================================
// Request Parsing
//=========================================================================================

/// Raw form pairs. Kept as pairs because `ids[]` repeats.
struct AjaxRequest {
    fields: Vec<(String, String)>,
}

enum DispatchError {
    BadRequest(String),
    Port(PortError),
}

impl From<PortError> for DispatchError {
    fn from(e: PortError) -> Self {
        DispatchError::Port(e)
    }
}

impl AjaxRequest {
    fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>, DispatchError> {
        match self.get(key).map(str::trim).filter(|v| !v.is_empty()) {
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|_| DispatchError::BadRequest(format!("Invalid {}", key))),
            None => Ok(None),
        }
    }

    fn require<T: FromStr>(&self, key: &str) -> Result<T, DispatchError> {
        self.parse(key)?
            .ok_or_else(|| DispatchError::BadRequest(format!("Missing {}", key)))
    }

    fn ids(&self) -> Result<Vec<u64>, DispatchError> {
        self.fields
            .iter()
            .filter(|(k, _)| k == "ids[]" || k == "ids")
            .map(|(_, v)| {
                v.trim()
                    .parse::<u64>()
                    .map_err(|_| DispatchError::BadRequest("Invalid ids".to_string()))
            })
            .collect()
    }
}

//=========================================================================================
// Handler
//=========================================================================================

/// Single entry point for every scan action.
#[utoipa::path(
    post,
    path = "/wp-admin/admin-ajax.php",
    request_body(content = AjaxForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Envelope with the action's payload, or success=false with a message", body = Envelope),
        (status = 400, description = "Missing or unknown action, or invalid fields", body = Envelope),
        (status = 403, description = "Security token rejected", body = Envelope)
    )
)]
pub async fn admin_ajax_handler(
    State(state): State<Arc<AppState>>,
    Form(fields): Form<Vec<(String, String)>>,
) -> (StatusCode, Json<Envelope>) {
    let request = AjaxRequest { fields };

    let Some(action_name) = request.get("action") else {
        return (StatusCode::BAD_REQUEST, Json(Envelope::failure("Missing action")));
    };
    let Some((target, action)) = AjaxAction::parse(action_name) else {
        warn!(action = action_name, "Unknown action.");
        return (
            StatusCode::BAD_REQUEST,
            Json(Envelope::failure(format!("Unknown action '{}'", action_name))),
        );
    };
    if !state.accepts_nonce(request.get("nonce")) {
        warn!(action = action_name, "Rejected call with a bad security token.");
        return (
            StatusCode::FORBIDDEN,
            Json(Envelope::failure("Security check failed.")),
        );
    }

    match dispatch(state.service_for(target).as_ref(), action, &request).await {
        Ok(envelope) => (StatusCode::OK, Json(envelope)),
        Err(DispatchError::BadRequest(message)) => {
            (StatusCode::BAD_REQUEST, Json(Envelope::failure(message)))
        }
        Err(DispatchError::Port(e)) => {
            error!(action = action_name, "Scan service error: {}", e);
            // Service failures travel in the envelope, as admin-ajax does.
            (StatusCode::OK, Json(Envelope::failure(failure_text(&e))))
        }
    }
}

fn failure_text(e: &PortError) -> String {
    match e {
        PortError::NotFound(message) | PortError::Rejected(Some(message)) => message.clone(),
        other => other.to_string(),
    }
}

async fn dispatch(
    service: &dyn ScanService,
    action: AjaxAction,
    request: &AjaxRequest,
) -> Result<Envelope, DispatchError> {
    let envelope = match action {
        AjaxAction::StartScan => {
            let scan_id = service.start_scan().await?;
            info!(%scan_id, "Scan started via endpoint.");
            Envelope::ok(&StartScanData {
                scan_id: scan_id.to_string(),
            })
        }
        AjaxAction::ProcessBatch => {
            let scan_id = ScanId::new(request.require::<String>("scan_id")?);
            let progress = service.process_batch(&scan_id).await?;
            Envelope::ok(&BatchData::from(progress))
        }
        AjaxAction::GetResults => {
            let filter = request
                .get("filter")
                .unwrap_or_default()
                .parse::<ResultFilter>()
                .map_err(DispatchError::BadRequest)?;
            let query = ResultsQuery {
                scan_id: request.parse::<String>("scan_id")?.map(ScanId::new),
                filter,
                search: request.get("search").unwrap_or_default().trim().to_string(),
                page: request.parse::<u32>("page")?.unwrap_or(1).max(1),
                per_page: request
                    .parse::<u32>("per_page")?
                    .unwrap_or(DEFAULT_PER_PAGE)
                    .clamp(1, MAX_PER_PAGE),
            };
            let page = service.get_results(&query).await?;
            Envelope::ok(&ResultsData::from(&page))
        }
        AjaxAction::UpdateSuggestion => {
            let id = request.require::<u64>("id")?;
            let new_value = request.get("new_url").unwrap_or_default().trim();
            service.update_suggestion(id, new_value).await?;
            Envelope::ok(&serde_json::json!({ "message": "Suggestion updated." }))
        }
        AjaxAction::DeleteEntry => {
            let id = request.require::<u64>("id")?;
            service.delete_entry(id).await?;
            Envelope::ok(&serde_json::json!({ "message": "Entry deleted." }))
        }
        AjaxAction::ApplyFixes => {
            let ids = request.ids()?;
            if ids.is_empty() {
                return Err(DispatchError::BadRequest("No entries selected".to_string()));
            }
            let summary = service.apply_fixes(&ids).await?;
            Envelope::ok(&FixData::from(summary))
        }
    };
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(pairs: &[(&str, &str)]) -> AjaxRequest {
        AjaxRequest {
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_repeated_ids_are_collected() {
        let req = request(&[("action", "blc_apply_fixes"), ("ids[]", "3"), ("ids[]", "9")]);
        assert_eq!(req.ids().ok(), Some(vec![3, 9]));
    }

    #[test]
    fn test_missing_and_invalid_fields() {
        let req = request(&[("id", "seven")]);
        assert!(matches!(req.require::<u64>("id"), Err(DispatchError::BadRequest(_))));
        assert!(matches!(req.require::<u64>("page"), Err(DispatchError::BadRequest(_))));
        assert!(matches!(request(&[("page", " ")]).parse::<u32>("page"), Ok(None)));
    }

    #[test]
    fn test_failure_text_keeps_service_message() {
        let text = failure_text(&PortError::NotFound("Entry 7 not found".to_string()));
        assert_eq!(text, "Entry 7 not found");
    }

    #[test]
    fn test_openapi_document_lists_endpoint() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key(AJAX_PATH));
    }
}
