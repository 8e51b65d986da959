//! services/audit/src/web/protocol.rs
//!
//! Defines the admin-ajax wire protocol shared by the HTTP client adapter and
//! the sandbox endpoint: action names, the `{success, data}` envelope, and the
//! JSON payloads of every operation.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use site_audit_core::{
    BatchProgress, FixStatus, FixSummary, Origin, PortError, PortResult, ResultRecord,
    ResultsPage, ScanId, ScanTarget,
};
use utoipa::ToSchema;

//=========================================================================================
// Actions
//=========================================================================================

/// The operation half of an action name such as `blc_process_batch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AjaxAction {
    StartScan,
    ProcessBatch,
    GetResults,
    UpdateSuggestion,
    DeleteEntry,
    ApplyFixes,
}

impl AjaxAction {
    const ALL: [AjaxAction; 6] = [
        AjaxAction::StartScan,
        AjaxAction::ProcessBatch,
        AjaxAction::GetResults,
        AjaxAction::UpdateSuggestion,
        AjaxAction::DeleteEntry,
        AjaxAction::ApplyFixes,
    ];

    pub fn operation(self) -> &'static str {
        match self {
            AjaxAction::StartScan => "start_scan",
            AjaxAction::ProcessBatch => "process_batch",
            AjaxAction::GetResults => "get_results",
            AjaxAction::UpdateSuggestion => "update_suggestion",
            AjaxAction::DeleteEntry => "delete_entry",
            AjaxAction::ApplyFixes => "apply_fixes",
        }
    }

    /// The full `action` field value for `target`.
    pub fn name(self, target: ScanTarget) -> String {
        format!("{}_{}", target.action_prefix(), self.operation())
    }

    /// Splits an `action` field value back into its target and operation.
    pub fn parse(action: &str) -> Option<(ScanTarget, AjaxAction)> {
        let (prefix, operation) = action.split_once('_')?;
        let target = ScanTarget::from_action_prefix(prefix)?;
        let action = Self::ALL.into_iter().find(|a| a.operation() == operation)?;
        Some((target, action))
    }
}

//=========================================================================================
// Envelope
//=========================================================================================

/// The `{success, data}` wrapper around every response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Value,
}

impl Envelope {
    pub fn ok<T: Serialize>(data: &T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: serde_json::json!({ "message": message.into() }),
        }
    }

    /// Turns the envelope into a tagged result. This is the only place a
    /// success flag is ever inspected.
    pub fn into_result<T: DeserializeOwned>(self) -> PortResult<T> {
        if !self.success {
            return Err(PortError::Rejected(failure_message(&self.data)));
        }
        serde_json::from_value(self.data).map_err(|e| PortError::Malformed(e.to_string()))
    }
}

/// Decodes a raw response body straight into the payload it carries.
pub fn decode<T: DeserializeOwned>(body: &str) -> PortResult<T> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| PortError::Malformed(e.to_string()))?;
    envelope.into_result()
}

/// `wp_send_json_error` sends either `{message: ...}` or a bare string.
fn failure_message(data: &Value) -> Option<String> {
    let message = match data {
        Value::String(message) => Some(message.clone()),
        Value::Object(fields) => fields
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    };
    message.filter(|message| !message.trim().is_empty())
}

//=========================================================================================
// Payloads
//=========================================================================================

/// Response to `start_scan`. The id may arrive as a number.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StartScanData {
    #[serde(deserialize_with = "string_or_number")]
    pub scan_id: String,
}

impl StartScanData {
    pub fn to_domain(self) -> PortResult<ScanId> {
        if self.scan_id.is_empty() {
            return Err(PortError::Malformed("empty scan_id".to_string()));
        }
        Ok(ScanId::new(self.scan_id))
    }
}

/// Response to `process_batch`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchData {
    #[serde(deserialize_with = "lenient_u64")]
    pub pages_processed: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub total_pages: u64,
    #[serde(deserialize_with = "lenient_bool")]
    pub completed: bool,
}

impl BatchData {
    pub fn to_domain(self) -> BatchProgress {
        BatchProgress {
            pages_processed: self.pages_processed,
            total_pages: self.total_pages,
            completed: self.completed,
        }
    }
}

impl From<BatchProgress> for BatchData {
    fn from(progress: BatchProgress) -> Self {
        Self {
            pages_processed: progress.pages_processed,
            total_pages: progress.total_pages,
            completed: progress.completed,
        }
    }
}

/// One row of a `get_results` response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResultRow {
    #[serde(deserialize_with = "lenient_u64")]
    pub id: u64,
    /// `internal` or `external`.
    #[serde(rename = "type")]
    pub origin: String,
    pub url: String,
    #[serde(default)]
    pub suggested_url: Option<String>,
    /// `fixed` or `unfixed`.
    pub status: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub found_on: Option<String>,
}

impl ResultRow {
    pub fn to_domain(self) -> PortResult<ResultRecord> {
        let origin = match self.origin.as_str() {
            "internal" => Origin::Internal,
            "external" => Origin::External,
            other => {
                return Err(PortError::Malformed(format!("unknown result type '{}'", other)))
            }
        };
        let status = match self.status.as_str() {
            "fixed" => FixStatus::Fixed,
            "unfixed" | "" => FixStatus::Unfixed,
            other => return Err(PortError::Malformed(format!("unknown status '{}'", other))),
        };
        Ok(ResultRecord {
            id: self.id,
            origin,
            url: self.url,
            suggestion: self.suggested_url.filter(|s| !s.is_empty()),
            status,
            reason: self.reason,
            found_on: self.found_on.filter(|s| !s.is_empty()),
        })
    }
}

impl From<&ResultRecord> for ResultRow {
    fn from(record: &ResultRecord) -> Self {
        Self {
            id: record.id,
            origin: record.origin.as_str().to_string(),
            url: record.url.clone(),
            suggested_url: record.suggestion.clone(),
            status: record.status.as_str().to_string(),
            reason: record.reason.clone(),
            found_on: record.found_on.clone(),
        }
    }
}

/// Response to `get_results`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResultsData {
    #[serde(default)]
    pub results: Vec<ResultRow>,
    #[serde(deserialize_with = "lenient_u64")]
    pub total: u64,
    #[serde(deserialize_with = "lenient_u32")]
    pub current_page: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub per_page: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub pages: u32,
}

impl ResultsData {
    pub fn to_domain(self) -> PortResult<ResultsPage> {
        let records = self
            .results
            .into_iter()
            .map(ResultRow::to_domain)
            .collect::<PortResult<Vec<_>>>()?;
        Ok(ResultsPage {
            records,
            total: self.total,
            current_page: self.current_page,
            per_page: self.per_page,
            pages: self.pages,
        })
    }
}

impl From<&ResultsPage> for ResultsData {
    fn from(page: &ResultsPage) -> Self {
        Self {
            results: page.records.iter().map(ResultRow::from).collect(),
            total: page.total,
            current_page: page.current_page,
            per_page: page.per_page,
            pages: page.pages,
        }
    }
}

/// Response to `apply_fixes`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FixData {
    #[serde(deserialize_with = "lenient_u64")]
    pub fixed_count: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub failed_count: u64,
}

impl From<FixSummary> for FixData {
    fn from(summary: FixSummary) -> Self {
        Self {
            fixed_count: summary.fixed,
            failed_count: summary.failed,
        }
    }
}

impl FixData {
    pub fn to_domain(self) -> FixSummary {
        FixSummary {
            fixed: self.fixed_count,
            failed: self.failed_count,
        }
    }
}

//=========================================================================================
// Lenient Scalars
//=========================================================================================
// PHP hands back numbers and booleans as strings often enough that the client
// accepts either form.

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Unsigned(u64),
    Float(f64),
    Text(String),
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match Scalar::deserialize(deserializer)? {
        Scalar::Unsigned(n) => Ok(n),
        Scalar::Float(f) if f >= 0.0 && f.fract() == 0.0 => Ok(f as u64),
        Scalar::Text(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| de::Error::custom(format!("'{}' is not a count", s))),
        _ => Err(de::Error::custom("expected a non-negative integer")),
    }
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let n = lenient_u64(deserializer)?;
    u32::try_from(n).map_err(|_| de::Error::custom(format!("{} is out of range", n)))
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match Scalar::deserialize(deserializer)? {
        Scalar::Bool(b) => Ok(b),
        Scalar::Unsigned(n) => Ok(n != 0),
        Scalar::Text(s) => match s.trim() {
            "1" | "true" => Ok(true),
            "0" | "false" | "" => Ok(false),
            other => Err(de::Error::custom(format!("'{}' is not a flag", other))),
        },
        Scalar::Float(_) => Err(de::Error::custom("expected a flag")),
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Scalar::deserialize(deserializer)? {
        Scalar::Text(s) => Ok(s),
        Scalar::Unsigned(n) => Ok(n.to_string()),
        _ => Err(de::Error::custom("expected a string or integer id")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_round_trip() {
        let name = AjaxAction::ProcessBatch.name(ScanTarget::BrokenLinks);
        assert_eq!(name, "blc_process_batch");
        assert_eq!(
            AjaxAction::parse("alt_apply_fixes"),
            Some((ScanTarget::ImageAlt, AjaxAction::ApplyFixes))
        );
        assert_eq!(AjaxAction::parse("blc_export_csv"), None);
        assert_eq!(AjaxAction::parse("heartbeat"), None);
    }

    #[test]
    fn test_success_envelope_decodes_payload() {
        let body = r#"{"success":true,"data":{"pages_processed":10,"total_pages":40,"completed":false}}"#;
        let batch: BatchData = decode(body).unwrap();
        assert_eq!(
            batch.to_domain(),
            BatchProgress { pages_processed: 10, total_pages: 40, completed: false }
        );
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let body = r#"{"success":true,"data":{"pages_processed":"40","total_pages":"40","completed":"1"}}"#;
        let batch: BatchData = decode(body).unwrap();
        assert!(batch.completed);
        assert_eq!(batch.pages_processed, 40);

        let start: StartScanData = decode(r#"{"success":true,"data":{"scan_id":17}}"#).unwrap();
        assert_eq!(start.to_domain().unwrap().as_str(), "17");
    }

    #[test]
    fn test_failure_message_is_kept_verbatim() {
        let err = decode::<FixData>(r#"{"success":false,"data":{"message":"not found"}}"#)
            .unwrap_err();
        assert_eq!(err, PortError::Rejected(Some("not found".to_string())));

        let err = decode::<FixData>(r#"{"success":false,"data":"Nonce expired"}"#).unwrap_err();
        assert_eq!(err, PortError::Rejected(Some("Nonce expired".to_string())));

        let err = decode::<FixData>(r#"{"success":false}"#).unwrap_err();
        assert_eq!(err, PortError::Rejected(None));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(decode::<FixData>("-1"), Err(PortError::Malformed(_))));
        assert!(matches!(
            decode::<FixData>(r#"{"success":true,"data":{"fixed_count":"many"}}"#),
            Err(PortError::Malformed(_))
        ));
    }

    #[test]
    fn test_results_rows_map_to_domain() {
        let body = r#"{"success":true,"data":{
            "results":[{"id":"7","type":"external","url":"https://gone.example/x",
                        "suggested_url":"","status":"unfixed","reason":"404 Not Found"}],
            "total":"1","current_page":1,"per_page":25,"pages":1}}"#;
        let page = decode::<ResultsData>(body).unwrap().to_domain().unwrap();
        let record = &page.records[0];
        assert_eq!(record.id, 7);
        assert_eq!(record.origin, Origin::External);
        assert_eq!(record.suggestion, None);
        assert_eq!(record.status, FixStatus::Unfixed);
        assert_eq!(page.total, 1);
    }

    #[test]
    fn test_unknown_result_type_is_malformed() {
        let row = ResultRow {
            id: 1,
            origin: "sideways".to_string(),
            url: String::new(),
            suggested_url: None,
            status: "fixed".to_string(),
            reason: String::new(),
            found_on: None,
        };
        assert!(matches!(row.to_domain(), Err(PortError::Malformed(_))));
    }
}
