//! services/audit/src/adapters/ajax.rs
//!
//! The HTTP adapter for the `ScanService` port. Every operation is a
//! form-encoded POST to one admin-ajax endpoint, discriminated by `action`,
//! and every response envelope is decoded here so nothing above this layer
//! sees a success flag.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use site_audit_core::ports::{PortError, PortResult, ScanService};
use site_audit_core::{
    BatchProgress, EntryId, FixSummary, ResultsPage, ResultsQuery, ScanId, ScanTarget,
};
use tracing::debug;

use crate::web::protocol::{self, AjaxAction, BatchData, FixData, ResultsData, StartScanData};

/// A `ScanService` that talks to a remote admin-ajax endpoint.
#[derive(Clone)]
pub struct AjaxScanService {
    client: Client,
    endpoint: String,
    nonce: Option<String>,
    target: ScanTarget,
}

impl AjaxScanService {
    /// Creates a new adapter for one scan target.
    pub fn new(endpoint: impl Into<String>, nonce: Option<String>, target: ScanTarget) -> Self {
        Self::with_client(Client::new(), endpoint, nonce, target)
    }

    /// Creates an adapter that reuses an existing HTTP client.
    pub fn with_client(
        client: Client,
        endpoint: impl Into<String>,
        nonce: Option<String>,
        target: ScanTarget,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            nonce,
            target,
        }
    }

    pub fn target(&self) -> ScanTarget {
        self.target
    }

    /// Sends one action and decodes its envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        action: AjaxAction,
        fields: Vec<(String, String)>,
    ) -> PortResult<T> {
        let action_name = action.name(self.target);
        let mut form = vec![("action".to_string(), action_name.clone())];
        if let Some(nonce) = &self.nonce {
            form.push(("nonce".to_string(), nonce.clone()));
        }
        form.extend(fields);

        debug!(action = %action_name, "Calling scan service.");
        let response = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| PortError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PortError::Transport(e.to_string()))?;

        match protocol::decode::<T>(&body) {
            // A non-2xx status with a proper envelope still carries a usable message.
            Err(PortError::Malformed(_)) if !status.is_success() => Err(PortError::Transport(
                format!("{} returned HTTP {}", action_name, status),
            )),
            result => result,
        }
    }
}

fn field(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

#[async_trait]
impl ScanService for AjaxScanService {
    async fn start_scan(&self) -> PortResult<ScanId> {
        self.call::<StartScanData>(AjaxAction::StartScan, Vec::new())
            .await?
            .to_domain()
    }

    async fn process_batch(&self, scan_id: &ScanId) -> PortResult<BatchProgress> {
        let data: BatchData = self
            .call(AjaxAction::ProcessBatch, vec![field("scan_id", scan_id)])
            .await?;
        Ok(data.to_domain())
    }

    async fn get_results(&self, query: &ResultsQuery) -> PortResult<ResultsPage> {
        let mut fields = vec![
            field("filter", query.filter.as_str()),
            field("search", &query.search),
            field("page", query.page),
            field("per_page", query.per_page),
        ];
        if let Some(scan_id) = &query.scan_id {
            fields.push(field("scan_id", scan_id));
        }
        self.call::<ResultsData>(AjaxAction::GetResults, fields)
            .await?
            .to_domain()
    }

    async fn update_suggestion(&self, id: EntryId, new_value: &str) -> PortResult<()> {
        self.call::<serde_json::Value>(
            AjaxAction::UpdateSuggestion,
            vec![field("id", id), field("new_url", new_value)],
        )
        .await?;
        Ok(())
    }

    async fn delete_entry(&self, id: EntryId) -> PortResult<()> {
        self.call::<serde_json::Value>(AjaxAction::DeleteEntry, vec![field("id", id)])
            .await?;
        Ok(())
    }

    async fn apply_fixes(&self, ids: &[EntryId]) -> PortResult<FixSummary> {
        let fields = ids.iter().map(|id| field("ids[]", id)).collect();
        let data: FixData = self.call(AjaxAction::ApplyFixes, fields).await?;
        Ok(data.to_domain())
    }
}
