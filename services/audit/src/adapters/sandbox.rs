//! services/audit/src/adapters/sandbox.rs
//!
//! An in-memory implementation of the `ScanService` port for local
//! development and integration tests. A session walks a fixed catalog of
//! findings page by page; each batch reveals the findings that live on the
//! pages it covered. No link is ever actually fetched.

use async_trait::async_trait;
use site_audit_core::ports::{PortError, PortResult, ScanService};
use site_audit_core::{
    BatchProgress, EntryId, FixStatus, FixSummary, Origin, ResultRecord, ResultsPage,
    ResultsQuery, ScanId, ScanTarget,
};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// A finding in the catalog together with the site page it sits on.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub page: u64,
    pub record: ResultRecord,
}

#[derive(Debug, Clone, Copy)]
struct SandboxSession {
    pages_processed: u64,
    completed: bool,
}

#[derive(Default)]
struct SandboxState {
    sessions: HashMap<ScanId, SandboxSession>,
    /// Findings revealed so far, keyed by id so listings are stable.
    found: BTreeMap<EntryId, ResultRecord>,
}

pub struct SandboxScanService {
    catalog: Vec<CatalogEntry>,
    total_pages: u64,
    batch_size: u64,
    state: Mutex<SandboxState>,
}

impl SandboxScanService {
    pub fn new(catalog: Vec<CatalogEntry>, total_pages: u64, batch_size: u64) -> Self {
        Self {
            catalog,
            total_pages,
            batch_size: batch_size.max(1),
            state: Mutex::new(SandboxState::default()),
        }
    }

    /// A sandbox seeded with a deterministic catalog for `target`.
    pub fn demo(target: ScanTarget, total_pages: u64, batch_size: u64) -> Self {
        Self::new(demo_catalog(target, total_pages), total_pages, batch_size)
    }

    fn missing_entry(id: EntryId) -> PortError {
        PortError::NotFound(format!("Entry {} not found", id))
    }
}

#[async_trait]
impl ScanService for SandboxScanService {
    async fn start_scan(&self) -> PortResult<ScanId> {
        let scan_id = ScanId::new(Uuid::new_v4().to_string());
        let mut state = self.state.lock().await;
        // A new scan replaces the previous findings, like a fresh crawl would.
        state.found.clear();
        state.sessions.insert(
            scan_id.clone(),
            SandboxSession {
                pages_processed: 0,
                completed: false,
            },
        );
        info!(%scan_id, total_pages = self.total_pages, "Sandbox scan started.");
        Ok(scan_id)
    }

    async fn process_batch(&self, scan_id: &ScanId) -> PortResult<BatchProgress> {
        let mut state = self.state.lock().await;
        let session = *state
            .sessions
            .get(scan_id)
            .ok_or_else(|| PortError::NotFound(format!("Scan {} not found", scan_id)))?;

        if session.completed {
            return Ok(BatchProgress {
                pages_processed: session.pages_processed,
                total_pages: self.total_pages,
                completed: true,
            });
        }

        let start = session.pages_processed;
        let end = (start + self.batch_size).min(self.total_pages);
        for entry in self.catalog.iter().filter(|e| e.page >= start && e.page < end) {
            state.found.insert(entry.record.id, entry.record.clone());
        }
        let completed = end >= self.total_pages;
        state.sessions.insert(
            scan_id.clone(),
            SandboxSession {
                pages_processed: end,
                completed,
            },
        );
        debug!(%scan_id, pages_processed = end, completed, "Sandbox batch processed.");

        Ok(BatchProgress {
            pages_processed: end,
            total_pages: self.total_pages,
            completed,
        })
    }

    async fn get_results(&self, query: &ResultsQuery) -> PortResult<ResultsPage> {
        let state = self.state.lock().await;
        if let Some(scan_id) = &query.scan_id {
            if !state.sessions.contains_key(scan_id) {
                return Err(PortError::NotFound(format!("Scan {} not found", scan_id)));
            }
        }

        let needle = query.search.to_lowercase();
        let matching: Vec<&ResultRecord> = state
            .found
            .values()
            .filter(|r| query.filter.matches(r.origin))
            .filter(|r| {
                needle.is_empty()
                    || r.url.to_lowercase().contains(&needle)
                    || r.reason.to_lowercase().contains(&needle)
                    || r.found_on
                        .as_deref()
                        .is_some_and(|p| p.to_lowercase().contains(&needle))
            })
            .collect();

        let per_page = query.per_page.max(1);
        let page = query.page.max(1);
        let total = matching.len() as u64;
        let skip = (page as usize - 1) * per_page as usize;
        let records = matching
            .into_iter()
            .skip(skip)
            .take(per_page as usize)
            .cloned()
            .collect();

        Ok(ResultsPage {
            records,
            total,
            current_page: page,
            per_page,
            pages: ResultsPage::page_count(total, per_page),
        })
    }

    async fn update_suggestion(&self, id: EntryId, new_value: &str) -> PortResult<()> {
        let mut state = self.state.lock().await;
        let record = state.found.get_mut(&id).ok_or_else(|| Self::missing_entry(id))?;
        record.suggestion = Some(new_value.to_string()).filter(|s| !s.is_empty());
        Ok(())
    }

    async fn delete_entry(&self, id: EntryId) -> PortResult<()> {
        let mut state = self.state.lock().await;
        state
            .found
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Self::missing_entry(id))
    }

    async fn apply_fixes(&self, ids: &[EntryId]) -> PortResult<FixSummary> {
        let mut state = self.state.lock().await;
        let mut summary = FixSummary::default();
        for id in ids {
            match state.found.get_mut(id) {
                Some(record) if record.suggestion.is_some() => {
                    record.status = FixStatus::Fixed;
                    summary.fixed += 1;
                }
                _ => summary.failed += 1,
            }
        }
        info!(fixed = summary.fixed, failed = summary.failed, "Sandbox fixes applied.");
        Ok(summary)
    }
}

/// Builds a catalog with a finding on every third page, alternating between
/// internal and external origins.
pub fn demo_catalog(target: ScanTarget, total_pages: u64) -> Vec<CatalogEntry> {
    (0..total_pages)
        .filter(|page| page % 3 == 0)
        .enumerate()
        .map(|(n, page)| {
            let id = n as EntryId + 1;
            let internal = n % 2 == 0;
            let origin = if internal { Origin::Internal } else { Origin::External };
            let found_on = Some(format!("https://example.com/blog/post-{}/", page));
            let record = match target {
                ScanTarget::BrokenLinks => ResultRecord {
                    id,
                    origin,
                    url: if internal {
                        format!("https://example.com/blog/old-post-{}/", page)
                    } else {
                        format!("https://partner-{}.example.net/resource", page)
                    },
                    suggestion: internal.then(|| format!("https://example.com/blog/post-{}/", page)),
                    status: FixStatus::Unfixed,
                    reason: (if internal { "404 Not Found" } else { "Connection timed out" })
                        .to_string(),
                    found_on,
                },
                ScanTarget::ImageAlt => ResultRecord {
                    id,
                    origin,
                    url: if internal {
                        format!("https://example.com/wp-content/uploads/photo-{}.jpg", page)
                    } else {
                        format!("https://cdn.example.net/img/banner-{}.png", page)
                    },
                    suggestion: internal.then(|| format!("Photo from post {}", page)),
                    status: FixStatus::Unfixed,
                    reason: "Missing alt text".to_string(),
                    found_on,
                },
            };
            CatalogEntry { page, record }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use site_audit_core::ResultFilter;

    fn entry(id: EntryId, page: u64, origin: Origin) -> CatalogEntry {
        CatalogEntry {
            page,
            record: ResultRecord {
                id,
                origin,
                url: format!("https://example.com/gone-{}", id),
                suggestion: None,
                status: FixStatus::Unfixed,
                reason: "404 Not Found".to_string(),
                found_on: None,
            },
        }
    }

    fn query(scan_id: &ScanId, filter: ResultFilter, page: u32, per_page: u32) -> ResultsQuery {
        ResultsQuery {
            scan_id: Some(scan_id.clone()),
            filter,
            search: String::new(),
            page,
            per_page,
        }
    }

    async fn run_to_completion(service: &SandboxScanService) -> ScanId {
        let scan_id = service.start_scan().await.unwrap();
        while !service.process_batch(&scan_id).await.unwrap().completed {}
        scan_id
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_terminal_state_is_idempotent() {
        let service = SandboxScanService::demo(ScanTarget::BrokenLinks, 40, 10);
        let scan_id = service.start_scan().await.unwrap();

        let mut seen = Vec::new();
        loop {
            let progress = service.process_batch(&scan_id).await.unwrap();
            seen.push(progress.pages_processed);
            if progress.completed {
                break;
            }
        }
        assert_eq!(seen, vec![10, 20, 30, 40]);

        let again = service.process_batch(&scan_id).await.unwrap();
        assert_eq!(
            again,
            BatchProgress { pages_processed: 40, total_pages: 40, completed: true }
        );
    }

    #[tokio::test]
    async fn test_findings_appear_as_pages_are_processed() {
        let catalog = vec![
            entry(1, 0, Origin::Internal),
            entry(2, 5, Origin::External),
            entry(3, 15, Origin::Internal),
        ];
        let service = SandboxScanService::new(catalog, 20, 10);
        let scan_id = service.start_scan().await.unwrap();

        service.process_batch(&scan_id).await.unwrap();
        let partial = service
            .get_results(&query(&scan_id, ResultFilter::All, 1, 25))
            .await
            .unwrap();
        assert_eq!(partial.total, 2);

        service.process_batch(&scan_id).await.unwrap();
        let full = service
            .get_results(&query(&scan_id, ResultFilter::All, 1, 25))
            .await
            .unwrap();
        assert_eq!(full.total, 3);
    }

    #[tokio::test]
    async fn test_filtered_second_page_of_thirty() {
        let mut catalog: Vec<CatalogEntry> =
            (1..=30).map(|id| entry(id, 0, Origin::Internal)).collect();
        catalog.extend((31..=38).map(|id| entry(id, 0, Origin::External)));
        let service = SandboxScanService::new(catalog, 1, 1);
        let scan_id = run_to_completion(&service).await;

        let page = service
            .get_results(&query(&scan_id, ResultFilter::Internal, 2, 25))
            .await
            .unwrap();

        assert_eq!(page.records.len(), 5);
        assert_eq!(page.total, 30);
        assert_eq!(page.pages, 2);
        assert_eq!(page.current_page, 2);
        assert!(page.records.iter().all(|r| r.origin == Origin::Internal));
    }

    #[tokio::test]
    async fn test_search_matches_url_reason_and_page() {
        let service = SandboxScanService::demo(ScanTarget::BrokenLinks, 12, 12);
        let scan_id = run_to_completion(&service).await;

        let mut by_url = query(&scan_id, ResultFilter::All, 1, 25);
        by_url.search = "PARTNER".to_string();
        let page = service.get_results(&by_url).await.unwrap();
        assert!(page.total > 0);
        assert!(page.records.iter().all(|r| r.origin == Origin::External));
    }

    #[tokio::test]
    async fn test_point_edits() {
        let service = SandboxScanService::new(
            vec![entry(1, 0, Origin::Internal), entry(2, 0, Origin::Internal)],
            1,
            1,
        );
        let scan_id = run_to_completion(&service).await;

        service
            .update_suggestion(1, "https://example.com/new-home/")
            .await
            .unwrap();
        let summary = service.apply_fixes(&[1, 2, 99]).await.unwrap();
        assert_eq!(summary, FixSummary { fixed: 1, failed: 2 });

        let listing = service
            .get_results(&query(&scan_id, ResultFilter::All, 1, 25))
            .await
            .unwrap();
        assert_eq!(listing.records[0].status, FixStatus::Fixed);
        assert_eq!(listing.records[1].status, FixStatus::Unfixed);

        service.delete_entry(2).await.unwrap();
        let err = service.delete_entry(2).await.unwrap_err();
        assert_eq!(err.user_message(), "Entry 2 not found");
        assert!(service.update_suggestion(2, "x").await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_scan_is_not_found() {
        let service = SandboxScanService::demo(ScanTarget::ImageAlt, 3, 1);
        let err = service
            .process_batch(&ScanId::from("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }
}
