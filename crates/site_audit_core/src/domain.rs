//! crates/site_audit_core/src/domain.rs
//!
//! Defines the pure, core data structures for the scan orchestrator.
//! These structs are independent of any transport or serialization format.

use std::fmt;
use std::str::FromStr;

/// Identifier of a single finding owned by the scan service.
pub type EntryId = u64;

/// Opaque, server-assigned identifier of a scan session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanId(String);

impl ScanId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScanId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ScanId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

//=========================================================================================
// Scan Targets and Result Records
//=========================================================================================

/// Which admin tool a scan belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanTarget {
    /// The broken-link scanner/fixer.
    BrokenLinks,
    /// The image alt-text manager.
    ImageAlt,
}

impl ScanTarget {
    /// The prefix of every remote action name for this target.
    pub fn action_prefix(self) -> &'static str {
        match self {
            ScanTarget::BrokenLinks => "blc",
            ScanTarget::ImageAlt => "alt",
        }
    }

    pub fn from_action_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "blc" => Some(ScanTarget::BrokenLinks),
            "alt" => Some(ScanTarget::ImageAlt),
            _ => None,
        }
    }

    /// Human-readable name used in notices and logs.
    pub fn label(self) -> &'static str {
        match self {
            ScanTarget::BrokenLinks => "broken links",
            ScanTarget::ImageAlt => "image alt text",
        }
    }
}

impl FromStr for ScanTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "links" | "broken-links" | "blc" => Ok(ScanTarget::BrokenLinks),
            "images" | "image-alt" | "alt" => Ok(ScanTarget::ImageAlt),
            other => Err(format!("'{}' is not a scan target (links, images)", other)),
        }
    }
}

/// Whether a finding points inside or outside the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Internal,
    External,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Internal => "internal",
            Origin::External => "external",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixStatus {
    Fixed,
    Unfixed,
}

impl FixStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FixStatus::Fixed => "fixed",
            FixStatus::Unfixed => "unfixed",
        }
    }
}

/// One finding (broken link or image) produced by a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub id: EntryId,
    pub origin: Origin,
    /// The broken URL, or the image source for alt-text findings.
    pub url: String,
    /// Replacement URL or alt text, supplied by the server or the user.
    pub suggestion: Option<String>,
    pub status: FixStatus,
    pub reason: String,
    /// The page on which the finding was discovered, when known.
    pub found_on: Option<String>,
}

//=========================================================================================
// Result Pages and Queries
//=========================================================================================

/// The filter applied to a results listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResultFilter {
    #[default]
    All,
    Internal,
    External,
}

impl ResultFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultFilter::All => "all",
            ResultFilter::Internal => "internal",
            ResultFilter::External => "external",
        }
    }

    pub fn matches(self, origin: Origin) -> bool {
        match self {
            ResultFilter::All => true,
            ResultFilter::Internal => origin == Origin::Internal,
            ResultFilter::External => origin == Origin::External,
        }
    }
}

impl FromStr for ResultFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "all" => Ok(ResultFilter::All),
            "internal" => Ok(ResultFilter::Internal),
            "external" => Ok(ResultFilter::External),
            other => Err(format!("unknown filter '{}'", other)),
        }
    }
}

/// A fully-specified request for one page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsQuery {
    pub scan_id: Option<ScanId>,
    pub filter: ResultFilter,
    pub search: String,
    pub page: u32,
    pub per_page: u32,
}

/// One page of findings plus the pagination metadata the view needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsPage {
    pub records: Vec<ResultRecord>,
    pub total: u64,
    pub current_page: u32,
    pub per_page: u32,
    pub pages: u32,
}

impl ResultsPage {
    /// Number of pages needed to list `total` records `per_page` at a time.
    pub fn page_count(total: u64, per_page: u32) -> u32 {
        if per_page == 0 {
            return 0;
        }
        let pages = total.div_ceil(u64::from(per_page));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }
}

//=========================================================================================
// Scan Progress
//=========================================================================================

/// The counters reported by one `process_batch` response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchProgress {
    pub pages_processed: u64,
    pub total_pages: u64,
    pub completed: bool,
}

impl BatchProgress {
    pub fn percent(&self) -> u8 {
        progress_percent(self.pages_processed, self.total_pages)
    }
}

/// Integer percentage of `processed` over `total`, rounded to nearest and
/// clamped to `0..=100`. An unknown total (`0`) reports `0`.
pub fn progress_percent(processed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let processed = u128::from(processed.min(total));
    let total = u128::from(total);
    let percent = (processed * 100 + total / 2) / total;
    percent.min(100) as u8
}

/// Outcome counts of an `apply_fixes` call. Partial failure is expected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixSummary {
    pub fixed: u64,
    pub failed: u64,
}

//=========================================================================================
// Client View State
//=========================================================================================

pub const DEFAULT_PER_PAGE: u32 = 20;

/// Filter, search and pagination state of one admin screen. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientViewState {
    filter: ResultFilter,
    search: String,
    page: u32,
    per_page: u32,
}

impl Default for ClientViewState {
    fn default() -> Self {
        Self::new(DEFAULT_PER_PAGE)
    }
}

impl ClientViewState {
    pub fn new(per_page: u32) -> Self {
        Self {
            filter: ResultFilter::All,
            search: String::new(),
            page: 1,
            per_page: per_page.max(1),
        }
    }

    pub fn filter(&self) -> ResultFilter {
        self.filter
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Changes the filter and goes back to the first page.
    pub fn set_filter(&mut self, filter: ResultFilter) {
        self.filter = filter;
        self.page = 1;
    }

    /// Changes the search string and goes back to the first page.
    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into().trim().to_string();
        self.page = 1;
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    pub fn query(&self, scan_id: Option<ScanId>) -> ResultsQuery {
        ResultsQuery {
            scan_id,
            filter: self.filter,
            search: self.search.clone(),
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_zero_when_total_unknown() {
        assert_eq!(progress_percent(0, 0), 0);
        assert_eq!(progress_percent(12, 0), 0);
    }

    #[test]
    fn percent_rounds_and_clamps() {
        assert_eq!(progress_percent(10, 40), 25);
        assert_eq!(progress_percent(40, 40), 100);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(55, 40), 100);
        assert_eq!(progress_percent(u64::MAX, u64::MAX), 100);
    }

    #[test]
    fn percent_follows_revised_total() {
        let first = BatchProgress { pages_processed: 10, total_pages: 20, completed: false };
        let revised = BatchProgress { pages_processed: 15, total_pages: 60, completed: false };
        assert_eq!(first.percent(), 50);
        assert_eq!(revised.percent(), 25);
    }

    #[test]
    fn filter_and_search_reset_page() {
        let mut state = ClientViewState::new(25);
        state.set_page(4);
        state.set_filter(ResultFilter::External);
        assert_eq!(state.page(), 1);

        state.set_page(3);
        state.set_search("  wp-content ");
        assert_eq!(state.page(), 1);
        assert_eq!(state.search(), "wp-content");

        let query = state.query(Some(ScanId::from("s1")));
        assert_eq!(query.filter, ResultFilter::External);
        assert_eq!(query.per_page, 25);
        assert_eq!(query.scan_id.as_ref().map(ScanId::as_str), Some("s1"));
    }

    #[test]
    fn page_never_drops_below_one() {
        let mut state = ClientViewState::default();
        state.set_page(0);
        assert_eq!(state.page(), 1);
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(ResultsPage::page_count(30, 25), 2);
        assert_eq!(ResultsPage::page_count(25, 25), 1);
        assert_eq!(ResultsPage::page_count(0, 25), 0);
        assert_eq!(ResultsPage::page_count(10, 0), 0);
    }

    #[test]
    fn parses_targets_and_filters() {
        assert_eq!("links".parse::<ScanTarget>(), Ok(ScanTarget::BrokenLinks));
        assert_eq!("Images".parse::<ScanTarget>(), Ok(ScanTarget::ImageAlt));
        assert!("videos".parse::<ScanTarget>().is_err());
        assert_eq!("".parse::<ResultFilter>(), Ok(ResultFilter::All));
        assert_eq!("internal".parse::<ResultFilter>(), Ok(ResultFilter::Internal));
        assert!(ResultFilter::External.matches(Origin::External));
        assert!(!ResultFilter::External.matches(Origin::Internal));
    }
}
