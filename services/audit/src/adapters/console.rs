//! services/audit/src/adapters/console.rs
//!
//! Terminal implementations of the `ResultsView` and `Confirmer` ports used
//! by the `audit-scan` binary.

use async_trait::async_trait;
use site_audit_core::ports::{Confirmation, Confirmer, Notice, ResultsView};
use site_audit_core::{BatchProgress, EntryId, FixStatus, ResultsPage, ScanTarget};
use std::io::{BufRead, Write};
use tracing::{info, warn};

/// Prints progress, notices and result pages to stdout.
pub struct ConsoleView {
    target: ScanTarget,
}

impl ConsoleView {
    pub fn new(target: ScanTarget) -> Self {
        Self { target }
    }
}

fn progress_bar(percent: u8) -> String {
    let filled = usize::from(percent) / 5;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(20 - filled))
}

impl ResultsView for ConsoleView {
    fn show_progress(&self, progress: &BatchProgress, percent: u8) {
        println!(
            "{} {:>3}%  {} / {} pages",
            progress_bar(percent),
            percent,
            progress.pages_processed,
            progress.total_pages
        );
    }

    fn hide_progress(&self) {}

    fn set_start_enabled(&self, enabled: bool) {
        info!(enabled, "Start control toggled.");
    }

    fn render_results(&self, page: &ResultsPage) {
        println!(
            "-- {}: {} finding(s), page {} of {} --",
            self.target.label(),
            page.total,
            page.current_page,
            page.pages.max(1)
        );
        for record in &page.records {
            let mark = match record.status {
                FixStatus::Fixed => "fixed",
                FixStatus::Unfixed => "open",
            };
            println!(
                "#{:<5} {:<8} {:<6} {}  ({})",
                record.id,
                record.origin.as_str(),
                mark,
                record.url,
                record.reason
            );
            if let Some(suggestion) = &record.suggestion {
                println!("       -> {}", suggestion);
            }
        }
    }

    fn update_row(&self, id: EntryId, suggestion: &str) {
        println!("#{:<5} -> {}", id, suggestion);
    }

    fn remove_row(&self, id: EntryId) {
        println!("#{:<5} removed", id);
    }

    fn notify(&self, notice: &Notice) {
        match notice {
            Notice::Error(_) | Notice::ScanAlreadyRunning | Notice::NothingSelected => {
                warn!("{}", notice);
                eprintln!("{}", notice);
            }
            _ => println!("{}", notice),
        }
    }
}

/// Asks on stdin, or says yes to everything when `assume_yes` is set.
pub struct ConsoleConfirmer {
    assume_yes: bool,
}

impl ConsoleConfirmer {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

#[async_trait]
impl Confirmer for ConsoleConfirmer {
    async fn confirm(&self, request: &Confirmation) -> bool {
        if self.assume_yes {
            return true;
        }
        let prompt = request.to_string();
        // Reading stdin blocks, so keep it off the runtime's worker threads.
        let answer = tokio::task::spawn_blocking(move || {
            print!("{} [y/N] ", prompt);
            std::io::stdout().flush().ok();
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).ok();
            line
        })
        .await
        .unwrap_or_default();
        is_yes(&answer)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
