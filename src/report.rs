//! Run counters and the end-of-run summary

use crate::catalog::CatalogEntry;
use crate::pipeline::{EntryOutcome, Stage};
use std::fmt::Write;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunStats {
    /// Percentage of attempted entries that were published
    ///
    /// `None` when nothing was attempted (everything skipped or empty run).
    pub fn success_rate(&self) -> Option<f64> {
        let attempted = self.processed + self.failed;
        if attempted == 0 {
            None
        } else {
            Some(self.processed as f64 / attempted as f64 * 100.0)
        }
    }
}

/// Context kept for every failed entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub name: String,
    pub bundle_id: String,
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub stats: RunStats,
    pub failures: Vec<FailureRecord>,
    /// Published bundle ids whose ledger save failed; a re-run publishes them again
    pub unsaved: Vec<String>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: &CatalogEntry, outcome: &EntryOutcome) {
        match outcome {
            EntryOutcome::Skipped => self.stats.skipped += 1,
            EntryOutcome::Published(published) => {
                self.stats.processed += 1;
                if !published.ledger_saved {
                    self.unsaved.push(entry.bundle_identifier.clone());
                }
            }
            EntryOutcome::Failed { stage, error } => {
                self.stats.failed += 1;
                self.failures.push(FailureRecord {
                    name: entry.name.clone(),
                    bundle_id: entry.bundle_identifier.clone(),
                    stage: *stage,
                    message: error.to_string(),
                });
            }
        }
    }

    /// Render the summary; `tracked` is the ledger size after the run
    pub fn summary(&self, tracked: usize) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();

        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "🏁 UPLOAD COMPLETED - SESSION SUMMARY");
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "   🎯 Successfully processed: {} apps", self.stats.processed);
        let _ = writeln!(out, "   ⏭️  Skipped (already uploaded): {} apps", self.stats.skipped);
        let _ = writeln!(out, "   ❌ Failed: {} apps", self.stats.failed);
        let _ = writeln!(out, "   📊 Total unique apps tracked: {} apps", tracked);

        if !self.failures.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "⚠️  ATTENTION: {} apps failed to upload", self.failures.len());
            for failure in &self.failures {
                let _ = writeln!(
                    out,
                    "   • {} ({}) at {}: {}",
                    failure.name,
                    failure.bundle_id,
                    failure.stage,
                    first_line(&failure.message)
                );
            }
        }

        if !self.unsaved.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "⚠️  {} published apps are not in the ledger and will be uploaded again:",
                self.unsaved.len()
            );
            for bundle_id in &self.unsaved {
                let _ = writeln!(out, "   • {}", bundle_id);
            }
        }

        let _ = writeln!(out);
        match self.stats.success_rate() {
            Some(rate) => {
                let _ = writeln!(out, "📈 SUCCESS RATE: {:.1}%", rate);
            }
            None => {
                let _ = writeln!(out, "📈 SUCCESS RATE: N/A");
            }
        }
        let _ = write!(out, "{}", rule);

        out
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or("")
}
