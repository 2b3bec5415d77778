//! Per-peer buffer of remote candidates awaiting application

use tracing::{debug, warn};

use crate::codec::{IceCandidate, PeerId};
use crate::engine::ConnectionEngine;

/// Outcome of one flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Candidates the engine accepted
    pub applied: usize,
    /// Null or empty entries
    pub skipped: usize,
    /// Candidates the engine rejected; never retried
    pub failed: usize,
}

/// Remote candidates in arrival order
///
/// Entries are append-only. A flush hands every entry not yet flushed to the
/// engine exactly once, so flushing twice never re-applies a candidate.
#[derive(Debug, Default)]
pub struct CandidateCache {
    entries: Vec<Option<IceCandidate>>,
    /// Index of the first entry not yet flushed
    flushed: usize,
}

impl CandidateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candidate: Option<IceCandidate>) {
        self.entries.push(candidate);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries waiting for the next flush
    pub fn pending(&self) -> usize {
        self.entries.len() - self.flushed
    }

    /// Apply every pending candidate to `engine`, in insertion order
    ///
    /// A rejected candidate is logged and skipped; the rest of the flush
    /// continues.
    pub async fn flush(&mut self, engine: &mut dyn ConnectionEngine, peer: &PeerId) -> FlushReport {
        let mut report = FlushReport::default();

        while self.flushed < self.entries.len() {
            let index = self.flushed;
            // Advance first: an entry is handed to the engine at most once
            self.flushed += 1;

            let candidate = match &self.entries[index] {
                Some(c) if !c.candidate.is_empty() => c.clone(),
                _ => {
                    report.skipped += 1;
                    continue;
                }
            };

            match engine.add_remote_candidate(candidate).await {
                Ok(()) => report.applied += 1,
                Err(err) => {
                    warn!(peer = %peer, index, error = %err, "failed to add remote candidate");
                    report.failed += 1;
                }
            }
        }

        debug!(
            peer = %peer,
            applied = report.applied,
            skipped = report.skipped,
            failed = report.failed,
            "flushed candidate cache"
        );
        report
    }

    /// Drop all entries, flushed or not
    pub fn clear(&mut self) {
        self.entries.clear();
        self.flushed = 0;
    }
}
