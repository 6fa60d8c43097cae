// Write-coalescing persistence queue
// Metadata and settings saves are requested often and written rarely: any
// number of requests for one target between flushes produce a single write.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::host::ChatContext;
use crate::types::errors::HostError;
use crate::types::settings::ExtensionSettings;

/// Something that can be scheduled for persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistTarget {
    ActiveChatMetadata,
    ExtensionSettings,
}

/// Outcome of one flush.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlushReport {
    pub written: Vec<PersistTarget>,
    pub failed: Vec<(PersistTarget, String)>,
}

/// Pending persistence requests.
#[derive(Debug, Default)]
pub struct WriteQueue {
    pending: BTreeSet<PersistTarget>,
    first_request: Option<Instant>,
    requested: u64,
    written: u64,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a write. Repeated requests before a flush coalesce.
    pub fn request(&mut self, target: PersistTarget) {
        self.requested += 1;
        if self.pending.insert(target) {
            debug!(?target, "persistence requested");
        }
        self.first_request.get_or_insert_with(Instant::now);
    }

    pub fn is_pending(&self, target: PersistTarget) -> bool {
        self.pending.contains(&target)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Whether the oldest pending request has waited at least `debounce`.
    pub fn is_due(&self, now: Instant, debounce: Duration) -> bool {
        self.first_request
            .is_some_and(|first| now.saturating_duration_since(first) >= debounce)
    }

    /// Total `request` calls since creation.
    pub fn requested_count(&self) -> u64 {
        self.requested
    }

    /// Total writes actually performed since creation.
    pub fn written_count(&self) -> u64 {
        self.written
    }

    /// Performs every pending write. Failed targets stay pending so the next
    /// flush retries them.
    pub fn flush<C: ChatContext>(&mut self, context: &mut C, settings: &ExtensionSettings) -> FlushReport {
        let mut report = FlushReport::default();
        let targets: Vec<PersistTarget> = self.pending.iter().copied().collect();

        for target in targets {
            let result: Result<(), HostError> = match target {
                PersistTarget::ActiveChatMetadata => context.write_active_metadata(),
                PersistTarget::ExtensionSettings => context.write_settings(settings),
            };
            match result {
                Ok(()) => {
                    self.pending.remove(&target);
                    self.written += 1;
                    report.written.push(target);
                }
                Err(e) => {
                    warn!(?target, error = %e, "persistence failed, will retry");
                    report.failed.push((target, e.to_string()));
                }
            }
        }

        self.first_request = if self.pending.is_empty() {
            None
        } else {
            Some(Instant::now())
        };
        report
    }
}
