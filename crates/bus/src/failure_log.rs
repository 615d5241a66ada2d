//! FailureLog - Bounded record of non-critical handler failures

use shared::{NonCriticalHandlerFailure, SubscriptionId};
use std::collections::{BTreeMap, VecDeque};

/// Failure log
///
/// Oldest entries are evicted once `max_entries` is reached. The running
/// total keeps counting evicted entries.
#[derive(Debug)]
pub struct FailureLog {
    entries: VecDeque<NonCriticalHandlerFailure>,
    max_entries: usize,
    total_recorded: u64,
}

impl FailureLog {
    /// Create a new FailureLog
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_entries),
            max_entries,
            total_recorded: 0,
        }
    }

    /// Record a failure
    pub fn record(&mut self, failure: NonCriticalHandlerFailure) {
        self.total_recorded += 1;
        if self.max_entries == 0 {
            return;
        }
        if self.entries.len() >= self.max_entries {
            self.entries.pop_front();
        }
        self.entries.push_back(failure);
    }

    /// Most recent failures first
    pub fn get_recent(&self, limit: usize) -> Vec<&NonCriticalHandlerFailure> {
        self.entries.iter().rev().take(limit).collect()
    }

    /// Retained failures of one subscription, oldest first
    pub fn for_subscription(&self, id: SubscriptionId) -> Vec<&NonCriticalHandlerFailure> {
        self.entries
            .iter()
            .filter(|f| f.subscription_id == id)
            .collect()
    }

    /// Get statistics
    pub fn get_stats(&self) -> FailureStats {
        let mut by_event: BTreeMap<String, usize> = BTreeMap::new();
        for failure in &self.entries {
            *by_event.entry(failure.event_name.clone()).or_default() += 1;
        }

        FailureStats {
            total_recorded: self.total_recorded,
            retained: self.entries.len(),
            by_event,
        }
    }

    /// Export retained entries as JSON
    pub fn export_json(&self) -> serde_json::Value {
        serde_json::to_value(self.entries.iter().collect::<Vec<_>>()).unwrap_or_default()
    }
}

impl Default for FailureLog {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Failure statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureStats {
    /// Failures seen since the bus was created, including evicted ones
    pub total_recorded: u64,
    /// Failures still held in the log
    pub retained: usize,
    /// Retained failures per event name
    pub by_event: BTreeMap<String, usize>,
}
