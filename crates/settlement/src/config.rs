use std::time::Duration;

use crate::retry::RetryPolicy;

/// Default bound on a single storage call.
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables for the checkout orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementConfig {
    /// Upper bound on each resolve, reserve and append call.
    pub storage_timeout: Duration,
    /// Retry schedule for ledger appends.
    pub append_retry: RetryPolicy,
}

impl SettlementConfig {
    pub fn new(storage_timeout: Duration, append_attempts: usize) -> Self {
        Self {
            storage_timeout,
            append_retry: RetryPolicy::ledger_append(append_attempts),
        }
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
            append_retry: RetryPolicy::default(),
        }
    }
}
