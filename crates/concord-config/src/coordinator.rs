// ============================================================================
// Coordinator Configuration
// ============================================================================

use crate::constants::{DEFAULT_DISPATCH_TIMEOUT_MS, DEFAULT_MSG_RETENTION_DAYS};

/// Tuning knobs of the status coordinator
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Upper bound on one item's dispatch batch (milliseconds). A transport
    /// stall past this bound fails the report; the status update is skipped
    /// and the caller retries.
    pub dispatch_timeout_ms: u64,

    /// Retention window for acknowledged transaction messages (days)
    pub msg_retention_days: i64,
}

impl CoordinatorConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            dispatch_timeout_ms: std::env::var("CONCORD_DISPATCH_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_DISPATCH_TIMEOUT_MS),
            msg_retention_days: std::env::var("CONCORD_MSG_RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MSG_RETENTION_DAYS),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            dispatch_timeout_ms: DEFAULT_DISPATCH_TIMEOUT_MS,
            msg_retention_days: DEFAULT_MSG_RETENTION_DAYS,
        }
    }
}
