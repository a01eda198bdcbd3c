// ============================================================================
// Shared Constants
// ============================================================================

pub const SECONDS_PER_MINUTE: i64 = 60;
pub const SECONDS_PER_HOUR: i64 = 3600;
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Upper bound on a single dispatch batch (publish + persist of every
/// notification of one item), after which the report fails and the status
/// update is skipped.
pub const DEFAULT_DISPATCH_TIMEOUT_MS: u64 = 3000;

/// Audit window for acknowledged transaction messages; the retention sweep
/// deletes older records.
pub const DEFAULT_MSG_RETENTION_DAYS: i64 = 7;
