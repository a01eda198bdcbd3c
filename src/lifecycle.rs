// ============================================================================
// Group Lifecycle Manager
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use concord_error::TxResult;
use concord_types::TransactionStatus;

use crate::storage::TransactionStore;

/// Terminal-state housekeeping for transaction groups.
pub struct GroupLifecycleManager {
    store: Arc<dyn TransactionStore>,
}

impl GroupLifecycleManager {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    /// Remove all items of a group once it reached a terminal state.
    ///
    /// Idempotent: purging a group with no remaining items succeeds.
    /// Transaction messages are NOT touched — the notification history
    /// outlives the group as an audit trail, bounded by
    /// [`sweep_messages`](Self::sweep_messages).
    pub async fn purge_group(&self, group_id: &str) -> TxResult<u64> {
        let removed = self.store.remove_items(group_id).await?;
        concord_metrics::ITEMS_PURGED_TOTAL.inc_by(removed);

        tracing::info!(
            group_id = %group_id,
            removed = removed,
            "Purged transaction group"
        );

        Ok(removed)
    }

    /// Status of some item of the group.
    ///
    /// Callers use this to decide whether to retry; an unresolvable status
    /// must read as "not committed", so any failure — no items, unmappable
    /// record, store fault — falls back to Rollback instead of raising.
    pub async fn group_status(&self, group_id: &str) -> TransactionStatus {
        match self.store.first_item_status(group_id).await {
            Ok(Some(status)) => status,
            Ok(None) => {
                tracing::debug!(
                    group_id = %group_id,
                    "No items found for group, defaulting to rollback"
                );
                TransactionStatus::Rollback
            }
            Err(e) => {
                tracing::warn!(
                    group_id = %group_id,
                    error = %e,
                    "Failed to resolve group status, defaulting to rollback"
                );
                TransactionStatus::Rollback
            }
        }
    }

    /// Delete acknowledged messages older than the retention window.
    ///
    /// Returns the number of swept messages. Unacknowledged messages are
    /// kept regardless of age.
    pub async fn sweep_messages(&self, retention: Duration) -> TxResult<u64> {
        let cutoff_ms = chrono::Utc::now().timestamp_millis() - retention.as_millis() as i64;
        let removed = self.store.remove_msgs_older_than(cutoff_ms).await?;

        if removed > 0 {
            tracing::info!(removed = removed, "Swept acknowledged transaction messages");
        }

        Ok(removed)
    }
}
