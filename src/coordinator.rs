// ============================================================================
// Status Coordinator
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use concord_config::CoordinatorConfig;
use concord_error::{TxError, TxResult};
use concord_types::{TransactionGroup, TransactionItem, TransactionStatus};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::dispatcher::MessageDispatcher;
use crate::lifecycle::GroupLifecycleManager;
use crate::storage::{ItemUpdate, TransactionStore};
use crate::transport::MessageTransport;

/// Caller-facing facade over the status-coordination core.
///
/// The central operation is [`report_item_status`](Self::report_item_status):
/// an item's status becomes final only after every completion notification
/// of its batch was published and durably recorded. A failed report leaves
/// the stored status untouched and must be retried as a whole; retries can
/// re-publish notifications (at-least-once).
pub struct TxCoordinator {
    store: Arc<dyn TransactionStore>,
    dispatcher: MessageDispatcher,
    lifecycle: GroupLifecycleManager,
    /// Serializes reports per (group_id, task_key); see report_item_status
    item_locks: DashMap<(String, String), Arc<Mutex<()>>>,
    dispatch_timeout: Duration,
}

impl TxCoordinator {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        transport: Arc<dyn MessageTransport>,
        config: &CoordinatorConfig,
    ) -> Self {
        Self {
            dispatcher: MessageDispatcher::new(store.clone(), transport),
            lifecycle: GroupLifecycleManager::new(store.clone()),
            store,
            item_locks: DashMap::new(),
            dispatch_timeout: Duration::from_millis(config.dispatch_timeout_ms),
        }
    }

    // ===== Group/item CRUD =====

    /// Persist a group's items, each tagged with the group id.
    ///
    /// A partial write (some items inserted, one failing) is reported as
    /// overall failure without rolling back the inserted items; callers
    /// must treat a failed create as at-least-one-inserted-or-unknown.
    pub async fn create_group(&self, group: &TransactionGroup) -> TxResult<()> {
        for item in &group.items {
            let mut item = item.clone();
            item.group_id = group.id.clone();
            self.store.insert_item(&item).await?;
        }

        tracing::info!(
            group_id = %group.id,
            items = group.items.len(),
            "Created transaction group"
        );

        Ok(())
    }

    /// Insert a single item into an existing group
    pub async fn add_item(&self, group_id: &str, item: &TransactionItem) -> TxResult<()> {
        let mut item = item.clone();
        item.group_id = group_id.to_string();
        self.store.insert_item(&item).await?;

        tracing::debug!(
            group_id = %group_id,
            task_key = %item.task_key,
            "Added transaction item"
        );

        Ok(())
    }

    /// All items of a group, order not guaranteed
    pub async fn list_items(&self, group_id: &str) -> TxResult<Vec<TransactionItem>> {
        Ok(self.store.list_items(group_id).await?)
    }

    // ===== Status reporting =====

    /// Record a participant's sub-transaction outcome.
    ///
    /// Loads the item, dispatches its embedded pending-message batch, and
    /// only if every message was published and persisted applies the status
    /// code, optional result message, and elapsed processing time in one
    /// update. On any dispatch failure the stored status is untouched and
    /// the whole report must be retried.
    ///
    /// Concurrent reports for the same (group_id, task_key) are serialized;
    /// without that, both could read the pre-update item and dispatch the
    /// batch twice.
    pub async fn report_item_status(
        &self,
        group_id: &str,
        task_key: &str,
        status: TransactionStatus,
        message: Option<String>,
    ) -> TxResult<()> {
        let lock = self.item_lock(group_id, task_key);
        let _guard = lock.lock().await;

        let result = self
            .report_locked(group_id, task_key, status, message)
            .await;

        match &result {
            Ok(()) => {
                concord_metrics::STATUS_REPORTS_TOTAL
                    .with_label_values(&["ok"])
                    .inc();
            }
            Err(e) => {
                e.log();
                concord_metrics::STATUS_REPORTS_TOTAL
                    .with_label_values(&[e.error_code()])
                    .inc();
            }
        }

        result
    }

    async fn report_locked(
        &self,
        group_id: &str,
        task_key: &str,
        status: TransactionStatus,
        message: Option<String>,
    ) -> TxResult<()> {
        let item = self
            .store
            .find_item(group_id, task_key)
            .await?
            .ok_or_else(|| TxError::ItemNotFound {
                group_id: group_id.to_string(),
                task_key: task_key.to_string(),
            })?;

        let pending = item.pending_messages().map_err(|e| TxError::Decode {
            group_id: group_id.to_string(),
            reason: e.to_string(),
        })?;

        if item.dispatch_pending {
            tracing::warn!(
                group_id = %group_id,
                task_key = %task_key,
                "Item already marked dispatch-pending, a previous report may have \
                 dispatched; downstream may see duplicates"
            );
        }

        // Two-phase marker: set before the first publish, cleared by the
        // final status update. Left set on failure so the unfinished report
        // is visible to the retry.
        self.store
            .set_dispatch_pending(group_id, task_key, true)
            .await?;

        let dispatched = tokio::time::timeout(
            self.dispatch_timeout,
            self.dispatcher.dispatch(group_id, &pending),
        )
        .await
        .map_err(|_| TxError::DispatchTimeout {
            group_id: group_id.to_string(),
            timeout_ms: self.dispatch_timeout.as_millis() as u64,
        })??;

        // Elapsed time is best-effort: an unparseable creation timestamp
        // degrades to an absent field, it never fails the report.
        let consume_time = match item.parse_create_time() {
            Ok(created) => {
                let elapsed = (chrono::Utc::now().naive_utc() - created).num_seconds();
                Some(elapsed.max(0))
            }
            Err(e) => {
                tracing::warn!(
                    group_id = %group_id,
                    task_key = %task_key,
                    create_time = %item.create_time,
                    error = %e,
                    "Unparseable item creation time, omitting consume time"
                );
                None
            }
        };

        let matched = self
            .store
            .update_item(
                group_id,
                task_key,
                &ItemUpdate {
                    status,
                    message,
                    consume_time,
                },
            )
            .await?;

        if matched == 0 {
            return Err(TxError::ItemNotFound {
                group_id: group_id.to_string(),
                task_key: task_key.to_string(),
            });
        }

        tracing::info!(
            group_id = %group_id,
            task_key = %task_key,
            status = %status.as_str(),
            dispatched = dispatched,
            "Transaction item status reported"
        );

        Ok(())
    }

    // ===== Acknowledgment =====

    /// Overwrite the consumed flag of a dispatched message; fails when no
    /// message matches (group_id, sub_task_id).
    pub async fn acknowledge_message(
        &self,
        group_id: &str,
        sub_task_id: &str,
        consumed: i32,
    ) -> TxResult<()> {
        self.dispatcher
            .acknowledge(group_id, sub_task_id, consumed)
            .await
    }

    // ===== Lifecycle =====

    /// Remove all items of a terminal group. Idempotent.
    pub async fn purge_group(&self, group_id: &str) -> TxResult<u64> {
        self.lifecycle.purge_group(group_id).await
    }

    /// Status of some item of the group; Rollback on any resolution
    /// failure.
    pub async fn group_status(&self, group_id: &str) -> TransactionStatus {
        self.lifecycle.group_status(group_id).await
    }

    /// Delete acknowledged messages older than the retention window
    pub async fn sweep_messages(&self, retention: Duration) -> TxResult<u64> {
        self.lifecycle.sweep_messages(retention).await
    }

    fn item_lock(&self, group_id: &str, task_key: &str) -> Arc<Mutex<()>> {
        self.item_locks
            .entry((group_id.to_string(), task_key.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::transport::LoopbackTransport;
    use concord_types::PendingMessage;
    use serde_json::json;

    fn pending(sub_task_id: &str) -> PendingMessage {
        PendingMessage {
            schema_version: 0,
            method: "pay".to_string(),
            source: "A".to_string(),
            target: "B".to_string(),
            args: json!({"amt": 10}),
            sub_task_id: sub_task_id.to_string(),
            create_time: 1000,
            consumed: 0,
        }
    }

    fn coordinator() -> (TxCoordinator, Arc<MemoryStore>, Arc<LoopbackTransport>) {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(LoopbackTransport::new());
        let coordinator = TxCoordinator::new(
            store.clone(),
            transport.clone(),
            &CoordinatorConfig::default(),
        );
        (coordinator, store, transport)
    }

    #[tokio::test]
    async fn test_report_with_unparseable_create_time_omits_consume_time() {
        let (coordinator, store, _transport) = coordinator();

        let mut item = TransactionItem::new("G1", "T1", vec![pending("S1")]);
        item.create_time = "garbage".to_string();
        store.insert_item(&item).await.unwrap();

        coordinator
            .report_item_status("G1", "T1", TransactionStatus::Commit, None)
            .await
            .unwrap();

        let updated = store.find_item("G1", "T1").await.unwrap().unwrap();
        assert_eq!(updated.status, TransactionStatus::Commit);
        assert_eq!(updated.consume_time, None);
    }

    #[tokio::test]
    async fn test_report_clears_dispatch_pending_marker() {
        let (coordinator, store, _transport) = coordinator();
        store
            .insert_item(&TransactionItem::new("G1", "T1", vec![pending("S1")]))
            .await
            .unwrap();

        coordinator
            .report_item_status("G1", "T1", TransactionStatus::Commit, None)
            .await
            .unwrap();

        let updated = store.find_item("G1", "T1").await.unwrap().unwrap();
        assert!(!updated.dispatch_pending);
    }

    #[tokio::test]
    async fn test_failed_report_leaves_marker_set() {
        let (coordinator, store, transport) = coordinator();
        store
            .insert_item(&TransactionItem::new("G1", "T1", vec![pending("S1")]))
            .await
            .unwrap();
        transport.set_failing(true);

        let err = coordinator
            .report_item_status("G1", "T1", TransactionStatus::Commit, None)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "DISPATCH_FAILURE");

        // The unfinished report stays visible for the retry.
        let item = store.find_item("G1", "T1").await.unwrap().unwrap();
        assert!(item.dispatch_pending);
        assert_eq!(item.status, TransactionStatus::Begin);

        // The retry succeeds once the transport recovers.
        transport.set_failing(false);
        coordinator
            .report_item_status("G1", "T1", TransactionStatus::Commit, None)
            .await
            .unwrap();
        let item = store.find_item("G1", "T1").await.unwrap().unwrap();
        assert!(!item.dispatch_pending);
        assert_eq!(item.status, TransactionStatus::Commit);
    }

    #[tokio::test]
    async fn test_concurrent_reports_are_serialized() {
        let (coordinator, store, transport) = coordinator();
        store
            .insert_item(&TransactionItem::new("G1", "T1", vec![pending("S1")]))
            .await
            .unwrap();

        let coordinator = Arc::new(coordinator);
        let a = {
            let c = coordinator.clone();
            tokio::spawn(async move {
                c.report_item_status("G1", "T1", TransactionStatus::Commit, None)
                    .await
            })
        };
        let b = {
            let c = coordinator.clone();
            tokio::spawn(async move {
                c.report_item_status("G1", "T1", TransactionStatus::Commit, None)
                    .await
            })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a.is_ok() && b.is_ok());

        // Both reports ran, one after the other; each dispatched its batch
        // (the documented at-least-once retry behavior), never interleaved
        // mid-report.
        assert_eq!(transport.published().len(), 2);
        let item = store.find_item("G1", "T1").await.unwrap().unwrap();
        assert_eq!(item.status, TransactionStatus::Commit);
    }
}
