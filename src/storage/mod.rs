// ============================================================================
// Group/Item Store
// ============================================================================

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use anyhow::Result;
use concord_types::{TransactionItem, TransactionMsg, TransactionStatus};

/// Fields applied to an item by the final status update. Applied in one
/// update call together with clearing the dispatch-pending marker.
#[derive(Debug, Clone)]
pub struct ItemUpdate {
    pub status: TransactionStatus,
    pub message: Option<String>,
    pub consume_time: Option<i64>,
}

/// Durable CRUD over transaction items and messages.
///
/// This trait allows for multiple implementations:
/// - PostgreSQL (production)
/// - In-memory (tests, single-process deployments)
///
/// Operations that mutate report how many records matched; zero matches is
/// not an error at this layer — the caller decides whether it is.
#[async_trait::async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert a single item tagged with its group id
    async fn insert_item(&self, item: &TransactionItem) -> Result<()>;

    /// Find the item identified by (group_id, task_key)
    async fn find_item(&self, group_id: &str, task_key: &str)
        -> Result<Option<TransactionItem>>;

    /// All items of a group, order not guaranteed
    async fn list_items(&self, group_id: &str) -> Result<Vec<TransactionItem>>;

    /// Apply the update to the first item matching (group_id, task_key),
    /// clearing its dispatch-pending marker. Returns the matched-row count.
    async fn update_item(
        &self,
        group_id: &str,
        task_key: &str,
        update: &ItemUpdate,
    ) -> Result<u64>;

    /// Set or clear the dispatch-pending marker. Returns the matched-row
    /// count.
    async fn set_dispatch_pending(
        &self,
        group_id: &str,
        task_key: &str,
        pending: bool,
    ) -> Result<u64>;

    /// Delete all items of a group. Deleting zero matches is success.
    /// Returns the number of removed items.
    async fn remove_items(&self, group_id: &str) -> Result<u64>;

    /// Status of some item of the group. The store does not aggregate
    /// across items; callers apply their own fallback when this yields
    /// nothing.
    async fn first_item_status(&self, group_id: &str) -> Result<Option<TransactionStatus>>;

    /// Persist a dispatched transaction message
    async fn insert_msg(&self, msg: &TransactionMsg) -> Result<()>;

    /// Overwrite the consumed flag of the first message matching
    /// (group_id, sub_task_id). Returns the matched-row count.
    async fn update_msg_consumed(
        &self,
        group_id: &str,
        sub_task_id: &str,
        consumed: i32,
    ) -> Result<u64>;

    /// Delete acknowledged messages whose update time is before the cutoff
    /// (epoch millis). Returns the number of deleted messages.
    async fn remove_msgs_older_than(&self, cutoff_ms: i64) -> Result<u64>;
}
