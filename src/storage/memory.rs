// ============================================================================
// In-Memory Store
// ============================================================================

use std::sync::Mutex;

use anyhow::Result;
use concord_types::{TransactionItem, TransactionMsg, TransactionStatus};

use super::{ItemUpdate, TransactionStore};

/// HashMap-backed store for tests and single-process deployments.
///
/// Mirrors the SQL store's matched-row semantics exactly, including the
/// update-first behavior on messages with duplicate (group_id, sub_task_id)
/// pairs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    items: Vec<TransactionItem>,
    msgs: Vec<TransactionMsg>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all persisted messages, in insertion order. Test hook.
    pub fn msgs(&self) -> Vec<TransactionMsg> {
        self.inner.lock().expect("store lock poisoned").msgs.clone()
    }
}

#[async_trait::async_trait]
impl TransactionStore for MemoryStore {
    async fn insert_item(&self, item: &TransactionItem) -> Result<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if inner
            .items
            .iter()
            .any(|i| i.group_id == item.group_id && i.task_key == item.task_key)
        {
            anyhow::bail!(
                "duplicate item: group={}, task={}",
                item.group_id,
                item.task_key
            );
        }
        inner.items.push(item.clone());
        Ok(())
    }

    async fn find_item(
        &self,
        group_id: &str,
        task_key: &str,
    ) -> Result<Option<TransactionItem>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .items
            .iter()
            .find(|i| i.group_id == group_id && i.task_key == task_key)
            .cloned())
    }

    async fn list_items(&self, group_id: &str) -> Result<Vec<TransactionItem>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .items
            .iter()
            .filter(|i| i.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn update_item(
        &self,
        group_id: &str,
        task_key: &str,
        update: &ItemUpdate,
    ) -> Result<u64> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        match inner
            .items
            .iter_mut()
            .find(|i| i.group_id == group_id && i.task_key == task_key)
        {
            Some(item) => {
                item.status = update.status;
                if update.message.is_some() {
                    item.message = update.message.clone();
                }
                if update.consume_time.is_some() {
                    item.consume_time = update.consume_time;
                }
                item.dispatch_pending = false;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn set_dispatch_pending(
        &self,
        group_id: &str,
        task_key: &str,
        pending: bool,
    ) -> Result<u64> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        match inner
            .items
            .iter_mut()
            .find(|i| i.group_id == group_id && i.task_key == task_key)
        {
            Some(item) => {
                item.dispatch_pending = pending;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn remove_items(&self, group_id: &str) -> Result<u64> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let before = inner.items.len();
        inner.items.retain(|i| i.group_id != group_id);
        Ok((before - inner.items.len()) as u64)
    }

    async fn first_item_status(&self, group_id: &str) -> Result<Option<TransactionStatus>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .items
            .iter()
            .find(|i| i.group_id == group_id)
            .map(|i| i.status))
    }

    async fn insert_msg(&self, msg: &TransactionMsg) -> Result<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.msgs.push(msg.clone());
        Ok(())
    }

    async fn update_msg_consumed(
        &self,
        group_id: &str,
        sub_task_id: &str,
        consumed: i32,
    ) -> Result<u64> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        match inner
            .msgs
            .iter_mut()
            .find(|m| m.group_id == group_id && m.sub_task_id == sub_task_id)
        {
            Some(msg) => {
                msg.consumed = consumed;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn remove_msgs_older_than(&self, cutoff_ms: i64) -> Result<u64> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let before = inner.msgs.len();
        inner
            .msgs
            .retain(|m| !m.is_acknowledged() || m.update_time >= cutoff_ms);
        Ok((before - inner.msgs.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_types::PendingMessage;
    use serde_json::json;

    fn item(group_id: &str, task_key: &str) -> TransactionItem {
        TransactionItem::new(
            group_id,
            task_key,
            vec![PendingMessage {
                schema_version: 0,
                method: "pay".to_string(),
                source: "A".to_string(),
                target: "B".to_string(),
                args: json!({"amt": 10}),
                sub_task_id: format!("{}-{}", group_id, task_key),
                create_time: 1000,
                consumed: 0,
            }],
        )
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = MemoryStore::new();
        store.insert_item(&item("G1", "T1")).await.unwrap();

        let found = store.find_item("G1", "T1").await.unwrap().unwrap();
        assert_eq!(found.task_key, "T1");
        assert!(store.find_item("G1", "T2").await.unwrap().is_none());

        // (group_id, task_key) is unique
        assert!(store.insert_item(&item("G1", "T1")).await.is_err());
    }

    #[tokio::test]
    async fn test_update_item_reports_matches() {
        let store = MemoryStore::new();
        store.insert_item(&item("G1", "T1")).await.unwrap();
        store.set_dispatch_pending("G1", "T1", true).await.unwrap();

        let update = ItemUpdate {
            status: TransactionStatus::Commit,
            message: Some("done".to_string()),
            consume_time: Some(3),
        };
        assert_eq!(store.update_item("G1", "T1", &update).await.unwrap(), 1);
        assert_eq!(store.update_item("G1", "T9", &update).await.unwrap(), 0);

        let found = store.find_item("G1", "T1").await.unwrap().unwrap();
        assert_eq!(found.status, TransactionStatus::Commit);
        assert_eq!(found.message.as_deref(), Some("done"));
        assert_eq!(found.consume_time, Some(3));
        assert!(!found.dispatch_pending);
    }

    #[tokio::test]
    async fn test_remove_items_idempotent() {
        let store = MemoryStore::new();
        store.insert_item(&item("G1", "T1")).await.unwrap();
        store.insert_item(&item("G1", "T2")).await.unwrap();
        store.insert_item(&item("G2", "T1")).await.unwrap();

        assert_eq!(store.remove_items("G1").await.unwrap(), 2);
        assert_eq!(store.remove_items("G1").await.unwrap(), 0);
        assert_eq!(store.list_items("G2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_msg_consumed_first_match_only() {
        let store = MemoryStore::new();
        let pending = item("G1", "T1").pending_messages().unwrap();
        let msg = TransactionMsg::from_pending("G1", &pending[0]);

        // The store does not enforce (group_id, sub_task_id) uniqueness;
        // only the first match is updated.
        store.insert_msg(&msg).await.unwrap();
        store.insert_msg(&msg).await.unwrap();

        assert_eq!(
            store
                .update_msg_consumed("G1", &msg.sub_task_id, 1)
                .await
                .unwrap(),
            1
        );
        let msgs = store.msgs();
        assert_eq!(msgs[0].consumed, 1);
        assert_eq!(msgs[1].consumed, 0);

        assert_eq!(store.update_msg_consumed("G1", "absent", 1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_keeps_unacknowledged_msgs() {
        let store = MemoryStore::new();
        let pending = item("G1", "T1").pending_messages().unwrap();

        let mut old_acked = TransactionMsg::from_pending("G1", &pending[0]);
        old_acked.update_time = 1000;
        old_acked.consumed = 1;
        let mut old_pending = TransactionMsg::from_pending("G1", &pending[0]);
        old_pending.update_time = 1000;

        store.insert_msg(&old_acked).await.unwrap();
        store.insert_msg(&old_pending).await.unwrap();

        assert_eq!(store.remove_msgs_older_than(2000).await.unwrap(), 1);
        let msgs = store.msgs();
        assert_eq!(msgs.len(), 1);
        assert!(!msgs[0].is_acknowledged());
    }
}
