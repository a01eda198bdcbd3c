// ============================================================================
// PostgreSQL Store
// ============================================================================

use anyhow::{Context, Result};
use concord_config::DbConfig;
use concord_types::{Collection, TransactionItem, TransactionMsg, TransactionStatus};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use super::{ItemUpdate, TransactionStore};

/// PostgreSQL implementation of [`TransactionStore`].
pub struct PostgresStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    group_id: String,
    task_key: String,
    create_time: String,
    status: i32,
    message: Option<String>,
    consume_time: Option<i64>,
    dispatch_pending: bool,
    args: serde_json::Value,
}

impl ItemRow {
    fn into_item(self) -> Result<TransactionItem> {
        let status = TransactionStatus::from_code(self.status)
            .with_context(|| format!("unknown status code {} in stored item", self.status))?;
        Ok(TransactionItem {
            group_id: self.group_id,
            task_key: self.task_key,
            create_time: self.create_time,
            status,
            message: self.message,
            consume_time: self.consume_time,
            dispatch_pending: self.dispatch_pending,
            args: self.args,
        })
    }
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a connection pool and wrap it in a store
    pub async fn connect(database_url: &str, db_config: &DbConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(db_config.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(
                db_config.acquire_timeout_secs,
            ))
            .idle_timeout(Some(std::time::Duration::from_secs(
                db_config.idle_timeout_secs,
            )))
            .test_before_acquire(true)
            .connect(database_url)
            .await
            .context("Failed to connect to Postgres")?;

        Ok(Self::new(pool))
    }

    /// Create the backing tables if they do not exist yet
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                group_id TEXT NOT NULL,
                task_key TEXT NOT NULL,
                create_time TEXT NOT NULL,
                status INT NOT NULL,
                message TEXT,
                consume_time BIGINT,
                dispatch_pending BOOLEAN NOT NULL DEFAULT FALSE,
                args JSONB NOT NULL DEFAULT '[]'::jsonb,
                PRIMARY KEY (group_id, task_key)
            )
            "#,
            Collection::TransactionItem.table_name()
        ))
        .execute(&self.pool)
        .await
        .context("Failed to create transaction item table")?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                group_id TEXT NOT NULL,
                method TEXT NOT NULL,
                source TEXT NOT NULL,
                target TEXT NOT NULL,
                args JSONB NOT NULL DEFAULT 'null'::jsonb,
                sub_task_id TEXT NOT NULL,
                create_time BIGINT NOT NULL,
                update_time BIGINT NOT NULL,
                consumed INT NOT NULL DEFAULT 0
            )
            "#,
            Collection::TransactionMsg.table_name()
        ))
        .execute(&self.pool)
        .await
        .context("Failed to create transaction message table")?;

        // Lookup index for the acknowledgment path. Intentionally not
        // unique: duplicate (group_id, sub_task_id) pairs can appear when a
        // report is retried; consumers deduplicate on that pair.
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_tx_msgs_group_subtask ON {} (group_id, sub_task_id)",
            Collection::TransactionMsg.table_name()
        ))
        .execute(&self.pool)
        .await
        .context("Failed to create transaction message index")?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl TransactionStore for PostgresStore {
    async fn insert_item(&self, item: &TransactionItem) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (group_id, task_key, create_time, status, message,
                            consume_time, dispatch_pending, args)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
            Collection::TransactionItem.table_name()
        ))
        .bind(&item.group_id)
        .bind(&item.task_key)
        .bind(&item.create_time)
        .bind(item.status.code())
        .bind(&item.message)
        .bind(item.consume_time)
        .bind(item.dispatch_pending)
        .bind(&item.args)
        .execute(&self.pool)
        .await
        .context("Failed to insert transaction item")?;

        tracing::debug!(
            group_id = %item.group_id,
            task_key = %item.task_key,
            "Inserted transaction item"
        );

        Ok(())
    }

    async fn find_item(
        &self,
        group_id: &str,
        task_key: &str,
    ) -> Result<Option<TransactionItem>> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            SELECT group_id, task_key, create_time, status, message,
                   consume_time, dispatch_pending, args
            FROM {}
            WHERE group_id = $1 AND task_key = $2
            "#,
            Collection::TransactionItem.table_name()
        ))
        .bind(group_id)
        .bind(task_key)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find transaction item")?;

        row.map(ItemRow::into_item).transpose()
    }

    async fn list_items(&self, group_id: &str) -> Result<Vec<TransactionItem>> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            SELECT group_id, task_key, create_time, status, message,
                   consume_time, dispatch_pending, args
            FROM {}
            WHERE group_id = $1
            "#,
            Collection::TransactionItem.table_name()
        ))
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transaction items")?;

        rows.into_iter().map(ItemRow::into_item).collect()
    }

    async fn update_item(
        &self,
        group_id: &str,
        task_key: &str,
        update: &ItemUpdate,
    ) -> Result<u64> {
        let result = sqlx::query(&format!(
            r#"
            UPDATE {}
            SET status = $3,
                message = COALESCE($4, message),
                consume_time = COALESCE($5, consume_time),
                dispatch_pending = FALSE
            WHERE group_id = $1 AND task_key = $2
            "#,
            Collection::TransactionItem.table_name()
        ))
        .bind(group_id)
        .bind(task_key)
        .bind(update.status.code())
        .bind(&update.message)
        .bind(update.consume_time)
        .execute(&self.pool)
        .await
        .context("Failed to update transaction item")?;

        Ok(result.rows_affected())
    }

    async fn set_dispatch_pending(
        &self,
        group_id: &str,
        task_key: &str,
        pending: bool,
    ) -> Result<u64> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET dispatch_pending = $3 WHERE group_id = $1 AND task_key = $2",
            Collection::TransactionItem.table_name()
        ))
        .bind(group_id)
        .bind(task_key)
        .bind(pending)
        .execute(&self.pool)
        .await
        .context("Failed to update dispatch-pending marker")?;

        Ok(result.rows_affected())
    }

    async fn remove_items(&self, group_id: &str) -> Result<u64> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE group_id = $1",
            Collection::TransactionItem.table_name()
        ))
        .bind(group_id)
        .execute(&self.pool)
        .await
        .context("Failed to remove transaction items")?;

        let removed = result.rows_affected();
        tracing::debug!(group_id = %group_id, removed = removed, "Removed transaction items");

        Ok(removed)
    }

    async fn first_item_status(&self, group_id: &str) -> Result<Option<TransactionStatus>> {
        let row = sqlx::query(&format!(
            "SELECT status FROM {} WHERE group_id = $1 LIMIT 1",
            Collection::TransactionItem.table_name()
        ))
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query group status")?;

        match row {
            Some(row) => {
                let code: i32 = row.try_get("status")?;
                let status = TransactionStatus::from_code(code)
                    .with_context(|| format!("unknown status code {} in stored item", code))?;
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }

    async fn insert_msg(&self, msg: &TransactionMsg) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (group_id, method, source, target, args,
                            sub_task_id, create_time, update_time, consumed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
            Collection::TransactionMsg.table_name()
        ))
        .bind(&msg.group_id)
        .bind(&msg.method)
        .bind(&msg.source)
        .bind(&msg.target)
        .bind(&msg.args)
        .bind(&msg.sub_task_id)
        .bind(msg.create_time)
        .bind(msg.update_time)
        .bind(msg.consumed)
        .execute(&self.pool)
        .await
        .context("Failed to insert transaction message")?;

        Ok(())
    }

    async fn update_msg_consumed(
        &self,
        group_id: &str,
        sub_task_id: &str,
        consumed: i32,
    ) -> Result<u64> {
        // Update-first semantics: duplicates of the pair may exist, only
        // one record is touched.
        let table = Collection::TransactionMsg.table_name();
        let result = sqlx::query(&format!(
            r#"
            UPDATE {table}
            SET consumed = $3
            WHERE ctid IN (
                SELECT ctid FROM {table}
                WHERE group_id = $1 AND sub_task_id = $2
                LIMIT 1
            )
            "#,
        ))
        .bind(group_id)
        .bind(sub_task_id)
        .bind(consumed)
        .execute(&self.pool)
        .await
        .context("Failed to update message consumed flag")?;

        Ok(result.rows_affected())
    }

    async fn remove_msgs_older_than(&self, cutoff_ms: i64) -> Result<u64> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE consumed <> 0 AND update_time < $1",
            Collection::TransactionMsg.table_name()
        ))
        .bind(cutoff_ms)
        .execute(&self.pool)
        .await
        .context("Failed to sweep transaction messages")?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_types::PendingMessage;
    use serde_json::json;

    // Note: These tests require a running PostgreSQL database
    // Run with: DATABASE_URL=postgres://... cargo test -- --ignored

    async fn setup_store() -> PostgresStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let store = PostgresStore::connect(&url, &concord_config::DbConfig {
            max_connections: 2,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 60,
        })
        .await
        .unwrap();
        store.migrate().await.unwrap();
        store
    }

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
                sub_task_id: "S1".to_string(),
                create_time: 1000,
                consumed: 0,
            }],
        )
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_item_round_trip() {
        let store = setup_store().await;
        let group_id = format!("pg-test-{}", chrono::Utc::now().timestamp_millis());

        store.insert_item(&item(&group_id, "T1")).await.unwrap();

        let found = store.find_item(&group_id, "T1").await.unwrap().unwrap();
        assert_eq!(found.status, TransactionStatus::Begin);
        assert_eq!(found.pending_messages().unwrap().len(), 1);

        let matched = store
            .update_item(
                &group_id,
                "T1",
                &ItemUpdate {
                    status: TransactionStatus::Commit,
                    message: None,
                    consume_time: Some(2),
                },
            )
            .await
            .unwrap();
        assert_eq!(matched, 1);
        assert_eq!(
            store.first_item_status(&group_id).await.unwrap(),
            Some(TransactionStatus::Commit)
        );

        // Cleanup
        store.remove_items(&group_id).await.unwrap();
        assert!(store.list_items(&group_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_msg_acknowledgment() {
        let store = setup_store().await;
        let group_id = format!("pg-msg-test-{}", chrono::Utc::now().timestamp_millis());

        let pending = item(&group_id, "T1").pending_messages().unwrap();
        let msg = TransactionMsg::from_pending(&group_id, &pending[0]);
        store.insert_msg(&msg).await.unwrap();

        assert_eq!(
            store.update_msg_consumed(&group_id, "S1", 1).await.unwrap(),
            1
        );
        assert_eq!(
            store
                .update_msg_consumed(&group_id, "absent", 1)
                .await
                .unwrap(),
            0
        );
    }
}
