use std::collections::BTreeMap;
use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, Sqlite, Transaction};
use tracing::debug;

use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{Mutation, MutationPlan};
use crate::repository::{ItemStore, StoredItem};

#[derive(Debug, FromRow)]
struct ItemRow {
    payload: String,
}

impl ItemRow {
    fn decode<T: StoredItem>(&self) -> Result<T, CoreError> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// SQLite implementation of [`ItemStore`], one instance per item kind.
pub struct SqliteStore<T> {
    pool: DbPool,
    _kind: PhantomData<fn() -> T>,
}

impl<T: StoredItem> SqliteStore<T> {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            _kind: PhantomData,
        }
    }

    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn fetch_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        id: &str,
    ) -> Result<Option<T>, CoreError> {
        let row: Option<ItemRow> =
            sqlx::query_as("SELECT payload FROM items WHERE id = ? AND kind = ?")
                .bind(id)
                .bind(T::KIND.as_str())
                .fetch_optional(&mut **tx)
                .await?;
        row.map(|r| r.decode::<T>()).transpose()
    }

    /// Runs one mutation against the row it touches.
    async fn apply_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        mutation: &Mutation<T>,
    ) -> Result<(), CoreError> {
        let id = mutation.item_id().to_string();
        let current = Self::fetch_in_transaction(tx, &id).await?;

        let mut slot = BTreeMap::new();
        if let Some(existing) = &current {
            slot.insert(id.clone(), existing.clone());
        }
        mutation.apply_to(&mut slot)?;

        match (current, slot.remove(&id)) {
            (None, None) => {}
            (Some(_), None) => {
                sqlx::query("DELETE FROM items WHERE id = ? AND kind = ?")
                    .bind(&id)
                    .bind(T::KIND.as_str())
                    .execute(&mut **tx)
                    .await?;
            }
            (None, Some(created)) => {
                let now = Utc::now();
                sqlx::query(
                    r#"INSERT INTO items (id, kind, recurring, anchor_at, payload, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?)"#,
                )
                .bind(&id)
                .bind(T::KIND.as_str())
                .bind(created.recurrence().is_some())
                .bind(created.anchor())
                .bind(serde_json::to_string(&created)?)
                .bind(now)
                .bind(now)
                .execute(&mut **tx)
                .await?;
            }
            (Some(previous), Some(updated)) => {
                if previous != updated {
                    sqlx::query(
                        r#"UPDATE items SET recurring = ?, anchor_at = ?, payload = ?, updated_at = ?
                        WHERE id = ? AND kind = ?"#,
                    )
                    .bind(updated.recurrence().is_some())
                    .bind(updated.anchor())
                    .bind(serde_json::to_string(&updated)?)
                    .bind(Utc::now())
                    .bind(&id)
                    .bind(T::KIND.as_str())
                    .execute(&mut **tx)
                    .await?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<T: StoredItem> ItemStore<T> for SqliteStore<T> {
    async fn list_items(&self) -> Result<Vec<T>, CoreError> {
        let rows: Vec<ItemRow> =
            sqlx::query_as("SELECT payload FROM items WHERE kind = ? ORDER BY rowid")
                .bind(T::KIND.as_str())
                .fetch_all(self.pool())
                .await?;
        rows.iter().map(ItemRow::decode::<T>).collect()
    }

    async fn find_item(&self, id: &str) -> Result<Option<T>, CoreError> {
        let row: Option<ItemRow> =
            sqlx::query_as("SELECT payload FROM items WHERE id = ? AND kind = ?")
                .bind(id)
                .bind(T::KIND.as_str())
                .fetch_optional(self.pool())
                .await?;
        row.map(|r| r.decode::<T>()).transpose()
    }

    async fn apply(&self, plan: &MutationPlan<T>) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;
        for mutation in &plan.mutations {
            // Dropping the transaction on error rolls it back.
            Self::apply_in_transaction(&mut tx, mutation).await?;
        }
        tx.commit().await?;

        debug!(
            kind = %T::KIND,
            series = %plan.series_id,
            mutations = plan.len(),
            "plan committed"
        );
        Ok(())
    }
}
