use crate::error::CoreError;
use crate::models::{Booking, ItemKind, Mutation, MutationPlan, Task, TemplatePatch};
use crate::recurrence::Schedulable;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// An item kind that can be persisted by an [`ItemStore`].
pub trait StoredItem:
    Schedulable + Serialize + DeserializeOwned + PartialEq + std::fmt::Debug + Send + Sync + 'static
{
    const KIND: ItemKind;
}

impl StoredItem for Booking {
    const KIND: ItemKind = ItemKind::Booking;
}

impl StoredItem for Task {
    const KIND: ItemKind = ItemKind::Task;
}

/// Persistence collaborator for one item kind: templates and standalone
/// records share one collection.
///
/// `update_template` and `delete_template` address any stored record by id,
/// which is how plain (non-series) edits are written.
#[async_trait]
pub trait ItemStore<T: StoredItem>: Send + Sync {
    /// Every template and standalone record, in insertion order.
    async fn list_items(&self) -> Result<Vec<T>, CoreError>;

    async fn find_item(&self, id: &str) -> Result<Option<T>, CoreError>;

    /// Applies every mutation of `plan`, in order, or none of them.
    async fn apply(&self, plan: &MutationPlan<T>) -> Result<(), CoreError>;

    async fn create_standalone(&self, item: T) -> Result<T, CoreError> {
        let id = item.id().to_string();
        self.apply(&MutationPlan::single(id.clone(), Mutation::CreateStandalone(item)))
            .await?;
        self.require(&id).await
    }

    async fn create_template(&self, item: T) -> Result<T, CoreError> {
        let id = item.id().to_string();
        self.apply(&MutationPlan::single(id.clone(), Mutation::CreateTemplate(item)))
            .await?;
        self.require(&id).await
    }

    async fn update_template(&self, id: &str, patch: TemplatePatch<T>) -> Result<T, CoreError> {
        let mutation = Mutation::UpdateTemplate {
            id: id.to_string(),
            patch,
        };
        self.apply(&MutationPlan::single(id, mutation)).await?;
        self.require(id).await
    }

    async fn delete_template(&self, id: &str) -> Result<(), CoreError> {
        let mutation = Mutation::DeleteTemplate { id: id.to_string() };
        self.apply(&MutationPlan::single(id, mutation)).await
    }

    async fn require(&self, id: &str) -> Result<T, CoreError> {
        self.find_item(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))
    }
}
