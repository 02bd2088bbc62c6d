use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::models::MutationPlan;
use crate::repository::{ItemStore, StoredItem};

/// In-process store, used by tests and by embedders without a database.
pub struct MemoryStore<T> {
    state: RwLock<State<T>>,
}

struct State<T> {
    items: BTreeMap<String, T>,
    /// Insertion order of ids, so listing matches a database's row order.
    order: Vec<String>,
}

impl<T: StoredItem> MemoryStore<T> {
    pub fn new() -> Self {
        Self::with_items(Vec::new())
    }

    pub fn with_items(items: Vec<T>) -> Self {
        let order = items.iter().map(|item| item.id().to_string()).collect();
        let items = items
            .into_iter()
            .map(|item| (item.id().to_string(), item))
            .collect();
        Self {
            state: RwLock::new(State { items, order }),
        }
    }
}

impl<T: StoredItem> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: StoredItem> ItemStore<T> for MemoryStore<T> {
    async fn list_items(&self) -> Result<Vec<T>, CoreError> {
        let state = self.state.read().await;
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.items.get(id).cloned())
            .collect())
    }

    async fn find_item(&self, id: &str) -> Result<Option<T>, CoreError> {
        Ok(self.state.read().await.items.get(id).cloned())
    }

    async fn apply(&self, plan: &MutationPlan<T>) -> Result<(), CoreError> {
        let mut state = self.state.write().await;

        // Stage on a copy so a failing mutation leaves nothing behind.
        let mut staged = state.items.clone();
        for mutation in &plan.mutations {
            mutation.apply_to(&mut staged)?;
        }

        let mut order: Vec<String> = state
            .order
            .iter()
            .filter(|id| staged.contains_key(id.as_str()))
            .cloned()
            .collect();
        for mutation in &plan.mutations {
            let id = mutation.item_id();
            if staged.contains_key(id) && !order.iter().any(|known| known == id) {
                order.push(id.to_string());
            }
        }

        state.items = staged;
        state.order = order;
        Ok(())
    }
}
