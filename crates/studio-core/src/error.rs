use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Stored item could not be (de)serialized")]
    Serialization(#[from] serde_json::Error),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid recurrence rule '{rule}' on item {item_id}")]
    InvalidRule { item_id: String, rule: String },

    #[error("Recurrence for item {0} stopped advancing")]
    StalledRecurrence(String),

    #[error("Scheduling conflict: {0}")]
    Conflict(String),

    #[error("Mutation was interrupted before it completed")]
    Interrupted,
}

impl CoreError {
    /// True for failures the user can resolve by picking another slot.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CoreError::Conflict(_))
    }
}
