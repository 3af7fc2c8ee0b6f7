use crate::types::StateEntry;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Постоянное хранилище снимка таблицы состояний между сессиями.
pub trait StateStore: Send {
    fn load(&self) -> Result<Vec<StateEntry>>;
    fn save(&mut self, entries: &[StateEntry]) -> Result<()>;
}
