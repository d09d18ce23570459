//! Store selection for hosts that pick a backend from configuration.

use std::path::PathBuf;
use std::sync::Arc;

use pchat::{ConversationStore, InMemoryConversationStore};

use crate::backends::sqlite::default_sqlite_path;
use crate::error::MemoryError;

pub use crate::backends::sqlite::SqliteConversationStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationStoreConfig {
    Sqlite { path: PathBuf },
    InMemory,
}

impl Default for ConversationStoreConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

pub fn create_conversation_store(
    config: ConversationStoreConfig,
) -> Result<Arc<dyn ConversationStore>, MemoryError> {
    match config {
        ConversationStoreConfig::Sqlite { path } => {
            Ok(Arc::new(SqliteConversationStore::new(path)?))
        }
        ConversationStoreConfig::InMemory => Ok(Arc::new(InMemoryConversationStore::new())),
    }
}

pub fn create_default_conversation_store() -> Result<Arc<dyn ConversationStore>, MemoryError> {
    create_conversation_store(ConversationStoreConfig::default())
}
