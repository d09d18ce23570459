//! Durable conversation storage behind the `pchat::ConversationStore` contract.
//!
//! ```rust
//! use pmemory::{ConversationStoreConfig, create_conversation_store};
//!
//! let store = create_conversation_store(ConversationStoreConfig::InMemory).unwrap();
//! # let _ = store;
//! ```

mod backend;
mod backends;
mod error;

pub mod prelude {
    pub use crate::{
        ConversationStoreConfig, MemoryError, MemoryErrorKind, SqliteConversationStore,
        create_conversation_store, create_default_conversation_store,
    };
}

pub use backend::{
    ConversationStoreConfig, SqliteConversationStore, create_conversation_store,
    create_default_conversation_store,
};
pub use error::{MemoryError, MemoryErrorKind};
