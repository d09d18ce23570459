//! Observability hooks for conversation exchanges and persistence retries.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use pobserve::{FanoutConversationHooks, MetricsConversationHooks, SafeConversationHooks, TracingConversationHooks};
//!
//! let _hooks = FanoutConversationHooks::new()
//!     .with(Arc::new(SafeConversationHooks::new(TracingConversationHooks)))
//!     .with(Arc::new(SafeConversationHooks::new(MetricsConversationHooks)));
//! ```

mod fanout_hooks;
mod metrics_hooks;
mod safe_hooks;
mod tracing_hooks;

pub use fanout_hooks::FanoutConversationHooks;
pub use metrics_hooks::MetricsConversationHooks;
pub use safe_hooks::SafeConversationHooks;
pub use tracing_hooks::TracingConversationHooks;

pub mod prelude {
    pub use crate::{
        FanoutConversationHooks, MetricsConversationHooks, SafeConversationHooks,
        TracingConversationHooks,
    };
}

#[cfg(test)]
mod tests;
