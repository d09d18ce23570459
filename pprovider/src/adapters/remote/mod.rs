//! Remote chat-completions backend over HTTP with SSE streaming.

mod backend;
mod frames;
mod tests;
mod transport;
mod wire;

pub use backend::{
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, RemoteTextBackend, default_catalog,
};
pub use frames::{DEFAULT_MAX_LINE_BYTES, SseLineDecoder, classify_frame};
pub use transport::{DEFAULT_BASE_URL, HttpRemoteTransport, RemoteLineStream, RemoteTransport};
pub use wire::{
    RemoteChoice, RemoteChoiceMessage, RemoteMessage, RemoteRequest, RemoteResponse, RemoteUsage,
};
