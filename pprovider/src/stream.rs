//! Delta stream contracts, frame outcomes, and in-memory stream utilities.
//!
//! ```rust
//! use pprovider::{DeltaStream, VecDeltaStream};
//!
//! let stream = VecDeltaStream::from_deltas(["He", "llo"]);
//! let _boxed: DeltaStream<'static> = Box::pin(stream);
//! ```

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::ProviderError;

/// Gateway delta stream contract.
///
/// Invariants for consumers:
/// - Fragments are emitted in the order the backend produced them.
/// - Empty fragments are never emitted.
/// - The stream is finite and is consumed once; after `None` it yields nothing more.
/// - An `Err` item is terminal.
pub type DeltaStream<'a> = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send + 'a>>;

/// Classification of a single streaming frame (one SSE line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A non-empty text fragment.
    Delta(String),
    /// Keep-alives, comments, empty deltas, and unparseable payloads.
    Skip,
    /// The `[DONE]` sentinel.
    End,
    /// An error object reported in-band by the backend.
    Error(ProviderError),
}

#[derive(Debug, Default)]
pub struct VecDeltaStream {
    items: VecDeque<Result<String, ProviderError>>,
}

impl VecDeltaStream {
    pub fn new(items: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            items: items.into(),
        }
    }

    pub fn from_deltas<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(deltas.into_iter().map(|delta| Ok(delta.into())).collect())
    }
}

impl Stream for VecDeltaStream {
    type Item = Result<String, ProviderError>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<String, ProviderError>>> {
        Poll::Ready(self.items.pop_front())
    }
}
