//! Delta sinks receive streamed reply fragments as they arrive.
//!
//! `accept` may suspend; a slow sink slows the exchange down.
//!
//! ```rust
//! use pchat::{DeltaSink, FnDeltaSink};
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! runtime.block_on(async {
//!     let mut seen = String::new();
//!     let mut sink = FnDeltaSink::new(|delta: &str| {
//!         seen.push_str(delta);
//!         Ok(())
//!     });
//!     sink.accept("He").await.unwrap();
//!     sink.accept("llo").await.unwrap();
//!     drop(sink);
//!     assert_eq!(seen, "Hello");
//! });
//! ```

use pcommon::BoxFuture;
use tokio::sync::mpsc;

use crate::ChatError;

pub trait DeltaSink: Send {
    fn accept<'a>(&'a mut self, delta: &'a str) -> BoxFuture<'a, Result<(), ChatError>>;
}

impl DeltaSink for Vec<String> {
    fn accept<'a>(&'a mut self, delta: &'a str) -> BoxFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            self.push(delta.to_string());
            Ok(())
        })
    }
}

/// Adapts a synchronous closure into a sink.
pub struct FnDeltaSink<F> {
    callback: F,
}

impl<F> FnDeltaSink<F>
where
    F: FnMut(&str) -> Result<(), ChatError> + Send,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> DeltaSink for FnDeltaSink<F>
where
    F: FnMut(&str) -> Result<(), ChatError> + Send,
{
    fn accept<'a>(&'a mut self, delta: &'a str) -> BoxFuture<'a, Result<(), ChatError>> {
        let result = (self.callback)(delta);
        Box::pin(async move { result })
    }
}

/// Forwards deltas over a bounded channel; a full channel suspends the exchange.
#[derive(Debug, Clone)]
pub struct ChannelDeltaSink {
    sender: mpsc::Sender<String>,
}

impl ChannelDeltaSink {
    pub fn new(sender: mpsc::Sender<String>) -> Self {
        Self { sender }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self::new(sender), receiver)
    }
}

impl DeltaSink for ChannelDeltaSink {
    fn accept<'a>(&'a mut self, delta: &'a str) -> BoxFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            self.sender
                .send(delta.to_string())
                .await
                .map_err(|_| ChatError::sink("delta receiver was dropped"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatErrorKind;

    #[tokio::test]
    async fn vec_sink_collects_in_order() {
        let mut sink: Vec<String> = Vec::new();
        sink.accept("a").await.expect("accept");
        sink.accept("b").await.expect("accept");
        assert_eq!(sink, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn channel_sink_forwards_and_reports_closed_receiver() {
        let (mut sink, mut receiver) = ChannelDeltaSink::channel(2);
        sink.accept("x").await.expect("accept");
        assert_eq!(receiver.recv().await.as_deref(), Some("x"));

        drop(receiver);
        let error = sink.accept("y").await.expect_err("closed receiver");
        assert_eq!(error.kind, ChatErrorKind::Sink);
    }

    #[tokio::test]
    async fn fn_sink_propagates_callback_errors() {
        let mut sink = FnDeltaSink::new(|delta: &str| {
            if delta == "stop" {
                Err(ChatError::sink("refused"))
            } else {
                Ok(())
            }
        });

        assert!(sink.accept("go").await.is_ok());
        assert!(sink.accept("stop").await.is_err());
    }
}
