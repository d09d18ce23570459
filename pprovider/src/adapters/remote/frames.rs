//! Incremental SSE line decoding and frame classification.
//!
//! ```rust
//! use pprovider::FrameOutcome;
//! use pprovider::adapters::remote::{SseLineDecoder, classify_frame};
//!
//! let mut decoder = SseLineDecoder::new();
//! decoder
//!     .push(b"data: {\"choices\":[{\"delta\":{\"content\":\"He\"}}]}\n\ndata: [DO")
//!     .expect("within line limit");
//! decoder.push(b"NE]\n").expect("within line limit");
//!
//! let first = decoder.next_line().expect("first line");
//! assert_eq!(classify_frame(&first), FrameOutcome::Delta("He".to_string()));
//! let blank = decoder.next_line().expect("blank separator");
//! assert_eq!(classify_frame(&blank), FrameOutcome::Skip);
//! let done = decoder.next_line().expect("done line");
//! assert_eq!(classify_frame(&done), FrameOutcome::End);
//! ```

use crate::{FrameOutcome, ProviderError, ProviderErrorKind};

use super::wire::RemoteStreamChunk;

/// Longest line accepted before the stream is abandoned.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Splits a byte stream into lines without assuming chunk boundaries align
/// with lines or UTF-8 characters.
#[derive(Debug)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
    /// Bytes seen since the last `\n`.
    current_line: usize,
    max_line_bytes: usize,
}

impl Default for SseLineDecoder {
    fn default() -> Self {
        Self::with_max_line_bytes(DEFAULT_MAX_LINE_BYTES)
    }
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            current_line: 0,
            max_line_bytes,
        }
    }

    /// Buffers `bytes`. Fails once any line grows past the limit, so a backend
    /// that never terminates a line cannot grow the buffer without bound.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), ProviderError> {
        let mut segments = bytes.split(|byte| *byte == b'\n');
        if let Some(first) = segments.next() {
            self.current_line += first.len();
            self.check_line_length()?;
        }
        for segment in segments {
            self.current_line = segment.len();
            self.check_line_length()?;
        }

        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    fn check_line_length(&self) -> Result<(), ProviderError> {
        if self.current_line <= self.max_line_bytes {
            return Ok(());
        }
        Err(ProviderError::new(
            ProviderErrorKind::BackendUnavailable,
            format!(
                "stream line exceeded {} bytes without a terminator",
                self.max_line_bytes
            ),
            false,
        ))
    }

    /// Returns the next complete line with its terminator (`\n` or `\r\n`) removed.
    pub fn next_line(&mut self) -> Option<String> {
        let newline = self.buffer.iter().position(|byte| *byte == b'\n')?;
        let mut line = self.buffer.drain(..=newline).collect::<Vec<_>>();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Flushes a trailing line that never received a terminator.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }

        self.current_line = 0;
        let line = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&line);
        Some(line.trim_end_matches('\r').to_string())
    }
}

pub fn classify_frame(line: &str) -> FrameOutcome {
    let Some(payload) = line.strip_prefix("data:") else {
        return FrameOutcome::Skip;
    };

    let payload = payload.trim();
    if payload.is_empty() {
        return FrameOutcome::Skip;
    }

    if payload == "[DONE]" {
        return FrameOutcome::End;
    }

    let chunk = match serde_json::from_str::<RemoteStreamChunk>(payload) {
        Ok(chunk) => chunk,
        Err(error) => {
            tracing::debug!(error = %error, frame = payload, "skipping malformed stream frame");
            return FrameOutcome::Skip;
        }
    };

    if let Some(error) = chunk.error {
        let message = error
            .message
            .unwrap_or_else(|| "backend reported an error mid-stream".to_string());
        return FrameOutcome::Error(ProviderError::unavailable(message));
    }

    match chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
    {
        Some(content) if !content.is_empty() => FrameOutcome::Delta(content),
        _ => FrameOutcome::Skip,
    }
}
