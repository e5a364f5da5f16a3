//! Server-sent event decoding.
//!
//! Only `data:` fields matter to the Narrative Service; `event:`, `id:` and
//! comment lines are ignored. Chunk boundaries may fall anywhere, including
//! inside a UTF-8 sequence.

use std::collections::VecDeque;
use std::fmt::Display;
use std::time::Duration;

use futures_util::{Stream, StreamExt, stream};
use playwriter_core::error::SyncError;

/// Line-buffered SSE decoder yielding one payload per dispatched event.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feeds a chunk and returns the payloads it completed.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            if let Some(payload) = self.line(line.trim_end_matches(['\n', '\r'])) {
                out.push(payload);
            }
        }
        out
    }

    /// Flushes a trailing unterminated event at end of input.
    pub(crate) fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.buffer);
        let mut out = Vec::new();
        if !rest.is_empty() {
            let line = String::from_utf8_lossy(&rest);
            if let Some(payload) = self.line(line.trim_end_matches('\r')) {
                out.push(payload);
            }
        }
        out.extend(self.dispatch());
        out
    }

    fn line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_owned());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        Some(payload)
    }
}

struct Pump<S> {
    bytes: S,
    decoder: SseDecoder,
    ready: VecDeque<String>,
    idle_timeout: Duration,
    done: bool,
}

/// Turns a byte stream into SSE payloads.
///
/// A transport error or `idle_timeout` of silence yields one error and ends
/// the stream.
pub(crate) fn payloads<S, B, E>(
    bytes: S,
    idle_timeout: Duration,
) -> impl Stream<Item = Result<String, SyncError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + Unpin,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let pump = Pump {
        bytes,
        decoder: SseDecoder::default(),
        ready: VecDeque::new(),
        idle_timeout,
        done: false,
    };
    stream::unfold(pump, |mut pump| async move {
        loop {
            if let Some(payload) = pump.ready.pop_front() {
                return Some((Ok(payload), pump));
            }
            if pump.done {
                return None;
            }
            match tokio::time::timeout(pump.idle_timeout, pump.bytes.next()).await {
                Err(_) => {
                    pump.done = true;
                    return Some((Err(SyncError::Timeout(pump.idle_timeout)), pump));
                }
                Ok(None) => {
                    pump.done = true;
                    let rest = pump.decoder.finish();
                    pump.ready.extend(rest);
                }
                Ok(Some(Err(e))) => {
                    pump.done = true;
                    return Some((Err(SyncError::Transport(e.to_string())), pump));
                }
                Ok(Some(Ok(chunk))) => {
                    let completed = pump.decoder.push(chunk.as_ref());
                    pump.ready.extend(completed);
                }
            }
        }
    })
}
