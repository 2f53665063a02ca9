use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

use gambit_core::errors::TransportError;

/// Splits a byte stream into newline-delimited records.
///
/// Blank lines are keep-alives and never surface. A transport error is
/// yielded once as `StreamInterrupted`, after which the stream ends.
pub struct NdjsonStream<E> {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, E>> + Send>>,
    buffer: Vec<u8>,
    done: bool,
}

impl<E: Display> NdjsonStream<E> {
    pub fn new(byte_stream: impl Stream<Item = Result<Bytes, E>> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            buffer: Vec::new(),
            done: false,
        }
    }

    /// Take the next complete non-blank line out of the buffer.
    fn next_line(&mut self) -> Option<String> {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
        None
    }
}

impl<E: Display> Stream for NdjsonStream<E> {
    type Item = Result<String, TransportError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(line) = self.next_line() {
            return Poll::Ready(Some(Ok(line)));
        }
        if self.done {
            return Poll::Ready(None);
        }

        loop {
            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.buffer.extend_from_slice(&bytes);
                    if let Some(line) = self.next_line() {
                        return Poll::Ready(Some(Ok(line)));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    self.buffer.clear();
                    return Poll::Ready(Some(Err(TransportError::StreamInterrupted(
                        e.to_string(),
                    ))));
                }
                Poll::Ready(None) => {
                    self.done = true;
                    // Final record without trailing newline
                    let remaining = std::mem::take(&mut self.buffer);
                    let text = String::from_utf8_lossy(&remaining);
                    let text = text.trim();
                    if !text.is_empty() {
                        return Poll::Ready(Some(Ok(text.to_string())));
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
