//! Incremental JSON value decoder
//!
//! Upstream sends a stream of concatenated JSON objects with no framing; a
//! single read may hold half an object or several. Bytes are buffered until
//! a complete value can be cut off the front.

use serde_json::{Deserializer, Value};
use thiserror::Error;

/// Largest incomplete value kept while waiting for more bytes
pub const MAX_BUFFERED_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("json syntax error: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("no complete json value within {0} buffered bytes")]
    Overflow(usize),
}

#[derive(Debug)]
pub struct JsonStreamDecoder {
    buffer: Vec<u8>,
    limit: usize,
}

impl Default for JsonStreamDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_BUFFERED_BYTES)
    }
}

impl JsonStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            limit,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes waiting for the rest of a value
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Next complete value, `Ok(None)` when more bytes are needed
    ///
    /// A syntax error drops input through the next newline (or all of it
    /// when there is none), so calling again resumes at the following line.
    /// An incomplete value larger than the limit is dropped as `Overflow`.
    pub fn next_value(&mut self) -> Result<Option<Value>, DecodeError> {
        let mut stream = Deserializer::from_slice(&self.buffer).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => {
                let consumed = stream.byte_offset();
                self.buffer.drain(..consumed);
                Ok(Some(value))
            }
            Some(Err(e)) if e.is_eof() => {
                if self.buffer.len() > self.limit {
                    let dropped = self.buffer.len();
                    self.buffer.clear();
                    return Err(DecodeError::Overflow(dropped));
                }
                Ok(None)
            }
            Some(Err(e)) => {
                match self.buffer.iter().position(|&b| b == b'\n') {
                    Some(newline) => {
                        self.buffer.drain(..=newline);
                    }
                    None => self.buffer.clear(),
                }
                Err(DecodeError::Syntax(e))
            }
            None => {
                // Only whitespace left
                self.buffer.clear();
                Ok(None)
            }
        }
    }
}
