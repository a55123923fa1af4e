use bytes::{Bytes, BytesMut};

use msgproxy_core::{Pushed, Result, RunState, StageError};

use crate::adapter::{Decoder, Encoder};

/// Joins messages with a delimiter, emitted only *between* messages and
/// never before the first one.
#[derive(Debug)]
pub struct DelimEncoder {
    delimiter: Bytes,
    first: bool,
}

impl DelimEncoder {
    pub fn new(delimiter: impl Into<Bytes>) -> Result<Self> {
        let delimiter = delimiter.into();
        if delimiter.is_empty() {
            return Err(StageError::invalid_option("delimiter must not be empty"));
        }
        Ok(Self {
            delimiter,
            first: true,
        })
    }
}

impl Encoder for DelimEncoder {
    fn encode(&mut self, message: Bytes) -> Result<Bytes> {
        if self.first {
            self.first = false;
            return Ok(message);
        }
        let mut joined = BytesMut::with_capacity(self.delimiter.len() + message.len());
        joined.extend_from_slice(&self.delimiter);
        joined.extend_from_slice(&message);
        Ok(joined.freeze())
    }
}

/// Splits the stream on the first delimiter occurrence.
///
/// Without a delimiter in sight the input is held, unless the pipeline
/// is draining, in which case the buffered bytes flush as the final
/// message.
#[derive(Debug)]
pub struct DelimDecoder {
    delimiter: Bytes,
}

impl DelimDecoder {
    pub fn new(delimiter: impl Into<Bytes>) -> Result<Self> {
        let delimiter = delimiter.into();
        if delimiter.is_empty() {
            return Err(StageError::invalid_option("delimiter must not be empty"));
        }
        Ok(Self { delimiter })
    }
}

impl Decoder for DelimDecoder {
    fn decode(&mut self, state: RunState, input: Bytes) -> Result<Pushed> {
        match find(&input, &self.delimiter) {
            Some(at) => Ok(Pushed::split(
                input.slice(..at),
                input.slice(at + self.delimiter.len()..),
            )),
            None if state == RunState::End => Ok(Pushed::emit(input)),
            None => Ok(Pushed::hold(input)),
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// `+lines` / `-lines`: delimiter fixed to `\n`.
pub fn lines_encoder() -> DelimEncoder {
    DelimEncoder::new(Bytes::from_static(b"\n")).expect("newline delimiter is non-empty")
}

pub fn lines_decoder() -> DelimDecoder {
    DelimDecoder::new(Bytes::from_static(b"\n")).expect("newline delimiter is non-empty")
}
