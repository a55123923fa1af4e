use bytes::{BufMut, Bytes, BytesMut};

use msgproxy_core::{Result, StageError};

use crate::adapter::Encoder;

/// Percent-encodes raw bytes. One-shot: always consumes its input.
#[derive(Debug, Default)]
pub struct UrlEncoder;

impl Encoder for UrlEncoder {
    fn encode(&mut self, message: Bytes) -> Result<Bytes> {
        let encoded = urlencoding::encode_binary(&message);
        Ok(Bytes::from(encoded.into_owned().into_bytes()))
    }
}

/// Reverses percent-encoding. Malformed sequences pass through verbatim.
#[derive(Debug, Default)]
pub struct UrlDecoder;

impl Encoder for UrlDecoder {
    fn encode(&mut self, message: Bytes) -> Result<Bytes> {
        let decoded = urlencoding::decode_binary(&message);
        Ok(Bytes::from(decoded.into_owned()))
    }
}

/// Escapes `\` to `\\`, LF to `\n` and CR to `\r`, flattening a message
/// onto a single line.
#[derive(Debug, Default)]
pub struct NewlineEscaper;

impl Encoder for NewlineEscaper {
    fn encode(&mut self, message: Bytes) -> Result<Bytes> {
        let mut out = BytesMut::with_capacity(message.len());
        for byte in message.iter() {
            match byte {
                b'\\' => out.put_slice(b"\\\\"),
                b'\n' => out.put_slice(b"\\n"),
                b'\r' => out.put_slice(b"\\r"),
                other => out.put_u8(*other),
            }
        }
        Ok(out.freeze())
    }
}

/// Inverse of [`NewlineEscaper`]. A dangling or unknown escape is
/// invalid-data: the stream is too corrupt to continue.
#[derive(Debug, Default)]
pub struct NewlineUnescaper;

impl Encoder for NewlineUnescaper {
    fn encode(&mut self, message: Bytes) -> Result<Bytes> {
        let mut out = BytesMut::with_capacity(message.len());
        let mut bytes = message.iter();
        while let Some(byte) = bytes.next() {
            if *byte != b'\\' {
                out.put_u8(*byte);
                continue;
            }
            match bytes.next() {
                Some(b'\\') => out.put_u8(b'\\'),
                Some(b'n') => out.put_u8(b'\n'),
                Some(b'r') => out.put_u8(b'\r'),
                Some(other) => {
                    return Err(StageError::invalid_data(format!(
                        "unknown escape sequence \\{}",
                        char::from(*other)
                    )))
                }
                None => {
                    return Err(StageError::invalid_data(
                        "dangling escape at end of message",
                    ))
                }
            }
        }
        Ok(out.freeze())
    }
}

/// Identity passthrough.
#[derive(Debug, Default)]
pub struct NullCodec;

impl Encoder for NullCodec {
    fn encode(&mut self, message: Bytes) -> Result<Bytes> {
        Ok(message)
    }
}

/// Trims surrounding ASCII whitespace.
#[derive(Debug, Default)]
pub struct StripCodec;

impl Encoder for StripCodec {
    fn encode(&mut self, message: Bytes) -> Result<Bytes> {
        let start = message
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(message.len());
        let end = message
            .iter()
            .rposition(|b| !b.is_ascii_whitespace())
            .map_or(start, |i| i + 1);
        Ok(message.slice(start..end))
    }
}

/// Drops the first `n` bytes of each message when `n >= 0`; keeps only
/// the first `|n|` bytes when `n < 0`.
#[derive(Debug)]
pub struct SkipCodec {
    count: i64,
}

impl SkipCodec {
    pub fn new(count: i64) -> Self {
        Self { count }
    }
}

impl Encoder for SkipCodec {
    fn encode(&mut self, message: Bytes) -> Result<Bytes> {
        if self.count >= 0 {
            let drop = (self.count as usize).min(message.len());
            Ok(message.slice(drop..))
        } else {
            let keep = (self.count.unsigned_abs() as usize).min(message.len());
            Ok(message.slice(..keep))
        }
    }
}
