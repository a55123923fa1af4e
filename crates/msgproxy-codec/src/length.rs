use bytes::{BufMut, Bytes, BytesMut};

use msgproxy_core::{Pushed, Result, RunState, StageError};

use crate::adapter::{Decoder, Encoder};

/// Length-prefix header: 4-byte little-endian unsigned payload length.
///
/// Little-endian is fixed so framed streams are portable across hosts.
pub const HEADER_SIZE: usize = 4;

/// Prepends the length header to each message.
#[derive(Debug, Default)]
pub struct LengthEncoder;

impl Encoder for LengthEncoder {
    fn encode(&mut self, message: Bytes) -> Result<Bytes> {
        if message.len() > u32::MAX as usize {
            return Err(StageError::invalid_data(format!(
                "message too large for length framing ({} bytes, max {})",
                message.len(),
                u32::MAX
            )));
        }
        let mut framed = BytesMut::with_capacity(HEADER_SIZE + message.len());
        framed.put_u32_le(message.len() as u32);
        framed.put_slice(&message);
        Ok(framed.freeze())
    }
}

/// Carves length-framed messages off the stream.
///
/// With fewer than `header + length` bytes available the whole input is
/// held as remainder; a split message is reassembled by the engine's
/// residual cache across any number of reads.
#[derive(Debug, Default)]
pub struct LengthDecoder;

impl Decoder for LengthDecoder {
    fn decode(&mut self, _state: RunState, input: Bytes) -> Result<Pushed> {
        if input.len() < HEADER_SIZE {
            return Ok(Pushed::hold(input));
        }

        let header: [u8; HEADER_SIZE] = input[..HEADER_SIZE].try_into().expect("sized slice");
        let length = u32::from_le_bytes(header) as usize;

        if input.len() < HEADER_SIZE + length {
            return Ok(Pushed::hold(input));
        }

        let message = input.slice(HEADER_SIZE..HEADER_SIZE + length);
        let rest = input.slice(HEADER_SIZE + length..);
        Ok(Pushed::split(message, rest))
    }
}
