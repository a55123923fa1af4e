use bytes::Bytes;

use msgproxy_core::{Pushed, Result, RunState, Stage};

/// A whole-message transform: maps one message to its encoded bytes and
/// always consumes its input.
pub trait Encoder {
    fn encode(&mut self, message: Bytes) -> Result<Bytes>;
}

/// A framing split: carves the next message off the front of `input` and
/// returns whatever it did not consume as remainder.
///
/// A decoder that cannot complete a message yet returns the whole input
/// as remainder; the engine re-offers it combined with future bytes. At
/// `RunState::End` the decoder decides what to do with a trailing tail.
pub trait Decoder {
    fn decode(&mut self, state: RunState, input: Bytes) -> Result<Pushed>;
}

/// Lift an [`Encoder`] into the stage contract.
pub struct EncoderStage<E> {
    codec: E,
}

/// Lift a [`Decoder`] into the stage contract.
pub struct DecoderStage<D> {
    codec: D,
}

pub fn as_encoder<E: Encoder>(codec: E) -> EncoderStage<E> {
    EncoderStage { codec }
}

pub fn as_decoder<D: Decoder>(codec: D) -> DecoderStage<D> {
    DecoderStage { codec }
}

impl<E: Encoder> Stage for EncoderStage<E> {
    fn push(&mut self, _state: RunState, input: Option<Bytes>) -> Result<Pushed> {
        match input {
            Some(message) => Ok(Pushed::emit(self.codec.encode(message)?)),
            // Encoders hold nothing back, so there is nothing to flush.
            None => Ok(Pushed::none()),
        }
    }
}

impl<D: Decoder> Stage for DecoderStage<D> {
    fn push(&mut self, state: RunState, input: Option<Bytes>) -> Result<Pushed> {
        match input {
            Some(bytes) => self.codec.decode(state, bytes),
            // The engine keeps a decoder's unconsumed tail in its residual
            // cache and re-offers it during flush, so an absent input
            // means there is truly nothing buffered.
            None => Ok(Pushed::none()),
        }
    }
}
