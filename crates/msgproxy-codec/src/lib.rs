//! Framing and byte-level transformation stages.
//!
//! Codecs come in two shapes: an [`Encoder`] maps one message to its
//! encoded bytes and always consumes its input; a [`Decoder`] carves the
//! next message off the stream and hands back what it did not consume.
//! The [`as_encoder`]/[`as_decoder`] adapters lift either shape into the
//! pipeline stage contract.

pub mod adapter;
pub mod delim;
pub mod length;
pub mod log;
pub mod text;
pub mod xmljson;

pub use adapter::{as_decoder, as_encoder, Decoder, DecoderStage, Encoder, EncoderStage};
pub use delim::{lines_decoder, lines_encoder, DelimDecoder, DelimEncoder};
pub use length::{LengthDecoder, LengthEncoder, HEADER_SIZE};
pub use log::LogStage;
pub use text::{NewlineEscaper, NewlineUnescaper, NullCodec, SkipCodec, StripCodec, UrlDecoder, UrlEncoder};
pub use xmljson::{JsonToXml, XmlToJson};
