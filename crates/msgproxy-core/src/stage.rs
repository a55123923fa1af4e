use bytes::Bytes;

use crate::error::Result;

/// Pipeline lifecycle state as seen by stages.
///
/// `End` is set once the source reports end-of-transport; stages then get
/// one last chance to emit buffered data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Active,
    End,
}

/// Result pair of a [`Stage::push`] call.
///
/// `emitted` is forwarded downstream; `remainder` is input the stage did
/// not consume and must be offered again, prepended to future input. A
/// stage that returns its input unchanged as `remainder` with nothing
/// emitted is declaring "I need more input" and will not be called again
/// until more arrives.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Pushed {
    pub emitted: Option<Bytes>,
    pub remainder: Option<Bytes>,
}

impl Pushed {
    /// Nothing emitted, nothing held back.
    pub fn none() -> Self {
        Self::default()
    }

    /// Forward `bytes` downstream, consuming all input.
    pub fn emit(bytes: impl Into<Bytes>) -> Self {
        Self {
            emitted: Some(bytes.into()),
            remainder: None,
        }
    }

    /// Hold all of `input` for the next call, emitting nothing.
    pub fn hold(input: Bytes) -> Self {
        Self {
            emitted: None,
            remainder: Some(input),
        }
    }

    /// Forward `message` and hold the unconsumed `rest`.
    pub fn split(message: Bytes, rest: Bytes) -> Self {
        Self {
            emitted: Some(message),
            remainder: if rest.is_empty() { None } else { Some(rest) },
        }
    }
}

/// The pipeline head: produces chunks by blocking on some transport.
pub trait Source {
    /// Return the next chunk, blocking until one is available.
    ///
    /// An empty chunk means "no data this round". Exhaustion is signalled
    /// with `Err(StageError::EndOfTransport)`.
    fn pull(&mut self) -> Result<Bytes>;
}

/// Any non-source pipeline node: transformer, codec, or sink.
pub trait Stage {
    /// Offer `input` to the stage and collect what it emits and what it
    /// leaves unconsumed.
    ///
    /// `input` is `None` only during the flush pass, when the engine walks
    /// the pipeline one final time with `state == RunState::End`.
    fn push(&mut self, state: RunState, input: Option<Bytes>) -> Result<Pushed>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_drops_empty_rest() {
        let pushed = Pushed::split(Bytes::from_static(b"msg"), Bytes::new());
        assert_eq!(pushed.emitted.as_deref(), Some(b"msg".as_ref()));
        assert!(pushed.remainder.is_none());
    }

    #[test]
    fn split_keeps_nonempty_rest() {
        let pushed = Pushed::split(Bytes::from_static(b"msg"), Bytes::from_static(b"tail"));
        assert_eq!(pushed.remainder.as_deref(), Some(b"tail".as_ref()));
    }

    #[test]
    fn hold_echoes_input() {
        let input = Bytes::from_static(b"partial");
        let pushed = Pushed::hold(input.clone());
        assert!(pushed.emitted.is_none());
        assert_eq!(pushed.remainder, Some(input));
    }
}
