use bytes::{Bytes, BytesMut};
use tracing::{debug, error};

use crate::error::{Result, StageError};
use crate::stage::{Pushed, RunState, Source, Stage};

/// Engine lifecycle. `End` is terminal and triggers a single flush pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Active,
    End,
}

/// A source followed by one or more downstream stages, driven to
/// completion by [`Pipeline::run`].
///
/// The engine owns a residual cache per downstream stage: input a stage
/// did not consume is held there and prepended the next time data for
/// that stage arrives. A stage is not called again while it is blocked
/// awaiting more input (its last `remainder` equalled what it was
/// offered), so arbitrarily fragmented reads cost no busy work.
pub struct Pipeline {
    source: Box<dyn Source>,
    stages: Vec<Box<dyn Stage>>,
    cache: Vec<Option<Bytes>>,
    phase: Phase,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages.len())
            .field("phase", &self.phase)
            .finish()
    }
}

impl Pipeline {
    /// Assemble a pipeline. The last element of `stages` acts as the sink;
    /// anything it emits is discarded.
    pub fn new(source: Box<dyn Source>, stages: Vec<Box<dyn Stage>>) -> Result<Self> {
        if stages.is_empty() {
            return Err(StageError::invalid_option(
                "a pipeline needs a source and at least one downstream stage",
            ));
        }
        let cache = vec![None; stages.len()];
        Ok(Self {
            source,
            stages,
            cache,
            phase: Phase::Start,
        })
    }

    /// Drive the pipeline until the source exhausts.
    ///
    /// Returns `Ok(())` after a clean end-of-transport and flush pass. Any
    /// other error aborts the run; one diagnostic line is logged and the
    /// error is handed back to the caller.
    pub fn run(&mut self) -> Result<()> {
        self.phase = Phase::Active;
        match self.run_loop() {
            Ok(()) => Ok(()),
            Err(err) => {
                error!(%err, "Fatal error: run loop terminated.");
                Err(err)
            }
        }
    }

    fn run_loop(&mut self) -> Result<()> {
        loop {
            match self.source.pull() {
                Ok(chunk) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    self.dispatch(Some(chunk), 0)?;
                }
                Err(StageError::EndOfTransport) => {
                    self.phase = Phase::End;
                    debug!("source exhausted, flushing pipeline");
                    self.flush()?;
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One final ascending walk with no new input; every stage sees
    /// `RunState::End` at least once and may emit trailing buffered data.
    fn flush(&mut self) -> Result<()> {
        for index in 0..self.stages.len() {
            self.dispatch(None, index)?;
        }
        Ok(())
    }

    fn run_state(&self) -> RunState {
        match self.phase {
            Phase::End => RunState::End,
            _ => RunState::Active,
        }
    }

    /// Walk `input` down the stage array starting at `first`.
    ///
    /// Emissions from stage `i` are collected in order and offered one by
    /// one to stage `i + 1`, each offer first coalescing that stage's
    /// residual cache. The inner loop stops at the fixed point: the stage
    /// returned exactly what it was offered (byte-identical, or both
    /// absent) without emitting progress.
    fn dispatch(&mut self, input: Option<Bytes>, first: usize) -> Result<()> {
        let state = self.run_state();
        let mut batch: Vec<Bytes> = input.into_iter().collect();

        for index in first..self.stages.len() {
            if batch.is_empty() && state == RunState::Active {
                // Nothing new for downstream; their caches stay untouched.
                return Ok(());
            }

            let mut carry = self.cache[index].take();
            let mut downstream: Vec<Bytes> = Vec::new();
            let feeds: Vec<Option<Bytes>> = if batch.is_empty() {
                vec![None]
            } else {
                batch.into_iter().map(Some).collect()
            };

            for fresh in feeds {
                let mut input = coalesce(carry.take(), fresh);
                loop {
                    let has_data = matches!(&input, Some(bytes) if !bytes.is_empty());
                    if state != RunState::End && !has_data {
                        break;
                    }

                    let offered = input.clone();
                    let Pushed { emitted, remainder } =
                        self.stages[index].push(state, input.take())?;
                    if let Some(bytes) = emitted {
                        downstream.push(bytes);
                    }

                    let blocked = remainder == offered;
                    input = remainder;
                    if blocked {
                        break;
                    }
                }
                carry = input;
            }

            self.cache[index] = carry.filter(|bytes| !bytes.is_empty());
            batch = downstream;
        }

        // `batch` now holds whatever the sink emitted; it falls off the
        // end of the pipeline and is discarded.
        Ok(())
    }
}

fn coalesce(cached: Option<Bytes>, fresh: Option<Bytes>) -> Option<Bytes> {
    match (cached, fresh) {
        (Some(cached), Some(fresh)) => {
            if cached.is_empty() {
                return Some(fresh);
            }
            let mut joined = BytesMut::with_capacity(cached.len() + fresh.len());
            joined.extend_from_slice(&cached);
            joined.extend_from_slice(&fresh);
            Some(joined.freeze())
        }
        (Some(cached), None) => Some(cached),
        (None, fresh) => fresh,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use super::*;

    struct ChunkSource {
        chunks: VecDeque<Bytes>,
    }

    impl ChunkSource {
        fn new<const N: usize>(chunks: [&'static [u8]; N]) -> Box<Self> {
            Box::new(Self {
                chunks: chunks.iter().map(|c| Bytes::from_static(c)).collect(),
            })
        }
    }

    impl Source for ChunkSource {
        fn pull(&mut self) -> Result<Bytes> {
            self.chunks.pop_front().ok_or(StageError::EndOfTransport)
        }
    }

    /// Records every offer it receives, then passes the input through.
    struct RecordingSink {
        offers: Rc<RefCell<Vec<(RunState, Option<Bytes>)>>>,
    }

    impl Stage for RecordingSink {
        fn push(&mut self, state: RunState, input: Option<Bytes>) -> Result<Pushed> {
            self.offers.borrow_mut().push((state, input.clone()));
            Ok(match input {
                Some(bytes) => Pushed::emit(bytes),
                None => Pushed::none(),
            })
        }
    }

    fn recording_sink() -> (Box<RecordingSink>, Rc<RefCell<Vec<(RunState, Option<Bytes>)>>>) {
        let offers = Rc::new(RefCell::new(Vec::new()));
        (
            Box::new(RecordingSink {
                offers: offers.clone(),
            }),
            offers,
        )
    }

    fn data_offers(offers: &[(RunState, Option<Bytes>)]) -> Vec<Bytes> {
        offers.iter().filter_map(|(_, b)| b.clone()).collect()
    }

    /// Holds everything until it has at least `need` bytes, then emits the
    /// accumulated input in one piece.
    struct Accumulate {
        need: usize,
    }

    impl Stage for Accumulate {
        fn push(&mut self, state: RunState, input: Option<Bytes>) -> Result<Pushed> {
            match input {
                Some(bytes) if bytes.len() >= need_for(self, state) => Ok(Pushed::emit(bytes)),
                Some(bytes) => Ok(Pushed::hold(bytes)),
                None => Ok(Pushed::none()),
            }
        }
    }

    fn need_for(stage: &Accumulate, state: RunState) -> usize {
        match state {
            RunState::Active => stage.need,
            // Flush: whatever is buffered goes out.
            RunState::End => 1,
        }
    }

    /// Emits one byte per call, holding the rest.
    struct ByteSplitter;

    impl Stage for ByteSplitter {
        fn push(&mut self, _state: RunState, input: Option<Bytes>) -> Result<Pushed> {
            match input {
                Some(bytes) if !bytes.is_empty() => {
                    Ok(Pushed::split(bytes.slice(0..1), bytes.slice(1..)))
                }
                _ => Ok(Pushed::none()),
            }
        }
    }

    struct FailingStage;

    impl Stage for FailingStage {
        fn push(&mut self, _state: RunState, _input: Option<Bytes>) -> Result<Pushed> {
            Err(StageError::invalid_data("corrupt stream"))
        }
    }

    struct CountingStage {
        calls: Rc<RefCell<usize>>,
    }

    impl Stage for CountingStage {
        fn push(&mut self, _state: RunState, input: Option<Bytes>) -> Result<Pushed> {
            *self.calls.borrow_mut() += 1;
            Ok(match input {
                Some(bytes) => Pushed::hold(bytes),
                None => Pushed::none(),
            })
        }
    }

    #[test]
    fn passthrough_preserves_chunk_order() {
        let (sink, offers) = recording_sink();
        let mut pipeline =
            Pipeline::new(ChunkSource::new([b"one", b"two", b"three"]), vec![sink]).unwrap();
        pipeline.run().unwrap();

        assert_eq!(
            data_offers(&offers.borrow()),
            vec![
                Bytes::from_static(b"one"),
                Bytes::from_static(b"two"),
                Bytes::from_static(b"three"),
            ]
        );
    }

    #[test]
    fn rejects_pipeline_without_downstream_stages() {
        let result = Pipeline::new(ChunkSource::new([b"x"]), vec![]);
        assert!(matches!(result, Err(StageError::InvalidOption(_))));
    }

    #[test]
    fn residuals_coalesce_in_arrival_order() {
        // 2 + 2 byte chunks through a stage that needs 4 at once: the
        // second offer must be cache ++ new input.
        let (sink, offers) = recording_sink();
        let mut pipeline = Pipeline::new(
            ChunkSource::new([b"ab", b"cd"]),
            vec![Box::new(Accumulate { need: 4 }), sink],
        )
        .unwrap();
        pipeline.run().unwrap();

        assert_eq!(
            data_offers(&offers.borrow()),
            vec![Bytes::from_static(b"abcd")]
        );
    }

    #[test]
    fn blocked_stage_is_called_once_per_chunk() {
        let calls = Rc::new(RefCell::new(0usize));
        let (sink, _offers) = recording_sink();
        let mut pipeline = Pipeline::new(
            ChunkSource::new([b"a", b"b"]),
            vec![
                Box::new(CountingStage {
                    calls: calls.clone(),
                }),
                sink,
            ],
        )
        .unwrap();
        pipeline.run().unwrap();

        // One call per chunk plus one flush call; the fixed-point rule
        // forbids re-offering the same bytes within a round.
        assert_eq!(*calls.borrow(), 3);
    }

    #[test]
    fn inner_loop_drains_multiple_emissions() {
        let (sink, offers) = recording_sink();
        let mut pipeline = Pipeline::new(
            ChunkSource::new([b"abc"]),
            vec![Box::new(ByteSplitter), sink],
        )
        .unwrap();
        pipeline.run().unwrap();

        assert_eq!(
            data_offers(&offers.borrow()),
            vec![
                Bytes::from_static(b"a"),
                Bytes::from_static(b"b"),
                Bytes::from_static(b"c"),
            ]
        );
    }

    #[test]
    fn flush_reaches_every_stage_with_end_state() {
        let (sink, offers) = recording_sink();
        let mut pipeline = Pipeline::new(
            ChunkSource::new([b"xy"]),
            vec![Box::new(Accumulate { need: 100 }), sink],
        )
        .unwrap();
        pipeline.run().unwrap();

        // The accumulator held "xy" until end-of-transport, then flushed.
        assert_eq!(
            data_offers(&offers.borrow()),
            vec![Bytes::from_static(b"xy")]
        );
        assert!(offers
            .borrow()
            .iter()
            .any(|(state, _)| *state == RunState::End));
    }

    #[test]
    fn empty_chunks_are_skipped() {
        let (sink, offers) = recording_sink();
        let mut pipeline = Pipeline::new(ChunkSource::new([b"", b"data", b""]), vec![sink]).unwrap();
        pipeline.run().unwrap();

        assert_eq!(
            data_offers(&offers.borrow()),
            vec![Bytes::from_static(b"data")]
        );
    }

    #[test]
    fn stage_error_aborts_the_run() {
        let (sink, _offers) = recording_sink();
        let mut pipeline =
            Pipeline::new(ChunkSource::new([b"boom"]), vec![Box::new(FailingStage), sink]).unwrap();
        let err = pipeline.run().unwrap_err();
        assert!(matches!(err, StageError::InvalidData(_)));
    }

    #[test]
    fn partial_residual_left_at_end_is_not_lost_by_flush() {
        // A stage still blocked at end-of-transport gets one End offer and
        // may keep holding; the run still terminates cleanly.
        struct NeverSatisfied;
        impl Stage for NeverSatisfied {
            fn push(&mut self, _state: RunState, input: Option<Bytes>) -> Result<Pushed> {
                Ok(match input {
                    Some(bytes) => Pushed::hold(bytes),
                    None => Pushed::none(),
                })
            }
        }

        let (sink, offers) = recording_sink();
        let mut pipeline = Pipeline::new(
            ChunkSource::new([b"frag"]),
            vec![Box::new(NeverSatisfied), sink],
        )
        .unwrap();
        pipeline.run().unwrap();

        // Nothing reached the sink with data; it only saw flush offers.
        assert!(data_offers(&offers.borrow()).is_empty());
    }
}
