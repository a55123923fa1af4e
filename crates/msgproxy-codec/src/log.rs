use bytes::Bytes;
use tracing::info;

use msgproxy_core::{Pushed, Result, RunState, Stage};

/// Passthrough stage that reports traffic on the diagnostic stream.
///
/// Every call is counted, data or not, so the trace shows the flush pass
/// as well as the payload flow.
pub struct LogStage {
    label: String,
    count: u64,
}

impl LogStage {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            count: 0,
        }
    }
}

impl Stage for LogStage {
    fn push(&mut self, state: RunState, input: Option<Bytes>) -> Result<Pushed> {
        self.count += 1;
        match input {
            Some(bytes) => {
                info!(
                    label = %self.label,
                    state = ?state,
                    count = self.count,
                    size = bytes.len(),
                    payload = %preview(&bytes),
                    "pipeline traffic"
                );
                Ok(Pushed::emit(bytes))
            }
            None => {
                info!(
                    label = %self.label,
                    state = ?state,
                    count = self.count,
                    "pipeline traffic (no data)"
                );
                Ok(Pushed::none())
            }
        }
    }
}

fn preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}
