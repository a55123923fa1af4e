use std::io::{ErrorKind, Read, Stdin, Stdout, Write};

use bytes::Bytes;

use msgproxy_core::{Pushed, Result, RunState, Source, Stage, StageError};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads chunks from stdin until EOF.
pub struct StdinSource {
    stdin: Stdin,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            stdin: std::io::stdin(),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Source for StdinSource {
    fn pull(&mut self) -> Result<Bytes> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.stdin.read(&mut chunk) {
                Ok(0) => return Err(StageError::EndOfTransport),
                Ok(read) => return Ok(Bytes::copy_from_slice(&chunk[..read])),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Writes every chunk to stdout, flushing after each write so piped
/// consumers see data promptly.
pub struct StdoutSink {
    stdout: Stdout,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            stdout: std::io::stdout(),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for StdoutSink {
    fn push(&mut self, _state: RunState, input: Option<Bytes>) -> Result<Pushed> {
        if let Some(bytes) = input {
            self.stdout.write_all(&bytes)?;
            self.stdout.flush()?;
        }
        Ok(Pushed::none())
    }
}
