use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use bytes::Bytes;
use tracing::{debug, info};

use msgproxy_core::{Pushed, Result, RunState, Source, Stage, StageError};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Listens on `addr`, accepts one client at a time, and pulls whatever
/// the client sends.
///
/// When the client disconnects the transport ends, unless constructed
/// with `keep_listening`, in which case the next client is accepted and
/// the stream continues.
pub struct TcpSource {
    listener: TcpListener,
    conn: Option<TcpStream>,
    keep_listening: bool,
}

impl TcpSource {
    pub fn bind(addr: SocketAddr, keep_listening: bool) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        info!(%addr, keep_listening, "listening on tcp");
        Ok(Self {
            listener,
            conn: None,
            keep_listening,
        })
    }

    fn accept(&mut self) -> Result<&mut TcpStream> {
        if self.conn.is_none() {
            let (stream, peer) = self.listener.accept()?;
            debug!(%peer, "accepted tcp client");
            self.conn = Some(stream);
        }
        Ok(self.conn.as_mut().expect("connection just ensured"))
    }
}

impl Source for TcpSource {
    fn pull(&mut self) -> Result<Bytes> {
        loop {
            let stream = self.accept()?;
            let mut chunk = [0u8; READ_CHUNK_SIZE];
            match stream.read(&mut chunk) {
                Ok(0) => {
                    debug!("tcp client disconnected");
                    self.conn = None;
                    if !self.keep_listening {
                        return Err(StageError::EndOfTransport);
                    }
                }
                Ok(read) => return Ok(Bytes::copy_from_slice(&chunk[..read])),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Connects to `addr` and writes every chunk to the peer.
pub struct TcpSink {
    stream: TcpStream,
}

impl TcpSink {
    pub fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        info!(%addr, "connected tcp sink");
        Ok(Self { stream })
    }
}

impl Stage for TcpSink {
    fn push(&mut self, _state: RunState, input: Option<Bytes>) -> Result<Pushed> {
        if let Some(bytes) = input {
            self.stream.write_all(&bytes)?;
            self.stream.flush()?;
        }
        Ok(Pushed::none())
    }
}
