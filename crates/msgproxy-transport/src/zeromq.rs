//! ZeroMQ source and sink stages (cargo feature `zmq`).
//!
//! The pipeline is strictly one-way, so the request/reply socket pairs
//! degenerate: a REP source answers every message with an empty reply,
//! and a REQ sink discards the reply to each send.

use std::str::FromStr;

use bytes::Bytes;
use tracing::info;

use msgproxy_core::{Pushed, Result, RunState, Source, Stage, StageError};

/// Socket mode, written in the CLI as `zmq:MODE:address`.
///
/// The pipeline role derives from the mode: REP, SUB and PULL receive
/// (sources); REQ, PUB and PUSH send (sinks). REP, PUB and PULL bind;
/// their counterparts connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZmqMode {
    Req,
    Rep,
    Pub,
    Sub,
    Push,
    Pull,
}

impl ZmqMode {
    pub fn is_source(self) -> bool {
        matches!(self, ZmqMode::Rep | ZmqMode::Sub | ZmqMode::Pull)
    }

    fn socket_type(self) -> zmq::SocketType {
        match self {
            ZmqMode::Req => zmq::REQ,
            ZmqMode::Rep => zmq::REP,
            ZmqMode::Pub => zmq::PUB,
            ZmqMode::Sub => zmq::SUB,
            ZmqMode::Push => zmq::PUSH,
            ZmqMode::Pull => zmq::PULL,
        }
    }

    fn binds(self) -> bool {
        matches!(self, ZmqMode::Rep | ZmqMode::Pub | ZmqMode::Pull)
    }
}

impl FromStr for ZmqMode {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "REQ" => Ok(ZmqMode::Req),
            "REP" => Ok(ZmqMode::Rep),
            "PUB" => Ok(ZmqMode::Pub),
            "SUB" => Ok(ZmqMode::Sub),
            "PUSH" => Ok(ZmqMode::Push),
            "PULL" => Ok(ZmqMode::Pull),
            other => Err(StageError::invalid_option(format!(
                "unknown zmq mode '{other}' (expected REQ, REP, PUB, SUB, PUSH or PULL)"
            ))),
        }
    }
}

fn open_socket(mode: ZmqMode, address: &str) -> Result<(zmq::Context, zmq::Socket)> {
    let context = zmq::Context::new();
    let socket = context.socket(mode.socket_type()).map_err(zmq_err)?;
    if mode.binds() {
        socket.bind(address).map_err(zmq_err)?;
    } else {
        socket.connect(address).map_err(zmq_err)?;
    }
    if mode == ZmqMode::Sub {
        socket.set_subscribe(b"").map_err(zmq_err)?;
    }
    info!(?mode, address, "opened zmq socket");
    Ok((context, socket))
}

/// Receives one ZeroMQ message per pull.
pub struct ZmqSource {
    socket: zmq::Socket,
    mode: ZmqMode,
    // Sockets must not outlive their context.
    _context: zmq::Context,
}

impl ZmqSource {
    pub fn open(mode: ZmqMode, address: &str) -> Result<Self> {
        if !mode.is_source() {
            return Err(StageError::invalid_option(format!(
                "zmq mode {mode:?} sends; it cannot sit at the source position"
            )));
        }
        let (context, socket) = open_socket(mode, address)?;
        Ok(Self {
            socket,
            mode,
            _context: context,
        })
    }
}

impl Source for ZmqSource {
    fn pull(&mut self) -> Result<Bytes> {
        let message = self.socket.recv_bytes(0).map_err(zmq_err)?;
        if self.mode == ZmqMode::Rep {
            self.socket.send(&b""[..], 0).map_err(zmq_err)?;
        }
        Ok(Bytes::from(message))
    }
}

/// Sends each chunk as one ZeroMQ message.
pub struct ZmqSink {
    socket: zmq::Socket,
    mode: ZmqMode,
    _context: zmq::Context,
}

impl ZmqSink {
    pub fn open(mode: ZmqMode, address: &str) -> Result<Self> {
        if mode.is_source() {
            return Err(StageError::invalid_option(format!(
                "zmq mode {mode:?} receives; it cannot sit at a sink position"
            )));
        }
        let (context, socket) = open_socket(mode, address)?;
        Ok(Self {
            socket,
            mode,
            _context: context,
        })
    }
}

impl Stage for ZmqSink {
    fn push(&mut self, _state: RunState, input: Option<Bytes>) -> Result<Pushed> {
        if let Some(bytes) = input {
            self.socket.send(&bytes[..], 0).map_err(zmq_err)?;
            if self.mode == ZmqMode::Req {
                let _reply = self.socket.recv_bytes(0).map_err(zmq_err)?;
            }
        }
        Ok(Pushed::none())
    }
}

fn zmq_err(err: zmq::Error) -> StageError {
    StageError::Io(std::io::Error::other(err))
}
