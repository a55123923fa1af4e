use std::net::{SocketAddr, UdpSocket};

use bytes::Bytes;
use tracing::info;

use msgproxy_core::{Pushed, Result, RunState, Source, Stage};

/// One datagram can carry at most this much payload.
const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Binds `addr` and delivers one datagram per pull.
///
/// UDP has no end-of-stream; this source pulls until the process is
/// stopped.
pub struct UdpSource {
    socket: UdpSocket,
}

impl UdpSource {
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        info!(%addr, "listening on udp");
        Ok(Self { socket })
    }
}

impl Source for UdpSource {
    fn pull(&mut self) -> Result<Bytes> {
        let mut datagram = vec![0u8; MAX_DATAGRAM_SIZE];
        let (read, _peer) = self.socket.recv_from(&mut datagram)?;
        datagram.truncate(read);
        Ok(Bytes::from(datagram))
    }
}

/// Sends each chunk to `addr` as one datagram.
pub struct UdpSink {
    socket: UdpSocket,
}

impl UdpSink {
    pub fn connect(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.connect(addr)?;
        info!(%addr, "connected udp sink");
        Ok(Self { socket })
    }
}

impl Stage for UdpSink {
    fn push(&mut self, _state: RunState, input: Option<Bytes>) -> Result<Pushed> {
        if let Some(bytes) = input {
            self.socket.send(&bytes)?;
        }
        Ok(Pushed::none())
    }
}
