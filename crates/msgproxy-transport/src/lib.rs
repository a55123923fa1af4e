//! Transport stages: I/O on external channels.
//!
//! Each transport adapts one channel kind (socket, file, stdio, message
//! queue) to the pipeline stage contract: a blocking `Source` at
//! position 0, a `Stage` sink elsewhere. Transports own their sockets
//! and file handles and release them on drop.

pub mod addr;
pub mod file;
pub mod folder;
pub mod stdio;
pub mod tcp;
pub mod udp;

#[cfg(feature = "zmq")]
pub mod zeromq;

pub use addr::parse_addr;
pub use file::{FileSink, FileSource};
pub use folder::{FolderSink, FolderSource};
pub use stdio::{StdinSource, StdoutSink};
pub use tcp::{TcpSink, TcpSource};
pub use udp::{UdpSink, UdpSource};

#[cfg(feature = "zmq")]
pub use zeromq::{ZmqMode, ZmqSink, ZmqSource};
