use std::io;

use msgproxy_core::StageError;

// Exit code constants aligned with rsfulmen/DDR-0002 semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;

/// Map a pipeline error to the process exit code.
pub fn code_for(err: &StageError) -> i32 {
    match err {
        // End-of-transport is the normal termination signal; it only
        // reaches here if a stage other than the source raised it.
        StageError::EndOfTransport => SUCCESS,
        StageError::InvalidOption(_) => USAGE,
        StageError::InvalidData(_) => DATA_INVALID,
        StageError::Io(err) => io_code(err),
    }
}

fn io_code(err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::AddrInUse => TRANSPORT_ERROR,
        _ => FAILURE,
    }
}
