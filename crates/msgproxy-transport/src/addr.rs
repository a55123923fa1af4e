use std::net::{Ipv4Addr, SocketAddr};

use msgproxy_core::{Result, StageError};

/// Parse a `[//]<ipv4>:<port>` address option.
///
/// The leading `//` is tolerated so URL-ish spellings like
/// `udp://0.0.0.0:7000` work. The host must be a dotted-quad IPv4
/// address and the port a decimal integer.
pub fn parse_addr(options: &str) -> Result<SocketAddr> {
    let trimmed = options.strip_prefix("//").unwrap_or(options);
    let (host, port) = trimmed
        .split_once(':')
        .ok_or_else(|| bad_addr(options, "expected <ipv4>:<port>"))?;

    if !host.split('.').all(|part| {
        !part.is_empty() && part.len() <= 3 && part.bytes().all(|b| b.is_ascii_digit())
    }) || host.split('.').count() != 4
    {
        return Err(bad_addr(options, "host must be a dotted-quad IPv4 address"));
    }
    let ip: Ipv4Addr = host
        .parse()
        .map_err(|_| bad_addr(options, "host octets must be in 0..=255"))?;
    let port: u16 = port
        .parse()
        .map_err(|_| bad_addr(options, "port must be a decimal integer in 0..=65535"))?;

    Ok(SocketAddr::from((ip, port)))
}

fn bad_addr(options: &str, reason: &str) -> StageError {
    StageError::invalid_option(format!("address '{options}': {reason}"))
}
