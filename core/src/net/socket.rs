//! Non-blocking UDP transport (§4.5 Datagram socket). Grounded in the
//! original's raw `recvfrom`/`sendto` loop, adapted to a `std::net`
//! non-blocking socket and a result taxonomy that keeps "nothing to
//! read", "malformed datagram" and "OS error" distinguishable at the
//! call site rather than collapsed into one `Result`.

use std::net::{SocketAddr, UdpSocket};

use tracing::warn;

use super::wire::{PacketHeader, MAX_DATAGRAM_SIZE};

pub struct Socket {
    inner: UdpSocket,
}

/// One received, hash-validated datagram.
pub struct Received {
    pub from: SocketAddr,
    pub header: PacketHeader,
    pub payload: Vec<u8>,
}

/// Outcome of a single non-blocking receive attempt, matching the
/// taxonomy §4.5 calls for at this boundary.
pub enum RecvOutcome {
    Ok(Received),
    WouldBlock,
    TooBig { from: SocketAddr, len: usize },
    InvalidHash { from: SocketAddr },
    System(std::io::Error),
}

impl Socket {
    pub fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let inner = UdpSocket::bind(addr)?;
        inner.set_nonblocking(true)?;
        Ok(Self { inner })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Attempts a single receive; the caller loops this until it sees
    /// [`RecvOutcome::WouldBlock`] to drain everything queued this tick.
    pub fn recv(&self) -> RecvOutcome {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        match self.inner.recv_from(&mut buf) {
            Ok((len, from)) => {
                if len > MAX_DATAGRAM_SIZE {
                    return RecvOutcome::TooBig { from, len };
                }
                match PacketHeader::parse(&buf[..len]) {
                    Ok((header, payload)) => RecvOutcome::Ok(Received { from, header, payload: payload.to_vec() }),
                    Err(err) => {
                        warn!(%from, error = %err, "dropping malformed datagram");
                        RecvOutcome::InvalidHash { from }
                    }
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => RecvOutcome::WouldBlock,
            Err(err) => RecvOutcome::System(err),
        }
    }

    pub fn send_to(&self, peer: SocketAddr, datagram: &[u8]) -> std::io::Result<usize> {
        self.inner.send_to(datagram, peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn an_idle_socket_reports_would_block() {
        let socket = Socket::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        assert!(matches!(socket.recv(), RecvOutcome::WouldBlock));
    }

    #[test]
    fn a_valid_framed_packet_round_trips_over_loopback() {
        let server = Socket::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let client = Socket::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let server_addr = server.local_addr().unwrap();

        let framed = PacketHeader::frame(1, false, 1, b"payload").unwrap();
        client.send_to(server_addr, &framed).unwrap();

        let mut outcome = server.recv();
        for _ in 0..50 {
            if matches!(outcome, RecvOutcome::WouldBlock) {
                std::thread::sleep(std::time::Duration::from_millis(5));
                outcome = server.recv();
            } else {
                break;
            }
        }
        match outcome {
            RecvOutcome::Ok(received) => assert_eq!(received.payload, b"payload"),
            _ => panic!("expected a valid received datagram"),
        }
    }

    #[test]
    fn a_tampered_packet_is_reported_as_invalid_hash() {
        let server = Socket::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let client = Socket::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let server_addr = server.local_addr().unwrap();

        let mut framed = PacketHeader::frame(1, false, 1, b"payload").unwrap();
        let last = framed.len() - 1;
        framed[last] ^= 0xff;
        client.send_to(server_addr, &framed).unwrap();

        let mut outcome = server.recv();
        for _ in 0..50 {
            if matches!(outcome, RecvOutcome::WouldBlock) {
                std::thread::sleep(std::time::Duration::from_millis(5));
                outcome = server.recv();
            } else {
                break;
            }
        }
        assert!(matches!(outcome, RecvOutcome::InvalidHash { .. }));
    }
}
