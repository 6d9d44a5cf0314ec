pub mod error;

pub use self::error::{TransportError, TransportErrorType};

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

/// Datagram link carrying voice packets to the voice server.
///
/// Sending is synchronous: packets leave on the playback tick and a
/// datagram send never waits for the peer.
pub trait Transport: Send + 'static {
    /// Points the link at a new voice server.
    fn connect(&mut self, addr: SocketAddr) -> Result<(), TransportError>;

    /// Sends one packet. There is no acknowledgement nor retransmission.
    fn send(&self, packet: &[u8]) -> Result<(), TransportError>;
}

/// UDP implementation of [`Transport`].
///
/// ```no_run
/// # use turntable::net::{Transport, TransportSocket};
/// let mut udp = TransportSocket::new();
///
/// // Not connected to anything by default.
/// udp.connect("127.0.0.1:50004".parse().unwrap())?;
/// udp.send(b"voice packet")?;
/// # Ok::<(), turntable::net::udp::TransportError>(())
/// ```
#[derive(Debug, Default)]
pub struct TransportSocket {
    socket: Option<UdpSocket>,
}

impl TransportSocket {
    /// Creates an unconnected socket.
    #[must_use]
    pub const fn new() -> Self {
        Self { socket: None }
    }

    /// Checks whether this socket is connected to a voice server.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    /// Gets the address the voice server sends replies to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket()?.local_addr().map_err(|source| TransportError {
            kind: TransportErrorType::Connect,
            source: Some(Box::new(source)),
        })
    }

    /// Receives one datagram from the voice server, blocking until one arrives.
    pub fn recv(&self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        self.socket()?.recv(buffer).map_err(|source| TransportError {
            kind: TransportErrorType::Receiving,
            source: Some(Box::new(source)),
        })
    }

    fn socket(&self) -> Result<&UdpSocket, TransportError> {
        self.socket.as_ref().ok_or(TransportError {
            kind: TransportErrorType::NotConnected,
            source: None,
        })
    }
}

impl Transport for TransportSocket {
    fn connect(&mut self, addr: SocketAddr) -> Result<(), TransportError> {
        let local = match addr {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };

        let socket = UdpSocket::bind(local).map_err(|source| TransportError {
            kind: TransportErrorType::Connect,
            source: Some(Box::new(source)),
        })?;

        socket.connect(addr).map_err(|source| TransportError {
            kind: TransportErrorType::Connect,
            source: Some(Box::new(source)),
        })?;

        self.socket = Some(socket);
        Ok(())
    }

    fn send(&self, packet: &[u8]) -> Result<(), TransportError> {
        self.socket()?
            .send(packet)
            .map_err(|source| TransportError {
                kind: TransportErrorType::Sending,
                source: Some(Box::new(source)),
            })
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn sends_to_connected_peer() {
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        peer.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

        let mut udp = TransportSocket::new();
        udp.connect(peer.local_addr().unwrap()).unwrap();
        assert!(udp.is_connected());
        udp.send(b"\x80\x78packet").unwrap();

        let mut buffer = [0u8; 64];
        let (len, from) = peer.recv_from(&mut buffer).unwrap();
        assert_eq!(&buffer[..len], b"\x80\x78packet");
        assert_eq!(from.port(), udp.local_addr().unwrap().port());

        peer.send_to(b"reply", from).unwrap();
        let len = udp.recv(&mut buffer).unwrap();
        assert_eq!(&buffer[..len], b"reply");
    }

    #[test]
    fn unconnected_socket_refuses_to_send() {
        let udp = TransportSocket::new();
        let error = udp.send(b"packet").unwrap_err();
        assert!(matches!(error.kind(), TransportErrorType::NotConnected));
    }
}
