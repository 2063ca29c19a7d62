//! Datagram transport under the network adapters
//!
//! Adapters only ever see an [`Endpoint`]: one remote peer, a non-blocking
//! receive that drops datagrams from anyone else, and a send. The socket
//! behind it is a [`DatagramLink`], a UDP socket in production and an
//! in-memory pair in tests.

use std::io;
use std::net::SocketAddr;

use tokio::net::{lookup_host, UdpSocket};
use tracing::{debug, error, info, warn};

use crate::config::EndpointConfig;
use crate::error::GatewayError;

/// Largest datagram any supported protocol sends
pub const MAX_DATAGRAM: usize = 512;

/// A non-blocking datagram socket
pub trait DatagramLink: Send {
    /// Receive one datagram if one is waiting
    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>>;

    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> io::Result<()>;
}

/// UDP socket polled without the reactor
///
/// The socket is bound through tokio, then handed back as a non-blocking std
/// socket so every poll is a real `recvfrom`/`sendto` rather than a check of
/// cached readiness.
pub struct UdpLink {
    socket: std::net::UdpSocket,
}

impl UdpLink {
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?.into_std()?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl DatagramLink for UdpLink {
    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(buf) {
            Ok(received) => Ok(Some(received)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> io::Result<()> {
        self.socket.send_to(buf, addr).map(|_| ())
    }
}

/// Resolve `host:port` to its first address
pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr, GatewayError> {
    let unresolved = || GatewayError::Resolve {
        host: host.to_string(),
        port,
    };
    lookup_host((host, port))
        .await
        .map_err(|_| unresolved())?
        .next()
        .ok_or_else(unresolved)
}

/// One network's connection to its remote peer
pub struct Endpoint {
    name: &'static str,
    link: Option<Box<dyn DatagramLink>>,
    remote: SocketAddr,
    debug: bool,
}

impl Endpoint {
    /// Resolve the remote peer and bind the local socket
    pub async fn open(config: &EndpointConfig, name: &'static str) -> Result<Self, GatewayError> {
        let remote = resolve(&config.remote_address, config.remote_port)
            .await
            .inspect_err(|e| error!("{name}: {e}"))?;
        let local = resolve(&config.local_address, config.local_port).await?;
        let link = UdpLink::bind(local).await.inspect_err(|e| {
            error!("{name}: cannot bind {local}: {e}");
        })?;
        info!(
            "{name}: {} <-> {remote}",
            link.local_addr().unwrap_or(local)
        );
        Ok(Self::new(Box::new(link), remote, name, config.debug))
    }

    /// Wrap an already-open link
    pub fn new(
        link: Box<dyn DatagramLink>,
        remote: SocketAddr,
        name: &'static str,
        debug: bool,
    ) -> Self {
        Self {
            name,
            link: Some(link),
            remote,
            debug,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// One non-blocking read; datagrams from any other peer are dropped
    pub fn recv(&mut self) -> Option<Vec<u8>> {
        let link = self.link.as_mut()?;
        let mut buf = [0u8; MAX_DATAGRAM];
        let (len, from) = match link.try_recv(&mut buf) {
            Ok(Some(received)) => received,
            Ok(None) => return None,
            Err(e) => {
                warn!("{}: receive failed: {e}", self.name);
                return None;
            }
        };

        if from != self.remote {
            warn!(
                "{}: dropping {len} bytes from unexpected peer {from}",
                self.name
            );
            return None;
        }
        if self.debug {
            debug!("{} received {:02X?}", self.name, &buf[..len]);
        }
        Some(buf[..len].to_vec())
    }

    pub fn send(&mut self, data: &[u8]) -> bool {
        let Some(link) = self.link.as_mut() else {
            return false;
        };
        if self.debug {
            debug!("{} sending {:02X?}", self.name, data);
        }
        match link.send_to(data, self.remote) {
            Ok(()) => true,
            Err(e) => {
                warn!("{}: send to {} failed: {e}", self.name, self.remote);
                false
            }
        }
    }

    pub fn close(&mut self) {
        if self.link.take().is_some() {
            info!("{}: closed", self.name);
        }
    }
}
