//! In-process datagram links
//!
//! A [`MemoryLink`] pair behaves like two UDP sockets that can only reach
//! each other. Hand one end to an `Endpoint` and drive the other from the
//! test, playing the remote network.

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use dv_gateway::DatagramLink;
use tracing::trace;

type Queue = Arc<Mutex<VecDeque<(Vec<u8>, SocketAddr)>>>;

fn lock(queue: &Queue) -> MutexGuard<'_, VecDeque<(Vec<u8>, SocketAddr)>> {
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One end of an in-memory datagram pair
///
/// Clones share the same queues.
#[derive(Debug, Clone)]
pub struct MemoryLink {
    local: SocketAddr,
    peer: SocketAddr,
    inbox: Queue,
    outbox: Queue,
}

impl MemoryLink {
    /// Two connected ends bound to `a` and `b`
    pub fn pair(a: SocketAddr, b: SocketAddr) -> (MemoryLink, MemoryLink) {
        let (qa, qb) = (Queue::default(), Queue::default());
        (
            MemoryLink {
                local: a,
                peer: b,
                inbox: qa.clone(),
                outbox: qb.clone(),
            },
            MemoryLink {
                local: b,
                peer: a,
                inbox: qb,
                outbox: qa,
            },
        )
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Send a datagram to the other end
    pub fn push(&self, data: &[u8]) {
        lock(&self.outbox).push_back((data.to_vec(), self.local));
    }

    /// Deliver a datagram to this end as if it came from `from`
    pub fn inject(&self, data: &[u8], from: SocketAddr) {
        lock(&self.inbox).push_back((data.to_vec(), from));
    }

    /// Take every datagram waiting at this end
    pub fn drain(&self) -> Vec<Vec<u8>> {
        lock(&self.inbox).drain(..).map(|(data, _)| data).collect()
    }

    /// Number of datagrams waiting at this end
    pub fn pending(&self) -> usize {
        lock(&self.inbox).len()
    }
}

impl DatagramLink for MemoryLink {
    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        let Some((data, from)) = lock(&self.inbox).pop_front() else {
            return Ok(None);
        };
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(Some((len, from)))
    }

    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> io::Result<()> {
        if addr == self.peer {
            lock(&self.outbox).push_back((buf.to_vec(), self.local));
        } else {
            trace!("Datagram for {addr} has nowhere to go");
        }
        Ok(())
    }
}
