//! UDP transport: one unconnected socket, many targets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use super::{PendingRequests, Transport, initial_request_id};
use crate::error::{Error, Result};
use crate::message::peek_request_id;
use crate::util::bind_udp_socket;

/// Largest datagram we accept.
const MAX_MESSAGE_SIZE: usize = 65_507;

/// UDP transport shared by every request of a session.
///
/// A background task reads the socket and hands each datagram to the
/// request whose id it carries. The task stops when the last clone is
/// dropped.
///
/// ```rust,no_run
/// # async fn example() -> snmp_poller::Result<()> {
/// use snmp_poller::transport::{Transport, UdpTransport};
///
/// let transport = UdpTransport::bind("0.0.0.0:0".parse().unwrap()).await?;
/// println!("listening on {}", transport.local_addr());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct UdpTransport {
    inner: Arc<Inner>,
}

struct Inner {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    pending: Arc<PendingRequests>,
    next_request_id: AtomicI32,
    recv_task: JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

impl UdpTransport {
    /// Bind to `addr` and start the receive loop.
    ///
    /// IPv6 addresses get `IPV6_V6ONLY`.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = bind_udp_socket(addr)
            .await
            .map_err(|source| Error::Network { target: addr, source }.boxed())?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| Error::Network { target: addr, source }.boxed())?;

        let socket = Arc::new(socket);
        let pending = Arc::new(PendingRequests::new());
        let recv_task = tokio::spawn(recv_loop(socket.clone(), pending.clone()));
        let first_id = initial_request_id();

        tracing::debug!(target: "snmp_poller::transport", { snmp.local_addr = %local_addr, snmp.request_id = first_id }, "UDP transport bound");

        Ok(Self {
            inner: Arc::new(Inner {
                socket,
                local_addr,
                pending,
                next_request_id: AtomicI32::new(first_id),
                recv_task,
            }),
        })
    }

    /// Bind an ephemeral port in the address family of `target`.
    pub async fn for_target(target: SocketAddr) -> Result<Self> {
        let addr: SocketAddr = if target.is_ipv6() {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        } else {
            (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
        };
        Self::bind(addr).await
    }
}

async fn recv_loop(socket: Arc<UdpSocket>, pending: Arc<PendingRequests>) {
    let mut buf = vec![0u8; MAX_MESSAGE_SIZE];
    loop {
        let (len, source) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                // ICMP port-unreachable surfaces here on some platforms.
                tracing::debug!(target: "snmp_poller::transport", error = %e, "UDP recv error");
                continue;
            }
        };
        let data = Bytes::copy_from_slice(&buf[..len]);

        match peek_request_id(&data) {
            Some(request_id) => {
                tracing::trace!(target: "snmp_poller::transport", { snmp.request_id = request_id, snmp.source = %source, snmp.bytes = len }, "UDP recv");
                if !pending.deliver(request_id, data, source) {
                    tracing::debug!(target: "snmp_poller::transport", { snmp.request_id = request_id, snmp.source = %source }, "reply for unknown request_id");
                }
            }
            None => {
                tracing::debug!(target: "snmp_poller::transport", { snmp.source = %source, snmp.bytes = len }, "datagram without a request_id");
            }
        }
    }
}

impl Transport for UdpTransport {
    fn register_request(&self, request_id: i32, timeout: Duration) {
        self.inner.pending.register(request_id, timeout);
    }

    fn cancel_request(&self, request_id: i32) {
        self.inner.pending.cancel(request_id);
    }

    async fn send(&self, target: SocketAddr, data: &[u8]) -> Result<()> {
        tracing::trace!(target: "snmp_poller::transport", { snmp.target = %target, snmp.bytes = data.len() }, "UDP send");
        self.inner
            .socket
            .send_to(data, target)
            .await
            .map_err(|source| Error::Network { target, source }.boxed())?;
        Ok(())
    }

    async fn recv(&self, request_id: i32, target: SocketAddr) -> Result<(Bytes, SocketAddr)> {
        self.inner.pending.wait(request_id, target).await
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    fn alloc_request_id(&self) -> i32 {
        let id = self.inner.next_request_id.fetch_add(1, Ordering::Relaxed);
        if id <= 0 {
            // Wrapped; restart in the positive range.
            self.inner.next_request_id.store(2, Ordering::Relaxed);
            return 1;
        }
        id
    }
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("local_addr", &self.inner.local_addr)
            .finish_non_exhaustive()
    }
}
