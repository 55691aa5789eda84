//! Datagram transport with request-id correlation.
//!
//! A transport owns one local socket and serves any number of targets.
//! Callers register a request id with a deadline, send, then wait on that
//! id; replies are matched by the request id carried in the response PDU.

mod pending;
mod udp;

#[cfg(any(test, feature = "testing"))]
mod mock;

pub use udp::UdpTransport;

#[cfg(any(test, feature = "testing"))]
pub use mock::{MockResponse, MockTransport, RecordedRequest, ResponseBuilder};

pub(crate) use pending::PendingRequests;

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// Client-side transport.
///
/// Implementations are cheap to clone (shared state behind an `Arc`), so a
/// session and the tasks it spawns can each hold one.
pub trait Transport: Send + Sync + Clone + 'static {
    /// Open a correlation slot for `request_id` that expires after `timeout`.
    ///
    /// Must be called before [`send`](Self::send) so a fast reply is not
    /// dropped.
    fn register_request(&self, request_id: i32, timeout: Duration);

    /// Drop the slot for `request_id` without waiting on it.
    fn cancel_request(&self, request_id: i32);

    /// Send one encoded message to `target`.
    fn send(&self, target: SocketAddr, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Wait for the reply to `request_id`, or time out at the registered
    /// deadline.
    ///
    /// Returns the reply and the address it came from.
    fn recv(
        &self,
        request_id: i32,
        target: SocketAddr,
    ) -> impl Future<Output = Result<(Bytes, SocketAddr)>> + Send;

    fn local_addr(&self) -> SocketAddr;

    /// Next request id from the transport's counter.
    fn alloc_request_id(&self) -> i32;
}

/// Starting point for a request-id counter.
///
/// Time-derived so a quick restart on a reused port does not collide with
/// ids still in flight from the previous run.
pub(crate) fn initial_request_id() -> i32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as i32)
        .unwrap_or(1);
    (nanos & 0x3fff_ffff).max(1)
}
