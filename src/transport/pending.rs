//! Correlation slots keyed by request id.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::{Error, Result};

type Reply = (Bytes, SocketAddr);

struct Slot {
    sender: Option<oneshot::Sender<Reply>>,
    receiver: Option<oneshot::Receiver<Reply>>,
    registered: Instant,
    deadline: Instant,
}

/// Requests waiting for a reply.
///
/// The receive loop calls [`deliver`](Self::deliver); the requester calls
/// [`wait`](Self::wait). The lock is only held for map updates.
#[derive(Default)]
pub(crate) struct PendingRequests {
    slots: Mutex<HashMap<i32, Slot>>,
}

impl PendingRequests {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, request_id: i32, timeout: Duration) {
        let (sender, receiver) = oneshot::channel();
        let now = Instant::now();
        let slot = Slot {
            sender: Some(sender),
            receiver: Some(receiver),
            registered: now,
            deadline: now + timeout,
        };
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        // Expired slots nobody waited on (send failed, caller dropped).
        slots.retain(|_, s| s.deadline > now);
        slots.insert(request_id, slot);
    }

    /// Hand a reply to its waiter. Returns `false` for unknown ids.
    pub(crate) fn deliver(&self, request_id: i32, data: Bytes, source: SocketAddr) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = slots.get_mut(&request_id).and_then(|s| s.sender.take()) else {
            return false;
        };
        sender.send((data, source)).is_ok()
    }

    pub(crate) fn cancel(&self, request_id: i32) {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&request_id);
    }

    /// Wait for the reply to `request_id` until its deadline.
    pub(crate) async fn wait(&self, request_id: i32, target: SocketAddr) -> Result<Reply> {
        let taken = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots
                .get_mut(&request_id)
                .and_then(|s| Some((s.receiver.take()?, s.registered, s.deadline)))
        };
        let Some((receiver, registered, deadline)) = taken else {
            tracing::debug!(target: "snmp_poller::transport", { snmp.request_id = request_id, snmp.target = %target }, "no pending slot for request");
            return Err(Error::Timeout {
                target,
                elapsed: Duration::ZERO,
                retries: 0,
            }
            .boxed());
        };

        let result = tokio::time::timeout_at(deadline, receiver).await;
        self.cancel(request_id);

        match result {
            Ok(Ok(reply)) => Ok(reply),
            // Sender dropped: slot was cancelled under us.
            Ok(Err(_)) | Err(_) => {
                let elapsed = registered.elapsed();
                tracing::debug!(target: "snmp_poller::transport", { snmp.request_id = request_id, snmp.target = %target, ?elapsed }, "transport timeout");
                Err(Error::Timeout {
                    target,
                    elapsed,
                    retries: 0,
                }
                .boxed())
            }
        }
    }
}
