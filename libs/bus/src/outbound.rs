//! Outbound connection pool.
//!
//! One writer per destination endpoint, shared by every handle acquired for
//! that endpoint. Each writer owns its transport and a queue; callers only
//! ever enqueue, so sending never blocks and never fails from the caller's
//! point of view. Delivery is best-effort and at-most-once: a frame that
//! cannot be written is logged and dropped, and the next frame triggers a
//! fresh connect. The last release stops the writer at once; frames still
//! queued at that point are discarded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pushbus_fabric::{Endpoint, Error as FabricError, Transport};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::envelope::Envelope;
use crate::error::{BusError, Result};

/// Default time allowed for establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

struct OutboundLink {
    endpoint: Endpoint,
    queue: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
    writer: JoinHandle<()>,
}

impl OutboundLink {
    fn enqueue(&self, envelope: Envelope) {
        if let Some(queue) = self.queue.lock().as_ref() {
            // A closed queue means the writer is gone; nothing to report
            let _ = queue.send(envelope);
        }
    }

    /// Close the queue and stop the writer, dropping anything still queued.
    fn shut_down(&self) {
        self.queue.lock().take();
        self.writer.abort();
    }
}

struct PoolEntry {
    refs: usize,
    link: Arc<OutboundLink>,
}

struct PoolShared {
    links: Mutex<HashMap<Endpoint, PoolEntry>>,
    connect_timeout: Duration,
}

/// Registry of outbound connections, at most one per endpoint.
///
/// Cloning yields another reference to the same registry.
#[derive(Clone)]
pub struct OutboundPool {
    shared: Arc<PoolShared>,
}

impl OutboundPool {
    #[must_use]
    pub fn new() -> Self {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    #[must_use]
    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                links: Mutex::new(HashMap::new()),
                connect_timeout,
            }),
        }
    }

    /// Get a handle to the connection for `address`, creating it if needed.
    ///
    /// Connection establishment happens in the background. Must be called
    /// from within a tokio runtime.
    pub fn acquire(&self, address: &str) -> Result<OutboundHandle> {
        let endpoint: Endpoint = address.parse()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| BusError::NoRuntime)?;

        let mut links = self.shared.links.lock();

        if let Some(entry) = links.get_mut(&endpoint) {
            entry.refs += 1;
            debug!(address = %endpoint, refs = entry.refs, "Outbound ref count increased");
            return Ok(OutboundHandle::new(&self.shared, &entry.link));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let writer = runtime.spawn(run_writer(
            endpoint.clone(),
            rx,
            self.shared.connect_timeout,
        ));
        let link = Arc::new(OutboundLink {
            endpoint: endpoint.clone(),
            queue: Mutex::new(Some(tx)),
            writer,
        });

        info!(address = %endpoint, "New outbound connection created");

        let handle = OutboundHandle::new(&self.shared, &link);
        links.insert(endpoint, PoolEntry { refs: 1, link });
        Ok(handle)
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.shared.links.lock().len()
    }

    /// Outstanding handles for `address`, 0 if there is no connection.
    pub fn ref_count(&self, address: &str) -> usize {
        let Ok(endpoint) = address.parse::<Endpoint>() else {
            return 0;
        };
        self.shared
            .links
            .lock()
            .get(&endpoint)
            .map_or(0, |entry| entry.refs)
    }
}

impl Default for OutboundPool {
    fn default() -> Self {
        Self::new()
    }
}

/// One reference to a pooled outbound connection.
///
/// Released explicitly with [`OutboundHandle::release`] or on drop; the last
/// release tears the connection down.
pub struct OutboundHandle {
    pool: Arc<PoolShared>,
    link: Arc<OutboundLink>,
    released: AtomicBool,
}

impl OutboundHandle {
    fn new(pool: &Arc<PoolShared>, link: &Arc<OutboundLink>) -> Self {
        Self {
            pool: Arc::clone(pool),
            link: Arc::clone(link),
            released: AtomicBool::new(false),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.link.endpoint
    }

    /// Queue `envelope` for transmission. Silently ignored after release.
    pub fn send(&self, envelope: Envelope) {
        if self.released.load(Ordering::Acquire) {
            return;
        }
        self.link.enqueue(envelope);
    }

    /// Give up this reference. Further calls are no-ops.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut links = self.pool.links.lock();
        let endpoint = &self.link.endpoint;

        let Some(entry) = links.get_mut(endpoint) else {
            return;
        };
        if !Arc::ptr_eq(&entry.link, &self.link) {
            return;
        }

        entry.refs = entry.refs.saturating_sub(1);
        debug!(address = %endpoint, refs = entry.refs, "Outbound ref count decreased");

        if entry.refs == 0 {
            links.remove(endpoint);
            self.link.shut_down();
            info!(address = %endpoint, "Outbound connection disposed");
        }
    }
}

impl Drop for OutboundHandle {
    fn drop(&mut self) {
        self.release();
    }
}

async fn run_writer(
    endpoint: Endpoint,
    mut queue: mpsc::UnboundedReceiver<Envelope>,
    connect_timeout: Duration,
) {
    let mut transport = connect(&endpoint, connect_timeout).await;

    while let Some(envelope) = queue.recv().await {
        let bytes = match envelope.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(address = %endpoint, kind = ?envelope.kind(), error = %e, "Failed to serialize envelope");
                continue;
            }
        };

        if transport.is_none() {
            transport = connect(&endpoint, connect_timeout).await;
        }

        let Some(active) = transport.as_mut() else {
            warn!(address = %endpoint, kind = ?envelope.kind(), "No connection, message dropped");
            continue;
        };

        match active.send(&bytes).await {
            Ok(()) => {}
            // Rejected before anything was written; the stream is intact
            Err(FabricError::InvalidFrame(reason)) => {
                warn!(address = %endpoint, kind = ?envelope.kind(), reason = %reason, "Frame rejected, message dropped");
            }
            Err(e) => {
                warn!(address = %endpoint, kind = ?envelope.kind(), error = %e, "Send failed, message dropped");
                transport = None;
            }
        }
    }

    if let Some(mut active) = transport {
        let _ = active.close().await;
    }
    debug!(address = %endpoint, "Outbound writer stopped");
}

async fn connect(endpoint: &Endpoint, timeout: Duration) -> Option<Box<dyn Transport>> {
    match endpoint.connect(Some(timeout)).await {
        Ok(transport) => {
            debug!(address = %endpoint, "Connected");
            Some(transport)
        }
        Err(e) => {
            warn!(address = %endpoint, error = %e, "Connect failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Message;
    use crate::payload::PushTokenInfo;
    use pushbus_fabric::transport::{TcpTransportListener, MAX_FRAME_SIZE};

    fn listener() -> (TcpTransportListener, String) {
        let listener = TcpTransportListener::bind("127.0.0.1:0").unwrap();
        let addr = format!("tcp://{}", listener.local_addr().unwrap());
        (listener, addr)
    }

    #[tokio::test]
    async fn one_connection_per_address() {
        let pool = OutboundPool::new();
        let (_listener, addr) = listener();

        let a = pool.acquire(&addr).unwrap();
        let b = pool.acquire(&addr).unwrap();
        assert_eq!(pool.connection_count(), 1);
        assert_eq!(pool.ref_count(&addr), 2);

        a.release();
        assert_eq!(pool.connection_count(), 1);
        assert_eq!(pool.ref_count(&addr), 1);

        b.release();
        assert_eq!(pool.connection_count(), 0);
        assert_eq!(pool.ref_count(&addr), 0);
    }

    #[tokio::test]
    async fn equivalent_addresses_share_a_connection() {
        let pool = OutboundPool::new();
        let (_listener, addr) = listener();
        let bare = addr.trim_start_matches("tcp://").to_string();

        let _a = pool.acquire(&addr).unwrap();
        let _b = pool.acquire(&bare).unwrap();
        assert_eq!(pool.connection_count(), 1);
        assert_eq!(pool.ref_count(&bare), 2);
    }

    #[tokio::test]
    async fn double_release_is_a_noop() {
        let pool = OutboundPool::new();
        let (_listener, addr) = listener();

        let a = pool.acquire(&addr).unwrap();
        let b = pool.acquire(&addr).unwrap();
        a.release();
        a.release();
        drop(a);

        assert_eq!(pool.ref_count(&addr), 1);
        drop(b);
        assert_eq!(pool.connection_count(), 0);
    }

    #[tokio::test]
    async fn stale_handle_does_not_touch_new_connection() {
        let pool = OutboundPool::new();
        let (_listener, addr) = listener();

        let old = pool.acquire(&addr).unwrap();
        let keep = pool.acquire(&addr).unwrap();
        drop(keep);
        old.release();

        let fresh = pool.acquire(&addr).unwrap();
        // Releasing the old handle again must not decrement the new entry
        old.release();
        assert_eq!(pool.ref_count(&addr), 1);
        drop(fresh);
    }

    #[tokio::test]
    async fn pools_are_isolated() {
        let first = OutboundPool::new();
        let second = OutboundPool::new();
        let (_listener, addr) = listener();

        let _a = first.acquire(&addr).unwrap();
        assert_eq!(second.connection_count(), 0);
    }

    #[tokio::test]
    async fn invalid_address_is_rejected() {
        let pool = OutboundPool::new();
        assert!(matches!(
            pool.acquire("not an address"),
            Err(BusError::Fabric(_))
        ));
    }

    #[test]
    fn acquire_outside_runtime_fails() {
        let pool = OutboundPool::new();
        assert!(matches!(
            pool.acquire("tcp://127.0.0.1:1"),
            Err(BusError::NoRuntime)
        ));
    }

    #[tokio::test]
    async fn sent_envelopes_arrive_in_order() {
        let pool = OutboundPool::new();
        let (listener, addr) = listener();
        let handle = pool.acquire(&addr).unwrap();

        let first = Envelope::new(Message::Ping, 7, 1);
        let second = Envelope::new(Message::Pong, 7, 1).with_correlation_code(99);
        handle.send(first.clone());
        handle.send(second.clone());

        let (mut conn, _) = listener.accept().await.unwrap();
        assert_eq!(Envelope::parse(&conn.receive().await.unwrap()).unwrap(), first);
        assert_eq!(Envelope::parse(&conn.receive().await.unwrap()).unwrap(), second);
    }

    #[tokio::test]
    async fn send_without_listener_does_not_fail() {
        let pool = OutboundPool::with_connect_timeout(Duration::from_millis(200));
        let addr = {
            let (_listener, addr) = listener();
            addr
        };

        let handle = pool.acquire(&addr).unwrap();
        for _ in 0..3 {
            handle.send(Envelope::new(Message::Ping, 1, 1));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.release();
        handle.send(Envelope::new(Message::Ping, 1, 1));
    }

    #[tokio::test]
    async fn released_handle_sends_nothing() {
        let pool = OutboundPool::new();
        let (listener, addr) = listener();

        let handle = pool.acquire(&addr).unwrap();
        handle.release();
        handle.send(Envelope::new(Message::Ping, 1, 1));

        // The writer may have connected before shutting down; it must not
        // deliver anything.
        let outcome = tokio::time::timeout(Duration::from_millis(200), async {
            let (mut conn, _) = listener.accept().await.unwrap();
            conn.receive().await
        })
        .await;
        assert!(!matches!(outcome, Ok(Ok(_))));
    }

    #[tokio::test]
    async fn last_release_discards_queued_frames() {
        let pool = OutboundPool::new();
        let (listener, addr) = listener();
        let handle = pool.acquire(&addr).unwrap();

        let first = Envelope::new(Message::Ping, 7, 1);
        handle.send(first.clone());
        let (mut conn, _) = listener.accept().await.unwrap();
        assert_eq!(Envelope::parse(&conn.receive().await.unwrap()).unwrap(), first);

        // Queued but not yet written when the connection goes away
        handle.send(Envelope::new(Message::Pong, 7, 1));
        handle.release();

        let next = tokio::time::timeout(Duration::from_secs(1), conn.receive()).await;
        assert!(!matches!(next, Ok(Ok(_))));
    }

    #[tokio::test]
    async fn frame_queued_at_acquire_is_not_sent_after_release() {
        let pool = OutboundPool::new();
        let (listener, addr) = listener();

        let handle = pool.acquire(&addr).unwrap();
        handle.send(Envelope::new(Message::Ping, 7, 1));
        handle.release();

        let outcome = tokio::time::timeout(Duration::from_millis(200), async {
            let (mut conn, _) = listener.accept().await.unwrap();
            conn.receive().await
        })
        .await;
        assert!(!matches!(outcome, Ok(Ok(_))));
    }

    #[tokio::test]
    async fn oversized_frame_keeps_the_connection() {
        let pool = OutboundPool::new();
        let (listener, addr) = listener();
        let handle = pool.acquire(&addr).unwrap();

        // Payload fits the codec limit, header pushes the frame over
        let token = "x".repeat(MAX_FRAME_SIZE - 32);
        handle.send(Envelope::new(
            Message::TokenRegistration(PushTokenInfo::new(1, token)),
            7,
            1,
        ));
        let after = Envelope::new(Message::Ping, 7, 1);
        handle.send(after.clone());

        let (mut conn, _) = listener.accept().await.unwrap();
        let received = tokio::time::timeout(Duration::from_secs(5), conn.receive())
            .await
            .expect("timed out waiting for frame")
            .expect("connection was dropped");
        assert_eq!(Envelope::parse(&received).unwrap(), after);
    }
}
