//! Inbound message routing.
//!
//! A router owns one bound listener. Every accepted connection gets a reader
//! task that pushes raw frames into a shared bounded queue; a single pump
//! drains the queue in batches and hands each batch to its own task for
//! dispatch. Dispatch reads only the header to find the receiver registered
//! for the envelope's channel, so frames for unknown channels are dropped
//! without decoding their payload.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use pushbus_fabric::{Endpoint, EndpointListener, Error as FabricError, Transport};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, trace, warn};

use crate::envelope::{Envelope, EnvelopeHeader};
use crate::error::{BusError, HandlerResult, Result};

/// Frames buffered between the readers and the pump.
pub const QUEUE_CAPACITY: usize = 10_000;

/// Most frames dispatched by a single batch task.
pub const BATCH_LIMIT: usize = 1_000;

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Consumer of envelopes arriving on one channel.
///
/// Called from dispatch tasks, possibly concurrently for different batches.
/// Errors and panics are logged and never stop the router.
pub trait MessageReceiver: Send + Sync {
    fn handle_message(&self, envelope: Envelope) -> HandlerResult;
}

impl<F> MessageReceiver for F
where
    F: Fn(Envelope) -> HandlerResult + Send + Sync,
{
    fn handle_message(&self, envelope: Envelope) -> HandlerResult {
        self(envelope)
    }
}

type Receivers = RwLock<HashMap<i32, Arc<dyn MessageReceiver>>>;

struct Router {
    local: Endpoint,
    receivers: Arc<Receivers>,
    tasks: Vec<JoinHandle<()>>,
}

impl Router {
    fn shut_down(&self) {
        for task in &self.tasks {
            task.abort();
        }
        self.receivers.write().clear();
    }
}

struct RouterEntry {
    refs: usize,
    router: Arc<Router>,
}

type Routers = Mutex<HashMap<Endpoint, RouterEntry>>;

/// Registry of inbound routers, at most one per bind address.
///
/// Cloning yields another reference to the same registry.
#[derive(Clone, Default)]
pub struct InboundRegistry {
    routers: Arc<Routers>,
}

impl InboundRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a handle to the router bound on `bind_address`, binding it if
    /// needed. Must be called from within a tokio runtime.
    pub fn acquire(&self, bind_address: &str) -> Result<RouterHandle> {
        let endpoint: Endpoint = bind_address.parse()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| BusError::NoRuntime)?;

        let mut routers = self.routers.lock();

        if let Some(entry) = routers.get_mut(&endpoint) {
            entry.refs += 1;
            debug!(address = %endpoint, refs = entry.refs, "Router ref count increased");
            return Ok(RouterHandle::new(&self.routers, &endpoint, &entry.router));
        }

        let listener = endpoint.bind()?;
        let local = listener.local_endpoint()?;

        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let receivers: Arc<Receivers> = Arc::default();
        let tasks = vec![
            runtime.spawn(run_acceptor(listener, tx)),
            runtime.spawn(run_pump(rx, Arc::clone(&receivers))),
        ];

        info!(address = %endpoint, local = %local, "New router created");

        let router = Arc::new(Router {
            local,
            receivers,
            tasks,
        });
        let handle = RouterHandle::new(&self.routers, &endpoint, &router);
        routers.insert(endpoint, RouterEntry { refs: 1, router });
        Ok(handle)
    }

    /// Number of live routers.
    pub fn router_count(&self) -> usize {
        self.routers.lock().len()
    }

    /// Outstanding handles for `bind_address`, 0 if there is no router.
    pub fn ref_count(&self, bind_address: &str) -> usize {
        let Ok(endpoint) = bind_address.parse::<Endpoint>() else {
            return 0;
        };
        self.routers
            .lock()
            .get(&endpoint)
            .map_or(0, |entry| entry.refs)
    }
}

/// One reference to a shared inbound router.
///
/// Released explicitly with [`RouterHandle::release`] or on drop; the last
/// release stops the listener and forgets every receiver.
pub struct RouterHandle {
    routers: Arc<Routers>,
    bind: Endpoint,
    router: Arc<Router>,
    released: AtomicBool,
}

impl RouterHandle {
    fn new(routers: &Arc<Routers>, bind: &Endpoint, router: &Arc<Router>) -> Self {
        Self {
            routers: Arc::clone(routers),
            bind: bind.clone(),
            router: Arc::clone(router),
            released: AtomicBool::new(false),
        }
    }

    /// Address the router was acquired for.
    pub fn bind_endpoint(&self) -> &Endpoint {
        &self.bind
    }

    /// Address peers should connect to. Differs from the bind address when
    /// binding to port 0.
    pub fn local_endpoint(&self) -> &Endpoint {
        &self.router.local
    }

    /// Route envelopes for `channel_id` to `receiver`, replacing any previous
    /// registration.
    pub fn register(&self, channel_id: i32, receiver: Arc<dyn MessageReceiver>) {
        if self.released.load(Ordering::Acquire) {
            return;
        }
        let replaced = self
            .router
            .receivers
            .write()
            .insert(channel_id, receiver)
            .is_some();
        debug!(address = %self.bind, channel = channel_id, replaced, "Receiver registered");
    }

    /// Stop routing `channel_id`. Returns whether a receiver was registered.
    pub fn unregister(&self, channel_id: i32) -> bool {
        let removed = self.router.receivers.write().remove(&channel_id).is_some();
        if removed {
            debug!(address = %self.bind, channel = channel_id, "Receiver unregistered");
        }
        removed
    }

    /// Stop routing `channel_id` only if `receiver` is the one registered.
    /// A later registration for the same channel is left in place.
    pub fn unregister_if(&self, channel_id: i32, receiver: &Arc<dyn MessageReceiver>) -> bool {
        let mut receivers = self.router.receivers.write();
        let ours = receivers
            .get(&channel_id)
            .is_some_and(|current| Arc::ptr_eq(current, receiver));
        if ours {
            receivers.remove(&channel_id);
            debug!(address = %self.bind, channel = channel_id, "Receiver unregistered");
        }
        ours
    }

    pub fn is_registered(&self, channel_id: i32) -> bool {
        self.router.receivers.read().contains_key(&channel_id)
    }

    /// Give up this reference. Further calls are no-ops.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut routers = self.routers.lock();

        let Some(entry) = routers.get_mut(&self.bind) else {
            return;
        };
        if !Arc::ptr_eq(&entry.router, &self.router) {
            return;
        }

        entry.refs = entry.refs.saturating_sub(1);
        debug!(address = %self.bind, refs = entry.refs, "Router ref count decreased");

        if entry.refs == 0 {
            routers.remove(&self.bind);
            self.router.shut_down();
            info!(address = %self.bind, "Router disposed");
        }
    }
}

impl Drop for RouterHandle {
    fn drop(&mut self) {
        self.release();
    }
}

async fn run_acceptor(listener: EndpointListener, frames: mpsc::Sender<Vec<u8>>) {
    // Dropping the set on abort stops every reader
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(transport) => {
                    trace!("Accepted inbound connection");
                    connections.spawn(read_frames(transport, frames.clone()));
                }
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn read_frames(mut transport: Box<dyn Transport>, frames: mpsc::Sender<Vec<u8>>) {
    loop {
        match transport.receive().await {
            Ok(frame) => {
                if frames.send(frame).await.is_err() {
                    break;
                }
            }
            Err(FabricError::ConnectionClosed) => {
                trace!("Inbound connection closed");
                break;
            }
            Err(e) => {
                // The stream cannot be resynchronized after a framing error
                warn!(error = %e, "Dropping inbound connection");
                break;
            }
        }
    }
}

async fn run_pump(mut frames: mpsc::Receiver<Vec<u8>>, receivers: Arc<Receivers>) {
    while let Some(batch) = next_batch(&mut frames, BATCH_LIMIT).await {
        let receivers = Arc::clone(&receivers);
        tokio::spawn(async move {
            for frame in &batch {
                dispatch_frame(&receivers, frame);
            }
        });
    }
}

/// Wait for one frame, then take whatever else is already queued, up to
/// `limit` frames in total. `None` once every sender is gone.
async fn next_batch(frames: &mut mpsc::Receiver<Vec<u8>>, limit: usize) -> Option<Vec<Vec<u8>>> {
    let first = frames.recv().await?;
    let mut batch = Vec::with_capacity(limit.min(64));
    batch.push(first);

    while batch.len() < limit {
        match frames.try_recv() {
            Ok(frame) => batch.push(frame),
            Err(_) => break,
        }
    }

    Some(batch)
}

fn dispatch_frame(receivers: &Receivers, frame: &[u8]) {
    let (header, body) = match EnvelopeHeader::read(frame) {
        Ok(parts) => parts,
        Err(e) => {
            warn!(error = %e, len = frame.len(), "Dropping unreadable frame");
            return;
        }
    };

    let receiver = receivers.read().get(&header.channel_id).cloned();
    let Some(receiver) = receiver else {
        warn!(channel = header.channel_id, kind = ?header.kind, "No receiver for channel, message dropped");
        return;
    };

    let envelope = match Envelope::from_parts(header, body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(channel = header.channel_id, kind = ?header.kind, error = %e, "Dropping malformed envelope");
            return;
        }
    };

    match panic::catch_unwind(AssertUnwindSafe(|| receiver.handle_message(envelope))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(channel = header.channel_id, kind = ?header.kind, error = %e, "Receiver failed");
        }
        Err(_) => {
            error!(channel = header.channel_id, kind = ?header.kind, "Receiver panicked");
        }
    }
}
