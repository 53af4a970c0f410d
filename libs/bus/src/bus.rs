//! # Push Bus
//!
//! The per-service entry point. One bus owns:
//!
//! - an outbound handle to the aggregator (`server_address`)
//! - a router handle on `client_bind_address`, with itself registered for
//!   its channel
//! - two correlation tables: callback requests and awaited queries, kept in
//!   separate code namespaces
//! - the heartbeat task
//!
//! Sending never fails from the caller's point of view. A request that gets
//! no answer within the TTL is silently forgotten; callers that need a retry
//! issue a new request.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use pushbus_fabric::Endpoint;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::BusConfig;
use crate::correlation::CorrelationTable;
use crate::envelope::{Envelope, Message};
use crate::error::{HandlerResult, Result};
use crate::inbound::{InboundRegistry, MessageReceiver, RouterHandle};
use crate::outbound::{OutboundHandle, OutboundPool};
use crate::payload::{
    ChannelIndex, PushNotification, PushSubscription, PushSubscriptionResponse, PushTokenInfo,
    PushTokenResult, SubscriptionAction, SubscriptionSender,
};

/// Answer delivered to a [`PendingRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Token(PushTokenResult),
    Subscription(PushSubscriptionResponse),
}

/// Caller context waiting for the response to a request.
///
/// Resolved at most once, from a dispatch task. Contexts whose response never
/// arrives are dropped unresolved.
pub trait PendingRequest: Send + 'static {
    fn resolve(self: Box<Self>, reply: Reply);
}

impl<F> PendingRequest for F
where
    F: FnOnce(Reply) + Send + 'static,
{
    fn resolve(self: Box<Self>, reply: Reply) {
        (*self)(reply)
    }
}

/// Peer liveness as observed by the heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Liveness {
    /// No heartbeat has completed yet
    Unknown = 0,
    /// The last ping was answered within one interval
    Alive = 1,
    /// The last ping went unanswered
    Degraded = 2,
}

impl Liveness {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Liveness::Alive,
            2 => Liveness::Degraded,
            _ => Liveness::Unknown,
        }
    }
}

struct BusShared {
    channel_id: i32,
    sender_id: i32,
    outbound: OutboundHandle,
    requests: CorrelationTable<Box<dyn PendingRequest>>,
    queries: CorrelationTable<oneshot::Sender<PushSubscriptionResponse>>,
    forward: RwLock<Option<Arc<dyn MessageReceiver>>>,
    pong_received: AtomicBool,
    liveness: AtomicU8,
    missed_pongs: AtomicU64,
}

impl BusShared {
    fn envelope(&self, message: Message) -> Envelope {
        Envelope::new(message, self.channel_id, self.sender_id)
    }

    fn send(&self, envelope: Envelope) {
        self.outbound.send(envelope);
    }

    fn handle_incoming(&self, envelope: Envelope) -> HandlerResult {
        let code = envelope.correlation_code;

        match envelope.message {
            Message::TokenResponse(result) => self.resolve_request(code, Reply::Token(result)),
            Message::SubscriptionResponse {
                sender: SubscriptionSender::ServiceClient,
                response,
            } => self.resolve_request(code, Reply::Subscription(response)),
            Message::SubscriptionResponse {
                sender: SubscriptionSender::ServiceUri,
                response,
            } => self.resolve_query(code, response),
            Message::Ping => {
                trace!(channel_id = envelope.channel_id, sender_id = envelope.sender_id, "Ping received");
                self.send(envelope.reply(Message::Pong));
            }
            Message::Pong => {
                trace!(channel_id = envelope.channel_id, sender_id = envelope.sender_id, "Pong received");
                if envelope.sender_id == self.sender_id {
                    self.pong_received.store(true, Ordering::Release);
                }
            }
            _ => return self.forward(envelope),
        }

        Ok(())
    }

    fn resolve_request(&self, code: i64, reply: Reply) {
        match self.requests.try_take(code) {
            Some(pending) => pending.resolve(reply),
            None => trace!(code, "No pending request for response"),
        }
    }

    fn resolve_query(&self, code: i64, response: PushSubscriptionResponse) {
        match self.queries.try_take(code) {
            // The waiter may have given up already
            Some(waiter) => {
                let _ = waiter.send(response);
            }
            None => trace!(code, "No pending query for response"),
        }
    }

    fn forward(&self, envelope: Envelope) -> HandlerResult {
        let consumer = self.forward.read().clone();
        match consumer {
            Some(consumer) => consumer.handle_message(envelope),
            None => {
                debug!(channel_id = self.channel_id, kind = ?envelope.kind(), "No consumer, message dropped");
                Ok(())
            }
        }
    }

    fn send_ping(&self) {
        self.pong_received.store(false, Ordering::Release);
        trace!(channel_id = self.channel_id, "Sending ping");
        self.send(self.envelope(Message::Ping));
    }

    fn check_pong(&self) {
        if self.pong_received.load(Ordering::Acquire) {
            self.liveness.store(Liveness::Alive as u8, Ordering::Release);
            return;
        }

        let missed = self.missed_pongs.fetch_add(1, Ordering::AcqRel) + 1;
        self.liveness.store(Liveness::Degraded as u8, Ordering::Release);
        warn!(
            channel_id = self.channel_id,
            sender_id = self.sender_id,
            missed,
            "No pong received within heartbeat interval"
        );
    }

    fn purge_expired(&self) {
        let requests = self.requests.purge_expired();
        let queries = self.queries.purge_expired();
        if requests + queries > 0 {
            debug!(channel_id = self.channel_id, requests, queries, "Purged expired entries");
        }
    }
}

/// Registered on the router in place of the bus itself so the router never
/// keeps the bus alive.
struct BusReceiver {
    shared: Weak<BusShared>,
}

impl MessageReceiver for BusReceiver {
    fn handle_message(&self, envelope: Envelope) -> HandlerResult {
        match self.shared.upgrade() {
            Some(shared) => shared.handle_incoming(envelope),
            None => Ok(()),
        }
    }
}

/// Send side of a bus, for consumers that answer requests.
///
/// Does not keep the bus alive; sends after the bus is gone are ignored.
#[derive(Clone)]
pub struct BusSender {
    shared: Weak<BusShared>,
}

impl BusSender {
    pub fn send_one_way(&self, message: Message) {
        if let Some(shared) = self.shared.upgrade() {
            shared.send(shared.envelope(message));
        }
    }

    /// Answer `request` with `message`, keeping its correlation code and
    /// routing fields.
    pub fn reply(&self, request: &Envelope, message: Message) {
        if let Some(shared) = self.shared.upgrade() {
            shared.send(request.reply(message));
        }
    }
}

/// Per-service push message bus.
pub struct PushBus {
    shared: Arc<BusShared>,
    router: RouterHandle,
    receiver: Arc<dyn MessageReceiver>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl PushBus {
    /// Acquire the outbound connection and the router, register on the
    /// configured channel and start the heartbeat.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(
        config: BusConfig,
        outbound: &OutboundPool,
        inbound: &InboundRegistry,
    ) -> Result<Self> {
        config.validate()?;

        let outbound_handle = outbound.acquire(&config.server_address)?;
        let router = inbound.acquire(&config.client_bind_address)?;

        let shared = Arc::new(BusShared {
            channel_id: config.channel_id,
            sender_id: config.sender_id,
            outbound: outbound_handle,
            requests: CorrelationTable::with_config(config.request_ttl, config.sweep_depth),
            queries: CorrelationTable::with_config(config.request_ttl, config.sweep_depth),
            forward: RwLock::new(None),
            pong_received: AtomicBool::new(false),
            liveness: AtomicU8::new(Liveness::Unknown as u8),
            missed_pongs: AtomicU64::new(0),
        });

        let receiver: Arc<dyn MessageReceiver> = Arc::new(BusReceiver {
            shared: Arc::downgrade(&shared),
        });
        router.register(config.channel_id, receiver.clone());

        let heartbeat = config.heartbeat_enabled.then(|| {
            tokio::spawn(run_heartbeat(
                Arc::downgrade(&shared),
                config.heartbeat_initial_delay,
                config.heartbeat_interval,
            ))
        });

        info!(
            channel_id = config.channel_id,
            sender_id = config.sender_id,
            server = %config.server_address,
            bind = %router.local_endpoint(),
            "Push bus started"
        );

        Ok(Self {
            shared,
            router,
            receiver,
            heartbeat: Mutex::new(heartbeat),
            closed: AtomicBool::new(false),
        })
    }

    pub fn channel_id(&self) -> i32 {
        self.shared.channel_id
    }

    pub fn sender_id(&self) -> i32 {
        self.shared.sender_id
    }

    /// Address peers reach this bus on.
    pub fn local_endpoint(&self) -> &Endpoint {
        self.router.local_endpoint()
    }

    pub fn sender(&self) -> BusSender {
        BusSender {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Send `message` without expecting an answer.
    pub fn send_one_way(&self, message: Message) {
        self.shared.send(self.shared.envelope(message));
    }

    /// Send `message` under a fresh correlation code and keep `context`
    /// until the response arrives or the TTL runs out. Returns the code.
    pub fn send_request<P: PendingRequest>(&self, message: Message, context: P) -> i64 {
        let code = self.shared.requests.insert_fresh(Box::new(context));
        self.shared
            .send(self.shared.envelope(message).with_correlation_code(code));
        code
    }

    /// Issue a subscription query and get a future for its answer.
    ///
    /// The query is sent immediately. The future yields `None` when no
    /// answer arrives within the TTL or the bus shuts down.
    pub fn send_query(
        &self,
        subscription: PushSubscription,
    ) -> impl Future<Output = Option<PushSubscriptionResponse>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        let code = self.shared.queries.insert_fresh(tx);
        let deadline = Instant::now() + self.shared.queries.ttl();

        self.shared.send(
            self.shared
                .envelope(Message::Subscription {
                    sender: SubscriptionSender::ServiceUri,
                    subscription,
                })
                .with_correlation_code(code),
        );

        let shared = Arc::downgrade(&self.shared);
        async move {
            match tokio::time::timeout_at(deadline, rx).await {
                Ok(Ok(response)) => Some(response),
                Ok(Err(_)) => None,
                Err(_) => {
                    if let Some(shared) = shared.upgrade() {
                        shared.queries.remove(code);
                    }
                    None
                }
            }
        }
    }

    /// Resolve `pushservice/{query|lastupdate}/{account_id}/{name}` through a
    /// subscription query. Any other path yields `None` without sending.
    pub fn query_dynamic_uri(
        &self,
        path: &str,
    ) -> impl Future<Output = Option<PushSubscriptionResponse>> + Send + 'static {
        let query = parse_dynamic_uri(path).map(|(action, account_id)| {
            self.send_query(PushSubscription {
                action,
                account_id,
                channel: ChannelIndex::new([0]),
            })
        });

        async move {
            match query {
                Some(query) => query.await,
                None => None,
            }
        }
    }

    pub fn register_token<P: PendingRequest>(&self, info: PushTokenInfo, context: P) -> i64 {
        self.send_request(Message::TokenRegistration(info), context)
    }

    pub fn remove_token<P: PendingRequest>(&self, info: PushTokenInfo, context: P) -> i64 {
        self.send_request(Message::TokenRemove(info), context)
    }

    /// Relay a client's subscription request. The answer arrives as
    /// [`Reply::Subscription`].
    pub fn subscribe<P: PendingRequest>(&self, subscription: PushSubscription, context: P) -> i64 {
        self.send_request(
            Message::Subscription {
                sender: SubscriptionSender::ServiceClient,
                subscription,
            },
            context,
        )
    }

    pub fn notify(&self, notification: PushNotification) {
        self.send_one_way(Message::Notification(notification));
    }

    /// Dispatch one envelope addressed to this bus.
    ///
    /// Responses resolve their pending entry, pings are answered, pongs
    /// update liveness and everything else goes to the forward consumer.
    pub fn handle_incoming(&self, envelope: Envelope) -> HandlerResult {
        self.shared.handle_incoming(envelope)
    }

    /// Receive envelopes the bus does not handle itself.
    pub fn set_forward(&self, consumer: Arc<dyn MessageReceiver>) {
        *self.shared.forward.write() = Some(consumer);
    }

    pub fn clear_forward(&self) {
        self.shared.forward.write().take();
    }

    pub fn liveness(&self) -> Liveness {
        Liveness::from_u8(self.shared.liveness.load(Ordering::Acquire))
    }

    /// Heartbeats that went unanswered since the bus started.
    pub fn missed_pongs(&self) -> u64 {
        self.shared.missed_pongs.load(Ordering::Acquire)
    }

    pub fn pending_requests(&self) -> usize {
        self.shared.requests.len()
    }

    pub fn pending_queries(&self) -> usize {
        self.shared.queries.len()
    }

    /// Stop the heartbeat, release both connections and abandon every
    /// pending entry. Further calls are no-ops.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(heartbeat) = self.heartbeat.lock().take() {
            heartbeat.abort();
        }

        // Another bus may have taken over the channel on a shared router
        self.router.unregister_if(self.shared.channel_id, &self.receiver);
        self.router.release();
        self.shared.outbound.release();

        // Dropping the query senders wakes their waiters with `None`
        self.shared.requests.clear();
        self.shared.queries.clear();
        self.shared.forward.write().take();

        info!(channel_id = self.shared.channel_id, "Push bus stopped");
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for PushBus {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_heartbeat(shared: Weak<BusShared>, initial_delay: Duration, interval: Duration) {
    tokio::time::sleep(initial_delay).await;

    loop {
        match shared.upgrade() {
            Some(bus) => bus.send_ping(),
            None => break,
        }

        tokio::time::sleep(interval).await;

        match shared.upgrade() {
            Some(bus) => {
                bus.check_pong();
                bus.purge_expired();
            }
            None => break,
        }
    }
}

fn parse_dynamic_uri(path: &str) -> Option<(SubscriptionAction, i64)> {
    let segments: Vec<&str> = path.split('/').collect();
    let [root, action, account_id, _] = segments.as_slice() else {
        return None;
    };
    if *root != "pushservice" {
        return None;
    }

    let account_id = account_id.parse().ok()?;
    let action = match *action {
        "query" => SubscriptionAction::Query,
        "lastupdate" => SubscriptionAction::LastUpdate,
        _ => return None,
    };
    Some((action, account_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const TTL: Duration = Duration::from_secs(15);

    /// A bus whose aggregator address has nothing listening.
    fn test_bus(heartbeat: bool) -> (PushBus, OutboundPool, InboundRegistry) {
        let outbound = OutboundPool::with_connect_timeout(Duration::from_millis(100));
        let inbound = InboundRegistry::new();
        let config = BusConfig::default()
            .with_channel_id(7)
            .with_sender_id(3)
            .with_server_address("tcp://127.0.0.1:1")
            .with_client_bind_address("tcp://127.0.0.1:0")
            .with_request_ttl(TTL)
            .with_heartbeat(heartbeat);
        let bus = PushBus::connect(config, &outbound, &inbound).unwrap();
        (bus, outbound, inbound)
    }

    fn response(sender: SubscriptionSender, code: i64) -> Envelope {
        let response = PushSubscriptionResponse {
            action: SubscriptionAction::Query,
            account_id: 42,
            channels: vec![ChannelIndex::new([0, 1])],
            last_update: 1_700_000_000,
        };
        Envelope::new(Message::SubscriptionResponse { sender, response }, 7, 3)
            .with_correlation_code(code)
    }

    fn subscription() -> PushSubscription {
        PushSubscription {
            action: SubscriptionAction::Query,
            account_id: 42,
            channel: ChannelIndex::new([0]),
        }
    }

    #[test]
    fn parses_dynamic_uris() {
        assert_eq!(
            parse_dynamic_uri("pushservice/query/42/x"),
            Some((SubscriptionAction::Query, 42))
        );
        assert_eq!(
            parse_dynamic_uri("pushservice/lastupdate/-5/anything"),
            Some((SubscriptionAction::LastUpdate, -5))
        );
        assert_eq!(parse_dynamic_uri("pushservice/query/42"), None);
        assert_eq!(parse_dynamic_uri("pushservice/query/42/x/y"), None);
        assert_eq!(parse_dynamic_uri("pushservice/subscribe/42/x"), None);
        assert_eq!(parse_dynamic_uri("pushservice/query/abc/x"), None);
        assert_eq!(parse_dynamic_uri("other/query/42/x"), None);
    }

    #[tokio::test]
    async fn token_response_resolves_request_once() {
        let (bus, _outbound, _inbound) = test_bus(false);
        let resolved = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&resolved);
        let code = bus.register_token(PushTokenInfo::new(42, "abc"), move |reply: Reply| {
            assert_eq!(reply, Reply::Token(PushTokenResult::Ok));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_ne!(code, 0);
        assert_eq!(bus.pending_requests(), 1);

        let answer = Envelope::new(Message::TokenResponse(PushTokenResult::Ok), 7, 3)
            .with_correlation_code(code);
        bus.handle_incoming(answer.clone()).unwrap();
        bus.handle_incoming(answer).unwrap();

        assert_eq!(resolved.load(Ordering::SeqCst), 1);
        assert_eq!(bus.pending_requests(), 0);
    }

    #[tokio::test]
    async fn subscription_responses_use_separate_tables() {
        let (bus, _outbound, _inbound) = test_bus(false);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let code = bus.subscribe(subscription(), move |reply: Reply| {
            let _ = tx.send(reply);
        });

        // Same code, wrong namespace
        bus.handle_incoming(response(SubscriptionSender::ServiceUri, code))
            .unwrap();
        assert_eq!(bus.pending_requests(), 1);

        bus.handle_incoming(response(SubscriptionSender::ServiceClient, code))
            .unwrap();
        assert!(matches!(rx.try_recv(), Ok(Reply::Subscription(_))));
        assert_eq!(bus.pending_requests(), 0);
    }

    #[tokio::test]
    async fn unknown_codes_are_ignored() {
        let (bus, _outbound, _inbound) = test_bus(false);
        let reply = Envelope::new(Message::TokenResponse(PushTokenResult::Failed), 7, 3)
            .with_correlation_code(12345);
        assert!(bus.handle_incoming(reply).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn query_without_answer_yields_none() {
        let (bus, _outbound, _inbound) = test_bus(false);

        let query = bus.send_query(subscription());
        assert_eq!(bus.pending_queries(), 1);

        assert_eq!(query.await, None);
        assert_eq!(bus.pending_queries(), 0);
    }

    #[tokio::test]
    async fn dynamic_uri_with_bad_path_sends_nothing() {
        let (bus, _outbound, _inbound) = test_bus(false);
        let query = bus.query_dynamic_uri("pushservice/bogus/1/x");
        assert_eq!(bus.pending_queries(), 0);
        assert_eq!(query.await, None);
    }

    #[tokio::test]
    async fn shutdown_wakes_pending_queries() {
        let (bus, _outbound, _inbound) = test_bus(false);
        let query = bus.query_dynamic_uri("pushservice/lastupdate/42/x");
        assert_eq!(bus.pending_queries(), 1);

        bus.shutdown();
        assert_eq!(query.await, None);
    }

    #[tokio::test]
    async fn unhandled_kinds_go_to_forward_consumer() {
        let (bus, _outbound, _inbound) = test_bus(false);
        let notification = Envelope::new(
            Message::Notification(PushNotification::account(42, ChannelIndex::new([1]), 9)),
            7,
            3,
        );

        // Without a consumer the message is dropped quietly
        assert!(bus.handle_incoming(notification.clone()).is_ok());

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        bus.set_forward(Arc::new(move |envelope: Envelope| -> HandlerResult {
            tx.send(envelope)?;
            Ok(())
        }));
        bus.handle_incoming(notification.clone()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), notification);

        bus.clear_forward();
        bus.handle_incoming(notification).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn missed_pong_degrades_liveness() {
        let (bus, _outbound, _inbound) = test_bus(true);
        assert_eq!(bus.liveness(), Liveness::Unknown);

        // Initial delay, then one full interval without a pong
        tokio::time::sleep(Duration::from_millis(2_500 + 5_000 + 10)).await;
        assert_eq!(bus.liveness(), Liveness::Degraded);
        assert_eq!(bus.missed_pongs(), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(bus.missed_pongs(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn pong_marks_peer_alive() {
        let (bus, _outbound, _inbound) = test_bus(true);

        tokio::time::sleep(Duration::from_millis(2_510)).await;
        bus.handle_incoming(Envelope::new(Message::Pong, 7, 3)).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(bus.liveness(), Liveness::Alive);
        assert_eq!(bus.missed_pongs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pong_for_other_sender_is_ignored() {
        let (bus, _outbound, _inbound) = test_bus(true);

        tokio::time::sleep(Duration::from_millis(2_510)).await;
        bus.handle_incoming(Envelope::new(Message::Pong, 7, 4)).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(bus.liveness(), Liveness::Degraded);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_purges_expired_entries() {
        let (bus, _outbound, _inbound) = test_bus(true);
        bus.send_request(Message::Ping, |_: Reply| {});

        tokio::time::sleep(TTL + Duration::from_secs(6)).await;

        // Nothing left for a manual sweep to find
        assert_eq!(bus.shared.requests.purge_expired(), 0);
    }

    #[tokio::test]
    async fn shutdown_releases_connections() {
        let (bus, outbound, inbound) = test_bus(false);
        assert_eq!(outbound.connection_count(), 1);
        assert_eq!(inbound.router_count(), 1);

        bus.shutdown();
        bus.shutdown();
        assert!(bus.is_shut_down());
        assert_eq!(outbound.connection_count(), 0);
        assert_eq!(inbound.router_count(), 0);

        // Sending after shutdown is a no-op
        bus.send_one_way(Message::Ping);
        bus.notify(PushNotification::channel(ChannelIndex::new([1]), 0));
        assert_eq!(outbound.connection_count(), 0);
    }

    #[tokio::test]
    async fn drop_releases_connections() {
        let (bus, outbound, inbound) = test_bus(false);
        drop(bus);
        assert_eq!(outbound.connection_count(), 0);
        assert_eq!(inbound.router_count(), 0);
    }

    #[tokio::test]
    async fn sender_outliving_bus_is_inert() {
        let (bus, _outbound, _inbound) = test_bus(false);
        let sender = bus.sender();
        drop(bus);

        sender.send_one_way(Message::Ping);
        sender.reply(&Envelope::new(Message::Ping, 7, 3), Message::Pong);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = BusConfig::default().with_request_ttl(Duration::ZERO);
        let result = PushBus::connect(config, &OutboundPool::new(), &InboundRegistry::new());
        assert!(matches!(result, Err(crate::BusError::Config(_))));
    }
}
