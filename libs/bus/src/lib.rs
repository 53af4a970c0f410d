//! Pushbus - Push-notification message bus between service processes
//!
//! Services exchange typed envelopes (token registration, subscription
//! queries, notifications, liveness pings) with a central aggregator over
//! length-framed transports. Connections are shared per address and
//! reference counted; responses are paired with their requests through
//! time-bounded correlation tables.
//!
//! # Example
//!
//! ```no_run
//! use pushbus::{BusConfig, InboundRegistry, OutboundPool, PushBus, PushTokenInfo, Reply};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let outbound = OutboundPool::new();
//! let inbound = InboundRegistry::new();
//! let bus = PushBus::connect(BusConfig::default().with_channel_id(7), &outbound, &inbound)?;
//!
//! bus.register_token(PushTokenInfo::new(42, "device-token"), |reply: Reply| {
//!     println!("registration finished: {reply:?}");
//! });
//!
//! if let Some(response) = bus.query_dynamic_uri("pushservice/lastupdate/42/x").await {
//!     println!("last update at {}", response.last_update);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod config;
pub mod correlation;
pub mod envelope;
pub mod error;
pub mod inbound;
pub mod outbound;
pub mod payload;

// Re-exports for convenience
pub use bus::{BusSender, Liveness, PendingRequest, PushBus, Reply};
pub use config::BusConfig;
pub use correlation::CorrelationTable;
pub use envelope::{Envelope, EnvelopeHeader, Message, MessageKind};
pub use error::{BusError, ConfigError, HandlerResult, ParseError, Result};
pub use inbound::{InboundRegistry, MessageReceiver, RouterHandle};
pub use outbound::{OutboundHandle, OutboundPool};
pub use payload::{
    ChannelIndex, NotificationTarget, PushNotification, PushSubscription,
    PushSubscriptionResponse, PushTokenInfo, PushTokenResult, SubscriptionAction,
    SubscriptionSender,
};
