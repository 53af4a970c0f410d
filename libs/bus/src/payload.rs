//! Kind-specific message payloads.

use serde::{Deserialize, Serialize};

/// Device token of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushTokenInfo {
    pub account_id: i64,
    pub token: String,
}

impl PushTokenInfo {
    pub fn new(account_id: i64, token: impl Into<String>) -> Self {
        Self {
            account_id,
            token: token.into(),
        }
    }
}

/// Outcome of a token registration or removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushTokenResult {
    Ok,
    InvalidToken,
    UnknownAccount,
    Failed,
}

/// Who asked for a subscription operation; decides where the response is
/// correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionSender {
    /// A remote client request relayed by the service
    ServiceClient,
    /// A query issued by the service itself
    ServiceUri,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionAction {
    Query,
    LastUpdate,
    Subscribe,
    Unsubscribe,
}

/// Path of segments identifying a notification channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelIndex(pub Vec<i64>);

impl ChannelIndex {
    pub fn new(segments: impl Into<Vec<i64>>) -> Self {
        Self(segments.into())
    }

    pub fn segments(&self) -> &[i64] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub action: SubscriptionAction,
    pub account_id: i64,
    pub channel: ChannelIndex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscriptionResponse {
    pub action: SubscriptionAction,
    pub account_id: i64,
    pub channels: Vec<ChannelIndex>,
    /// Unix timestamp of the last change, 0 if never updated
    pub last_update: i64,
}

impl PushSubscriptionResponse {
    /// Empty answer for `subscription`.
    pub fn empty_for(subscription: &PushSubscription) -> Self {
        Self {
            action: subscription.action,
            account_id: subscription.account_id,
            channels: Vec::new(),
            last_update: 0,
        }
    }
}

/// Recipients of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationTarget {
    /// Everyone subscribed to the channel
    Channel,
    Account(i64),
    Accounts(Vec<i64>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushNotification {
    pub target: NotificationTarget,
    pub channel: ChannelIndex,
    pub notification_id: i32,
    pub title: Option<String>,
    pub message: Option<String>,
    pub image_uri: Option<String>,
    pub scheme: Option<String>,
}

impl PushNotification {
    /// Notification id meaning "none".
    pub const IGNORE_ID: i32 = 0;

    pub fn channel(channel: ChannelIndex, notification_id: i32) -> Self {
        Self::with_target(NotificationTarget::Channel, channel, notification_id)
    }

    pub fn account(account_id: i64, channel: ChannelIndex, notification_id: i32) -> Self {
        Self::with_target(NotificationTarget::Account(account_id), channel, notification_id)
    }

    pub fn accounts(accounts: Vec<i64>, channel: ChannelIndex, notification_id: i32) -> Self {
        Self::with_target(NotificationTarget::Accounts(accounts), channel, notification_id)
    }

    fn with_target(target: NotificationTarget, channel: ChannelIndex, notification_id: i32) -> Self {
        Self {
            target,
            channel,
            notification_id,
            title: None,
            message: None,
            image_uri: None,
            scheme: None,
        }
    }

    pub fn has_notification_id(&self) -> bool {
        self.notification_id != Self::IGNORE_ID
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_image_uri(mut self, image_uri: impl Into<String>) -> Self {
        self.image_uri = Some(image_uri.into());
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }
}
