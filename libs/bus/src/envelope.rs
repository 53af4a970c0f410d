//! Binary envelope format.
//!
//! Every frame starts with a fixed header so a router can resolve the
//! destination before touching the payload:
//!
//! ```text
//! ┌──────────┬──────────────────┬────────────┬───────────┬───────────┐
//! │ Kind     │ Correlation code │ Channel id │ Sender id │ Payload   │
//! │ u16 BE   │ i64 BE           │ i32 BE     │ i32 BE    │ bincode   │
//! └──────────┴──────────────────┴────────────┴───────────┴───────────┘
//! ```
//!
//! Kinds start at [`KIND_BASE`]. Unknown kinds are rejected, never skipped.

use pushbus_fabric::codec::{BincodeCodec, Codec};
use serde::Deserialize;

use crate::error::ParseError;
use crate::payload::{
    PushNotification, PushSubscription, PushSubscriptionResponse, PushTokenInfo, PushTokenResult,
    SubscriptionSender,
};

/// First discriminant of the push service message range.
pub const KIND_BASE: u16 = 10_000;

/// Size of the fixed envelope header in bytes.
pub const HEADER_SIZE: usize = 2 + 8 + 4 + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageKind {
    TokenRegistration = KIND_BASE,
    TokenRemove,
    TokenResponse,
    Subscription,
    SubscriptionResponse,
    Notification,
    Ping,
    Pong,
}

impl MessageKind {
    pub const ALL: [MessageKind; 8] = [
        MessageKind::TokenRegistration,
        MessageKind::TokenRemove,
        MessageKind::TokenResponse,
        MessageKind::Subscription,
        MessageKind::SubscriptionResponse,
        MessageKind::Notification,
        MessageKind::Ping,
        MessageKind::Pong,
    ];

    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Kinds that resolve a pending correlation entry.
    pub fn is_response(self) -> bool {
        matches!(
            self,
            MessageKind::TokenResponse | MessageKind::SubscriptionResponse
        )
    }
}

impl TryFrom<u16> for MessageKind {
    type Error = ParseError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_u16() == value)
            .ok_or(ParseError::UnknownKind(value))
    }
}

/// Typed message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    TokenRegistration(PushTokenInfo),
    TokenRemove(PushTokenInfo),
    TokenResponse(PushTokenResult),
    Subscription {
        sender: SubscriptionSender,
        subscription: PushSubscription,
    },
    SubscriptionResponse {
        sender: SubscriptionSender,
        response: PushSubscriptionResponse,
    },
    Notification(PushNotification),
    Ping,
    Pong,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::TokenRegistration(_) => MessageKind::TokenRegistration,
            Message::TokenRemove(_) => MessageKind::TokenRemove,
            Message::TokenResponse(_) => MessageKind::TokenResponse,
            Message::Subscription { .. } => MessageKind::Subscription,
            Message::SubscriptionResponse { .. } => MessageKind::SubscriptionResponse,
            Message::Notification(_) => MessageKind::Notification,
            Message::Ping => MessageKind::Ping,
            Message::Pong => MessageKind::Pong,
        }
    }
}

/// The routing fields of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub kind: MessageKind,
    pub correlation_code: i64,
    pub channel_id: i32,
    pub sender_id: i32,
}

impl EnvelopeHeader {
    /// Read the header, returning it together with the undecoded payload.
    pub fn read(bytes: &[u8]) -> Result<(Self, &[u8]), ParseError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ParseError::MalformedEnvelope(format!(
                "truncated header: {} of {} bytes",
                bytes.len(),
                HEADER_SIZE
            )));
        }

        let (head, body) = bytes.split_at(HEADER_SIZE);
        let kind = MessageKind::try_from(u16::from_be_bytes([head[0], head[1]]))?;

        let mut code = [0u8; 8];
        code.copy_from_slice(&head[2..10]);
        let mut channel = [0u8; 4];
        channel.copy_from_slice(&head[10..14]);
        let mut sender = [0u8; 4];
        sender.copy_from_slice(&head[14..18]);

        let header = Self {
            kind,
            correlation_code: i64::from_be_bytes(code),
            channel_id: i32::from_be_bytes(channel),
            sender_id: i32::from_be_bytes(sender),
        };
        Ok((header, body))
    }

    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.kind.as_u16().to_be_bytes());
        buf.extend_from_slice(&self.correlation_code.to_be_bytes());
        buf.extend_from_slice(&self.channel_id.to_be_bytes());
        buf.extend_from_slice(&self.sender_id.to_be_bytes());
    }
}

/// One self-describing message unit exchanged over the bus.
///
/// A `correlation_code` of 0 marks an unsolicited message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub correlation_code: i64,
    pub channel_id: i32,
    pub sender_id: i32,
    pub message: Message,
}

impl Envelope {
    pub fn new(message: Message, channel_id: i32, sender_id: i32) -> Self {
        Self {
            correlation_code: 0,
            channel_id,
            sender_id,
            message,
        }
    }

    pub fn with_correlation_code(mut self, code: i64) -> Self {
        self.correlation_code = code;
        self
    }

    /// Build the answer to this envelope: same code, channel and sender.
    pub fn reply(&self, message: Message) -> Self {
        Self {
            correlation_code: self.correlation_code,
            channel_id: self.channel_id,
            sender_id: self.sender_id,
            message,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.message.kind()
    }

    pub fn header(&self) -> EnvelopeHeader {
        EnvelopeHeader {
            kind: self.kind(),
            correlation_code: self.correlation_code,
            channel_id: self.channel_id,
            sender_id: self.sender_id,
        }
    }

    /// Serialize into a frame body.
    pub fn to_bytes(&self) -> pushbus_fabric::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + 64);
        self.header().write(&mut buf);

        let codec = BincodeCodec;
        match &self.message {
            Message::TokenRegistration(info) | Message::TokenRemove(info) => {
                codec.encode_into(info, &mut buf)?
            }
            Message::TokenResponse(result) => codec.encode_into(result, &mut buf)?,
            Message::Subscription {
                sender,
                subscription,
            } => codec.encode_into(&(sender, subscription), &mut buf)?,
            Message::SubscriptionResponse { sender, response } => {
                codec.encode_into(&(sender, response), &mut buf)?
            }
            Message::Notification(notification) => codec.encode_into(notification, &mut buf)?,
            Message::Ping | Message::Pong => {}
        }

        Ok(buf)
    }

    /// Parse a complete frame body.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let (header, body) = EnvelopeHeader::read(bytes)?;
        Self::from_parts(header, body)
    }

    /// Decode the payload that followed `header`.
    pub fn from_parts(header: EnvelopeHeader, body: &[u8]) -> Result<Self, ParseError> {
        let message = match header.kind {
            MessageKind::TokenRegistration => Message::TokenRegistration(decode(body)?),
            MessageKind::TokenRemove => Message::TokenRemove(decode(body)?),
            MessageKind::TokenResponse => Message::TokenResponse(decode(body)?),
            MessageKind::Subscription => {
                let (sender, subscription) = decode(body)?;
                Message::Subscription {
                    sender,
                    subscription,
                }
            }
            MessageKind::SubscriptionResponse => {
                let (sender, response) = decode(body)?;
                Message::SubscriptionResponse { sender, response }
            }
            MessageKind::Notification => Message::Notification(decode(body)?),
            MessageKind::Ping | MessageKind::Pong => {
                if !body.is_empty() {
                    return Err(ParseError::MalformedEnvelope(format!(
                        "{:?} carries {} unexpected payload bytes",
                        header.kind,
                        body.len()
                    )));
                }
                if header.kind == MessageKind::Ping {
                    Message::Ping
                } else {
                    Message::Pong
                }
            }
        };

        Ok(Self {
            correlation_code: header.correlation_code,
            channel_id: header.channel_id,
            sender_id: header.sender_id,
            message,
        })
    }
}

fn decode<T: for<'de> Deserialize<'de>>(body: &[u8]) -> Result<T, ParseError> {
    BincodeCodec
        .decode(body)
        .map_err(|e| ParseError::MalformedEnvelope(e.to_string()))
}
