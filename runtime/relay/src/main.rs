//! Diagnostic push aggregator.
//!
//! Listens where services send (`push_serverbindaddress`) and answers on the
//! address services bind (`push_clientbindaddress`). Pings are answered by
//! the bus itself; token and subscription requests are acknowledged with
//! canned answers and notifications are logged. Every `--channel` gets its
//! own bus on the shared listener and reply connection.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pushbus::{
    BusConfig, BusSender, Envelope, HandlerResult, InboundRegistry, Message, OutboundPool,
    PushBus, PushSubscriptionResponse, PushTokenResult,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "pushbus diagnostic aggregator")]
struct Args {
    /// Address services send to
    #[arg(long, default_value = "tcp://*:49853")]
    listen: String,
    /// Address services receive on
    #[arg(long, default_value = "tcp://localhost:48944")]
    reply_to: String,
    /// Channel (chain id) to serve; repeat for several
    #[arg(long = "channel", default_values_t = [0])]
    channels: Vec<i32>,
    /// Sender id stamped on unsolicited messages
    #[arg(long, default_value_t = 0)]
    sender_id: i32,
    /// Request lifetime in milliseconds
    #[arg(long, default_value_t = 15_000)]
    request_ttl_ms: u64,
    /// Result sent for token registrations and removals
    #[arg(long, value_parser = parse_token_result, default_value = "ok")]
    token_result: PushTokenResult,
}

fn parse_token_result(raw: &str) -> Result<PushTokenResult, String> {
    match raw.to_ascii_lowercase().as_str() {
        "ok" => Ok(PushTokenResult::Ok),
        "invalid" | "invalidtoken" => Ok(PushTokenResult::InvalidToken),
        "unknown" | "unknownaccount" => Ok(PushTokenResult::UnknownAccount),
        "failed" => Ok(PushTokenResult::Failed),
        other => Err(format!("unknown token result {other:?}")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pushbus=info,pushbus_relay=info".into()),
        )
        .init();

    let args = Args::parse();

    let outbound = OutboundPool::new();
    let inbound = InboundRegistry::new();
    let mut buses = Vec::with_capacity(args.channels.len());

    for config in channel_configs(&args) {
        let channel = config.channel_id;
        let bus = PushBus::connect(config, &outbound, &inbound).with_context(|| {
            format!("failed to start relay for channel {channel} on {}", args.listen)
        })?;

        let sender = bus.sender();
        let token_result = args.token_result;
        bus.set_forward(Arc::new(move |envelope: Envelope| -> HandlerResult {
            respond(&sender, &envelope, token_result);
            Ok(())
        }));
        buses.push(bus);
    }

    if let Some(bus) = buses.first() {
        info!(
            listen = %bus.local_endpoint(),
            reply_to = %args.reply_to,
            channels = ?args.channels,
            "pushbus-relay running"
        );
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for shutdown signal")?;

    info!("Shutting down");
    for bus in &buses {
        bus.shutdown();
    }
    Ok(())
}

/// One bus configuration per distinct channel, addresses swapped relative
/// to a service.
fn channel_configs(args: &Args) -> Vec<BusConfig> {
    let mut channels = args.channels.clone();
    channels.sort_unstable();
    channels.dedup();

    channels
        .into_iter()
        .map(|channel| {
            BusConfig::default()
                .with_channel_id(channel)
                .with_sender_id(args.sender_id)
                .with_server_address(args.reply_to.clone())
                .with_client_bind_address(args.listen.clone())
                .with_request_ttl(std::time::Duration::from_millis(args.request_ttl_ms))
                .with_heartbeat(false)
        })
        .collect()
}

fn respond(sender: &BusSender, envelope: &Envelope, token_result: PushTokenResult) {
    if let Message::Notification(notification) = &envelope.message {
        info!(
            channel_id = envelope.channel_id,
            sender_id = envelope.sender_id,
            target = ?notification.target,
            notification_id = notification.notification_id,
            title = ?notification.title,
            "Notification"
        );
        return;
    }

    match answer(&envelope.message, token_result) {
        Some(message) => {
            info!(
                code = envelope.correlation_code,
                request = ?envelope.kind(),
                response = ?message.kind(),
                "Answering"
            );
            sender.reply(envelope, message);
        }
        None => warn!(kind = ?envelope.kind(), "Unexpected message"),
    }
}

/// Canned answer for a request, if it is one.
fn answer(message: &Message, token_result: PushTokenResult) -> Option<Message> {
    match message {
        Message::TokenRegistration(_) | Message::TokenRemove(_) => {
            Some(Message::TokenResponse(token_result))
        }
        Message::Subscription {
            sender,
            subscription,
        } => Some(Message::SubscriptionResponse {
            sender: *sender,
            response: PushSubscriptionResponse::empty_for(subscription),
        }),
        _ => None,
    }
}
