// src/core/pubsub/handler.rs

//! Handles a client connection that has entered Pub/Sub mode.
//!
//! In sub-mode the connection forwards broadcast messages from its
//! subscriptions and accepts only the subscription-management commands plus
//! PING and QUIT; everything else is rejected without touching the
//! keyspace.

use crate::connection::{SessionState, SubscriptionReceiver};
use crate::core::handler::actions;
use crate::core::handler::command_router::RouteResponse;
use crate::core::protocol::{RespFrame, RespFrameCodec, RespValue};
use crate::core::state::ServerState;
use crate::core::{Command, OpalDBError};
use bytes::Bytes;
use futures::future::FutureExt;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

/// The next thing the sub-mode loop should react to.
enum SubModeEvent {
    Shutdown,
    Broadcast(Option<Result<RespFrame, broadcast::error::RecvError>>),
    ClientFrame(Option<Result<RespFrame, OpalDBError>>),
}

pub struct PubSubModeHandler<'a> {
    framed: &'a mut Framed<TcpStream, RespFrameCodec>,
    shutdown_rx: &'a mut broadcast::Receiver<()>,
    session: &'a mut SessionState,
    state: Arc<ServerState>,
}

impl<'a> PubSubModeHandler<'a> {
    pub fn new(
        framed: &'a mut Framed<TcpStream, RespFrameCodec>,
        shutdown_rx: &'a mut broadcast::Receiver<()>,
        session: &'a mut SessionState,
        state: Arc<ServerState>,
    ) -> Self {
        Self {
            framed,
            shutdown_rx,
            session,
            state,
        }
    }

    /// Forwards broadcast messages and serves the restricted command set
    /// until the session has no subscriptions left.
    pub async fn run(&mut self) -> Result<(), OpalDBError> {
        debug!("Connection entering Pub/Sub mode loop.");
        loop {
            if !self.session.in_sub_mode()
                || (self.session.subscribed_channels.is_empty()
                    && self.session.subscribed_patterns.is_empty())
            {
                debug!("No more subscriptions; exiting Pub/Sub mode.");
                return Ok(());
            }

            // Resolve the next event first; the borrows taken by the
            // competing futures end before the event is acted on.
            let event = tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => SubModeEvent::Shutdown,
                msg = receive_pubsub_message(&mut self.session.pubsub_receivers) => {
                    SubModeEvent::Broadcast(msg)
                }
                frame = self.framed.next() => SubModeEvent::ClientFrame(frame),
            };

            match event {
                SubModeEvent::Shutdown => return Ok(()),
                SubModeEvent::Broadcast(Some(Ok(frame))) => {
                    if self.framed.send(frame).await.is_err() {
                        warn!("Failed to forward pubsub message; connection closed.");
                        return Ok(());
                    }
                }
                SubModeEvent::Broadcast(Some(Err(broadcast::error::RecvError::Lagged(n)))) => {
                    // The receiver fell behind; resubscribe for a fresh
                    // cursor and keep going.
                    warn!("Pub/Sub receiver lagged, missed {n} messages. Re-subscribing.");
                    self.resubscribe_all();
                }
                SubModeEvent::Broadcast(Some(Err(broadcast::error::RecvError::Closed))) => {
                    warn!("A Pub/Sub channel closed. Exiting sub-mode.");
                    return Ok(());
                }
                SubModeEvent::Broadcast(None) => {
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                }
                SubModeEvent::ClientFrame(Some(Ok(frame))) => {
                    self.handle_client_frame(frame).await?;
                }
                SubModeEvent::ClientFrame(Some(Err(e))) => {
                    debug!("Protocol error in sub-mode: {e}");
                    return Err(e);
                }
                SubModeEvent::ClientFrame(None) => return Ok(()),
            }
        }
    }

    /// Dispatches a command received while in sub-mode.
    async fn handle_client_frame(&mut self, frame: RespFrame) -> Result<(), OpalDBError> {
        let command = match Command::try_from(frame) {
            Ok(command) => command,
            Err(e) => {
                self.framed.send(RespFrame::Error(e.to_string())).await?;
                return Ok(());
            }
        };

        let response = match command {
            Command::Subscribe(cmd) => {
                actions::pubsub::handle_subscribe(cmd.channels, self.session, &self.state)
            }
            Command::Unsubscribe(cmd) => {
                actions::pubsub::handle_unsubscribe(cmd.channels, self.session)
            }
            Command::PSubscribe(cmd) => {
                actions::pubsub::handle_psubscribe(cmd.patterns, self.session, &self.state)
            }
            Command::PUnsubscribe(cmd) => {
                actions::pubsub::handle_punsubscribe(cmd.patterns, self.session)
            }
            // PING in sub-mode replies with the two-element pong array.
            Command::Ping(cmd) => Ok(RouteResponse::Single(RespValue::Array(vec![
                RespValue::BulkString("pong".into()),
                RespValue::BulkString(cmd.message.unwrap_or_else(Bytes::new)),
            ]))),
            Command::Quit(_) => {
                self.framed
                    .send(RespFrame::SimpleString("OK".into()))
                    .await?;
                return Err(OpalDBError::InvalidState("connection closed".into()));
            }
            other => Ok(RouteResponse::Single(RespValue::Error(format!(
                "ERR Can't execute '{}': only (P)SUBSCRIBE / (P)UNSUBSCRIBE / \
                 PING / QUIT / RESET are allowed in this context",
                other.name()
            )))),
        };

        match response {
            Ok(RouteResponse::Single(value)) => {
                self.framed.send(value.into()).await?;
            }
            Ok(RouteResponse::Multiple(values)) => {
                for value in values {
                    self.framed.send(value.into()).await?;
                }
            }
            Ok(RouteResponse::NoOp) => {}
            Err(e) => {
                self.framed.send(RespFrame::Error(e.to_string())).await?;
            }
        }
        Ok(())
    }

    /// Re-subscribes to everything after a lagged receiver.
    fn resubscribe_all(&mut self) {
        let old_receivers = std::mem::take(&mut self.session.pubsub_receivers);
        for sub_receiver in old_receivers {
            match sub_receiver {
                SubscriptionReceiver::Channel(name, _) => {
                    let rx = self.state.pubsub.subscribe(&name);
                    self.session
                        .pubsub_receivers
                        .push(SubscriptionReceiver::Channel(name, rx));
                }
                SubscriptionReceiver::Pattern(pattern, _) => {
                    let rx = self.state.pubsub.subscribe_pattern(&pattern);
                    self.session
                        .pubsub_receivers
                        .push(SubscriptionReceiver::Pattern(pattern, rx));
                }
            }
        }
    }
}

/// Waits for a message from any of the session's subscription receivers and
/// formats it as the client-facing frame.
async fn receive_pubsub_message(
    pubsub_receivers: &mut [SubscriptionReceiver],
) -> Option<Result<RespFrame, broadcast::error::RecvError>> {
    if pubsub_receivers.is_empty() {
        return None;
    }

    let select_all = futures::future::select_all(pubsub_receivers.iter_mut().map(|sub_receiver| {
        async move {
            match sub_receiver {
                SubscriptionReceiver::Channel(name, rx) => rx.recv().await.map(|msg| {
                    RespValue::Array(vec![
                        RespValue::BulkString("message".into()),
                        RespValue::BulkString(name.clone()),
                        RespValue::BulkString(msg),
                    ])
                }),
                SubscriptionReceiver::Pattern(pattern, rx) => rx.recv().await.map(|pmsg| {
                    let (_pattern, channel, msg) = pmsg;
                    RespValue::Array(vec![
                        RespValue::BulkString("pmessage".into()),
                        RespValue::BulkString(pattern.clone()),
                        RespValue::BulkString(channel),
                        RespValue::BulkString(msg),
                    ])
                }),
            }
        }
        .boxed()
    }));

    let (recv_result, _index, _remaining) = select_all.await;
    match recv_result {
        Ok(resp_value) => Some(Ok(resp_value.into())),
        Err(e) => Some(Err(e)),
    }
}
