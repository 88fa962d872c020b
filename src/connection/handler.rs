// src/connection/handler.rs

//! Defines the `ConnectionHandler` which manages the full lifecycle of a
//! client connection: framed request/reply processing, the PSYNC handoff to
//! a replica handler, and the transition into Pub/Sub mode.

use super::guard::ConnectionGuard;
use super::session::SessionState;
use crate::core::handler::command_router::{RouteResponse, Router};
use crate::core::protocol::{RespFrame, RespFrameCodec};
use crate::core::pubsub::handler::PubSubModeHandler;
use crate::core::replication::handler::ReplicaHandler;
use crate::core::state::ServerState;
use crate::core::{Command, OpalDBError};
use futures::{stream, SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// The next step for the connection's main loop.
enum NextAction {
    Continue,
    EnterPubSub,
    ExitLoop,
}

pub struct ConnectionHandler {
    framed: Option<Framed<TcpStream, RespFrameCodec>>,
    addr: SocketAddr,
    state: Arc<ServerState>,
    session_id: u64,
    shutdown_rx: broadcast::Receiver<()>,
    session: SessionState,
}

impl ConnectionHandler {
    pub fn new(
        socket: TcpStream,
        addr: SocketAddr,
        state: Arc<ServerState>,
        session_id: u64,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            framed: Some(Framed::new(socket, RespFrameCodec)),
            addr,
            state,
            session_id,
            shutdown_rx,
            session: SessionState::new(),
        }
    }

    /// The main event loop for the connection.
    pub async fn run(&mut self) -> Result<(), OpalDBError> {
        let mut guard = ConnectionGuard::new(self.state.clone(), self.session_id, self.addr);

        'main_loop: loop {
            if self.framed.is_none() {
                break 'main_loop;
            }

            tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => {
                    info!("Connection handler for {} received shutdown signal.", self.addr);
                    break 'main_loop;
                }
                result = self.framed.as_mut().unwrap().next() => {
                    match result {
                        Some(Ok(frame)) => {
                            match self.process_frame(frame, &mut guard).await {
                                Ok(NextAction::Continue) => {}
                                Ok(NextAction::EnterPubSub) => {
                                    if self.run_pubsub_mode().await.is_err() {
                                        break 'main_loop;
                                    }
                                }
                                Ok(NextAction::ExitLoop) => break 'main_loop,
                                Err(e) => {
                                    self.send_error_to_client(e).await?;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            if is_normal_disconnect(&e) {
                                debug!("Connection from {} closed by peer: {}", self.addr, e);
                            } else {
                                warn!("Connection error for {}: {}", self.addr, e);
                                // Protocol errors get a reply before the
                                // connection drops.
                                let _ = self.send_error_to_client(e).await;
                            }
                            break 'main_loop;
                        }
                        None => {
                            debug!("Connection from {} closed by peer.", self.addr);
                            break 'main_loop;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Parses a frame into a command, routes it, and sends the response.
    async fn process_frame(
        &mut self,
        frame: RespFrame,
        conn_guard: &mut ConnectionGuard,
    ) -> Result<NextAction, OpalDBError> {
        let command = match Command::try_from(frame) {
            Ok(command) => command,
            Err(e) => {
                // A command that fails to parse while queueing poisons the
                // open transaction.
                if self.session.is_in_transaction {
                    Router::new(
                        self.state.clone(),
                        self.session_id,
                        self.addr,
                        &mut self.session,
                    )
                    .mark_transaction_error();
                }
                return Err(e);
            }
        };
        debug!(
            "Session {}: received command '{}'",
            self.session_id,
            command.name()
        );

        let is_quit = matches!(command, Command::Quit(_));

        // PSYNC switches the wire protocol and hands the socket off.
        if let Command::Psync(_) = command {
            return self.handle_replica_handoff(conn_guard).await;
        }

        let mut router = Router::new(
            self.state.clone(),
            self.session_id,
            self.addr,
            &mut self.session,
        );
        let route_response = router.route(command).await;

        // Routing errors inside a transaction poison it too.
        let route_response = match route_response {
            Ok(response) => response,
            Err(e) => {
                if self.session.is_in_transaction {
                    Router::new(
                        self.state.clone(),
                        self.session_id,
                        self.addr,
                        &mut self.session,
                    )
                    .mark_transaction_error();
                }
                return Err(e);
            }
        };

        let framed = self.framed.as_mut().unwrap();
        match route_response {
            RouteResponse::Single(response) => {
                framed.send(response.into()).await?;
            }
            RouteResponse::Multiple(responses) => {
                let mut frames = stream::iter(responses).map(|r| Ok(r.into()));
                framed.send_all(&mut frames).await?;
            }
            RouteResponse::NoOp => {}
        }

        if is_quit {
            return Ok(NextAction::ExitLoop);
        }
        if self.session.in_sub_mode() {
            return Ok(NextAction::EnterPubSub);
        }
        Ok(NextAction::Continue)
    }

    /// Hands the connection off to a dedicated `ReplicaHandler`.
    async fn handle_replica_handoff(
        &mut self,
        conn_guard: &mut ConnectionGuard,
    ) -> Result<NextAction, OpalDBError> {
        conn_guard.set_handed_off();

        // Drop any lingering transaction before the socket changes owners.
        self.state.db.discard_transaction(self.session_id);
        self.state
            .blocker_manager
            .remove_waiters_for_session(self.session_id);
        self.state
            .stream_blocker_manager
            .remove_waiters_for_session(self.session_id);

        let Some(framed) = self.framed.take() else {
            return Err(OpalDBError::Internal(
                "stream already taken for replica handoff".into(),
            ));
        };
        info!("Handing off connection {} to the replica handler.", self.addr);

        let stream = framed.into_inner();
        let handler = ReplicaHandler::new(self.state.clone(), self.addr, stream);
        let shutdown_rx = self.shutdown_rx.resubscribe();
        tokio::spawn(handler.run(shutdown_rx));

        Ok(NextAction::ExitLoop)
    }

    /// Runs the restricted Pub/Sub command loop until the session leaves
    /// sub-mode or the connection ends.
    async fn run_pubsub_mode(&mut self) -> Result<(), OpalDBError> {
        let framed = self.framed.as_mut().ok_or_else(|| {
            OpalDBError::Internal("cannot enter pubsub mode without a stream".into())
        })?;
        let mut pubsub_handler = PubSubModeHandler::new(
            framed,
            &mut self.shutdown_rx,
            &mut self.session,
            self.state.clone(),
        );
        let result = pubsub_handler.run().await;

        // Leaving sub-mode clears all subscription state.
        self.session.is_subscribed = false;
        self.session.is_pattern_subscribed = false;
        self.session.subscribed_channels.clear();
        self.session.subscribed_patterns.clear();
        self.session.pubsub_receivers.clear();
        result
    }

    async fn send_error_to_client(&mut self, e: OpalDBError) -> Result<(), OpalDBError> {
        if let Some(framed) = self.framed.as_mut() {
            framed.send(RespFrame::Error(e.to_string())).await?;
        }
        Ok(())
    }
}

/// Non-critical disconnection errors that need no warning log.
fn is_normal_disconnect(e: &OpalDBError) -> bool {
    matches!(e, OpalDBError::Io(arc_err) if matches!(
        arc_err.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionAborted
    ))
}
