// src/connection/guard.rs

//! An RAII guard ensuring a connection's server-side state is released on
//! every exit path: blocking-waiter registrations and any open transaction.

use crate::core::state::ServerState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

pub struct ConnectionGuard {
    pub(crate) state: Arc<ServerState>,
    pub(crate) session_id: u64,
    pub(crate) addr: SocketAddr,
    /// Set when the socket was handed off to a replica handler, which takes
    /// over its lifecycle.
    pub(crate) is_handed_off: bool,
}

impl ConnectionGuard {
    pub(crate) fn new(state: Arc<ServerState>, session_id: u64, addr: SocketAddr) -> Self {
        Self {
            state,
            session_id,
            addr,
            is_handed_off: false,
        }
    }

    pub(crate) fn set_handed_off(&mut self) {
        self.is_handed_off = true;
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.is_handed_off {
            debug!(
                "ConnectionGuard for {} dropped after handoff; cleanup skipped.",
                self.addr
            );
            return;
        }

        debug!("Cleaning up connection state for {}", self.addr);
        self.state
            .blocker_manager
            .remove_waiters_for_session(self.session_id);
        self.state
            .stream_blocker_manager
            .remove_waiters_for_session(self.session_id);
        self.state.db.discard_transaction(self.session_id);
    }
}
