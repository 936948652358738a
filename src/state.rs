//! State manager (C5): the global system state enum, its validated transition
//! table, and the thread-safe FIFO event queue the supervisor drains.
//!
//! Ported from the reference implementation's `SystemStateManager.hpp`; the
//! teacher repo has no direct analogue (its closest pattern is the daemon's
//! plain `ConnectionState` enum in `src/daemon/ipc.rs`, whose "simple enum +
//! match dispatch" style this module follows for the transition guard).

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::Mutex;

/// Process-wide connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    Idle,
    Connecting,
    Connected,
    ShuttingDown,
}

/// Events produced by the datapath (C7) and the RPC surface (C9), consumed by
/// the supervisor's monitor loop (C8).
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    InitializeConnection {
        self_index: usize,
        peers: Vec<String>,
        peer_keys: Vec<[u8; 32]>,
    },
    DisconnectAllRequested,
    PeerConnected { endpoint: Ipv4Addr },
    PeerDisconnected { endpoint: Ipv4Addr },
    AllPeersDisconnected,
    ShutdownRequested,
}

impl NetworkEvent {
    /// Name for logging, matching the reference implementation's event tags.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitializeConnection { .. } => "INITIALIZE_CONNECTION",
            Self::DisconnectAllRequested => "DISCONNECT_ALL_REQUESTED",
            Self::PeerConnected { .. } => "PEER_CONNECTED",
            Self::PeerDisconnected { .. } => "PEER_DISCONNECTED",
            Self::AllPeersDisconnected => "ALL_PEERS_DISCONNECTED",
            Self::ShutdownRequested => "SHUTDOWN_REQUESTED",
        }
    }
}

/// Holds the current state and the pending event queue.
///
/// `set_state` and `queue_event` are the only mutators; `state()` is a cheap,
/// lock-free-feeling read (a short mutex hold) and `next_event` never blocks.
pub struct StateManager {
    state: Mutex<SystemState>,
    events: Mutex<VecDeque<NetworkEvent>>,
}

impl StateManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SystemState::Idle),
            events: Mutex::new(VecDeque::new()),
        }
    }

    pub fn state(&self) -> SystemState {
        *self.state.lock().expect("state mutex poisoned")
    }

    /// Attempt a transition along the edges of §4.5. An invalid transition is
    /// silently ignored and the current state is preserved (spec invariant).
    pub fn set_state(&self, target: SystemState) {
        let mut guard = self.state.lock().expect("state mutex poisoned");
        if Self::is_valid_transition(*guard, target) {
            tracing::info!(from = ?*guard, to = ?target, "state transition");
            *guard = target;
        } else {
            tracing::debug!(from = ?*guard, to = ?target, "rejected invalid transition");
        }
    }

    fn is_valid_transition(from: SystemState, to: SystemState) -> bool {
        use SystemState::*;
        match (from, to) {
            (_, ShuttingDown) => true,
            (Idle, Connecting) => true,
            (Connecting, Connected) => true,
            (Connecting, Idle) => true,
            (Connected, Idle) => true,
            _ => false,
        }
    }

    /// Enqueue an event. Thread-safe; producers never block on a full queue
    /// (bounded only by memory, per spec §5).
    pub fn queue_event(&self, event: NetworkEvent) {
        tracing::debug!(event = event.name(), "event queued");
        self.events.lock().expect("event queue poisoned").push_back(event);
    }

    /// Pop at most one event. Never blocks; returns `None` if the queue is empty.
    pub fn next_event(&self) -> Option<NetworkEvent> {
        self.events.lock().expect("event queue poisoned").pop_front()
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_manager_is_idle() {
        let mgr = StateManager::new();
        assert_eq!(mgr.state(), SystemState::Idle);
    }

    #[test]
    fn invalid_transition_is_ignored() {
        // Seed scenario 4.
        let mgr = StateManager::new();
        mgr.set_state(SystemState::Connecting);
        mgr.set_state(SystemState::Connected);
        mgr.set_state(SystemState::Connecting); // invalid from Connected; ignored
        assert_eq!(mgr.state(), SystemState::Connected);
    }

    #[test]
    fn shutting_down_reachable_from_any_state() {
        for start in [
            SystemState::Idle,
            SystemState::Connecting,
            SystemState::Connected,
        ] {
            let mgr = StateManager::new();
            mgr.set_state(start);
            mgr.set_state(SystemState::ShuttingDown);
            assert_eq!(mgr.state(), SystemState::ShuttingDown);
        }
    }

    #[test]
    fn events_are_fifo() {
        let mgr = StateManager::new();
        mgr.queue_event(NetworkEvent::AllPeersDisconnected);
        mgr.queue_event(NetworkEvent::DisconnectAllRequested);

        assert!(matches!(
            mgr.next_event(),
            Some(NetworkEvent::AllPeersDisconnected)
        ));
        assert!(matches!(
            mgr.next_event(),
            Some(NetworkEvent::DisconnectAllRequested)
        ));
        assert!(mgr.next_event().is_none());
    }
}
