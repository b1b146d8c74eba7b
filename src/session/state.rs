//! Session state and its transition table.

use std::fmt;

use thiserror::Error;

/// Connection/bind state. Exactly one value at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Not connected, nothing scheduled
    Idle,
    /// Transport opening
    Connecting,
    /// Transport open, not yet binding
    Connected,
    /// bind_transceiver in flight
    Binding,
    /// Bound as transceiver
    Bound,
    /// Waiting for the reconnect delay
    Reconnecting,
}

impl SessionState {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        matches!(
            (self, next),
            (Idle, Connecting)
                | (Reconnecting, Connecting)
                | (Connecting, Connected)
                | (Connected, Binding)
                | (Binding, Bound)
                | (Connecting, Reconnecting)
                | (Connected, Reconnecting)
                | (Binding, Reconnecting)
                | (Bound, Reconnecting)
                | (_, Idle)
        )
    }

    /// Transport is open.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected | Self::Binding | Self::Bound)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Binding => "binding",
            Self::Bound => "bound",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidTransition {
    #[error("invalid transition {from} -> {to}")]
    State { from: SessionState, to: SessionState },

    #[error("{flag} requires bound state, session is {state}")]
    Flag {
        flag: &'static str,
        state: SessionState,
    },
}

/// State plus the sub-flags that may only co-exist with `Bound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateMachine {
    state: SessionState,
    /// Peer-imposed cool-down active
    throttled: bool,
    /// enquire_link in flight
    pinging: bool,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            throttled: false,
            pinging: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_throttled(&self) -> bool {
        self.throttled
    }

    pub fn is_pinging(&self) -> bool {
        self.pinging
    }

    /// Move to `next`, returning the previous state. Leaving `Bound` clears the sub-flags.
    pub fn transition(&mut self, next: SessionState) -> Result<SessionState, InvalidTransition> {
        let from = self.state;
        if !from.can_transition_to(next) {
            return Err(InvalidTransition::State { from, to: next });
        }

        self.state = next;
        if next != SessionState::Bound {
            self.throttled = false;
            self.pinging = false;
        }
        Ok(from)
    }

    pub fn set_throttled(&mut self, throttled: bool) -> Result<(), InvalidTransition> {
        self.set_flag("throttled", throttled)?;
        self.throttled = throttled;
        Ok(())
    }

    pub fn set_pinging(&mut self, pinging: bool) -> Result<(), InvalidTransition> {
        self.set_flag("pinging", pinging)?;
        self.pinging = pinging;
        Ok(())
    }

    fn set_flag(&self, flag: &'static str, value: bool) -> Result<(), InvalidTransition> {
        if value && self.state != SessionState::Bound {
            return Err(InvalidTransition::Flag {
                flag,
                state: self.state,
            });
        }
        Ok(())
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the session, published after every event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub throttled: bool,
    pub pinging: bool,
    pub stopped: bool,
    /// Consecutive connection failures since the last successful bind
    pub reconnect_attempts: u32,
    pub peer_system_id: Option<String>,
    pub peer_interface_version: Option<u8>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            throttled: false,
            pinging: false,
            stopped: false,
            reconnect_attempts: 0,
            peer_system_id: None,
            peer_interface_version: None,
        }
    }
}
