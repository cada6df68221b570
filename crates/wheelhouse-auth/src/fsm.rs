//! Authentication state machine using rust-fsm.
//!
//! The session's authorization state is tracked by an explicit finite state
//! machine rather than derived from storage checks.
//!
//! ## State Diagram
//!
//! ```text
//! ┌──────────────────┐
//! │ Unauthenticated  │ (initial)
//! └────────┬─────────┘
//!          │ LoginStarted            SessionRestored (hydration)
//!          ▼                                 │
//! ┌──────────────────┐                       │
//! │  Authenticating  │                       │
//! └────────┬─────────┘                       │
//!          │ LoginSucceeded / LoginFailed    ▼
//!          ▼                        ┌──────────────────┐
//! ┌──────────────────┐ Credential   │                  │
//! │  Authenticated   │──Expired────►│    Refreshing    │
//! └────────┬─────────┘              └────────┬─────────┘
//!          │ LoggedOut /                     │ RefreshSucceeded → Authenticated
//!          │ ValidationFailed                │ RefreshFailed / LoggedOut
//!          ▼                                 ▼
//!     Unauthenticated                  Unauthenticated
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Declarative FSM definition. This generates a module `session_machine` with
// State and Input enums plus the StateMachine type alias.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Unauthenticated)

    Unauthenticated => {
        LoginStarted => Authenticating,
        SessionRestored => Authenticated
    },
    Authenticating => {
        LoginSucceeded => Authenticated,
        LoginFailed => Unauthenticated
    },
    Authenticated => {
        CredentialExpired => Refreshing,
        ValidationFailed => Unauthenticated,
        LoggedOut => Unauthenticated
    },
    Refreshing => {
        RefreshSucceeded => Authenticated,
        RefreshFailed => Unauthenticated,
        LoggedOut => Unauthenticated
    }
}

// Re-export the generated types with clearer names
pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Authorization state for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// No session.
    Unauthenticated,
    /// Login call in flight.
    Authenticating,
    /// Session active.
    Authenticated,
    /// Access credential expired, renewal in flight.
    Refreshing,
}

impl AuthState {
    /// Returns true only when the session is fully active.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }

    /// Returns true when outbound calls may carry the stored credential.
    ///
    /// During a refresh the stale token is still attached so the retried
    /// request can go out the moment renewal completes.
    pub fn can_attach_credential(&self) -> bool {
        matches!(self, AuthState::Authenticated | AuthState::Refreshing)
    }
}

impl From<&SessionMachineState> for AuthState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Unauthenticated => AuthState::Unauthenticated,
            SessionMachineState::Authenticating => AuthState::Authenticating,
            SessionMachineState::Authenticated => AuthState::Authenticated,
            SessionMachineState::Refreshing => AuthState::Refreshing,
        }
    }
}

/// Payload for auth state change notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStateChangedPayload {
    /// Current auth state.
    pub state: AuthState,
    /// Username if logged in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}
