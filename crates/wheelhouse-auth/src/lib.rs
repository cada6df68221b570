//! Session and authorization engine for the Wheelhouse client.
//!
//! This crate owns the full lifecycle of an authenticated session against a
//! Wheelhouse backend: login and logout, optimistic restore of a persisted
//! session at startup, single-flight renewal of expired access credentials,
//! permission evaluation, and a request gateway that attaches the credential
//! to outbound API calls and recovers from expiry transparently.
//!
//! The pieces compose bottom-up:
//!
//! - [`Authority`] is the wire contract with the backend
//!   ([`HttpAuthority`] is the reqwest-backed implementation)
//! - [`TokenRefresher`] coordinates credential renewal so concurrent
//!   expiries share one authority call
//! - [`SessionManager`] is the authoritative session state: the auth state
//!   machine plus the identity and permission snapshots
//! - [`RequestGateway`] dispatches API calls with the credential attached,
//!   retrying once across an expiry
//! - [`SessionClient`] wires it all together, with an optional process-wide
//!   installed instance ([`runtime::install`] / [`runtime::current`])

pub mod api;
pub mod error;
pub mod fsm;
pub mod gateway;
pub mod permissions;
pub mod refresher;
pub mod runtime;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{Authority, HttpAuthority, LoginOutcome, RenewedCredential, ValidationOutcome};
pub use error::{AuthError, AuthResult};
pub use fsm::{AuthState, AuthStateChangedPayload};
pub use gateway::{ApiRequest, ApiResponse, HttpSend, RequestGateway, ReqwestSender};
pub use permissions::{PermissionAction, PermissionSet};
pub use refresher::TokenRefresher;
pub use runtime::SessionClient;
pub use session::{AuthSnapshot, AuthStateCallback, SessionManager};
