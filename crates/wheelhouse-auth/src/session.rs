//! Session management with FSM-based state tracking.
//!
//! The [`SessionManager`] is the authoritative in-memory session state: it
//! owns the credential store, tracks the auth state machine, and holds the
//! current identity and permission snapshots. Snapshots are replaced
//! wholesale on login/validate/refresh-permissions, never patched in place.

use crate::api::Authority;
use crate::fsm::{AuthState, AuthStateChangedPayload, SessionMachine, SessionMachineInput};
use crate::permissions::{PermissionAction, PermissionSet};
use crate::refresher::TokenRefresher;
use crate::{AuthError, AuthResult};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};
use wheelhouse_storage::{Credential, CredentialStore, Durability, SessionUser};

/// Callback type for auth state change notifications.
pub type AuthStateCallback = Box<dyn Fn(AuthStateChangedPayload) + Send + Sync>;

/// Snapshot of authentication state for consumers.
#[derive(Debug, Clone)]
pub struct AuthSnapshot {
    pub authenticated: bool,
    pub state: AuthState,
    pub user: Option<SessionUser>,
}

/// Authoritative session state machine.
pub struct SessionManager {
    store: Arc<CredentialStore>,
    authority: Arc<dyn Authority>,
    refresher: TokenRefresher,
    /// Internal FSM for tracking auth state transitions.
    fsm: Mutex<SessionMachine>,
    /// Identity snapshot; replaced wholesale, never field-patched.
    user: RwLock<Option<SessionUser>>,
    /// Permission grants; replaced wholesale, never incrementally patched.
    permissions: RwLock<PermissionSet>,
    /// Optional callback for state change notifications.
    state_callback: Mutex<Option<AuthStateCallback>>,
}

impl SessionManager {
    /// Create a new session manager.
    pub fn new(store: Arc<CredentialStore>, authority: Arc<dyn Authority>) -> Self {
        Self {
            refresher: TokenRefresher::new(authority.clone(), store.clone()),
            store,
            authority,
            fsm: Mutex::new(SessionMachine::new()),
            user: RwLock::new(None),
            permissions: RwLock::new(PermissionSet::empty()),
            state_callback: Mutex::new(None),
        }
    }

    /// Set a callback to be notified of auth state changes.
    pub fn set_state_callback(&self, callback: AuthStateCallback) {
        let mut cb = self.state_callback.lock().unwrap();
        *cb = Some(callback);
    }

    /// Get the current auth state.
    pub fn state(&self) -> AuthState {
        let fsm = self.fsm.lock().unwrap();
        AuthState::from(fsm.state())
    }

    /// Whether the session is fully active.
    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    /// Current identity snapshot, if any.
    pub fn user(&self) -> Option<SessionUser> {
        self.user.read().unwrap().clone()
    }

    /// Current permission set. Cheap to clone; empty when logged out.
    pub fn permissions(&self) -> PermissionSet {
        self.permissions.read().unwrap().clone()
    }

    /// Whether `action` is granted on `code` for the current session.
    pub fn check_permission(&self, code: &str, action: PermissionAction) -> bool {
        self.permissions().allows(code, action)
    }

    /// The access token to attach to outbound calls, when state permits.
    pub fn access_token(&self) -> AuthResult<Option<String>> {
        if !self.state().can_attach_credential() {
            return Ok(None);
        }
        Ok(self
            .store
            .credential()?
            .map(|credential| credential.access_token))
    }

    /// Snapshot for status reporting.
    pub fn snapshot(&self) -> AuthSnapshot {
        let state = self.state();
        AuthSnapshot {
            authenticated: state.is_authenticated(),
            state,
            user: self.user(),
        }
    }

    /// Transition the FSM and notify the callback if the state changed.
    fn transition(&self, input: &SessionMachineInput) -> AuthResult<AuthState> {
        let mut fsm = self.fsm.lock().unwrap();
        let old_state = AuthState::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_state = AuthState::from(fsm.state());
        drop(fsm);

        if old_state != new_state {
            debug!(
                old_state = ?old_state,
                new_state = ?new_state,
                "Auth state transition"
            );
            self.notify_state_change(new_state);
        }

        Ok(new_state)
    }

    fn notify_state_change(&self, state: AuthState) {
        let cb = self.state_callback.lock().unwrap();
        if let Some(callback) = cb.as_ref() {
            let username = self.user().map(|user| user.username);
            callback(AuthStateChangedPayload { state, username });
        }
    }

    /// Login with username and password.
    ///
    /// On success the store and in-memory state are written together before
    /// this returns; the session is active immediately, no further round
    /// trip required.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        remember_me: bool,
    ) -> AuthResult<()> {
        self.transition(&SessionMachineInput::LoginStarted)?;

        let outcome = match self.authority.login(username, password, remember_me).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.transition(&SessionMachineInput::LoginFailed)?;
                return Err(e);
            }
        };

        let durability = if remember_me {
            Durability::Persistent
        } else {
            Durability::Ephemeral
        };
        let credential = Credential {
            access_token: outcome.access_token,
            refresh_token: outcome.refresh_token,
            durability,
        };

        self.store
            .store_session(&credential, &outcome.user, &outcome.grants)?;
        {
            let mut user = self.user.write().unwrap();
            *user = Some(outcome.user.clone());
        }
        {
            let mut permissions = self.permissions.write().unwrap();
            *permissions = PermissionSet::from_map(outcome.grants);
        }

        self.transition(&SessionMachineInput::LoginSucceeded)?;
        info!(username = %outcome.user.username, "Login successful");

        Ok(())
    }

    /// Optimistically restore a persisted session into memory.
    ///
    /// No network call is made; the stored snapshot is trusted so consumers
    /// render immediately instead of flashing a logged-out view. Ground
    /// truth arrives when [`validate`](Self::validate) runs afterwards.
    ///
    /// Returns `Ok(true)` when a session was restored, `Ok(false)` when no
    /// usable session exists (a corrupt snapshot is cleared and counts as
    /// none).
    pub fn hydrate(&self) -> AuthResult<bool> {
        let credential = match self.store.credential()? {
            Some(credential) => credential,
            None => {
                debug!("No stored session to restore");
                return Ok(false);
            }
        };

        let (user, grants) = match (self.store.user()?, self.store.permissions()?) {
            (Some(user), Some(grants)) => (user, grants),
            _ => {
                // Token present but the snapshot around it is unreadable.
                // Fail safe: clear everything instead of propagating.
                warn!("Stored session snapshot is corrupt, clearing");
                self.store.clear()?;
                return Ok(false);
            }
        };

        {
            let mut slot = self.user.write().unwrap();
            *slot = Some(user.clone());
        }
        {
            let mut slot = self.permissions.write().unwrap();
            *slot = PermissionSet::from_map(grants);
        }
        self.transition(&SessionMachineInput::SessionRestored)?;

        info!(
            username = %user.username,
            durability = ?credential.durability,
            "Session restored from storage"
        );
        Ok(true)
    }

    /// Run once at process start: hydrate, then converge to ground truth in
    /// the background.
    ///
    /// Returns as soon as hydration completes so startup never waits on the
    /// network; the validate call it spawns replaces the optimistic snapshot
    /// or tears it down.
    pub async fn initialize(self: &Arc<Self>) -> AuthResult<bool> {
        let hydrated = self.hydrate()?;
        if hydrated {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(e) = manager.validate().await {
                    warn!(error = %e, "Background session validation failed");
                }
            });
        }
        Ok(hydrated)
    }

    /// Confirm the access credential with the authority and replace the
    /// identity and permission snapshots with fresh ones.
    ///
    /// A transient failure (authority unreachable, server error) while a
    /// cached snapshot exists leaves the optimistic session in place; a
    /// definitive rejection clears everything.
    pub async fn validate(&self) -> AuthResult<()> {
        let credential = self.store.credential()?.ok_or(AuthError::NotLoggedIn)?;

        match self.authority.validate(&credential.access_token).await {
            Ok(outcome) => {
                self.store.replace_user(&outcome.user)?;
                self.store.replace_permissions(&outcome.grants)?;
                {
                    let mut user = self.user.write().unwrap();
                    *user = Some(outcome.user);
                }
                {
                    let mut permissions = self.permissions.write().unwrap();
                    *permissions = PermissionSet::from_map(outcome.grants);
                }
                debug!("Session validated, snapshots replaced");
                Ok(())
            }
            Err(e) if e.is_transient() && self.user().is_some() => {
                warn!(error = %e, "Authority unreachable, keeping cached session");
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "Session validation failed, clearing session");
                self.clear_local(&SessionMachineInput::ValidationFailed)?;
                Err(e)
            }
        }
    }

    /// Re-fetch and replace the permission grants without touching the
    /// identity snapshot or the credential.
    ///
    /// Used when role changes must take effect without a full re-login.
    pub async fn refresh_permissions(&self) -> AuthResult<()> {
        let credential = self.store.credential()?.ok_or(AuthError::NotLoggedIn)?;
        let outcome = self.authority.validate(&credential.access_token).await?;

        self.store.replace_permissions(&outcome.grants)?;
        let mut permissions = self.permissions.write().unwrap();
        *permissions = PermissionSet::from_map(outcome.grants);
        Ok(())
    }

    /// Fetch a fresh identity snapshot and replace the cached one.
    pub async fn fetch_profile(&self) -> AuthResult<SessionUser> {
        let credential = self.store.credential()?.ok_or(AuthError::NotLoggedIn)?;
        let user = self.authority.profile(&credential.access_token).await?;

        self.store.replace_user(&user)?;
        {
            let mut slot = self.user.write().unwrap();
            *slot = Some(user.clone());
        }
        Ok(user)
    }

    /// Renew the expired access credential via the single-flight refresher
    /// and persist the result.
    ///
    /// On failure the session is force-cleared (`logout(true)`) and the
    /// error surfaces to the caller. If an explicit logout raced the
    /// renewal, the renewed credential is discarded rather than resurrected.
    pub async fn refresh_credential(&self) -> AuthResult<Credential> {
        // Concurrent callers may already have moved us to Refreshing.
        let _ = self.transition(&SessionMachineInput::CredentialExpired);

        let previous = self.store.credential()?;

        match self.refresher.refresh().await {
            Ok(renewed) => {
                if self.state() == AuthState::Unauthenticated {
                    debug!("Session torn down mid-renewal, discarding result");
                    return Err(AuthError::NotLoggedIn);
                }

                let durability = previous
                    .as_ref()
                    .map(|credential| credential.durability)
                    .unwrap_or(Durability::Ephemeral);
                let refresh_token = renewed
                    .refresh_token
                    .or_else(|| previous.and_then(|credential| credential.refresh_token));
                let credential = Credential {
                    access_token: renewed.access_token,
                    refresh_token,
                    durability,
                };

                self.store.set_credential(&credential)?;
                let _ = self.transition(&SessionMachineInput::RefreshSucceeded);
                Ok(credential)
            }
            Err(e) => {
                warn!(error = %e, "Credential renewal failed, forcing logout");
                self.logout(true).await?;
                Err(e)
            }
        }
    }

    /// End the session.
    ///
    /// With `immediate`, local state is cleared synchronously first and the
    /// authority notification is best-effort; a network failure there is
    /// swallowed, since local state is already gone. Without `immediate`,
    /// the authority is notified first but local clearing runs regardless
    /// of the notification outcome.
    ///
    /// Either path ends Unauthenticated with both storage tiers empty.
    pub async fn logout(&self, immediate: bool) -> AuthResult<()> {
        let token = self
            .store
            .credential()?
            .map(|credential| credential.access_token);

        if immediate {
            self.clear_local(&SessionMachineInput::LoggedOut)?;
            if let Some(token) = token {
                if let Err(e) = self.authority.notify_logout(&token).await {
                    debug!(error = %e, "Logout notification failed (ignored)");
                }
            }
            info!("Logged out");
            return Ok(());
        }

        let notify_result = match &token {
            Some(token) => self.authority.notify_logout(token).await,
            None => Ok(()),
        };

        // Local clearing always runs, even when the notification failed.
        self.clear_local(&SessionMachineInput::LoggedOut)?;
        info!("Logged out");
        notify_result
    }

    fn clear_local(&self, input: &SessionMachineInput) -> AuthResult<()> {
        self.store.clear()?;
        {
            let mut user = self.user.write().unwrap();
            *user = None;
        }
        {
            let mut permissions = self.permissions.write().unwrap();
            *permissions = PermissionSet::empty();
        }
        // Already-unauthenticated is fine; clearing is idempotent.
        let _ = self.transition(input);
        Ok(())
    }
}
