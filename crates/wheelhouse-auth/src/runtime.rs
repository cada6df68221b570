//! Process-wide session client.
//!
//! [`SessionClient`] wires the storage, authority, session manager, and
//! request gateway together, and a single installed instance serves the
//! whole process so every caller observes the same session.

use crate::api::{Authority, HttpAuthority};
use crate::fsm::AuthState;
use crate::gateway::{ApiRequest, ApiResponse, HttpSend, RequestGateway, ReqwestSender};
use crate::permissions::PermissionAction;
use crate::session::{AuthSnapshot, AuthStateCallback, SessionManager};
use crate::AuthResult;
use std::sync::{Arc, RwLock};
use tracing::info;
use wheelhouse_core::{Config, Paths};
use wheelhouse_storage::{CredentialStore, SessionUser};

/// Fully wired auth client for one Wheelhouse backend.
pub struct SessionClient {
    session: Arc<SessionManager>,
    gateway: RequestGateway,
}

impl SessionClient {
    /// Wire up a client from configuration: file-backed durable storage
    /// under the client data directory, HTTP authority and transport
    /// against the configured base URL.
    pub fn connect(config: &Config, paths: &Paths) -> AuthResult<Arc<Self>> {
        let store = Arc::new(CredentialStore::open(paths));
        let authority = Arc::new(HttpAuthority::from_config(config)?);
        let sender = Arc::new(ReqwestSender::from_config(config)?);
        Ok(Self::assemble(store, authority, sender))
    }

    /// Wire up a client over explicit components.
    pub fn assemble(
        store: Arc<CredentialStore>,
        authority: Arc<dyn Authority>,
        sender: Arc<dyn HttpSend>,
    ) -> Arc<Self> {
        let session = Arc::new(SessionManager::new(store, authority));
        let gateway = RequestGateway::new(session.clone(), sender);
        Arc::new(Self { session, gateway })
    }

    /// Restore any persisted session and kick off background validation.
    pub async fn initialize(&self) -> AuthResult<bool> {
        self.session.initialize().await
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
        remember_me: bool,
    ) -> AuthResult<()> {
        self.session.login(username, password, remember_me).await
    }

    pub async fn logout(&self, immediate: bool) -> AuthResult<()> {
        self.session.logout(immediate).await
    }

    pub async fn refresh_permissions(&self) -> AuthResult<()> {
        self.session.refresh_permissions().await
    }

    pub async fn fetch_profile(&self) -> AuthResult<SessionUser> {
        self.session.fetch_profile().await
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn state(&self) -> AuthState {
        self.session.state()
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.session.user()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.session.snapshot()
    }

    pub fn check_permission(&self, code: &str, action: PermissionAction) -> bool {
        self.session.check_permission(code, action)
    }

    pub fn set_state_callback(&self, callback: AuthStateCallback) {
        self.session.set_state_callback(callback)
    }

    /// Send an API request with the session credential attached.
    pub async fn fetch(&self, request: ApiRequest) -> AuthResult<ApiResponse> {
        self.gateway.dispatch(request).await
    }

    /// The session manager, for callers that need direct access.
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }
}

static CLIENT: RwLock<Option<Arc<SessionClient>>> = RwLock::new(None);

/// Install `client` as the process-wide session client, replacing any
/// previous one.
pub fn install(client: Arc<SessionClient>) {
    let mut slot = CLIENT.write().unwrap();
    *slot = Some(client);
    info!("Session client installed");
}

/// The installed session client, if any.
pub fn current() -> Option<Arc<SessionClient>> {
    CLIENT.read().unwrap().clone()
}

/// Remove the installed client. Existing handles stay valid.
pub fn teardown() {
    let mut slot = CLIENT.write().unwrap();
    *slot = None;
}
