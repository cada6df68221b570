//! Scripted [`Authority`] double and fixture data shared by the crate's
//! unit tests.

use crate::api::{Authority, LoginOutcome, RenewedCredential, ValidationOutcome};
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use wheelhouse_storage::{Credential, Durability, PermissionGrant, SessionUser};

pub fn sample_user() -> SessionUser {
    SessionUser {
        id: 42,
        username: "jdoe".to_string(),
        email: "jdoe@example.com".to_string(),
        display_name: "Jane Doe".to_string(),
        role_name: "Mechanic".to_string(),
        role_id: 3,
        department: Some("Service".to_string()),
        last_login: Some("2026-08-01T09:15:00Z".to_string()),
    }
}

pub fn sample_grants() -> HashMap<String, PermissionGrant> {
    let mut grants = HashMap::new();
    grants.insert(
        "vehicles".to_string(),
        PermissionGrant {
            can_view: true,
            can_create: true,
            can_edit: true,
            ..Default::default()
        },
    );
    grants
}

pub fn ephemeral_credential() -> Credential {
    Credential {
        access_token: "access-token-1".to_string(),
        refresh_token: Some("refresh-token-1".to_string()),
        durability: Durability::Ephemeral,
    }
}

/// One scripted outcome for a validate call. Scripts are consumed in FIFO
/// order; an empty queue answers with the default valid outcome.
pub enum ValidateScript {
    Valid {
        user: SessionUser,
        grants: HashMap<String, PermissionGrant>,
    },
    /// Definitive rejection of the credential.
    Invalid,
    /// Transient failure that says nothing about the session.
    Unreachable,
}

/// Scripted authority. Counters record how many times each endpoint was
/// hit; builders configure failure modes before the double is shared.
pub struct MockAuthority {
    pub login_calls: AtomicUsize,
    pub validate_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    reject_login: bool,
    fail_logout: bool,
    refresh_failure: Option<String>,
    refresh_delay: Option<Duration>,
    validate_script: Mutex<VecDeque<ValidateScript>>,
}

impl MockAuthority {
    pub fn new() -> Self {
        Self {
            login_calls: AtomicUsize::new(0),
            validate_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            reject_login: false,
            fail_logout: false,
            refresh_failure: None,
            refresh_delay: None,
            validate_script: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_login_rejected(mut self) -> Self {
        self.reject_login = true;
        self
    }

    pub fn with_logout_failure(mut self) -> Self {
        self.fail_logout = true;
        self
    }

    pub fn with_refresh_failure(mut self, reason: &str) -> Self {
        self.refresh_failure = Some(reason.to_string());
        self
    }

    /// Hold every refresh call open for `delay`, so tests can overlap
    /// callers with the renewal in flight.
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    pub fn push_validate(&self, script: ValidateScript) {
        self.validate_script.lock().unwrap().push_back(script);
    }
}

#[async_trait]
impl Authority for MockAuthority {
    async fn login(
        &self,
        _username: &str,
        _password: &str,
        _remember_me: bool,
    ) -> AuthResult<LoginOutcome> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_login {
            return Err(AuthError::InvalidCredentials(
                "Invalid username or password".to_string(),
            ));
        }
        Ok(LoginOutcome {
            access_token: "access-token-1".to_string(),
            refresh_token: Some("refresh-token-1".to_string()),
            user: sample_user(),
            grants: sample_grants(),
        })
    }

    async fn validate(&self, _access_token: &str) -> AuthResult<ValidationOutcome> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.validate_script.lock().unwrap().pop_front();
        match script {
            None => Ok(ValidationOutcome {
                user: sample_user(),
                grants: sample_grants(),
            }),
            Some(ValidateScript::Valid { user, grants }) => {
                Ok(ValidationOutcome { user, grants })
            }
            Some(ValidateScript::Invalid) => Err(AuthError::TokenExpired),
            Some(ValidateScript::Unreachable) => Err(AuthError::Timeout),
        }
    }

    async fn refresh(&self, _refresh_token: &str) -> AuthResult<RenewedCredential> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.refresh_failure {
            return Err(AuthError::RefreshFailed(reason.clone()));
        }
        Ok(RenewedCredential {
            access_token: "renewed-token".to_string(),
            refresh_token: None,
        })
    }

    async fn notify_logout(&self, _access_token: &str) -> AuthResult<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_logout {
            return Err(AuthError::Timeout);
        }
        Ok(())
    }

    async fn profile(&self, _access_token: &str) -> AuthResult<SessionUser> {
        Ok(sample_user())
    }
}
