//! Single-flight renewal of the access credential.
//!
//! Refresh credentials are single-use on most authorities: two renewals
//! racing would leave one caller holding a dead token. The refresher
//! therefore memoizes the in-flight renewal as a shared future. The first
//! caller installs it, every concurrent caller awaits the same result, and
//! completion clears the slot so the next expiry starts a fresh renewal.

use crate::api::{Authority, RenewedCredential};
use crate::{AuthError, AuthResult};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use wheelhouse_storage::CredentialStore;

/// Cloneable failure carried through the shared future to every waiter.
#[derive(Debug, Clone)]
struct RenewalFailure(String);

type SharedRenewal = Shared<BoxFuture<'static, Result<RenewedCredential, RenewalFailure>>>;

/// Coordinates renewal of an expired access credential.
pub struct TokenRefresher {
    authority: Arc<dyn Authority>,
    store: Arc<CredentialStore>,
    inflight: Arc<Mutex<Option<SharedRenewal>>>,
}

impl TokenRefresher {
    pub fn new(authority: Arc<dyn Authority>, store: Arc<CredentialStore>) -> Self {
        Self {
            authority,
            store,
            inflight: Arc::new(Mutex::new(None)),
        }
    }

    /// Renew the access credential, joining any renewal already in flight.
    ///
    /// Exactly one authority call is made no matter how many callers arrive
    /// while it is pending; they all observe the same outcome. The renewed
    /// credential is returned to the caller, which decides whether its
    /// effects still apply (a logout may have raced the renewal).
    pub async fn refresh(&self) -> AuthResult<RenewedCredential> {
        let renewal = {
            let mut slot = self.inflight.lock().unwrap();
            match slot.as_ref() {
                Some(pending) => {
                    debug!("Renewal already in flight, attaching to it");
                    pending.clone()
                }
                None => {
                    let authority = self.authority.clone();
                    let store = self.store.clone();
                    let slot_handle = self.inflight.clone();
                    let renewal = async move {
                        let result = renew(authority, store).await;
                        // Clear the slot so the next expiry starts fresh.
                        slot_handle.lock().unwrap().take();
                        result
                    }
                    .boxed()
                    .shared();
                    *slot = Some(renewal.clone());
                    renewal
                }
            }
        };

        renewal
            .await
            .map_err(|RenewalFailure(reason)| AuthError::RefreshFailed(reason))
    }
}

async fn renew(
    authority: Arc<dyn Authority>,
    store: Arc<CredentialStore>,
) -> Result<RenewedCredential, RenewalFailure> {
    let refresh_token = store
        .credential()
        .map_err(|e| RenewalFailure(e.to_string()))?
        .and_then(|credential| credential.refresh_token)
        .ok_or_else(|| RenewalFailure("No refresh credential available".to_string()))?;

    match authority.refresh(&refresh_token).await {
        Ok(renewed) => {
            info!("Access credential renewed");
            Ok(renewed)
        }
        Err(e) => {
            warn!(error = %e, "Credential renewal failed");
            Err(RenewalFailure(e.to_string()))
        }
    }
}
