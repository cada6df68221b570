//! HTTP client for the Wheelhouse authority.
//!
//! The [`Authority`] trait is the seam between session logic and the wire:
//! the session manager and token refresher only ever talk to the authority
//! through it, so tests can substitute a scripted double and the HTTP client
//! stays independently testable.

use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;
use wheelhouse_storage::{PermissionGrant, SessionUser};

/// Result of a successful login call.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: SessionUser,
    pub grants: HashMap<String, PermissionGrant>,
}

/// Result of a successful validate-token call.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub user: SessionUser,
    pub grants: HashMap<String, PermissionGrant>,
}

/// Result of a successful refresh call.
#[derive(Debug, Clone)]
pub struct RenewedCredential {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Client-side contract for the remote authority.
#[async_trait]
pub trait Authority: Send + Sync {
    /// Exchange username/password for a session.
    async fn login(
        &self,
        username: &str,
        password: &str,
        remember_me: bool,
    ) -> AuthResult<LoginOutcome>;

    /// Confirm the access credential and fetch a fresh permission set.
    async fn validate(&self, access_token: &str) -> AuthResult<ValidationOutcome>;

    /// Mint a new access credential from the refresh credential.
    async fn refresh(&self, refresh_token: &str) -> AuthResult<RenewedCredential>;

    /// Tell the authority the session is over. Callers treat this as
    /// best-effort.
    async fn notify_logout(&self, access_token: &str) -> AuthResult<()>;

    /// Fetch the identity snapshot for the current credential.
    async fn profile(&self, access_token: &str) -> AuthResult<SessionUser>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    remember_me: bool,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    success: bool,
    #[serde(default)]
    token: Option<String>,
    #[serde(default, rename = "refreshToken")]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<SessionUser>,
    #[serde(default)]
    permissions: Option<HashMap<String, PermissionGrant>>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    success: bool,
    #[serde(default)]
    valid: bool,
    #[serde(default)]
    user: Option<SessionUser>,
    #[serde(default)]
    permissions: Option<HashMap<String, PermissionGrant>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    success: bool,
    #[serde(default)]
    token: Option<String>,
    #[serde(default, rename = "refreshToken")]
    refresh_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    success: bool,
    #[serde(default)]
    user: Option<SessionUser>,
}

/// Reqwest-backed [`Authority`] implementation.
#[derive(Clone)]
pub struct HttpAuthority {
    http_client: reqwest::Client,
    base_url: Url,
}

impl HttpAuthority {
    /// Create an authority client against the given base URL.
    ///
    /// Every call carries `timeout` so a hung authority resolves as
    /// [`AuthError::Timeout`] instead of wedging its caller.
    pub fn new(base_url: &str, timeout: Duration) -> AuthResult<Self> {
        let base_url = Url::parse(base_url)?;
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// Create an authority client from the loaded configuration.
    pub fn from_config(config: &wheelhouse_core::Config) -> AuthResult<Self> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    fn endpoint(&self, path: &str) -> AuthResult<Url> {
        Ok(self.base_url.join(path)?)
    }
}

#[async_trait]
impl Authority for HttpAuthority {
    async fn login(
        &self,
        username: &str,
        password: &str,
        remember_me: bool,
    ) -> AuthResult<LoginOutcome> {
        let url = self.endpoint("/api/auth/login")?;
        debug!(url = %url, username = %username, "Attempting login");

        let response = self
            .http_client
            .post(url)
            .json(&LoginRequest {
                username,
                password,
                remember_me,
            })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST {
            let body: LoginResponse = response.json().await?;
            let reason = login_failure_reason(&body);
            warn!(status = %status, reason = %reason, "Login rejected");
            return Err(AuthError::InvalidCredentials(reason));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body_len = body.len(), "Login failed");
            return Err(AuthError::Authority {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: LoginResponse = response.json().await?;
        if !body.success {
            return Err(AuthError::InvalidCredentials(login_failure_reason(&body)));
        }

        match (body.token, body.user) {
            (Some(access_token), Some(user)) => Ok(LoginOutcome {
                access_token,
                refresh_token: body.refresh_token,
                user,
                grants: body.permissions.unwrap_or_default(),
            }),
            _ => Err(AuthError::InvalidCredentials(
                "Malformed login response".to_string(),
            )),
        }
    }

    async fn validate(&self, access_token: &str) -> AuthResult<ValidationOutcome> {
        let url = self.endpoint("/api/auth/validate-token")?;
        debug!(url = %url, "Validating access credential");

        let response = self
            .http_client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::TokenExpired);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body_len = body.len(), "Validate call failed");
            return Err(AuthError::Authority {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: ValidateResponse = response.json().await?;
        if !body.success || !body.valid {
            return Err(AuthError::TokenExpired);
        }

        let user = body
            .user
            .ok_or_else(|| AuthError::SessionCorrupt("Validate response lacked user".to_string()))?;

        Ok(ValidationOutcome {
            user,
            grants: body.permissions.unwrap_or_default(),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<RenewedCredential> {
        let url = self.endpoint("/api/auth/refresh")?;
        debug!(url = %url, "Renewing access credential");

        let response = self
            .http_client
            .post(url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body_len = body.len(), "Credential refresh rejected");
            return Err(AuthError::RefreshFailed(format!("HTTP {}", status)));
        }

        let body: RefreshResponse = response.json().await?;
        if !body.success {
            return Err(AuthError::RefreshFailed(
                body.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        let access_token = body
            .token
            .ok_or_else(|| AuthError::RefreshFailed("Refresh response lacked token".to_string()))?;

        Ok(RenewedCredential {
            access_token,
            refresh_token: body.refresh_token,
        })
    }

    async fn notify_logout(&self, access_token: &str) -> AuthResult<()> {
        let url = self.endpoint("/api/auth/logout")?;
        debug!(url = %url, "Notifying authority of logout");

        let response = self
            .http_client
            .post(url)
            .bearer_auth(access_token)
            .send()
            .await?;

        // The ack is best-effort; a non-success status is not worth more
        // than a log line to any caller.
        if !response.status().is_success() {
            debug!(status = %response.status(), "Logout ack was not successful");
        }
        Ok(())
    }

    async fn profile(&self, access_token: &str) -> AuthResult<SessionUser> {
        let url = self.endpoint("/api/auth/profile")?;
        debug!(url = %url, "Fetching profile");

        let response = self
            .http_client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::TokenExpired);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Authority {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: ProfileResponse = response.json().await?;
        if !body.success {
            return Err(AuthError::SessionCorrupt(
                "Profile response unsuccessful".to_string(),
            ));
        }
        body.user
            .ok_or_else(|| AuthError::SessionCorrupt("Profile response lacked user".to_string()))
    }
}

fn login_failure_reason(body: &LoginResponse) -> String {
    match (&body.error, &body.code) {
        (Some(error), Some(code)) => format!("{} ({})", error, code),
        (Some(error), None) => error.clone(),
        _ => "Login rejected".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_wire_names() {
        let request = LoginRequest {
            username: "jdoe",
            password: "hunter2",
            remember_me: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["username"], "jdoe");
        assert_eq!(json["rememberMe"], true);
    }

    #[test]
    fn test_login_response_failure_shape() {
        let body: LoginResponse = serde_json::from_str(
            r#"{"success": false, "error": "Invalid password", "code": "BAD_CREDENTIALS"}"#,
        )
        .unwrap();
        assert!(!body.success);
        assert_eq!(
            login_failure_reason(&body),
            "Invalid password (BAD_CREDENTIALS)"
        );
    }

    #[test]
    fn test_refresh_response_optional_rotation() {
        let body: RefreshResponse =
            serde_json::from_str(r#"{"success": true, "token": "t2"}"#).unwrap();
        assert!(body.success);
        assert_eq!(body.token.as_deref(), Some("t2"));
        assert!(body.refresh_token.is_none());
    }

    #[test]
    fn test_validate_response_defaults() {
        let body: ValidateResponse = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(body.success);
        assert!(!body.valid);
        assert!(body.user.is_none());
    }

    #[test]
    fn test_endpoint_join() {
        let authority = HttpAuthority::new("http://localhost:3001", Duration::from_secs(5)).unwrap();
        assert_eq!(
            authority.endpoint("/api/auth/login").unwrap().as_str(),
            "http://localhost:3001/api/auth/login"
        );
    }
}
