//! Authenticated request dispatch.
//!
//! Every API call from the client flows through the [`RequestGateway`], so
//! credential attachment and expiry recovery live in exactly one place.
//! On a 401 the gateway renews the credential and retries the request once;
//! a 403 is surfaced immediately and never retried, because it means the
//! credential is fine and the caller simply lacks the permission.

use crate::session::SessionManager;
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

const AUTHORIZATION: &str = "Authorization";

/// An outbound API request, before credential attachment.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the configured API base URL.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers
            .iter()
            .any(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
    }
}

/// A response as the gateway's callers see it.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> AuthResult<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Transport seam under the gateway, so retry logic is testable without a
/// live server.
#[async_trait]
pub trait HttpSend: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> AuthResult<ApiResponse>;
}

/// Reqwest-backed transport.
pub struct ReqwestSender {
    http_client: reqwest::Client,
    base_url: Url,
}

impl ReqwestSender {
    pub fn new(base_url: &str, timeout: std::time::Duration) -> AuthResult<Self> {
        Ok(Self {
            http_client: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: Url::parse(base_url)?,
        })
    }

    pub fn from_config(config: &wheelhouse_core::Config) -> AuthResult<Self> {
        Self::new(&config.api_base_url, config.request_timeout())
    }
}

#[async_trait]
impl HttpSend for ReqwestSender {
    async fn send(&self, request: &ApiRequest) -> AuthResult<ApiResponse> {
        let url = self.base_url.join(&request.path)?;
        let mut builder = self.http_client.request(request.method.clone(), url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

/// Dispatches API requests with the session credential attached, recovering
/// from credential expiry transparently.
pub struct RequestGateway {
    session: Arc<SessionManager>,
    http: Arc<dyn HttpSend>,
}

impl RequestGateway {
    pub fn new(session: Arc<SessionManager>, http: Arc<dyn HttpSend>) -> Self {
        Self { session, http }
    }

    /// Send `request`, attaching the session credential when the caller did
    /// not set an `Authorization` header of their own.
    ///
    /// A 401 on a gateway-attached credential triggers one renewal and one
    /// retry; a second 401 tears the session down. A 403 is returned as
    /// [`AuthError::PermissionDenied`] without any retry. Every other
    /// status, success or not, passes through untouched.
    pub async fn dispatch(&self, mut request: ApiRequest) -> AuthResult<ApiResponse> {
        let request_id = Uuid::new_v4();

        // A caller-supplied Authorization header is theirs to manage; the
        // gateway neither overrides it nor refreshes on its behalf.
        let mut attached = false;
        if !request.has_header(AUTHORIZATION) {
            if let Some(token) = self.session.access_token()? {
                request.set_header(AUTHORIZATION, &format!("Bearer {}", token));
                attached = true;
            }
        }

        debug!(
            request_id = %request_id,
            method = %request.method,
            path = %request.path,
            attached,
            "Dispatching request"
        );

        let response = self.http.send(&request).await?;
        if response.status == 403 {
            warn!(request_id = %request_id, path = %request.path, "Request forbidden");
            return Err(AuthError::PermissionDenied(request.path.clone()));
        }
        if response.status != 401 || !attached {
            return Ok(response);
        }

        debug!(request_id = %request_id, "Credential rejected, renewing and retrying once");
        let renewed = self.session.refresh_credential().await?;
        request.set_header(AUTHORIZATION, &format!("Bearer {}", renewed.access_token));

        let response = self.http.send(&request).await?;
        if response.status == 401 {
            // A freshly renewed credential was rejected; the session is not
            // salvageable from here.
            warn!(request_id = %request_id, "Renewed credential rejected, ending session");
            self.session.logout(true).await?;
            return Err(AuthError::TokenExpired);
        }
        if response.status == 403 {
            return Err(AuthError::PermissionDenied(request.path.clone()));
        }
        Ok(response)
    }

    /// Dispatch and decode a JSON body, failing on non-success statuses.
    pub async fn dispatch_json<T: DeserializeOwned>(&self, request: ApiRequest) -> AuthResult<T> {
        let path = request.path.clone();
        let response = self.dispatch(request).await?;
        if !response.is_success() {
            return Err(AuthError::Authority {
                status: response.status,
                message: format!("{} returned {}", path, response.status),
            });
        }
        response.json()
    }
}
