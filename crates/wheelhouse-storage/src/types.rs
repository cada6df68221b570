//! Persisted session types.
//!
//! These are the snapshots the credential store reads and writes. They are
//! replaced wholesale on login/validate/refresh, never partially mutated.

use serde::{Deserialize, Serialize};

/// Durability tier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// Cleared at process end.
    Ephemeral,
    /// Survives process restarts.
    Persistent,
}

/// Access credential plus the refresh credential used to renew it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Short-lived token authorizing API calls.
    pub access_token: String,
    /// Longer-lived token used solely to mint a new access token.
    pub refresh_token: Option<String>,
    /// Which tier holds this session.
    pub durability: Durability,
}

/// Identity snapshot returned by the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub role_name: String,
    pub role_id: i64,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<String>,
}

/// Per-code permission grant.
///
/// A code absent from the grant map denies every action; this type only
/// exists for codes the server explicitly granted something on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub can_view: bool,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_approve: bool,
}
