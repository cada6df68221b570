//! Storage key constants.

/// Storage keys used by the credential store.
///
/// The same key names are used in both durability tiers; which tier holds
/// them depends on how the session was created.
pub struct StorageKeys;

impl StorageKeys {
    /// Access token (string)
    pub const AUTH_TOKEN: &'static str = "auth_token";

    /// Identity snapshot (JSON SessionUser)
    pub const USER_INFO: &'static str = "user_info";

    /// Permission grants (JSON map keyed by permission code)
    pub const USER_PERMISSIONS: &'static str = "user_permissions";

    /// Refresh token (string)
    pub const REFRESH_TOKEN: &'static str = "refresh_token";

    /// Remember-me flag ("true"/"false", durable tier only)
    pub const REMEMBER_ME: &'static str = "remember_me";

    /// Every key that makes up a session snapshot.
    ///
    /// `clear` walks this list in both tiers, so callers never need to know
    /// which tier held the active session.
    pub const SESSION_KEYS: [&'static str; 5] = [
        Self::AUTH_TOKEN,
        Self::USER_INFO,
        Self::USER_PERMISSIONS,
        Self::REFRESH_TOKEN,
        Self::REMEMBER_ME,
    ];
}
