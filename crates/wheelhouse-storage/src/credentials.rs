//! High-level API for the session snapshot.
//!
//! The [`CredentialStore`] owns both durability tiers and is the only code
//! that decides which tier a read or write touches. Reads consult the
//! durable tier first, then the ephemeral one; that order is a contract,
//! because after a restart a previously remembered session must win over any
//! stale ephemeral leftovers. The write path always clears the tier it did
//! not write, so the two tiers never hold conflicting sessions.

use crate::{
    Credential, Durability, FileStore, KeyValueStore, MemoryStore, PermissionGrant, SessionUser,
    StorageError, StorageKeys, StorageResult,
};
use std::collections::HashMap;
use tracing::warn;

/// Tiered persistence for the session snapshot.
pub struct CredentialStore {
    durable: Box<dyn KeyValueStore>,
    ephemeral: Box<dyn KeyValueStore>,
}

impl CredentialStore {
    /// Create a store over explicit tier backends.
    pub fn new(durable: Box<dyn KeyValueStore>, ephemeral: Box<dyn KeyValueStore>) -> Self {
        Self { durable, ephemeral }
    }

    /// Create the default store: file-backed durable tier under the client
    /// data directory, in-memory ephemeral tier.
    pub fn open(paths: &wheelhouse_core::Paths) -> Self {
        Self::new(
            Box::new(FileStore::open(paths.session_file())),
            Box::new(MemoryStore::new()),
        )
    }

    fn tier(&self, durability: Durability) -> &dyn KeyValueStore {
        match durability {
            Durability::Persistent => self.durable.as_ref(),
            Durability::Ephemeral => self.ephemeral.as_ref(),
        }
    }

    /// Which tier currently holds a session, durable tier first.
    fn active_durability(&self) -> StorageResult<Option<Durability>> {
        if self.durable.has(StorageKeys::AUTH_TOKEN)? {
            return Ok(Some(Durability::Persistent));
        }
        if self.ephemeral.has(StorageKeys::AUTH_TOKEN)? {
            return Ok(Some(Durability::Ephemeral));
        }
        Ok(None)
    }

    fn clear_tier(&self, durability: Durability) -> StorageResult<()> {
        let tier = self.tier(durability);
        for key in StorageKeys::SESSION_KEYS {
            let _ = tier.delete(key);
        }
        Ok(())
    }

    /// Store a complete session snapshot in the credential's tier and clear
    /// the other tier.
    pub fn store_session(
        &self,
        credential: &Credential,
        user: &SessionUser,
        grants: &HashMap<String, PermissionGrant>,
    ) -> StorageResult<()> {
        let tier = self.tier(credential.durability);

        tier.set(StorageKeys::AUTH_TOKEN, &credential.access_token)?;
        match &credential.refresh_token {
            Some(refresh) => tier.set(StorageKeys::REFRESH_TOKEN, refresh)?,
            None => {
                let _ = tier.delete(StorageKeys::REFRESH_TOKEN);
            }
        }
        tier.set(StorageKeys::USER_INFO, &encode(user)?)?;
        tier.set(StorageKeys::USER_PERMISSIONS, &encode(grants)?)?;
        if credential.durability == Durability::Persistent {
            tier.set(StorageKeys::REMEMBER_ME, "true")?;
        }

        self.clear_tier(other(credential.durability))
    }

    /// Replace the stored credential, keeping the rest of the snapshot.
    ///
    /// Writes the credential's own tier and clears the other, like every
    /// write-path operation.
    pub fn set_credential(&self, credential: &Credential) -> StorageResult<()> {
        let tier = self.tier(credential.durability);
        tier.set(StorageKeys::AUTH_TOKEN, &credential.access_token)?;
        match &credential.refresh_token {
            Some(refresh) => tier.set(StorageKeys::REFRESH_TOKEN, refresh)?,
            None => {
                let _ = tier.delete(StorageKeys::REFRESH_TOKEN);
            }
        }
        self.clear_tier(other(credential.durability))
    }

    /// Read the active credential, if any.
    pub fn credential(&self) -> StorageResult<Option<Credential>> {
        let durability = match self.active_durability()? {
            Some(d) => d,
            None => return Ok(None),
        };
        let tier = self.tier(durability);

        let access_token = match tier.get(StorageKeys::AUTH_TOKEN)? {
            Some(token) => token,
            None => return Ok(None),
        };
        let refresh_token = tier.get(StorageKeys::REFRESH_TOKEN)?;

        Ok(Some(Credential {
            access_token,
            refresh_token,
            durability,
        }))
    }

    /// Read the stored identity snapshot.
    ///
    /// Malformed JSON reads as `None` rather than an error, so a corrupt
    /// snapshot degrades to "not logged in" instead of a crash loop.
    pub fn user(&self) -> StorageResult<Option<SessionUser>> {
        self.read_json(StorageKeys::USER_INFO)
    }

    /// Read the stored permission grants. Malformed JSON reads as `None`.
    pub fn permissions(&self) -> StorageResult<Option<HashMap<String, PermissionGrant>>> {
        self.read_json(StorageKeys::USER_PERMISSIONS)
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let durability = match self.active_durability()? {
            Some(d) => d,
            None => return Ok(None),
        };
        match self.tier(durability).get(key)? {
            Some(json) => match serde_json::from_str(&json) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    warn!(key, error = %e, "Stored session snapshot is malformed, treating as absent");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Replace the identity snapshot in the active tier.
    pub fn replace_user(&self, user: &SessionUser) -> StorageResult<()> {
        if let Some(durability) = self.active_durability()? {
            self.tier(durability).set(StorageKeys::USER_INFO, &encode(user)?)?;
        }
        Ok(())
    }

    /// Replace the permission grants in the active tier.
    pub fn replace_permissions(
        &self,
        grants: &HashMap<String, PermissionGrant>,
    ) -> StorageResult<()> {
        if let Some(durability) = self.active_durability()? {
            self.tier(durability)
                .set(StorageKeys::USER_PERMISSIONS, &encode(grants)?)?;
        }
        Ok(())
    }

    /// Whether this session was created with "remember me".
    pub fn remember_me(&self) -> StorageResult<bool> {
        Ok(self.durable.get(StorageKeys::REMEMBER_ME)?.as_deref() == Some("true"))
    }

    /// Whether any tier currently holds a session.
    pub fn has_session(&self) -> StorageResult<bool> {
        Ok(self.active_durability()?.is_some())
    }

    /// Clear both tiers unconditionally. Idempotent.
    pub fn clear(&self) -> StorageResult<()> {
        self.clear_tier(Durability::Persistent)?;
        self.clear_tier(Durability::Ephemeral)?;
        Ok(())
    }

    /// Direct access to a tier's raw backend. Test-only.
    #[cfg(test)]
    pub(crate) fn raw_tier(&self, durability: Durability) -> &dyn KeyValueStore {
        self.tier(durability)
    }
}

fn other(durability: Durability) -> Durability {
    match durability {
        Durability::Persistent => Durability::Ephemeral,
        Durability::Ephemeral => Durability::Persistent,
    }
}

fn encode<T: serde::Serialize>(value: &T) -> StorageResult<String> {
    serde_json::to_string(value).map_err(|e| StorageError::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> CredentialStore {
        CredentialStore::new(Box::new(MemoryStore::new()), Box::new(MemoryStore::new()))
    }

    fn test_user() -> SessionUser {
        SessionUser {
            id: 12,
            username: "jdoe".to_string(),
            email: "jdoe@example.com".to_string(),
            display_name: "Jane Doe".to_string(),
            role_name: "Mechanic".to_string(),
            role_id: 3,
            department: Some("Service".to_string()),
            last_login: Some("2026-08-01T09:15:00Z".to_string()),
        }
    }

    fn test_grants() -> HashMap<String, PermissionGrant> {
        let mut grants = HashMap::new();
        grants.insert(
            "vehicles".to_string(),
            PermissionGrant {
                can_view: true,
                can_edit: true,
                ..Default::default()
            },
        );
        grants
    }

    fn persistent_credential() -> Credential {
        Credential {
            access_token: "tok-persistent".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            durability: Durability::Persistent,
        }
    }

    fn ephemeral_credential() -> Credential {
        Credential {
            access_token: "tok-ephemeral".to_string(),
            refresh_token: Some("refresh-2".to_string()),
            durability: Durability::Ephemeral,
        }
    }

    #[test]
    fn test_store_session_roundtrip() {
        let store = test_store();
        store
            .store_session(&persistent_credential(), &test_user(), &test_grants())
            .unwrap();

        let credential = store.credential().unwrap().unwrap();
        assert_eq!(credential, persistent_credential());
        assert_eq!(store.user().unwrap().unwrap(), test_user());
        assert_eq!(store.permissions().unwrap().unwrap(), test_grants());
        assert!(store.remember_me().unwrap());
    }

    #[test]
    fn test_ephemeral_session_leaves_durable_tier_empty() {
        let store = test_store();
        store
            .store_session(&ephemeral_credential(), &test_user(), &test_grants())
            .unwrap();

        for key in StorageKeys::SESSION_KEYS {
            assert_eq!(
                store.raw_tier(Durability::Persistent).get(key).unwrap(),
                None,
                "durable tier should not hold {key}"
            );
        }
        assert!(!store.remember_me().unwrap());
        assert_eq!(store.credential().unwrap().unwrap(), ephemeral_credential());
    }

    #[test]
    fn test_write_clears_the_other_tier() {
        let store = test_store();
        store
            .store_session(&ephemeral_credential(), &test_user(), &test_grants())
            .unwrap();
        store
            .store_session(&persistent_credential(), &test_user(), &test_grants())
            .unwrap();

        assert_eq!(
            store.raw_tier(Durability::Ephemeral)
                .get(StorageKeys::AUTH_TOKEN)
                .unwrap(),
            None
        );
        assert_eq!(
            store.credential().unwrap().unwrap().access_token,
            "tok-persistent"
        );
    }

    #[test]
    fn test_durable_tier_wins_on_read() {
        let store = test_store();
        // Simulate a stale ephemeral leftover under a remembered session.
        store
            .raw_tier(Durability::Ephemeral)
            .set(StorageKeys::AUTH_TOKEN, "stale")
            .unwrap();
        store
            .raw_tier(Durability::Persistent)
            .set(StorageKeys::AUTH_TOKEN, "remembered")
            .unwrap();

        let credential = store.credential().unwrap().unwrap();
        assert_eq!(credential.access_token, "remembered");
        assert_eq!(credential.durability, Durability::Persistent);
    }

    #[test]
    fn test_clear_empties_both_tiers() {
        let store = test_store();
        store
            .raw_tier(Durability::Persistent)
            .set(StorageKeys::AUTH_TOKEN, "a")
            .unwrap();
        store
            .raw_tier(Durability::Ephemeral)
            .set(StorageKeys::AUTH_TOKEN, "b")
            .unwrap();

        store.clear().unwrap();
        assert!(!store.has_session().unwrap());

        // Idempotent.
        store.clear().unwrap();
        assert!(!store.has_session().unwrap());
    }

    #[test]
    fn test_malformed_user_json_reads_as_none() {
        let store = test_store();
        store
            .store_session(&ephemeral_credential(), &test_user(), &test_grants())
            .unwrap();
        store
            .raw_tier(Durability::Ephemeral)
            .set(StorageKeys::USER_INFO, "{broken")
            .unwrap();

        assert!(store.user().unwrap().is_none());
        // The credential itself is still readable.
        assert!(store.credential().unwrap().is_some());
    }

    #[test]
    fn test_replace_permissions_touches_active_tier_only() {
        let store = test_store();
        store
            .store_session(&persistent_credential(), &test_user(), &test_grants())
            .unwrap();

        let mut fresh = HashMap::new();
        fresh.insert(
            "journal".to_string(),
            PermissionGrant {
                can_view: true,
                can_approve: true,
                ..Default::default()
            },
        );
        store.replace_permissions(&fresh).unwrap();

        assert_eq!(store.permissions().unwrap().unwrap(), fresh);
        assert_eq!(store.user().unwrap().unwrap(), test_user());
        assert_eq!(
            store.credential().unwrap().unwrap().access_token,
            "tok-persistent"
        );
    }

    #[test]
    fn test_set_credential_keeps_snapshot() {
        let store = test_store();
        store
            .store_session(&persistent_credential(), &test_user(), &test_grants())
            .unwrap();

        let renewed = Credential {
            access_token: "tok-renewed".to_string(),
            refresh_token: Some("refresh-rotated".to_string()),
            durability: Durability::Persistent,
        };
        store.set_credential(&renewed).unwrap();

        assert_eq!(store.credential().unwrap().unwrap(), renewed);
        assert_eq!(store.user().unwrap().unwrap(), test_user());
        assert_eq!(store.permissions().unwrap().unwrap(), test_grants());
    }
}
