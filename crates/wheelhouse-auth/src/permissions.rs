//! Fine-grained permission evaluation.
//!
//! Pure lookups over an immutable grant map. The map has total-function
//! semantics: a permission code that is absent denies every action, so
//! callers never special-case unknown codes.

use crate::{AuthError, AuthResult};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use wheelhouse_storage::PermissionGrant;

/// One of the five grantable actions on a permission code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionAction {
    View,
    Create,
    Edit,
    Delete,
    Approve,
}

impl PermissionAction {
    /// Every action, in grant-field order.
    pub const ALL: [PermissionAction; 5] = [
        PermissionAction::View,
        PermissionAction::Create,
        PermissionAction::Edit,
        PermissionAction::Delete,
        PermissionAction::Approve,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionAction::View => "view",
            PermissionAction::Create => "create",
            PermissionAction::Edit => "edit",
            PermissionAction::Delete => "delete",
            PermissionAction::Approve => "approve",
        }
    }
}

impl FromStr for PermissionAction {
    type Err = AuthError;

    /// Parse an action name from a consumer-supplied string.
    ///
    /// An unrecognized action is a programming error in the caller and is
    /// reported as such, never silently mapped to a denial.
    fn from_str(s: &str) -> AuthResult<Self> {
        match s {
            "view" => Ok(PermissionAction::View),
            "create" => Ok(PermissionAction::Create),
            "edit" => Ok(PermissionAction::Edit),
            "delete" => Ok(PermissionAction::Delete),
            "approve" => Ok(PermissionAction::Approve),
            other => Err(AuthError::UnknownAction(other.to_string())),
        }
    }
}

/// Immutable set of permission grants keyed by permission code.
///
/// Replaced wholesale whenever the server returns a fresher set; never
/// incrementally patched. Cloning is cheap (shared map).
#[derive(Debug, Clone, Default)]
pub struct PermissionSet {
    grants: Arc<HashMap<String, PermissionGrant>>,
}

impl PermissionSet {
    /// Build a set from a grant map.
    pub fn from_map(grants: HashMap<String, PermissionGrant>) -> Self {
        Self {
            grants: Arc::new(grants),
        }
    }

    /// The empty set: denies everything.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether `action` is granted on `code`. Absent codes deny every action.
    pub fn allows(&self, code: &str, action: PermissionAction) -> bool {
        match self.grants.get(code) {
            Some(grant) => match action {
                PermissionAction::View => grant.can_view,
                PermissionAction::Create => grant.can_create,
                PermissionAction::Edit => grant.can_edit,
                PermissionAction::Delete => grant.can_delete,
                PermissionAction::Approve => grant.can_approve,
            },
            None => false,
        }
    }

    /// Whether `action` is granted on at least one of `codes`.
    pub fn allows_any<I, S>(&self, codes: I, action: PermissionAction) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        codes
            .into_iter()
            .any(|code| self.allows(code.as_ref(), action))
    }

    /// Whether `action` is granted on every one of `codes`.
    pub fn allows_all<I, S>(&self, codes: I, action: PermissionAction) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        codes
            .into_iter()
            .all(|code| self.allows(code.as_ref(), action))
    }

    /// The underlying grant map.
    pub fn as_map(&self) -> &HashMap<String, PermissionGrant> {
        &self.grants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> PermissionSet {
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
        grants.insert(
            "journal".to_string(),
            PermissionGrant {
                can_view: true,
                can_approve: true,
                ..Default::default()
            },
        );
        PermissionSet::from_map(grants)
    }

    #[test]
    fn test_absent_code_denies_every_action() {
        let set = sample_set();
        for action in PermissionAction::ALL {
            assert!(
                !set.allows("no_such_code", action),
                "absent code must deny {action:?}"
            );
        }
    }

    #[test]
    fn test_granted_actions() {
        let set = sample_set();
        assert!(set.allows("vehicles", PermissionAction::View));
        assert!(set.allows("vehicles", PermissionAction::Edit));
        assert!(!set.allows("vehicles", PermissionAction::Delete));
        assert!(set.allows("journal", PermissionAction::Approve));
        assert!(!set.allows("journal", PermissionAction::Create));
    }

    #[test]
    fn test_empty_set_denies_everything() {
        let set = PermissionSet::empty();
        assert!(!set.allows("vehicles", PermissionAction::View));
    }

    #[test]
    fn test_allows_any() {
        let set = sample_set();
        assert!(set.allows_any(["wheels", "vehicles"], PermissionAction::View));
        assert!(!set.allows_any(["wheels", "tires"], PermissionAction::View));
    }

    #[test]
    fn test_allows_all() {
        let set = sample_set();
        assert!(set.allows_all(["vehicles", "journal"], PermissionAction::View));
        assert!(!set.allows_all(["vehicles", "journal"], PermissionAction::Edit));
        // Vacuously true on an empty code list.
        assert!(set.allows_all(Vec::<&str>::new(), PermissionAction::Delete));
    }

    #[test]
    fn test_action_parse_roundtrip() {
        for action in PermissionAction::ALL {
            assert_eq!(action.as_str().parse::<PermissionAction>().unwrap(), action);
        }
    }

    #[test]
    fn test_unknown_action_is_an_error_not_a_denial() {
        let err = "destroy".parse::<PermissionAction>().unwrap_err();
        assert!(matches!(err, AuthError::UnknownAction(name) if name == "destroy"));
    }
}
