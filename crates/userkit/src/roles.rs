//! Conversion between role-name sets and the API's role references.

use crate::error::{Error, Result};
use airflow::RoleRef;
use std::collections::BTreeSet;

/// Encode role names as references. An empty set encodes to `None`.
#[must_use]
pub fn encode(roles: &BTreeSet<String>) -> Option<Vec<RoleRef>> {
    if roles.is_empty() {
        return None;
    }
    Some(roles.iter().map(RoleRef::named).collect())
}

/// Decode references back to role names.
///
/// The API always names its role references, so an unnamed one is reported
/// as [`Error::MalformedRole`] rather than skipped.
pub fn decode(email: &str, refs: &[RoleRef]) -> Result<BTreeSet<String>> {
    refs.iter()
        .map(|role| {
            role.name.clone().ok_or_else(|| Error::MalformedRole {
                email: email.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_encode_empty_is_absent() {
        assert_eq!(encode(&BTreeSet::new()), None);
    }

    #[test]
    fn test_encode_carries_names_only() {
        let refs = encode(&set(&["Viewer", "Admin"])).unwrap();
        assert_eq!(refs, vec![RoleRef::named("Admin"), RoleRef::named("Viewer")]);
    }

    #[test]
    fn test_round_trip() {
        let roles = set(&["Admin", "Op", "User", "Viewer"]);
        let refs = encode(&roles).unwrap();
        assert_eq!(decode("a@x.com", &refs).unwrap(), roles);
    }

    #[test]
    fn test_decode_is_order_independent() {
        let refs = vec![RoleRef::named("Viewer"), RoleRef::named("Admin")];
        assert_eq!(decode("a@x.com", &refs).unwrap(), set(&["Admin", "Viewer"]));
    }

    #[test]
    fn test_decode_collapses_duplicates() {
        let refs = vec![RoleRef::named("Op"), RoleRef::named("Op")];
        assert_eq!(decode("a@x.com", &refs).unwrap(), set(&["Op"]));
    }

    #[test]
    fn test_decode_unnamed_reference_fails() {
        let refs = vec![RoleRef::named("Admin"), RoleRef::default()];
        let err = decode("a@x.com", &refs).unwrap_err();
        assert!(matches!(err, Error::MalformedRole { ref email } if email == "a@x.com"));
    }
}
