//! Routing record validation.
//!
//! Every value written to or merged into the routing store goes through a
//! [`RecordValidator`]. Keys are namespaced as `<namespace>/<namespace-key>`
//! (a single leading `/` is tolerated), and [`NamespacedValidator`]
//! dispatches on the namespace.

mod public_key;
mod sha256;

use std::collections::HashMap;

pub use public_key::{PublicKeyValidator, PUBLIC_KEY_NAMESPACE};
pub use sha256::{sha256_key, Sha256Validator, SHA256_NAMESPACE};

use crate::error::ValidationError;

/// Validates routing records and picks a winner among competing values.
///
/// Implementations must be pure: no I/O and no interior state.
pub trait RecordValidator: Send + Sync {
    /// Check that `value` may be stored under `key`.
    fn validate(&self, key: &str, value: &[u8]) -> Result<(), ValidationError>;

    /// Pick the value to keep among candidates seen for the same key.
    ///
    /// The choice depends only on the multiset of values, never on their order.
    fn select(&self, key: &str, values: &[Vec<u8>]) -> Result<usize, ValidationError>;
}

/// Split `key` into `(namespace, namespace_key)`.
pub fn split_key(key: &str) -> Result<(&str, &str), ValidationError> {
    let trimmed = key.strip_prefix('/').unwrap_or(key);
    trimmed
        .split_once('/')
        .ok_or_else(|| ValidationError::MalformedKey(key.to_string()))
}

/// Index of the first occurrence of the smallest valid value.
///
/// Used by validators whose valid values are interchangeable: ordering by the
/// bytes themselves gives every node the same winner for the same candidates.
pub(crate) fn select_smallest_valid<V>(
    validator: &V,
    key: &str,
    values: &[Vec<u8>],
) -> Result<usize, ValidationError>
where
    V: RecordValidator + ?Sized,
{
    if values.is_empty() {
        return Err(ValidationError::NoCandidates);
    }

    values
        .iter()
        .enumerate()
        .filter(|(_, value)| validator.validate(key, value).is_ok())
        .min_by(|(ia, a), (ib, b)| a.cmp(b).then(ia.cmp(ib)))
        .map(|(index, _)| index)
        .ok_or(ValidationError::NoValidCandidate)
}

/// Dispatches validation to a per-namespace validator.
#[derive(Default)]
pub struct NamespacedValidator {
    validators: HashMap<String, Box<dyn RecordValidator>>,
}

impl NamespacedValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The validator set used by overlay nodes: `sha256` and `pk`.
    pub fn overlay_default() -> Self {
        Self::new()
            .with_namespace(SHA256_NAMESPACE, Sha256Validator)
            .with_namespace(PUBLIC_KEY_NAMESPACE, PublicKeyValidator)
    }

    /// Register `validator` for `namespace`, replacing any previous one.
    pub fn with_namespace<V>(mut self, namespace: &str, validator: V) -> Self
    where
        V: RecordValidator + 'static,
    {
        self.validators.insert(namespace.to_string(), Box::new(validator));
        self
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.validators.keys().map(String::as_str)
    }

    fn validator_for(&self, key: &str) -> Result<&dyn RecordValidator, ValidationError> {
        let (namespace, _) = split_key(key)?;
        self.validators
            .get(namespace)
            .map(|validator| validator.as_ref())
            .ok_or_else(|| ValidationError::InvalidNamespace(namespace.to_string()))
    }
}

impl RecordValidator for NamespacedValidator {
    fn validate(&self, key: &str, value: &[u8]) -> Result<(), ValidationError> {
        self.validator_for(key)?.validate(key, value)
    }

    fn select(&self, key: &str, values: &[Vec<u8>]) -> Result<usize, ValidationError> {
        self.validator_for(key)?.select(key, values)
    }
}

impl std::fmt::Debug for NamespacedValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut namespaces: Vec<&str> = self.namespaces().collect();
        namespaces.sort_unstable();
        f.debug_struct("NamespacedValidator").field("namespaces", &namespaces).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_key_accepts_optional_leading_slash() {
        assert_eq!(split_key("sha256/abc").unwrap(), ("sha256", "abc"));
        assert_eq!(split_key("/sha256/abc").unwrap(), ("sha256", "abc"));
        assert_eq!(split_key("pk/a/b").unwrap(), ("pk", "a/b"));
    }

    #[test]
    fn split_key_rejects_keys_without_separator() {
        for key in ["", "sha256", "/sha256", "deadbeef"] {
            assert_eq!(split_key(key), Err(ValidationError::MalformedKey(key.to_string())));
        }
    }

    #[test]
    fn unknown_namespace_is_rejected() {
        let validator = NamespacedValidator::overlay_default();
        assert_eq!(
            validator.validate("ipns/whatever", b"value"),
            Err(ValidationError::InvalidNamespace("ipns".to_string()))
        );
    }

    #[test]
    fn malformed_key_wins_over_namespace_lookup() {
        let validator = NamespacedValidator::overlay_default();
        assert!(matches!(
            validator.validate("no-separator", b"value"),
            Err(ValidationError::MalformedKey(_))
        ));
    }

    #[test]
    fn dispatches_to_sha256() {
        let validator = NamespacedValidator::overlay_default();
        let value = b"Hello World!";
        assert!(validator.validate(&sha256_key(value), value).is_ok());
        assert!(matches!(
            validator.validate(&sha256_key(b"other"), value),
            Err(ValidationError::HashMismatch { .. })
        ));
    }

    #[test]
    fn debug_lists_namespaces() {
        let rendered = format!("{:?}", NamespacedValidator::overlay_default());
        assert!(rendered.contains("pk"));
        assert!(rendered.contains("sha256"));
    }
}
