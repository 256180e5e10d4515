//! Content-addressed records: the key is the hex sha256 of the value.

use sha2::{Digest, Sha256};

use super::{select_smallest_valid, split_key, RecordValidator};
use crate::error::ValidationError;

pub const SHA256_NAMESPACE: &str = "sha256";

/// Build the routing key under which `value` is content-addressed.
pub fn sha256_key(value: &[u8]) -> String {
    format!("{SHA256_NAMESPACE}/{}", hex::encode(Sha256::digest(value)))
}

/// Accepts a record only if its key is `sha256/<lowercase hex sha256(value)>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Validator;

impl RecordValidator for Sha256Validator {
    fn validate(&self, key: &str, value: &[u8]) -> Result<(), ValidationError> {
        let (namespace, expected) = split_key(key)?;
        if namespace != SHA256_NAMESPACE {
            return Err(ValidationError::InvalidNamespace(namespace.to_string()));
        }

        let actual = hex::encode(Sha256::digest(value));
        if expected != actual {
            return Err(ValidationError::HashMismatch { expected: expected.to_string(), actual });
        }
        Ok(())
    }

    // Valid values for one key are byte-identical, so any stable rule works.
    fn select(&self, key: &str, values: &[Vec<u8>]) -> Result<usize, ValidationError> {
        select_smallest_valid(self, key, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_hash() {
        for value in [&b""[..], b"Hello World!", &[0u8; 1024][..], &[0xff, 0x00, 0x7f][..]] {
            assert_eq!(Sha256Validator.validate(&sha256_key(value), value), Ok(()));
        }
    }

    #[test]
    fn known_vector() {
        let key = sha256_key(b"Hello World!");
        assert_eq!(
            key,
            "sha256/7f83b1657ff1fc53b92dc18148a1d65dfc2d4b1fa3d677284addd200126d9069"
        );
    }

    #[test]
    fn rejects_other_keys_with_hash_mismatch() {
        let value = b"Hello World!";
        let good = hex::encode(Sha256::digest(value));
        let bad_keys = [
            String::new(),
            "00".repeat(32),
            good.to_uppercase(),
            good[..63].to_string(),
            format!("{good}0"),
        ];

        for bad in bad_keys {
            let err = Sha256Validator.validate(&format!("sha256/{bad}"), value).unwrap_err();
            assert!(matches!(err, ValidationError::HashMismatch { .. }), "{bad}: {err:?}");
        }
    }

    #[test]
    fn rejects_foreign_namespace() {
        let value = b"v";
        let hash = hex::encode(Sha256::digest(value));
        assert_eq!(
            Sha256Validator.validate(&format!("pk/{hash}"), value),
            Err(ValidationError::InvalidNamespace("pk".to_string()))
        );
    }

    #[test]
    fn rejects_key_without_separator_as_malformed() {
        let err = Sha256Validator.validate("sha256", b"v").unwrap_err();
        assert!(matches!(err, ValidationError::MalformedKey(_)));
    }

    #[test]
    fn select_is_order_independent() {
        let a = b"same".to_vec();
        let key = sha256_key(&a);
        let first = Sha256Validator.select(&key, &[a.clone(), a.clone(), a.clone()]).unwrap();
        assert_eq!(first, 0);

        let junk = b"junk".to_vec();
        let forward = [junk.clone(), a.clone()];
        let backward = [a.clone(), junk];
        assert_eq!(forward[Sha256Validator.select(&key, &forward).unwrap()], a);
        assert_eq!(backward[Sha256Validator.select(&key, &backward).unwrap()], a);
    }

    #[test]
    fn select_without_candidates_fails() {
        let key = sha256_key(b"x");
        assert_eq!(Sha256Validator.select(&key, &[]), Err(ValidationError::NoCandidates));
        assert_eq!(
            Sha256Validator.select(&key, &[b"y".to_vec()]),
            Err(ValidationError::NoValidCandidate)
        );
    }
}
