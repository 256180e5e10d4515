//! Public key records: `pk/<peer id>` maps to the protobuf-encoded key.

use libp2p::{identity::PublicKey, PeerId};

use super::{select_smallest_valid, split_key, RecordValidator};
use crate::error::ValidationError;

pub const PUBLIC_KEY_NAMESPACE: &str = "pk";

/// Accepts a record only if the value is the public key the peer ID in the
/// key was derived from.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicKeyValidator;

impl PublicKeyValidator {
    /// Routing key under which `peer_id`'s public key is published.
    pub fn key_for(peer_id: &PeerId) -> String {
        format!("{PUBLIC_KEY_NAMESPACE}/{peer_id}")
    }
}

impl RecordValidator for PublicKeyValidator {
    fn validate(&self, key: &str, value: &[u8]) -> Result<(), ValidationError> {
        let (namespace, expected) = split_key(key)?;
        if namespace != PUBLIC_KEY_NAMESPACE {
            return Err(ValidationError::InvalidNamespace(namespace.to_string()));
        }

        let public_key = PublicKey::try_decode_protobuf(value)
            .map_err(|e| ValidationError::InvalidPublicKey(e.to_string()))?;
        let actual = public_key.to_peer_id().to_base58();

        if actual != expected {
            return Err(ValidationError::KeyMismatch { expected: expected.to_string(), actual });
        }
        Ok(())
    }

    fn select(&self, key: &str, values: &[Vec<u8>]) -> Result<usize, ValidationError> {
        select_smallest_valid(self, key, values)
    }
}
