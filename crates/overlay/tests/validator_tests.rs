//! Record validator properties over randomized inputs

use libp2p::identity::Keypair;
use overlay::{
    validator::{sha256_key, PublicKeyValidator, Sha256Validator},
    NamespacedValidator, RecordValidator, ValidationError,
};
use rand::{seq::SliceRandom, Rng};

fn random_values(count: usize) -> Vec<Vec<u8>> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let len = rng.gen_range(0..256);
            (0..len).map(|_| rng.gen()).collect()
        })
        .collect()
}

#[test]
fn test_content_addressed_values_always_validate() {
    let validator = NamespacedValidator::overlay_default();
    for value in random_values(200) {
        let key = sha256_key(&value);
        assert_eq!(validator.validate(&key, &value), Ok(()));
        assert_eq!(validator.validate(&format!("/{key}"), &value), Ok(()));
    }
}

#[test]
fn test_other_keys_never_validate() {
    let values = random_values(50);
    for (i, value) in values.iter().enumerate() {
        for (j, other) in values.iter().enumerate() {
            if i == j || value == other {
                continue;
            }
            let err = Sha256Validator.validate(&sha256_key(other), value).unwrap_err();
            assert!(matches!(err, ValidationError::HashMismatch { .. }));
        }
    }
}

#[test]
fn test_select_ignores_arrival_order() {
    let validator = NamespacedValidator::overlay_default();
    let good = b"the value".to_vec();
    let key = sha256_key(&good);
    let mut candidates = random_values(8);
    candidates.push(good.clone());
    candidates.push(good.clone());

    let mut rng = rand::thread_rng();
    for _ in 0..50 {
        candidates.shuffle(&mut rng);
        let index = validator.select(&key, &candidates).unwrap();
        assert_eq!(candidates[index], good);
        let first = candidates.iter().position(|c| *c == good).unwrap();
        assert_eq!(index, first);
    }
}

#[test]
fn test_select_identical_candidates_picks_first() {
    let value = b"v".to_vec();
    let key = sha256_key(&value);
    let candidates = vec![value; 5];
    assert_eq!(Sha256Validator.select(&key, &candidates), Ok(0));
}

#[test]
fn test_public_key_records_round_trip_through_namespaced_validator() {
    let validator = NamespacedValidator::overlay_default();
    for _ in 0..10 {
        let keypair = Keypair::generate_ed25519();
        let key = PublicKeyValidator::key_for(&keypair.public().to_peer_id());
        let value = keypair.public().encode_protobuf();

        assert_eq!(validator.validate(&key, &value), Ok(()));
        let junk = b"junk".to_vec();
        assert_eq!(validator.select(&key, &[junk, value]), Ok(1));
    }
}
