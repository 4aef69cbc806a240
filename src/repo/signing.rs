//! Repository metadata signing
//!
//! Detached ed25519 signatures over the repository metadata document.
//! Key material arrives as a filesystem state; it must hold exactly one
//! signing identity (a base64-encoded 32-byte key in a `*.key` file) or
//! the stage fails. SHA-256 fingerprints identify the public key in the
//! emitted metadata.

use base64::Engine as _;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::error::{PacksmithError, Result};
use crate::tree::Tree;

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Import the single signing identity from a key-material tree
///
/// Exactly one `*.key` file must be present; zero or several identities
/// fail the signing stage.
pub fn import_signing_key(key_material: &Tree) -> Result<SigningKey> {
    let candidates: Vec<(&str, &[u8])> = key_material
        .files()
        .filter(|(path, _, _)| path.ends_with(".key"))
        .map(|(path, data, _)| (path, data))
        .collect();

    match candidates.as_slice() {
        [] => Err(PacksmithError::Signing {
            reason: "no signing identity found in key material".to_string(),
        }),
        [(path, data)] => decode_signing_key(data).map_err(|reason| PacksmithError::Signing {
            reason: format!("key '{path}': {reason}"),
        }),
        many => Err(PacksmithError::Signing {
            reason: format!(
                "expected exactly one signing identity, found {}: {}",
                many.len(),
                many.iter()
                    .map(|(path, _)| *path)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }),
    }
}

fn decode_signing_key(data: &[u8]) -> std::result::Result<SigningKey, String> {
    let text = std::str::from_utf8(data).map_err(|_| "key is not valid UTF-8".to_string())?;
    let bytes = B64
        .decode(text.trim())
        .map_err(|e| format!("invalid base64: {e}"))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| "key must decode to 32 bytes".to_string())?;
    Ok(SigningKey::from_bytes(&bytes))
}

/// Produce a base64 detached signature over the given bytes
pub fn sign_detached(key: &SigningKey, data: &[u8]) -> String {
    B64.encode(key.sign(data).to_bytes())
}

/// Verify a base64 detached signature
pub fn verify_detached(key: &VerifyingKey, data: &[u8], signature_b64: &str) -> Result<bool> {
    let bytes = B64
        .decode(signature_b64.trim())
        .map_err(|e| PacksmithError::Signing {
            reason: format!("invalid signature encoding: {e}"),
        })?;
    let signature = Signature::from_slice(&bytes).map_err(|e| PacksmithError::Signing {
        reason: format!("invalid signature: {e}"),
    })?;
    Ok(key.verify(data, &signature).is_ok())
}

/// SHA-256 fingerprint of a public key, hex-encoded
pub fn key_fingerprint(key: &VerifyingKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Encode a signing key the way key material stores it
pub fn encode_signing_key(key: &SigningKey) -> String {
    B64.encode(key.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn key_material(entries: &[(&str, &SigningKey)]) -> Tree {
        let mut tree = Tree::new();
        for (path, key) in entries {
            tree.insert_file(path, encode_signing_key(key).into_bytes(), 0o600)
                .unwrap();
        }
        tree
    }

    #[test]
    fn test_import_single_key() {
        let key = SigningKey::generate(&mut OsRng);
        let material = key_material(&[("repo.key", &key)]);
        let imported = import_signing_key(&material).unwrap();
        assert_eq!(imported.to_bytes(), key.to_bytes());
    }

    #[test]
    fn test_import_no_key_fails() {
        let err = import_signing_key(&Tree::new()).unwrap_err();
        assert!(matches!(err, PacksmithError::Signing { .. }));
    }

    #[test]
    fn test_import_two_keys_fails() {
        let k1 = SigningKey::generate(&mut OsRng);
        let k2 = SigningKey::generate(&mut OsRng);
        let material = key_material(&[("a.key", &k1), ("b.key", &k2)]);
        let err = import_signing_key(&material).unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn test_sign_and_verify() {
        let key = SigningKey::generate(&mut OsRng);
        let signature = sign_detached(&key, b"metadata");
        assert!(verify_detached(&key.verifying_key(), b"metadata", &signature).unwrap());
        assert!(!verify_detached(&key.verifying_key(), b"tampered", &signature).unwrap());
    }

    #[test]
    fn test_fingerprint_is_stable_sha256() {
        let key = SigningKey::generate(&mut OsRng);
        let fp = key_fingerprint(&key.verifying_key());
        assert_eq!(fp.len(), 64);
        assert_eq!(fp, key_fingerprint(&key.verifying_key()));
    }
}
