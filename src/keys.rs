//! Public key material and the key-type to verification-relationship authorization rules.
//!
//! A key extracted from a certificate is carried as a simplified JWK. The key type implied by
//! its `kty`/`crv` parameters determines which verification relationships the key is
//! cryptographically permitted to serve. The rules are a pure lookup with no side effects.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};

use crate::{error::Err, tracerr, Result};

/// Simplified JSON Web Key (JWK) key structure.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Jwk {
    /// Key type.
    pub kty: String,
    /// Cryptographic curve type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// X coordinate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// Y coordinate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    /// RSA modulus.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA exponent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

/// Verification relationship (purpose) a verification method may serve.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyPurpose {
    #[default]
    /// The authentication verification relationship is used to specify how the DID subject is
    /// expected to be authenticated, for purposes such as logging into a website or engaging
    /// in any sort of challenge-response protocol.
    Authentication,
    /// The assertionMethod verification relationship is used to specify how the DID subject is
    /// expected to express claims, such as for the purposes of issuing a Verifiable Credential.
    AssertionMethod,
    /// The keyAgreement verification relationship is used to specify how an entity can generate
    /// encryption material in order to transmit confidential information intended for the DID
    /// subject.
    KeyAgreement,
    /// The capabilityInvocation verification relationship is used to specify a verification
    /// method that might be used by the DID subject to invoke a cryptographic capability, such
    /// as the authorization to update the DID Document.
    CapabilityInvocation,
    /// The capabilityDelegation verification relationship is used to specify a mechanism that
    /// might be used by the DID subject to delegate a cryptographic capability to another
    /// party.
    CapabilityDelegation,
}

impl KeyPurpose {
    /// All verification relationships, in document order.
    pub const ALL: [KeyPurpose; 5] = [
        KeyPurpose::Authentication,
        KeyPurpose::AssertionMethod,
        KeyPurpose::KeyAgreement,
        KeyPurpose::CapabilityInvocation,
        KeyPurpose::CapabilityDelegation,
    ];
}

impl std::fmt::Display for KeyPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyPurpose::Authentication => write!(f, "authentication"),
            KeyPurpose::AssertionMethod => write!(f, "assertionMethod"),
            KeyPurpose::KeyAgreement => write!(f, "keyAgreement"),
            KeyPurpose::CapabilityInvocation => write!(f, "capabilityInvocation"),
            KeyPurpose::CapabilityDelegation => write!(f, "capabilityDelegation"),
        }
    }
}

/// Key types recognized by the purpose authorization rules.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyType {
    /// Edwards curve digital signature key.
    Ed25519,
    /// Montgomery curve key agreement key.
    X25519,
    /// NIST P-256 elliptic curve key.
    P256,
    /// NIST P-384 elliptic curve key.
    P384,
    /// NIST P-521 elliptic curve key.
    P521,
    /// RSA key.
    Rsa,
}

impl KeyType {
    /// The set of verification relationships a key of this type is permitted to serve.
    #[must_use]
    pub const fn allowed_purposes(&self) -> &'static [KeyPurpose] {
        match self {
            KeyType::Ed25519 => &[
                KeyPurpose::Authentication,
                KeyPurpose::AssertionMethod,
                KeyPurpose::CapabilityInvocation,
                KeyPurpose::CapabilityDelegation,
            ],
            KeyType::X25519 => &[KeyPurpose::KeyAgreement],
            KeyType::P256 | KeyType::P384 | KeyType::P521 => &[
                KeyPurpose::Authentication,
                KeyPurpose::AssertionMethod,
                KeyPurpose::KeyAgreement,
                KeyPurpose::CapabilityInvocation,
                KeyPurpose::CapabilityDelegation,
            ],
            KeyType::Rsa => &[
                KeyPurpose::Authentication,
                KeyPurpose::AssertionMethod,
                KeyPurpose::CapabilityInvocation,
            ],
        }
    }

    /// Check whether this key type permits the given verification relationship.
    #[must_use]
    pub fn permits(&self, purpose: KeyPurpose) -> bool {
        self.allowed_purposes().contains(&purpose)
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyType::Ed25519 => write!(f, "ED25519"),
            KeyType::X25519 => write!(f, "X25519"),
            KeyType::P256 => write!(f, "P-256"),
            KeyType::P384 => write!(f, "P-384"),
            KeyType::P521 => write!(f, "P-521"),
            KeyType::Rsa => write!(f, "RSA"),
        }
    }
}

impl Jwk {
    /// Attempt to match the public key parameters to one of the recognized key types.
    ///
    /// # Returns
    ///
    /// The key type implied by the key structure, or `None` for an unrecognized `kty`/`crv`
    /// combination. Unrecognized keys are not rejected: no purpose filtering applies to them
    /// and the registrar remains the final authority on whether they are usable.
    #[must_use]
    pub fn key_type(&self) -> Option<KeyType> {
        match (self.kty.as_str(), self.crv.as_deref()) {
            ("RSA", _) => Some(KeyType::Rsa),
            ("OKP", Some("Ed25519")) => Some(KeyType::Ed25519),
            ("OKP", Some("X25519")) => Some(KeyType::X25519),
            ("EC", Some("P-256")) => Some(KeyType::P256),
            ("EC", Some("P-384")) => Some(KeyType::P384),
            ("EC", Some("P-521")) => Some(KeyType::P521),
            _ => None,
        }
    }

    /// Intersect a set of selected purposes with the purposes this key is permitted to serve.
    ///
    /// Selection order is preserved. For an unrecognized key type the selection passes through
    /// unfiltered.
    #[must_use]
    pub fn filter_purposes(&self, selected: &[KeyPurpose]) -> Vec<KeyPurpose> {
        match self.key_type() {
            Some(kt) => selected.iter().copied().filter(|p| kt.permits(*p)).collect(),
            None => selected.to_vec(),
        }
    }

    /// Check that the structure of the public key is plausible for its implied key type.
    ///
    /// This is a shape check on the base64url-encoded parameters, not a cryptographic
    /// validation - that is the registrar's job.
    ///
    /// # Errors
    ///
    /// * `Err::InvalidKey` - A required parameter is missing or not base64url-encoded.
    pub fn check(&self) -> Result<()> {
        let Some(kt) = self.key_type() else {
            // Unrecognized key types are passed through unchecked.
            return Ok(());
        };
        match kt {
            KeyType::Rsa => {
                for (label, param) in [("n", &self.n), ("e", &self.e)] {
                    let value = param.clone().unwrap_or_default();
                    if value.is_empty() {
                        tracerr!(Err::InvalidKey, "Missing {} parameter", label);
                    }
                    if let Err(e) = Base64UrlUnpadded::decode_vec(&value) {
                        tracerr!(Err::InvalidKey, "Invalid {} parameter encoding: {}", label, e);
                    }
                }
            }
            KeyType::Ed25519 | KeyType::X25519 => {
                let x = self.x.clone().unwrap_or_default();
                if x.is_empty() {
                    tracerr!(Err::InvalidKey, "Missing x coordinate");
                }
                match Base64UrlUnpadded::decode_vec(&x) {
                    Ok(raw_x) => {
                        if raw_x.len() != 32 {
                            tracerr!(
                                Err::InvalidKey,
                                "Invalid x coordinate length. Expected 32 bytes, got {}",
                                raw_x.len()
                            );
                        }
                    }
                    Err(e) => tracerr!(Err::InvalidKey, "Invalid x coordinate encoding: {}", e),
                };
            }
            KeyType::P256 | KeyType::P384 | KeyType::P521 => {
                for (label, param) in [("x", &self.x), ("y", &self.y)] {
                    let value = param.clone().unwrap_or_default();
                    if value.is_empty() {
                        tracerr!(Err::InvalidKey, "Missing {} coordinate", label);
                    }
                    if let Err(e) = Base64UrlUnpadded::decode_vec(&value) {
                        tracerr!(Err::InvalidKey, "Invalid {} coordinate encoding: {}", label, e);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ed25519_key() -> Jwk {
        Jwk {
            kty: "OKP".to_string(),
            crv: Some("Ed25519".to_string()),
            x: Some("VCpo2LMLhn6iWku8MKvSLg2ZAoC-nlOyPVQaO3FxVeQ".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn key_type_inference() {
        assert_eq!(ed25519_key().key_type(), Some(KeyType::Ed25519));

        let x = Jwk {
            kty: "OKP".to_string(),
            crv: Some("X25519".to_string()),
            ..Default::default()
        };
        assert_eq!(x.key_type(), Some(KeyType::X25519));

        let rsa = Jwk {
            kty: "RSA".to_string(),
            ..Default::default()
        };
        assert_eq!(rsa.key_type(), Some(KeyType::Rsa));

        for crv in ["P-256", "P-384", "P-521"] {
            let ec = Jwk {
                kty: "EC".to_string(),
                crv: Some(crv.to_string()),
                ..Default::default()
            };
            assert!(ec.key_type().is_some());
        }

        let unknown = Jwk {
            kty: "EC".to_string(),
            crv: Some("secp256k1".to_string()),
            ..Default::default()
        };
        assert_eq!(unknown.key_type(), None);
    }

    #[test]
    fn rule_table() {
        assert_eq!(
            KeyType::Ed25519.allowed_purposes(),
            &[
                KeyPurpose::Authentication,
                KeyPurpose::AssertionMethod,
                KeyPurpose::CapabilityInvocation,
                KeyPurpose::CapabilityDelegation,
            ]
        );
        assert_eq!(KeyType::X25519.allowed_purposes(), &[KeyPurpose::KeyAgreement]);
        for kt in [KeyType::P256, KeyType::P384, KeyType::P521] {
            assert_eq!(kt.allowed_purposes().len(), 5);
        }
        assert_eq!(
            KeyType::Rsa.allowed_purposes(),
            &[
                KeyPurpose::Authentication,
                KeyPurpose::AssertionMethod,
                KeyPurpose::CapabilityInvocation,
            ]
        );
        assert!(!KeyType::Ed25519.permits(KeyPurpose::KeyAgreement));
        assert!(!KeyType::Rsa.permits(KeyPurpose::CapabilityDelegation));
    }

    #[test]
    fn filter_drops_disallowed() {
        let filtered = ed25519_key()
            .filter_purposes(&[KeyPurpose::Authentication, KeyPurpose::KeyAgreement]);
        assert_eq!(filtered, vec![KeyPurpose::Authentication]);
    }

    #[test]
    fn filter_passes_unknown_through() {
        let unknown = Jwk {
            kty: "EC".to_string(),
            crv: Some("secp256k1".to_string()),
            ..Default::default()
        };
        let selected = vec![KeyPurpose::KeyAgreement, KeyPurpose::CapabilityDelegation];
        assert_eq!(unknown.filter_purposes(&selected), selected);
    }

    #[test]
    fn check_valid_ed25519() {
        ed25519_key().check().expect("expected valid key");
    }

    #[test]
    fn check_missing_coordinate() {
        let key = Jwk {
            kty: "OKP".to_string(),
            crv: Some("Ed25519".to_string()),
            ..Default::default()
        };
        let err = key.check().expect_err("expected error");
        assert!(err.is(crate::error::Err::InvalidKey));
    }
}
