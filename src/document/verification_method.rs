//! Verification methods allow public keys to be associated with a DID.

use std::{convert::Infallible, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::keys::Jwk;

/// A DID document can express verification methods, such as cryptographic public keys, which
/// can be used to authenticate or authorize interactions with the DID subject or associated
/// parties.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerificationMethod {
    /// Identifier for the verification method. The value must be a string that conforms to
    /// DID URL syntax which can be a relative DID URL that is confined to the DID document.
    pub id: String,
    /// The type of verification method. One that is registered in a DID specification
    /// registry. https://www.w3.org/TR/did-spec-registries/
    #[serde(rename = "type")]
    pub type_: String,
    /// Identifier for the controller of the verification method. A DID.
    pub controller: String,
    /// The public key material of the verification method, if applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_jwk: Option<Jwk>,
}

/// A reference to a verification method or an embedded verification method object, as used by
/// the "authentication" and other similar fields in a DID document.
#[derive(Clone, Debug, Default)]
pub struct VmRelationship {
    /// Key identifier referring to a verification method elsewhere in the DID document.
    pub key_id: Option<String>,
    /// Embedded verification method object in the case where the verification method is not
    /// referred to by key identifier.
    pub verification_method: Option<VerificationMethod>,
}

/// Deserialise a verification method relationship in the case it is a string - the ID of a
/// verification method specified elsewhere in the DID document.
impl FromStr for VmRelationship {
    type Err = Infallible;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            key_id: Some(id.to_string()),
            verification_method: None,
        })
    }
}

/// Partial Equality for verification method relationship.
impl PartialEq for VmRelationship {
    fn eq(&self, other: &Self) -> bool {
        if self.key_id.is_some() && other.key_id.is_some() {
            return self.key_id == other.key_id;
        }
        if let Some(me) = &self.verification_method {
            if let Some(them) = &other.verification_method {
                return me == them;
            }
        }
        false
    }
}
impl Eq for VmRelationship {}

/// Convert a verification method into a verification method relationship. Note that this will
/// only pick up the ID of the verification method to refer to and will *not* embed the
/// verification method itself.
impl From<&VerificationMethod> for VmRelationship {
    fn from(vm: &VerificationMethod) -> Self {
        Self {
            key_id: Some(vm.id.clone()),
            verification_method: None,
        }
    }
}

/// Serialize a verification method relationship to a string or object. If the `key_id` field
/// is set, serialize to a string, otherwise serialize to an embedded verification method.
impl Serialize for VmRelationship {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match (&self.key_id, &self.verification_method) {
            (Some(id), None) => serializer.serialize_str(id),
            (None, Some(vm)) => vm.serialize(serializer),
            _ => Err(serde::ser::Error::custom(
                "Verification method reference must be a string or object",
            )),
        }
    }
}

/// Deserialize a verification method relationship from a string (a reference to a method
/// elsewhere in the document) or an object (an embedded method).
impl<'de> Deserialize<'de> for VmRelationship {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RefOrEmbedded {
            Reference(String),
            Embedded(VerificationMethod),
        }
        match RefOrEmbedded::deserialize(deserializer)? {
            RefOrEmbedded::Reference(id) => Ok(Self {
                key_id: Some(id),
                verification_method: None,
            }),
            RefOrEmbedded::Embedded(vm) => Ok(Self {
                key_id: None,
                verification_method: Some(vm),
            }),
        }
    }
}
