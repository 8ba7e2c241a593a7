//! DID Document draft and its component data structures. The draft is assembled locally from
//! ingested keys and user-added services, kept strongly typed throughout, and serialized to
//! JSON only at the registrar-call boundary.

use serde::{Deserialize, Serialize};

use crate::document::{
    service::Service,
    verification_method::{VerificationMethod, VmRelationship},
};
use crate::error::Err;
use crate::keys::{Jwk, KeyPurpose};
use crate::{tracerr, Result};

pub mod service;
pub mod verification_method;

/// Base JSON-LD context for DID documents.
pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";

/// Verification method type used for keys expressed as JWKs.
pub const JWK_VM_TYPE: &str = "JsonWebKey2020";

/// A DID is associated with a DID document that can be serialized into a representation of the
/// DID. https://www.w3.org/TR/did-core/
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DidDocument {
    /// The DID document's unique identifier. It is a URI scheme conformant with RFC3986. Left
    /// empty on a draft that has not been compiled by the registrar yet.
    pub id: String,
    /// The JSON-LD context for the document.
    #[serde(rename = "@context", skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
    /// A DID controller is an entity that is authorized to make changes to a DID document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    /// A set of parameters that can be used together with a process to independently verify a
    /// proof. For example, a cryptographic public key can be used as a verification method
    /// with respect to a digital signature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<Vec<VerificationMethod>>,
    /// Authentication methods - maps to one or more verification methods by ID or contains
    /// embedded verification methods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Vec<VmRelationship>>,
    /// Assertion methods - how the DID subject is expected to express claims, such as for the
    /// purposes of issuing verifiable credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_method: Option<Vec<VmRelationship>>,
    /// Key agreement methods - how an entity can generate encryption material to transmit
    /// confidential messages to the DID subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_agreement: Option<Vec<VmRelationship>>,
    /// Capability invocation methods - how the DID subject can invoke a cryptographic
    /// capability, such as to authorize an update to the DID document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability_invocation: Option<Vec<VmRelationship>>,
    /// Capability delegation methods - how the DID subject can delegate a cryptographic
    /// capability to another party.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability_delegation: Option<Vec<VmRelationship>>,
    /// Services are used to express ways of communicating with the DID subject or associated
    /// entities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<Vec<Service>>,
}

/// Draft assembly: adding verification methods and services while keeping the relationship
/// lists consistent with the key-purpose authorization rules.
impl DidDocument {
    /// Add a verification method for a public key and auto-assign it to every relationship the
    /// key type permits that is also currently selected.
    ///
    /// The method is assigned a deterministic identifier `{did}#key-{n}` where `n` is the
    /// current count of verification methods. A key with an unrecognized type is added to the
    /// method list but not auto-assigned to any relationship; the caller may assign manually.
    ///
    /// # Arguments
    ///
    /// * `key` - The public key to add, as a JWK.
    /// * `selected` - The relationships currently selected for the editing session.
    ///
    /// # Returns
    ///
    /// The identifier assigned to the new verification method.
    pub fn add_verification_method(&mut self, key: &Jwk, selected: &[KeyPurpose]) -> String {
        let count = self.verification_method.as_ref().map_or(0, Vec::len);
        let id = format!("{}#key-{}", self.id, count);

        let vm = VerificationMethod {
            id: id.clone(),
            type_: JWK_VM_TYPE.to_string(),
            controller: self.id.clone(),
            public_key_jwk: Some(key.clone()),
        };
        let vm_ref = VmRelationship::from(&vm);
        self.verification_method.get_or_insert_with(Vec::new).push(vm);

        if key.key_type().is_some() {
            for purpose in key.filter_purposes(selected) {
                self.assign(purpose, vm_ref.clone());
            }
        }
        id
    }

    /// Assign a verification method reference to a relationship list. Does not re-check the
    /// key-purpose rules - use [`DidDocument::verify_relationships`] before submission.
    pub fn assign(&mut self, purpose: KeyPurpose, vm_ref: VmRelationship) {
        self.relationship_mut(purpose).get_or_insert_with(Vec::new).push(vm_ref);
    }

    /// Append a service entry. No uniqueness constraint is enforced on the service ID beyond
    /// what the registrar rejects.
    pub fn add_service(&mut self, service: Service) {
        self.service.get_or_insert_with(Vec::new).push(service);
    }

    /// Remove a service entry by ID. No-op if absent.
    pub fn remove_service(&mut self, service_id: &str) {
        if let Some(services) = &mut self.service {
            services.retain(|s| s.id != service_id);
        }
    }

    /// Verify that every relationship-list entry references an existing verification method
    /// and that the method's key type permits the relationship. Run before compilation rather
    /// than trusted from assembly time, in case purposes were changed after assembly.
    ///
    /// # Errors
    ///
    /// * `Err::Validation` - A relationship references a missing method or one whose key type
    /// does not permit it.
    pub fn verify_relationships(&self) -> Result<()> {
        for purpose in KeyPurpose::ALL {
            let Some(refs) = self.relationship(purpose) else {
                continue;
            };
            for vm_ref in refs {
                let Some(vm) = self.vm_from_ref(vm_ref) else {
                    tracerr!(
                        Err::Validation,
                        "{} references a verification method that does not exist",
                        purpose
                    );
                };
                let key_type = vm.public_key_jwk.as_ref().and_then(Jwk::key_type);
                // Unrecognized key types are exempt from purpose checking.
                if let Some(kt) = key_type {
                    if !kt.permits(purpose) {
                        tracerr!(
                            Err::Validation,
                            "key type {} is not permitted to serve {}",
                            kt,
                            purpose
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Get the relationship list for a purpose.
    #[must_use]
    pub fn relationship(&self, purpose: KeyPurpose) -> Option<&Vec<VmRelationship>> {
        match purpose {
            KeyPurpose::Authentication => self.authentication.as_ref(),
            KeyPurpose::AssertionMethod => self.assertion_method.as_ref(),
            KeyPurpose::KeyAgreement => self.key_agreement.as_ref(),
            KeyPurpose::CapabilityInvocation => self.capability_invocation.as_ref(),
            KeyPurpose::CapabilityDelegation => self.capability_delegation.as_ref(),
        }
    }

    fn relationship_mut(&mut self, purpose: KeyPurpose) -> &mut Option<Vec<VmRelationship>> {
        match purpose {
            KeyPurpose::Authentication => &mut self.authentication,
            KeyPurpose::AssertionMethod => &mut self.assertion_method,
            KeyPurpose::KeyAgreement => &mut self.key_agreement,
            KeyPurpose::CapabilityInvocation => &mut self.capability_invocation,
            KeyPurpose::CapabilityDelegation => &mut self.capability_delegation,
        }
    }

    // Get a verification method from a verification method reference, either by looking up the
    // ID or returning the embedded verification method. If the ref contains an ID that doesn't
    // resolve or an embedded verification method doesn't exist, None is returned.
    fn vm_from_ref(&self, vm_ref: &VmRelationship) -> Option<VerificationMethod> {
        if let Some(id) = &vm_ref.key_id {
            if let Some(vms) = &self.verification_method {
                for vm in vms {
                    if &vm.id == id {
                        return Some(vm.clone());
                    }
                }
            }
        } else if let Some(vm) = &vm_ref.verification_method {
            return Some(vm.clone());
        }
        None
    }
}
