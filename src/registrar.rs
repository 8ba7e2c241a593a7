//! https://identity.foundation/did-registration/
//!
//! Client contract for the remote registrar service. The registrar is responsible for
//! certificate parsing, cryptographic signing, DID persistence, publication, and resolution -
//! this crate only orchestrates requests against it and interprets the returned state
//! envelopes.

use serde::{Deserialize, Serialize};

use crate::certificate::CertificateUpload;
use crate::document::{service::Service, DidDocument};
use crate::keys::{Jwk, KeyPurpose};
use crate::Result;

pub mod http;

/// Registrar-side environment of a DID's document. A document is promoted from draft to
/// production via an explicit publish action.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    /// Unpublished working state.
    #[default]
    Draft,
    /// Published production state.
    Prod,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Draft => write!(f, "DRAFT"),
            Environment::Prod => write!(f, "PROD"),
        }
    }
}

/// State reported by the registrar for a DID operation.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StateType {
    /// The operation produced a document requiring further client action.
    #[default]
    Action,
    /// The operation is waiting on the registrar side.
    Wait,
    /// The operation failed. A reason is supplied.
    Error,
    /// The operation completed.
    Finished,
    /// The registrar reports an updated document.
    Update,
}

/// State of a DID operation as reported by the registrar.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DidState {
    /// Operation state. Only `action` (with a document body) and `error` (with a reason) are
    /// interpreted by this crate; other states are passed through to the caller.
    pub state: StateType,
    /// The DID the operation applies to, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    /// The DID document produced by the operation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<DidDocument>,
    /// Human-readable failure reason, set when `state` is `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Envelope returned by registrar DID operations.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DidStateEnvelope {
    /// Registrar job identifier for long-running operations, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// The state of the requested operation.
    pub did_state: DidState,
}

/// Request to preview (compile) a DID document from an ingested certificate.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreviewRequest {
    /// Organization the DID belongs to.
    pub organization_id: String,
    /// Logical identifier (document type) for the DID.
    pub document_type: String,
    /// Identifier of the previously ingested certificate.
    pub certificate_id: String,
    /// Verification relationships requested for the certificate's key.
    pub purposes: Vec<KeyPurpose>,
}

/// Request to create a DID.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateRequest {
    /// Organization the DID belongs to.
    pub organization_id: String,
    /// Logical identifier (document type) for the DID.
    pub document_type: String,
    /// Identifier of the previously ingested certificate.
    pub certificate_id: String,
    /// Verification relationships requested for the certificate's key.
    pub purposes: Vec<KeyPurpose>,
    /// User that will own the DID.
    pub owner_id: String,
    /// Services to include in the DID document.
    pub services: Vec<Service>,
    /// Public keys to include in the DID document.
    pub keys: Vec<Jwk>,
}

/// Request to rotate the key of an existing DID.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RotateRequest {
    /// Identifier of the ingested certificate holding the replacement key.
    pub certificate_id: String,
    /// Verification relationships requested for the replacement key.
    pub purposes: Vec<KeyPurpose>,
}

/// Receipt returned by the registrar on deactivation.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeactivationReceipt {
    /// The deactivated DID.
    pub did: String,
    /// Always true on success.
    pub deactivated: bool,
}

/// Response to a DID resolution request.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolutionResponse {
    /// The resolved DID document, if found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_document: Option<DidDocument>,
    /// Metadata about the resolution process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_resolution_metadata: Option<serde_json::Value>,
    /// Metadata about the document itself (versioning, timestamps).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_document_metadata: Option<serde_json::Value>,
}

/// Extracted key material returned by the certificate endpoints.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CertificateResponse {
    /// Identifier binding the extraction to a certificate record. Provisional on preview,
    /// persistent after upload.
    pub certificate_id: String,
    /// The extracted public key.
    pub public_jwk: Jwk,
    /// Fingerprint of the certificate.
    pub fingerprint: String,
}

/// A registrar is a remote service that supports the lifecycle operations of a DID, including
/// persisting, publishing and resolving it. Implemented over HTTP by [`http::HttpRegistrar`];
/// tests substitute their own implementations.
#[allow(async_fn_in_trait)]
pub trait Registrar {
    /// Compile a DID document preview from an ingested certificate without persisting it.
    async fn preview_did(&self, request: &PreviewRequest) -> Result<DidStateEnvelope>;

    /// Create a new DID from an ingested certificate, services and keys.
    async fn create_did(&self, request: &CreateRequest) -> Result<DidStateEnvelope>;

    /// Rotate the key of an existing DID to a newly ingested certificate.
    async fn rotate_key(&self, did: &str, request: &RotateRequest) -> Result<DidStateEnvelope>;

    /// Publish a DID document version to production. When `version` is omitted the registrar
    /// publishes the latest; the client never computes version numbers.
    async fn publish_did(&self, did: &str, version: Option<u32>) -> Result<DidStateEnvelope>;

    /// Deactivate a DID. A deactivated DID is no longer valid and cannot be resolved.
    async fn deactivate_did(&self, did: &str) -> Result<DeactivationReceipt>;

    /// Resolve a DID in the given environment.
    async fn resolve_did(
        &self, identifier: &str, environment: Environment,
    ) -> Result<ResolutionResponse>;

    /// Extract and validate the public key of a certificate without persisting it.
    async fn preview_certificate(&self, upload: &CertificateUpload) -> Result<CertificateResponse>;

    /// Persist a certificate. Callers must supply the certificate ID returned by a prior
    /// preview so the persisted record is bound to the previewed extraction.
    async fn upload_certificate(&self, upload: &CertificateUpload) -> Result<CertificateResponse>;
}
