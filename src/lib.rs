//! # DID Lifecycle & Key-Purpose Authorization
//!
//! Client-side orchestration of the DID lifecycle: ingest a cryptographic certificate,
//! determine which verification relationships its key type is permitted to serve, assemble a
//! DID document draft, and drive it through compile, create or rotate, publish and deactivate
//! operations against a remote registrar.
//!
//! Cryptographic signing, certificate parsing and DID resolution are delegated to the
//! registrar; this crate validates, orchestrates and tracks state on the client side.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Two-phase certificate ingestion pipeline.
pub mod certificate;
/// DID document draft and assembly.
pub mod document;
/// Error types.
pub mod error;
/// Public key material and purpose authorization rules.
pub mod keys;
/// Lifecycle session state machine.
pub mod lifecycle;
/// Publication and deactivation of created DIDs.
pub mod publish;
/// Registrar client contract and HTTP implementation.
pub mod registrar;

pub use certificate::{CertificateFormat, CertificateKey, CertificatePipeline, CertificateUpload};
pub use document::{service::Service, verification_method::VerificationMethod, DidDocument};
pub use error::Error;
pub use keys::{Jwk, KeyPurpose, KeyType};
pub use lifecycle::{Session, SessionMode, SubmissionState};
pub use publish::{PublishRequest, PublishStatus};
pub use registrar::{DidStateEnvelope, Environment, Registrar, StateType};

/// Crate result type.
pub type Result<T, E = Error> = core::result::Result<T, E>;
