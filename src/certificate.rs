//! Two-phase certificate ingestion. Certificate validation (parsing, password-based
//! decryption) is expensive and side-effecting on the registrar, so extraction is previewed
//! first and only persisted once the preview succeeds. The persisted record is bound to the
//! previewed extraction by reusing the provisional certificate ID.

use serde::{Deserialize, Serialize};

use crate::error::Err;
use crate::keys::{Jwk, KeyPurpose};
use crate::registrar::{CertificateResponse, Registrar};
use crate::{tracerr, Result};

/// Declared encoding of an uploaded certificate file.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CertificateFormat {
    /// Detect the format from the file content.
    #[default]
    Auto,
    /// PEM-encoded certificate.
    Pem,
    /// DER-encoded certificate.
    Der,
    /// PKCS#7 certificate bundle.
    Pkcs7,
    /// PKCS#12 archive, usually password protected.
    Pkcs12,
    /// JSON Web Key.
    Jwk,
    /// Raw certificate file.
    Crt,
}

impl std::fmt::Display for CertificateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CertificateFormat::Auto => write!(f, "AUTO"),
            CertificateFormat::Pem => write!(f, "PEM"),
            CertificateFormat::Der => write!(f, "DER"),
            CertificateFormat::Pkcs7 => write!(f, "PKCS7"),
            CertificateFormat::Pkcs12 => write!(f, "PKCS12"),
            CertificateFormat::Jwk => write!(f, "JWK"),
            CertificateFormat::Crt => write!(f, "CRT"),
        }
    }
}

/// Certificate material submitted to the registrar's extraction endpoints, sent as a
/// multipart form.
#[derive(Clone, Debug, Default)]
pub struct CertificateUpload {
    /// Organization the certificate belongs to.
    pub organization_id: String,
    /// Declared file format.
    pub format: CertificateFormat,
    /// The certificate file bytes.
    pub file: Vec<u8>,
    /// Decryption password for protected archives.
    pub password: Option<String>,
    /// Certificate ID from a prior preview, binding the persisted record to the previewed
    /// extraction. Unset on preview.
    pub certificate_id: Option<String>,
}

/// An ingested certificate key: the persisted certificate record together with the purposes
/// the key is authorized to serve.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CertificateKey {
    /// Identifier of the persisted certificate record.
    pub certificate_id: String,
    /// The extracted public key.
    pub jwk: Jwk,
    /// Fingerprint of the certificate.
    pub fingerprint: String,
    /// Purposes the key is currently selected for. Defaults to the full allowed set for the
    /// key type on ingestion.
    pub purposes: Vec<KeyPurpose>,
}

impl CertificateKey {
    /// Re-filter the key's purposes to the intersection of a new selection with the set its
    /// key type permits. Purposes not cryptographically valid for the key are never added.
    pub fn refilter(&mut self, selected: &[KeyPurpose]) {
        self.purposes = self.jwk.filter_purposes(selected);
    }
}

/// Ingestion pipeline for one editing session. Holds at most one in-flight preview; starting
/// a new preview discards any prior unsaved preview result.
#[derive(Clone, Debug, Default)]
pub struct CertificatePipeline {
    preview: Option<CertificateResponse>,
}

impl CertificatePipeline {
    /// Create an empty pipeline with no in-flight preview.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current unsaved preview result, if any.
    #[must_use]
    pub fn previewed(&self) -> Option<&CertificateResponse> {
        self.preview.as_ref()
    }

    /// Extract and validate the certificate's public key without persisting anything.
    ///
    /// # Errors
    ///
    /// * `Err::Upload` - The file could not be parsed or decrypted. Any prior preview is
    /// discarded regardless of outcome.
    pub async fn preview(
        &mut self, registrar: &impl Registrar, upload: &CertificateUpload,
    ) -> Result<&CertificateResponse> {
        self.preview = None;

        let mut request = upload.clone();
        request.certificate_id = None;
        let response = registrar.preview_certificate(&request).await?;
        tracing::debug!(
            certificate_id = %response.certificate_id,
            fingerprint = %response.fingerprint,
            "certificate previewed"
        );
        Ok(self.preview.insert(response))
    }

    /// Persist the previously previewed certificate and return the ingested key with its
    /// default purpose set.
    ///
    /// # Errors
    ///
    /// * `Err::Validation` - No successful preview is held; rejected locally without a
    /// network call.
    /// * `Err::Upload` - The registrar failed to persist the certificate.
    pub async fn upload(
        &mut self, registrar: &impl Registrar, upload: &CertificateUpload,
    ) -> Result<CertificateKey> {
        let Some(previewed) = &self.preview else {
            tracerr!(Err::Validation, "certificate must be previewed before it is persisted");
        };

        let mut request = upload.clone();
        request.certificate_id = Some(previewed.certificate_id.clone());
        let response = registrar.upload_certificate(&request).await?;

        // The preview is consumed by a successful persist.
        self.preview = None;

        let purposes = match response.public_jwk.key_type() {
            Some(kt) => kt.allowed_purposes().to_vec(),
            // Unrecognized key type: no rule applies, leave the full selection open.
            None => KeyPurpose::ALL.to_vec(),
        };
        Ok(CertificateKey {
            certificate_id: response.certificate_id,
            jwk: response.public_jwk,
            fingerprint: response.fingerprint,
            purposes,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::registrar::{
        CreateRequest, DeactivationReceipt, DidStateEnvelope, Environment, PreviewRequest,
        ResolutionResponse, RotateRequest,
    };

    /// Registrar stub serving canned certificate extractions and counting calls.
    #[derive(Default)]
    struct StubRegistrar {
        next_id: RefCell<u32>,
        fail_preview: bool,
        upload_calls: RefCell<u32>,
    }

    impl Registrar for StubRegistrar {
        async fn preview_did(&self, _: &PreviewRequest) -> Result<DidStateEnvelope> {
            unimplemented!("not used by pipeline tests")
        }

        async fn create_did(&self, _: &CreateRequest) -> Result<DidStateEnvelope> {
            unimplemented!("not used by pipeline tests")
        }

        async fn rotate_key(&self, _: &str, _: &RotateRequest) -> Result<DidStateEnvelope> {
            unimplemented!("not used by pipeline tests")
        }

        async fn publish_did(&self, _: &str, _: Option<u32>) -> Result<DidStateEnvelope> {
            unimplemented!("not used by pipeline tests")
        }

        async fn deactivate_did(&self, _: &str) -> Result<DeactivationReceipt> {
            unimplemented!("not used by pipeline tests")
        }

        async fn resolve_did(&self, _: &str, _: Environment) -> Result<ResolutionResponse> {
            unimplemented!("not used by pipeline tests")
        }

        async fn preview_certificate(
            &self, _: &CertificateUpload,
        ) -> Result<CertificateResponse> {
            if self.fail_preview {
                tracerr!(Err::Upload, "could not decrypt archive");
            }
            let mut id = self.next_id.borrow_mut();
            *id += 1;
            Ok(CertificateResponse {
                certificate_id: format!("cert-{}", *id),
                public_jwk: Jwk {
                    kty: "OKP".to_string(),
                    crv: Some("Ed25519".to_string()),
                    x: Some("VCpo2LMLhn6iWku8MKvSLg2ZAoC-nlOyPVQaO3FxVeQ".to_string()),
                    ..Default::default()
                },
                fingerprint: "ab:cd:ef".to_string(),
            })
        }

        async fn upload_certificate(
            &self, upload: &CertificateUpload,
        ) -> Result<CertificateResponse> {
            *self.upload_calls.borrow_mut() += 1;
            Ok(CertificateResponse {
                certificate_id: upload.certificate_id.clone().unwrap_or_default(),
                public_jwk: Jwk {
                    kty: "OKP".to_string(),
                    crv: Some("Ed25519".to_string()),
                    x: Some("VCpo2LMLhn6iWku8MKvSLg2ZAoC-nlOyPVQaO3FxVeQ".to_string()),
                    ..Default::default()
                },
                fingerprint: "ab:cd:ef".to_string(),
            })
        }
    }

    fn upload_request() -> CertificateUpload {
        CertificateUpload {
            organization_id: "org-1".to_string(),
            format: CertificateFormat::Pem,
            file: b"-----BEGIN CERTIFICATE-----".to_vec(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn upload_before_preview_rejected_locally() {
        let registrar = StubRegistrar::default();
        let mut pipeline = CertificatePipeline::new();

        let err =
            pipeline.upload(&registrar, &upload_request()).await.expect_err("expected error");
        assert!(err.is(Err::Validation));
        assert_eq!(*registrar.upload_calls.borrow(), 0);
    }

    #[tokio::test]
    async fn upload_binds_previewed_id() {
        let registrar = StubRegistrar::default();
        let mut pipeline = CertificatePipeline::new();

        pipeline.preview(&registrar, &upload_request()).await.expect("preview failed");
        let key = pipeline.upload(&registrar, &upload_request()).await.expect("upload failed");

        assert_eq!(key.certificate_id, "cert-1");
        assert_eq!(
            key.purposes,
            vec![
                KeyPurpose::Authentication,
                KeyPurpose::AssertionMethod,
                KeyPurpose::CapabilityInvocation,
                KeyPurpose::CapabilityDelegation,
            ]
        );
        // The preview was consumed; a second upload needs a fresh preview.
        let err =
            pipeline.upload(&registrar, &upload_request()).await.expect_err("expected error");
        assert!(err.is(Err::Validation));
    }

    #[tokio::test]
    async fn new_preview_replaces_prior() {
        let registrar = StubRegistrar::default();
        let mut pipeline = CertificatePipeline::new();

        pipeline.preview(&registrar, &upload_request()).await.expect("preview failed");
        pipeline.preview(&registrar, &upload_request()).await.expect("preview failed");
        assert_eq!(
            pipeline.previewed().map(|p| p.certificate_id.as_str()),
            Some("cert-2")
        );
    }

    #[tokio::test]
    async fn failed_preview_discards_prior() {
        let ok = StubRegistrar::default();
        let failing = StubRegistrar {
            fail_preview: true,
            ..Default::default()
        };
        let mut pipeline = CertificatePipeline::new();

        pipeline.preview(&ok, &upload_request()).await.expect("preview failed");
        let err = pipeline
            .preview(&failing, &upload_request())
            .await
            .map(|_| ())
            .expect_err("expected error");
        assert!(err.is(Err::Upload));
        assert!(pipeline.previewed().is_none());
    }

    #[test]
    fn refilter_never_adds_invalid_purposes() {
        let mut key = CertificateKey {
            jwk: Jwk {
                kty: "OKP".to_string(),
                crv: Some("Ed25519".to_string()),
                ..Default::default()
            },
            purposes: vec![KeyPurpose::Authentication],
            ..Default::default()
        };
        key.refilter(&[KeyPurpose::AssertionMethod, KeyPurpose::KeyAgreement]);
        assert_eq!(key.purposes, vec![KeyPurpose::AssertionMethod]);
    }

    #[test]
    fn format_labels() {
        assert_eq!(CertificateFormat::Pkcs12.to_string(), "PKCS12");
        assert_eq!(
            serde_json::to_value(CertificateFormat::Auto).expect("serialize"),
            serde_json::json!("AUTO")
        );
    }
}
