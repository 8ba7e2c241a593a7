//! Tests for the full lifecycle of a DID authored from an ingested certificate: preview and
//! persist the certificate, compile the draft, create the DID, then publish and deactivate it.

use std::cell::RefCell;

use vercre_didadmin::certificate::{CertificateFormat, CertificateUpload};
use vercre_didadmin::document::DID_CONTEXT;
use vercre_didadmin::error::Err;
use vercre_didadmin::publish::{self, PublishRequest, PublishStatus};
use vercre_didadmin::registrar::{
    CertificateResponse, CreateRequest, DeactivationReceipt, DidState, DidStateEnvelope,
    PreviewRequest, ResolutionResponse, RotateRequest, StateType,
};
use vercre_didadmin::{
    DidDocument, Environment, Jwk, KeyPurpose, Registrar, Result, Session, SubmissionState,
};

// Registrar stub behaving like the remote service: previews assemble a document from the
// request, creation mints a DID, resolution serves the published document.
#[derive(Default)]
struct FakeRegistrar {
    published: RefCell<Option<DidDocument>>,
}

fn test_jwk() -> Jwk {
    Jwk {
        kty: "OKP".to_string(),
        crv: Some("Ed25519".to_string()),
        x: Some("VCpo2LMLhn6iWku8MKvSLg2ZAoC-nlOyPVQaO3FxVeQ".to_string()),
        ..Default::default()
    }
}

impl Registrar for FakeRegistrar {
    async fn preview_did(&self, request: &PreviewRequest) -> Result<DidStateEnvelope> {
        let mut document = DidDocument {
            id: format!("did:web:example.com:{}", request.document_type),
            context: vec![DID_CONTEXT.to_string()],
            ..Default::default()
        };
        document.add_verification_method(&test_jwk(), &request.purposes);
        Ok(DidStateEnvelope {
            did_state: DidState {
                state: StateType::Action,
                document: Some(document),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn create_did(&self, request: &CreateRequest) -> Result<DidStateEnvelope> {
        let did = format!("did:web:example.com:{}", request.document_type);
        let mut document = DidDocument {
            id: did.clone(),
            context: vec![DID_CONTEXT.to_string()],
            ..Default::default()
        };
        document.add_verification_method(&test_jwk(), &request.purposes);
        *self.published.borrow_mut() = Some(document);
        Ok(DidStateEnvelope {
            did_state: DidState {
                state: StateType::Finished,
                did: Some(did),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn rotate_key(&self, did: &str, _: &RotateRequest) -> Result<DidStateEnvelope> {
        Ok(DidStateEnvelope {
            did_state: DidState {
                state: StateType::Finished,
                did: Some(did.to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn publish_did(&self, did: &str, _: Option<u32>) -> Result<DidStateEnvelope> {
        Ok(DidStateEnvelope {
            did_state: DidState {
                state: StateType::Finished,
                did: Some(did.to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn deactivate_did(&self, did: &str) -> Result<DeactivationReceipt> {
        *self.published.borrow_mut() = None;
        Ok(DeactivationReceipt {
            did: did.to_string(),
            deactivated: true,
        })
    }

    async fn resolve_did(&self, _: &str, _: Environment) -> Result<ResolutionResponse> {
        Ok(ResolutionResponse {
            did_document: self.published.borrow().clone(),
            ..Default::default()
        })
    }

    async fn preview_certificate(&self, _: &CertificateUpload) -> Result<CertificateResponse> {
        Ok(CertificateResponse {
            certificate_id: "cert-77".to_string(),
            public_jwk: test_jwk(),
            fingerprint: "aa:bb:cc:dd".to_string(),
        })
    }

    async fn upload_certificate(
        &self, upload: &CertificateUpload,
    ) -> Result<CertificateResponse> {
        Ok(CertificateResponse {
            certificate_id: upload.certificate_id.clone().unwrap_or_default(),
            public_jwk: test_jwk(),
            fingerprint: "aa:bb:cc:dd".to_string(),
        })
    }
}

fn pem_upload() -> CertificateUpload {
    CertificateUpload {
        organization_id: "org-acme".to_string(),
        format: CertificateFormat::Pem,
        file: b"-----BEGIN CERTIFICATE-----".to_vec(),
        ..Default::default()
    }
}

// Test the happy path from certificate ingestion to a published then deactivated DID.
// Should just work without errors.
#[tokio::test]
async fn create_publish_deactivate() {
    let registrar = FakeRegistrar::default();

    let mut session = Session::create("org-acme", "user-1");
    session.set_identifier("payments-gateway");
    session
        .preview_certificate(&registrar, &pem_upload())
        .await
        .expect("should preview certificate");
    session
        .ingest_certificate(&registrar, &pem_upload())
        .await
        .expect("should ingest certificate");

    let key = session.key().expect("should hold ingested key");
    assert_eq!(key.certificate_id, "cert-77");
    assert!(key.purposes.contains(&KeyPurpose::Authentication));
    assert!(!key.purposes.contains(&KeyPurpose::KeyAgreement));

    session.compile(&registrar).await.expect("should compile draft");
    assert_eq!(session.state(), SubmissionState::Compiled);
    assert_eq!(session.draft().id, "did:web:example.com:payments-gateway");

    session.execute(&registrar).await.expect("should create DID");
    assert_eq!(session.state(), SubmissionState::Succeeded);
    let did = session
        .last_response()
        .and_then(|e| e.did_state.did.clone())
        .expect("should have a DID");

    // Publication requires reviewer approval for this caller.
    let mut request = PublishRequest::new(&did, None, "user-1");
    request.approve("reviewer-1", Some("key rotation reviewed")).expect("should approve");
    assert_eq!(request.status, PublishStatus::Approved);

    let envelope =
        publish::publish(&registrar, &request.did, request.version).await.expect("should publish");
    assert_eq!(envelope.did_state.did.as_deref(), Some(did.as_str()));

    let resolved = session
        .resolve(&registrar, &did, Environment::Prod)
        .await
        .expect("should resolve DID");
    assert_eq!(
        resolved.did_document.expect("should have a document").id,
        did
    );

    let receipt = publish::deactivate(&registrar, &did).await.expect("should deactivate");
    assert!(receipt.deactivated);
    let resolved =
        session.resolve(&registrar, &did, Environment::Prod).await.expect("should resolve");
    assert!(resolved.did_document.is_none());
}

// An edit between compile and execute must force a recompile before the DID can be created.
#[tokio::test]
async fn stale_draft_cannot_be_submitted() {
    let registrar = FakeRegistrar::default();

    let mut session = Session::create("org-acme", "user-1");
    session.set_identifier("payments-gateway");
    session
        .preview_certificate(&registrar, &pem_upload())
        .await
        .expect("should preview certificate");
    session
        .ingest_certificate(&registrar, &pem_upload())
        .await
        .expect("should ingest certificate");
    session.compile(&registrar).await.expect("should compile draft");

    session.set_purposes(vec![KeyPurpose::Authentication]);
    assert_eq!(session.state(), SubmissionState::Editing);

    let err = session.execute(&registrar).await.expect_err("should reject stale draft");
    assert!(err.is(Err::Validation));

    session.compile(&registrar).await.expect("should recompile");
    session.execute(&registrar).await.expect("should create DID");
    assert_eq!(session.state(), SubmissionState::Succeeded);
}
