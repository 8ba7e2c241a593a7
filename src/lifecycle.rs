//! DID lifecycle session and its state machine.
//!
//! A session owns everything a user is editing while authoring or updating a DID: the logical
//! identifier, the selected purposes, the ingested certificate key, and the document draft. It
//! drives the compile -> execute cycle against the registrar and tracks submission state as an
//! explicit enum, so illegal transitions (executing an uncompiled draft) are rejected before
//! any network call.
//!
//! Any mutation to the identifier, purposes, or key invalidates a compiled draft. This is the
//! central invariant: a stale draft can never be submitted.

use crate::certificate::{CertificateKey, CertificatePipeline, CertificateUpload};
use crate::document::DidDocument;
use crate::error::Err;
use crate::keys::KeyPurpose;
use crate::registrar::{
    CreateRequest, DidStateEnvelope, Environment, PreviewRequest, Registrar, ResolutionResponse,
    RotateRequest, StateType,
};
use crate::{tracerr, Result};

/// What the session was opened for.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SessionMode {
    /// Author a new DID.
    #[default]
    Create,
    /// Rotate the key of an existing DID.
    Update,
    /// Look up an existing DID.
    Resolve,
}

/// Submission state of a lifecycle session. Acts as the session's in-flight mutex: a new
/// compile or execute action is rejected while one is running.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SubmissionState {
    /// The draft is being edited.
    #[default]
    Editing,
    /// A compile call is in flight.
    Compiling,
    /// The draft has been compiled by the registrar and may be executed.
    Compiled,
    /// A create or rotate call is in flight.
    Executing,
    /// The operation completed. Terminal.
    Succeeded,
    /// The operation failed. Re-entered to `Editing` on the next user edit.
    Failed,
}

/// A DID authoring or editing session. Owned exclusively by one caller; all registrar calls
/// suspend the session until resolution and at most one is in flight at a time.
#[derive(Debug, Default)]
pub struct Session {
    mode: SessionMode,
    organization_id: String,
    owner_id: String,
    logical_identifier: String,
    selected_purposes: Vec<KeyPurpose>,
    key: Option<CertificateKey>,
    pipeline: CertificatePipeline,
    draft: DidDocument,
    state: SubmissionState,
    last_error: Option<String>,
    last_response: Option<DidStateEnvelope>,
}

impl Session {
    /// Open a session for authoring a new DID.
    #[must_use]
    pub fn create(organization_id: &str, owner_id: &str) -> Self {
        Self {
            mode: SessionMode::Create,
            organization_id: organization_id.to_string(),
            owner_id: owner_id.to_string(),
            selected_purposes: KeyPurpose::ALL.to_vec(),
            ..Default::default()
        }
    }

    /// Open a session for editing an existing DID, seeded with its current document.
    #[must_use]
    pub fn update(organization_id: &str, owner_id: &str, document: DidDocument) -> Self {
        Self {
            mode: SessionMode::Update,
            organization_id: organization_id.to_string(),
            owner_id: owner_id.to_string(),
            selected_purposes: KeyPurpose::ALL.to_vec(),
            draft: document,
            ..Default::default()
        }
    }

    /// The session's mode.
    #[must_use]
    pub const fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Current submission state.
    #[must_use]
    pub const fn state(&self) -> SubmissionState {
        self.state
    }

    /// The document draft as it currently stands.
    #[must_use]
    pub const fn draft(&self) -> &DidDocument {
        &self.draft
    }

    /// Mutable access to the draft for service edits. Adding or removing services does not
    /// invalidate a compiled draft; only identifier, purposes, and key do.
    pub fn draft_mut(&mut self) -> &mut DidDocument {
        &mut self.draft
    }

    /// The ingested certificate key, if any.
    #[must_use]
    pub const fn key(&self) -> Option<&CertificateKey> {
        self.key.as_ref()
    }

    /// The purposes currently selected for this session.
    #[must_use]
    pub fn selected_purposes(&self) -> &[KeyPurpose] {
        &self.selected_purposes
    }

    /// The most recent error message, if the session is in a failed or locally rejected
    /// state. Cleared on the next edit.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The raw envelope from the most recent registrar call, for display.
    #[must_use]
    pub const fn last_response(&self) -> Option<&DidStateEnvelope> {
        self.last_response.as_ref()
    }

    /// Set the logical identifier. Invalidates a compiled draft.
    pub fn set_identifier(&mut self, identifier: &str) {
        self.logical_identifier = identifier.to_string();
        self.edited();
    }

    /// Replace the selected purposes. The ingested key's purposes are re-filtered to the
    /// intersection with what its key type permits, so a purpose that is not
    /// cryptographically valid for the key is never retained. Invalidates a compiled draft.
    pub fn set_purposes(&mut self, purposes: Vec<KeyPurpose>) {
        if let Some(key) = &mut self.key {
            key.refilter(&purposes);
        }
        self.selected_purposes = purposes;
        self.edited();
    }

    /// Preview a certificate without persisting it. See [`CertificatePipeline::preview`].
    ///
    /// # Errors
    ///
    /// * `Err::Upload` - The certificate could not be parsed or decrypted.
    pub async fn preview_certificate(
        &mut self, registrar: &impl Registrar, upload: &CertificateUpload,
    ) -> Result<()> {
        self.pipeline.preview(registrar, upload).await?;
        Ok(())
    }

    /// Persist the previewed certificate and take its key as the session's ingested key.
    /// Invalidates a compiled draft.
    ///
    /// # Errors
    ///
    /// * `Err::Validation` - No successful preview is held.
    /// * `Err::Upload` - The registrar failed to persist the certificate.
    pub async fn ingest_certificate(
        &mut self, registrar: &impl Registrar, upload: &CertificateUpload,
    ) -> Result<()> {
        let mut key = self.pipeline.upload(registrar, upload).await?;
        key.refilter(&self.selected_purposes);
        self.key = Some(key);
        self.edited();
        Ok(())
    }

    /// Compile the draft: ask the registrar to assemble the DID document for the current
    /// identifier, certificate, and purposes.
    ///
    /// Local preconditions are checked before any network call and leave the submission
    /// state untouched. A registrar failure transitions the session to `Failed` with the
    /// registrar's reason as the active error. Compiling twice with no intervening edits
    /// replaces the draft rather than accumulating into it.
    ///
    /// # Errors
    ///
    /// * `Err::Validation` - Identifier empty, key missing in create mode, draft
    /// relationships inconsistent, or an operation already in flight.
    /// * `Err::Registrar` - The registrar reported failure.
    pub async fn compile(&mut self, registrar: &impl Registrar) -> Result<()> {
        if matches!(self.state, SubmissionState::Compiling | SubmissionState::Executing) {
            tracerr!(Err::Validation, "an operation is already in flight");
        }
        if self.logical_identifier.is_empty() {
            self.last_error = Some("a logical identifier is required".to_string());
            tracerr!(Err::Validation, "a logical identifier is required");
        }
        if self.mode == SessionMode::Create && self.key.is_none() {
            self.last_error = Some("a certificate key must be ingested first".to_string());
            tracerr!(Err::Validation, "a certificate key must be ingested first");
        }
        self.draft.verify_relationships()?;

        let request = PreviewRequest {
            organization_id: self.organization_id.clone(),
            document_type: self.logical_identifier.clone(),
            certificate_id: self
                .key
                .as_ref()
                .map(|k| k.certificate_id.clone())
                .unwrap_or_default(),
            purposes: self.effective_purposes(),
        };

        self.state = SubmissionState::Compiling;
        tracing::debug!(identifier = %self.logical_identifier, "compiling draft");

        let envelope = match registrar.preview_did(&request).await {
            Ok(envelope) => envelope,
            Err(e) => {
                self.fail(e.to_string());
                return Err(e);
            }
        };
        self.accept_compiled(envelope)
    }

    // Interpret a preview envelope: an actionable document replaces the draft, an error
    // fails the session with the registrar's reason, anything else cannot produce a draft.
    fn accept_compiled(&mut self, envelope: DidStateEnvelope) -> Result<()> {
        match envelope.did_state.state {
            StateType::Action => {
                let Some(document) = envelope.did_state.document.clone() else {
                    self.fail("registrar returned no document to compile".to_string());
                    tracerr!(Err::Registrar, "registrar returned no document to compile");
                };
                self.draft = document;
                self.last_response = Some(envelope);
                self.state = SubmissionState::Compiled;
                tracing::debug!("draft compiled");
                Ok(())
            }
            StateType::Error => {
                let reason = envelope
                    .did_state
                    .reason
                    .clone()
                    .unwrap_or_else(|| "registrar reported an unspecified error".to_string());
                self.last_response = Some(envelope);
                self.fail(reason.clone());
                tracerr!(Err::Registrar, "{}", reason);
            }
            state => {
                self.last_response = Some(envelope);
                let reason = format!("registrar returned state {state:?} without a document");
                self.fail(reason.clone());
                tracerr!(Err::Registrar, "{}", reason);
            }
        }
    }

    /// Execute the compiled draft: create the DID, or rotate the key of an existing one.
    ///
    /// Requires a compiled draft; rejected locally otherwise with no network call and no
    /// state change. On success the session reaches `Succeeded` and retains the raw
    /// registrar response; on failure it reaches `Failed` with the error message. Nothing is
    /// retried automatically.
    ///
    /// # Errors
    ///
    /// * `Err::Validation` - The draft is not compiled, or required data is missing.
    /// * `Err::Registrar` - The registrar reported failure.
    pub async fn execute(&mut self, registrar: &impl Registrar) -> Result<()> {
        if self.state != SubmissionState::Compiled {
            tracerr!(Err::Validation, "draft must be compiled before execution");
        }
        let Some(key) = self.key.clone() else {
            tracerr!(Err::Validation, "a certificate key must be ingested first");
        };

        let result = match self.mode {
            SessionMode::Create => {
                let request = CreateRequest {
                    organization_id: self.organization_id.clone(),
                    document_type: self.logical_identifier.clone(),
                    certificate_id: key.certificate_id.clone(),
                    purposes: key.purposes.clone(),
                    owner_id: self.owner_id.clone(),
                    services: self.draft.service.clone().unwrap_or_default(),
                    keys: vec![key.jwk.clone()],
                };
                self.state = SubmissionState::Executing;
                tracing::debug!(identifier = %self.logical_identifier, "creating DID");
                registrar.create_did(&request).await
            }
            SessionMode::Update => {
                if self.draft.id.is_empty() {
                    tracerr!(Err::Validation, "compiled draft carries no DID to update");
                }
                let did = self.draft.id.clone();
                let request = RotateRequest {
                    certificate_id: key.certificate_id.clone(),
                    purposes: key.purposes.clone(),
                };
                self.state = SubmissionState::Executing;
                tracing::debug!(%did, "rotating DID key");
                registrar.rotate_key(&did, &request).await
            }
            SessionMode::Resolve => {
                tracerr!(Err::Validation, "a resolve session cannot be executed");
            }
        };

        match result {
            Ok(envelope) => {
                if envelope.did_state.state == StateType::Error {
                    let reason = envelope
                        .did_state
                        .reason
                        .clone()
                        .unwrap_or_else(|| "registrar reported an unspecified error".to_string());
                    self.last_response = Some(envelope);
                    self.fail(reason.clone());
                    tracerr!(Err::Registrar, "{}", reason);
                }
                self.last_response = Some(envelope);
                self.state = SubmissionState::Succeeded;
                tracing::debug!("DID operation succeeded");
                Ok(())
            }
            Err(e) => {
                self.fail(e.to_string());
                Err(e)
            }
        }
    }

    /// Resolve a DID in the given environment. Passthrough; does not affect submission state.
    ///
    /// # Errors
    ///
    /// * `Err::NotFound` - No document exists for the identifier.
    /// * `Err::RequestError` - The registrar could not be reached.
    pub async fn resolve(
        &self, registrar: &impl Registrar, identifier: &str, environment: Environment,
    ) -> Result<ResolutionResponse> {
        registrar.resolve_did(identifier, environment).await
    }

    // The purposes to submit: the ingested key's filtered set when a key is present,
    // otherwise the raw selection.
    fn effective_purposes(&self) -> Vec<KeyPurpose> {
        self.key
            .as_ref()
            .map_or_else(|| self.selected_purposes.clone(), |k| k.purposes.clone())
    }

    // Record an edit: a compiled or failed session drops back to editing and the active
    // error is cleared.
    fn edited(&mut self) {
        if !matches!(self.state, SubmissionState::Compiling | SubmissionState::Executing) {
            self.state = SubmissionState::Editing;
        }
        self.last_error = None;
    }

    fn fail(&mut self, reason: String) {
        tracing::debug!(%reason, "session failed");
        self.last_error = Some(reason);
        self.state = SubmissionState::Failed;
    }
}
