//! Publication and deactivation of already-created DIDs.
//!
//! Publishing to production is a privileged operation. A caller with direct publish rights
//! calls the registrar straight away; otherwise a [`PublishRequest`] is raised and decided
//! exactly once by a reviewer in an external approval workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Err;
use crate::registrar::{DeactivationReceipt, DidStateEnvelope, Environment, Registrar};
use crate::{tracerr, Result};

/// Status of a publish request.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PublishStatus {
    /// Awaiting a reviewer decision.
    #[default]
    Pending,
    /// Approved by a reviewer. Final.
    Approved,
    /// Rejected by a reviewer. Final.
    Rejected,
}

/// A request to publish a DID document version, raised when the caller lacks direct publish
/// rights. Transitions to approved or rejected exactly once and is immutable thereafter.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    /// The DID to publish.
    pub did: String,
    /// Document version to publish. When unset the registrar publishes the latest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Target environment.
    pub environment: Environment,
    /// Current status.
    pub status: PublishStatus,
    /// User that raised the request.
    pub requested_by: String,
    /// Reviewer that decided the request, once decided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<String>,
    /// Reviewer note accompanying the decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// When the request was raised.
    pub requested_at: DateTime<Utc>,
    /// When the request was decided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
}

impl PublishRequest {
    /// Raise a pending request to publish a DID to production.
    #[must_use]
    pub fn new(did: &str, version: Option<u32>, requested_by: &str) -> Self {
        Self {
            did: did.to_string(),
            version,
            environment: Environment::Prod,
            status: PublishStatus::Pending,
            requested_by: requested_by.to_string(),
            decided_by: None,
            note: None,
            requested_at: Utc::now(),
            decided_at: None,
        }
    }

    /// Approve the request.
    ///
    /// # Errors
    ///
    /// * `Err::Validation` - The request was already decided, or the reviewer raised it.
    pub fn approve(&mut self, reviewer: &str, note: Option<&str>) -> Result<()> {
        self.decide(PublishStatus::Approved, reviewer, note)
    }

    /// Reject the request.
    ///
    /// # Errors
    ///
    /// * `Err::Validation` - The request was already decided, or the reviewer raised it.
    pub fn reject(&mut self, reviewer: &str, note: Option<&str>) -> Result<()> {
        self.decide(PublishStatus::Rejected, reviewer, note)
    }

    fn decide(&mut self, status: PublishStatus, reviewer: &str, note: Option<&str>) -> Result<()> {
        if self.status != PublishStatus::Pending {
            tracerr!(Err::Validation, "publish request for {} is already decided", self.did);
        }
        if reviewer == self.requested_by {
            tracerr!(Err::Validation, "a publish request cannot be decided by its requester");
        }
        self.status = status;
        self.decided_by = Some(reviewer.to_string());
        self.note = note.map(ToString::to_string);
        self.decided_at = Some(Utc::now());
        Ok(())
    }
}

/// Publish a DID document version directly. When `version` is omitted the registrar publishes
/// the latest; version numbers are never computed on the client.
///
/// # Errors
///
/// * `Err::Registrar` - The registrar rejected the publication.
pub async fn publish(
    registrar: &impl Registrar, did: &str, version: Option<u32>,
) -> Result<DidStateEnvelope> {
    tracing::debug!(%did, ?version, "publishing DID");
    registrar.publish_did(did, version).await
}

/// Deactivate a DID. A deactivated DID is no longer valid and cannot be resolved.
///
/// # Errors
///
/// * `Err::Registrar` - The registrar rejected the deactivation or did not confirm it.
pub async fn deactivate(registrar: &impl Registrar, did: &str) -> Result<DeactivationReceipt> {
    tracing::debug!(%did, "deactivating DID");
    let receipt = registrar.deactivate_did(did).await?;
    if !receipt.deactivated {
        tracerr!(Err::Registrar, "registrar did not confirm deactivation of {}", did);
    }
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_is_one_shot() {
        let mut request = PublishRequest::new("did:web:example.com:orders-api", None, "user-1");
        assert_eq!(request.status, PublishStatus::Pending);

        request.approve("reviewer-1", Some("looks good")).expect("approve failed");
        assert_eq!(request.status, PublishStatus::Approved);
        assert_eq!(request.decided_by.as_deref(), Some("reviewer-1"));
        assert!(request.decided_at.is_some());

        let err = request.reject("reviewer-2", None).expect_err("expected error");
        assert!(err.is(Err::Validation));
        assert_eq!(request.status, PublishStatus::Approved);
    }

    #[test]
    fn rejection_is_final() {
        let mut request = PublishRequest::new("did:web:example.com:orders-api", Some(3), "user-1");
        request.reject("reviewer-1", Some("key not approved")).expect("reject failed");

        let err = request.approve("reviewer-1", None).expect_err("expected error");
        assert!(err.is(Err::Validation));
        assert_eq!(request.status, PublishStatus::Rejected);
        assert_eq!(request.note.as_deref(), Some("key not approved"));
    }

    #[test]
    fn requester_cannot_self_review() {
        let mut request = PublishRequest::new("did:web:example.com:orders-api", None, "user-1");
        let err = request.approve("user-1", None).expect_err("expected error");
        assert!(err.is(Err::Validation));
        assert_eq!(request.status, PublishStatus::Pending);
    }

    #[test]
    fn status_wire_form() {
        assert_eq!(
            serde_json::to_value(PublishStatus::Pending).expect("serialize"),
            serde_json::json!("PENDING")
        );
        assert_eq!(
            serde_json::to_value(PublishStatus::Approved).expect("serialize"),
            serde_json::json!("APPROVED")
        );
    }
}
