//! HTTP implementation of the registrar client contract.

use std::fmt::Display;
use std::time::Duration;

use reqwest::{multipart, Response, Url};
use serde::{Deserialize, Serialize};

use crate::certificate::CertificateUpload;
use crate::error::Err;
use crate::registrar::{
    CertificateResponse, CreateRequest, DeactivationReceipt, DidStateEnvelope, Environment,
    PreviewRequest, Registrar, ResolutionResponse, RotateRequest,
};
use crate::{tracerr, Result};

/// Default bound on any registrar call. A timed-out call surfaces as `Err::RequestError` so a
/// session is never left waiting indefinitely.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// Error response returned by the registrar API. Allow dead code because we can't control the
// struct coming from the API but don't use all the fields.
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct ErrorResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorResponseDetail>,
}

// Error details in the error response.
#[derive(Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct ErrorResponseDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl Display for ErrorResponseDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        serde_json::to_string(self).map_err(|_| std::fmt::Error)?.fmt(f)
    }
}

/// Registrar client that talks to a remote registrar service over HTTP.
pub struct HttpRegistrar {
    base_url: String,
    /// Reusable HTTP client
    http_client: reqwest::Client,
}

impl HttpRegistrar {
    /// Constructor with the default request timeout.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Constructor with an explicit request timeout.
    #[must_use]
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .expect("failed to create HTTP client.");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!("{}/{}", self.base_url, path))?)
    }

    fn certificate_form(upload: &CertificateUpload) -> multipart::Form {
        let mut form = multipart::Form::new()
            .text("organizationId", upload.organization_id.clone())
            .text("format", upload.format.to_string())
            .part("file", multipart::Part::bytes(upload.file.clone()).file_name("certificate"));
        if let Some(password) = &upload.password {
            form = form.text("password", password.clone());
        }
        if let Some(id) = &upload.certificate_id {
            form = form.text("certificateId", id.clone());
        }
        form
    }
}

impl Registrar for HttpRegistrar {
    async fn preview_did(&self, request: &PreviewRequest) -> Result<DidStateEnvelope> {
        let url = self.endpoint("dids/preview")?;
        let res = match self.http_client.post(url).json(request).send().await {
            Ok(v) => v,
            Err(e) => tracerr!(Err::RequestError, "failed to call DID preview: {}", e),
        };
        unpack_response(res, Err::Registrar).await
    }

    async fn create_did(&self, request: &CreateRequest) -> Result<DidStateEnvelope> {
        let url = self.endpoint("dids")?;
        let res = match self.http_client.post(url).json(request).send().await {
            Ok(v) => v,
            Err(e) => tracerr!(Err::RequestError, "failed to call DID create: {}", e),
        };
        unpack_response(res, Err::Registrar).await
    }

    async fn rotate_key(&self, did: &str, request: &RotateRequest) -> Result<DidStateEnvelope> {
        let url = self.endpoint(&format!("dids/{did}/rotate"))?;
        let res = match self.http_client.post(url).json(request).send().await {
            Ok(v) => v,
            Err(e) => tracerr!(Err::RequestError, "failed to call key rotation: {}", e),
        };
        unpack_response(res, Err::Registrar).await
    }

    async fn publish_did(&self, did: &str, version: Option<u32>) -> Result<DidStateEnvelope> {
        let mut url = self.endpoint(&format!("dids/{did}/publish"))?;
        // When no version is given the registrar publishes the latest.
        if let Some(version) = version {
            url.query_pairs_mut().append_pair("version", &version.to_string());
        }
        let res = match self.http_client.post(url).send().await {
            Ok(v) => v,
            Err(e) => tracerr!(Err::RequestError, "failed to call DID publish: {}", e),
        };
        unpack_response(res, Err::Registrar).await
    }

    async fn deactivate_did(&self, did: &str) -> Result<DeactivationReceipt> {
        let url = self.endpoint(&format!("dids/{did}/deactivate"))?;
        let res = match self.http_client.post(url).send().await {
            Ok(v) => v,
            Err(e) => tracerr!(Err::RequestError, "failed to call DID deactivate: {}", e),
        };
        unpack_response(res, Err::Registrar).await
    }

    async fn resolve_did(
        &self, identifier: &str, environment: Environment,
    ) -> Result<ResolutionResponse> {
        let mut url = self.endpoint(&format!("dids/{identifier}"))?;
        url.query_pairs_mut().append_pair("environment", &environment.to_string());
        let res = match self.http_client.get(url).send().await {
            Ok(v) => v,
            Err(e) => tracerr!(Err::RequestError, "failed to call DID resolution: {}", e),
        };
        unpack_response(res, Err::NotFound).await
    }

    async fn preview_certificate(
        &self, upload: &CertificateUpload,
    ) -> Result<CertificateResponse> {
        let url = self.endpoint("certificates/preview")?;
        let form = Self::certificate_form(upload);
        let res = match self.http_client.post(url).multipart(form).send().await {
            Ok(v) => v,
            Err(e) => tracerr!(Err::RequestError, "failed to call certificate preview: {}", e),
        };
        unpack_response(res, Err::Upload).await
    }

    async fn upload_certificate(
        &self, upload: &CertificateUpload,
    ) -> Result<CertificateResponse> {
        let url = self.endpoint("certificates")?;
        let form = Self::certificate_form(upload);
        let res = match self.http_client.post(url).multipart(form).send().await {
            Ok(v) => v,
            Err(e) => tracerr!(Err::RequestError, "failed to call certificate upload: {}", e),
        };
        unpack_response(res, Err::Upload).await
    }
}

// Helper to unpack any response from the registrar API. A non-success status is reported under
// the supplied error code with the registrar's detail as context.
async fn unpack_response<T>(res: Response, code: Err) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    if res.status().is_success() {
        match res.json::<T>().await {
            Ok(obj) => Ok(obj),
            Err(e) => tracerr!(
                Err::DeserializationError,
                "failed to deserialize successful response: {}",
                e
            ),
        }
    } else {
        let status = res.status();
        match res.json::<ErrorResponse>().await {
            Ok(e) => match e.error {
                Some(e) => tracerr!(code, "{}", e),
                None => tracerr!(code, "error response ({}) but no detail provided", status),
            },
            Err(e) => tracerr!(
                Err::DeserializationError,
                "failed to deserialize error response: {}",
                e
            ),
        }
    }
}
