//! services/portal/src/adapters/http.rs
//!
//! The HTTP adapter, the concrete implementation of the `PortalApi` port.
//!
//! Every request goes through `send`, which attaches the bearer token from the
//! shared `SessionContext` and inspects the response. A 401 tears the session
//! down (once); other failures are logged by class. The error is always handed
//! back to the caller.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::DateTime;
use portal_core::domain::{
    parse_timestamp, Credentials, Document, LoginGrant, UserProfile, VoucherStatusReport,
};
use portal_core::ports::{PortError, PortResult, PortalApi};
use portal_core::SessionContext;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::config::Config;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `PortalApi` port over HTTP/JSON.
#[derive(Clone)]
pub struct HttpPortalAdapter {
    client: Client,
    base_url: Url,
    session: Arc<SessionContext>,
}

impl HttpPortalAdapter {
    /// Creates a new `HttpPortalAdapter` with the configured base URL and deadline.
    pub fn new(config: &Config, session: Arc<SessionContext>) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            session,
        })
    }

    /// Public URL of a document download, for display.
    pub fn document_url(&self, filename: &str) -> PortResult<Url> {
        self.endpoint(&["api", "docs", "file", filename])
    }

    /// Joins path segments onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> PortResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PortError::Unexpected("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends a request with the session's bearer token and inspects the answer.
    async fn send(&self, request: RequestBuilder) -> PortResult<Response> {
        let request = match self.session.token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                error!("Network error: request timed out ({})", e);
            } else {
                error!("Network error: No response from server ({})", e);
            }
            PortError::Network(e.to_string())
        })?;

        if response.status().is_success() {
            return Ok(response);
        }
        Err(self.inspect_failure(response).await)
    }

    /// Classifies a non-success response, logging it the way its class deserves.
    async fn inspect_failure(&self, response: Response) -> PortError {
        let status = response.status();
        let url = response.url().to_string();
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message);

        match status {
            StatusCode::UNAUTHORIZED => {
                match self.session.expire().await {
                    Ok(true) => warn!("Unauthorized: session cleared, returning to login"),
                    Ok(false) => debug!("Unauthorized response with no active session"),
                    Err(e) => error!("Failed to clear session after 401: {}", e),
                }
                PortError::Unauthorized(message)
            }
            StatusCode::FORBIDDEN => {
                error!("Access forbidden");
                PortError::Forbidden(message)
            }
            StatusCode::NOT_FOUND => {
                error!("Resource not found");
                PortError::NotFound(url)
            }
            StatusCode::INTERNAL_SERVER_ERROR => {
                error!("Server error occurred");
                PortError::Rejected {
                    status: status.as_u16(),
                    message,
                }
            }
            _ => {
                error!(
                    "Error {}: {}",
                    status.as_u16(),
                    message.as_deref().unwrap_or("Unknown error")
                );
                PortError::Rejected {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> PortResult<T> {
        let response = self.send(self.client.get(url)).await?;
        decode(response).await
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> PortResult<T> {
        let response = self.send(self.client.post(url).json(body)).await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> PortResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| PortError::InvalidResponse(e.to_string()))
}

//=========================================================================================
// Wire Payloads
//=========================================================================================

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: Option<String>,
    user: Option<Value>,
}

#[derive(Deserialize)]
struct UserPayload {
    name: Option<String>,
    email: Option<String>,
}

impl LoginResponse {
    fn to_domain(self) -> LoginGrant {
        // A `user` that is not an object is treated as absent.
        let user = self
            .user
            .and_then(|value| serde_json::from_value::<UserPayload>(value).ok())
            .map(|user| UserProfile {
                name: user.name.unwrap_or_default(),
                email: user.email.unwrap_or_default(),
            });
        LoginGrant {
            token: self.token,
            user,
        }
    }
}

#[derive(Deserialize)]
struct DocsResponse {
    docs: Option<Vec<DocumentPayload>>,
}

#[derive(Deserialize)]
struct DocumentPayload {
    #[serde(rename = "_id")]
    id: Option<String>,
    title: Option<String>,
    originalname: Option<String>,
    filename: Option<String>,
    #[serde(rename = "uploadDate")]
    upload_date: Option<String>,
}

impl DocumentPayload {
    fn to_domain(self) -> Document {
        let filename = self.filename.unwrap_or_default();
        let title = [self.title, self.originalname]
            .into_iter()
            .flatten()
            .find(|title| !title.trim().is_empty())
            .unwrap_or_else(|| "Untitled Document".to_string());
        Document {
            id: self.id.unwrap_or_else(|| filename.clone()),
            title,
            upload_date: self.upload_date.as_deref().and_then(parse_timestamp),
            filename,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoucherStatusPayload {
    status: Option<String>,
    email: Option<String>,
    code: Option<String>,
    submitted_at: Option<Value>,
    verified: Option<bool>,
}

impl VoucherStatusPayload {
    fn to_domain(self) -> VoucherStatusReport {
        // Timestamps arrive as ISO strings; epoch milliseconds are accepted too.
        let submitted_at = match self.submitted_at {
            Some(Value::String(raw)) => Some(raw),
            Some(Value::Number(millis)) => millis
                .as_i64()
                .and_then(DateTime::from_timestamp_millis)
                .map(|at| at.to_rfc3339()),
            _ => None,
        };
        VoucherStatusReport {
            status: self.status,
            email: self.email,
            code: self.code,
            submitted_at,
            verified: self.verified.unwrap_or(false),
        }
    }
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    email: &'a str,
    code: &'a str,
}

#[derive(Deserialize)]
struct SubmitResponse {
    verified: Option<Value>,
}

//=========================================================================================
// `PortalApi` Trait Implementation
//=========================================================================================

#[async_trait]
impl PortalApi for HttpPortalAdapter {
    async fn login(&self, credentials: &Credentials) -> PortResult<LoginGrant> {
        let url = self.endpoint(&["api", "auth", "login"])?;
        let body = LoginRequest {
            email: &credentials.email,
            password: &credentials.password,
        };
        let response: LoginResponse = self.post_json(url, &body).await?;
        Ok(response.to_domain())
    }

    async fn list_documents(&self) -> PortResult<Vec<Document>> {
        let url = self.endpoint(&["api", "docs"])?;
        let response: DocsResponse = self.get_json(url).await?;
        Ok(response
            .docs
            .unwrap_or_default()
            .into_iter()
            .map(DocumentPayload::to_domain)
            .collect())
    }

    async fn download_document(&self, filename: &str) -> PortResult<Bytes> {
        let url = self.document_url(filename)?;
        let response = self.send(self.client.get(url)).await?;
        response
            .bytes()
            .await
            .map_err(|e| PortError::Network(e.to_string()))
    }

    async fn voucher_status(&self, email: &str) -> PortResult<VoucherStatusReport> {
        let url = self.endpoint(&["api", "voucher", "status", email])?;
        let response: VoucherStatusPayload = self.get_json(url).await?;
        Ok(response.to_domain())
    }

    async fn submit_voucher(&self, email: &str, code: &str) -> PortResult<bool> {
        let url = self.endpoint(&["api", "voucher", "submit"])?;
        let response: SubmitResponse = self.post_json(url, &SubmitRequest { email, code }).await?;
        // Only a literal `true` counts.
        Ok(matches!(response.verified, Some(Value::Bool(true))))
    }
}
