use crate::config::{AuthConfig, Config, HttpConfig};
use crate::{Error, Result};
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const USER_AGENT: &str = concat!("altpub/", env!("CARGO_PKG_VERSION"));

/// Authenticated session against the store developer API
pub struct StoreClient {
    base_url: String,
    client: Client,
    retry: RetryPolicy,
    request_timeout: Duration,
    transfer_timeout: Duration,
}

/// Payload for `POST /apps`
#[derive(Debug, Clone, Serialize)]
pub struct AppPayload {
    pub title: String,
    pub description: String,
    pub details: String,
    pub bundle_id: String,
    pub categories: Vec<u64>,
    pub platforms: Vec<u64>,
    pub price: u32,
    pub version: String,
    pub changelog: String,
    pub file_size: String,
}

/// Payload for `POST /apps/{id}/versions`
#[derive(Debug, Clone, Serialize)]
pub struct VersionPayload {
    pub version: String,
    pub changelog: String,
    pub file_size: String,
}

/// Payload for `POST /upload/initiate`
#[derive(Debug, Clone, Serialize)]
pub struct InitiateUpload {
    pub filename: String,
    pub total_size: u64,
    pub total_chunks: u64,
    pub chunk_size: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedId {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataResponse {
    #[serde(default)]
    pub categories: Vec<NamedId>,
    #[serde(default)]
    pub platforms: Vec<NamedId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DestinationApp {
    pub id: u64,
    pub title: String,
    #[serde(default = "default_status")]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DestinationVersion {
    pub id: u64,
    pub version: String,
    #[serde(default = "default_status")]
    pub status: String,
}

/// Result of attaching a finalized upload to a version
#[derive(Debug, Clone, Deserialize)]
pub struct BinaryAttachment {
    #[serde(default = "default_version_status")]
    pub version_status: String,
    #[serde(default = "default_upload_method")]
    pub upload_method: String,
}

impl Default for BinaryAttachment {
    fn default() -> Self {
        Self {
            version_status: default_version_status(),
            upload_method: default_upload_method(),
        }
    }
}

impl BinaryAttachment {
    pub fn is_approved(&self) -> bool {
        self.version_status == "approved"
    }
}

fn default_status() -> String {
    "pending".to_string()
}

fn default_version_status() -> String {
    "unknown".to_string()
}

fn default_upload_method() -> String {
    "chunked_path".to_string()
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct InitiateResponse {
    upload_id: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FinalizeResponse {
    final_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AttachResponse {
    #[serde(default)]
    data: Option<BinaryAttachment>,
}

/// Bounded exponential backoff for calls that are safe to repeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(http: &HttpConfig) -> Self {
        Self {
            max_retries: http.max_retries,
            base_delay: Duration::from_millis(http.retry_base_delay_ms),
            max_delay: Duration::from_millis(http.retry_max_delay_ms),
        }
    }

    /// A policy that sends exactly once
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Send the request built by `build`, rebuilding it for every attempt
    ///
    /// Connection failures, timeouts, 429 and 5xx responses are retried. The
    /// last response is returned as-is so callers can report its status.
    pub fn send<F>(&self, context: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let can_retry = attempt < self.max_retries;
            match build().send() {
                Ok(response) if can_retry && is_transient_status(response.status()) => {
                    let delay = self.delay_for(attempt);
                    eprintln!(
                        "  ⚠ {} returned HTTP {}, retrying in {}ms ({}/{})",
                        context,
                        response.status().as_u16(),
                        delay.as_millis(),
                        attempt + 1,
                        self.max_retries
                    );
                    std::thread::sleep(delay);
                }
                Ok(response) => return Ok(response),
                Err(e) if can_retry && is_transient_error(&e) => {
                    let delay = self.delay_for(attempt);
                    eprintln!(
                        "  ⚠ {} failed ({}), retrying in {}ms ({}/{})",
                        context,
                        e,
                        delay.as_millis(),
                        attempt + 1,
                        self.max_retries
                    );
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(request_error(context, e)),
            }
            attempt += 1;
        }
    }
}

pub fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn is_transient_error(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout()
}

/// Map a transport failure; connect failures and timeouts are [`Error::Network`]
pub(crate) fn request_error(context: &str, e: reqwest::Error) -> Error {
    let body = if e.is_connect() {
        format!(
            "cannot connect to {}\n\
             Please check your network connection and the configured URL.",
            e.url().map(|u| u.as_str()).unwrap_or("server")
        )
    } else if e.is_timeout() {
        "request timed out".to_string()
    } else {
        return Error::Http(e);
    };

    Error::Network {
        context: context.to_string(),
        status: None,
        body,
    }
}

/// Fail with [`Error::Network`] unless the status is one of `expected`
pub fn expect_status(response: Response, expected: &[u16], context: &str) -> Result<Response> {
    let status = response.status().as_u16();
    if expected.contains(&status) {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    Err(Error::Network {
        context: context.to_string(),
        status: Some(status),
        body,
    })
}

pub fn parse_json<T: DeserializeOwned>(response: Response, context: &str) -> Result<T> {
    response
        .json()
        .map_err(|e| Error::MalformedResponse(format!("{}: {}", context, e)))
}

/// Unauthenticated client for the catalog and package downloads
pub fn build_http_client(http: &HttpConfig) -> Result<Client> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(http.connect_timeout())
        .timeout(http.transfer_timeout())
        .build()?)
}

impl StoreClient {
    pub fn new(base_url: &str, token: &str, http: &HttpConfig) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&AuthConfig::format_auth_header(token))
            .map_err(|_| Error::InvalidConfig("API token contains invalid characters".to_string()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .connect_timeout(http.connect_timeout())
            .timeout(http.request_timeout())
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            retry: RetryPolicy::from_config(http),
            request_timeout: http.request_timeout(),
            transfer_timeout: http.transfer_timeout(),
        })
    }

    pub fn from_config(config: &Config, token: &str) -> Result<Self> {
        Self::new(&config.api.base_url, token, &config.http)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET /metadata`, doubling as the credential probe
    pub fn get_metadata(&self) -> Result<MetadataResponse> {
        let url = self.url("/metadata");
        let response = self
            .retry
            .send("Metadata request", || self.client.get(&url))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::Auth {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let envelope: Envelope<MetadataResponse> = parse_json(response, "metadata")?;
        Ok(envelope.data)
    }

    /// `POST /apps`; not retried since a repeat would create a duplicate
    pub fn create_app(&self, payload: &AppPayload) -> Result<DestinationApp> {
        let response = self
            .client
            .post(self.url("/apps"))
            .json(payload)
            .send()
            .map_err(|e| request_error("Create app", e))?;

        let response = expect_status(response, &[201], "Create app")?;
        let envelope: Envelope<DestinationApp> = parse_json(response, "create app")?;
        Ok(envelope.data)
    }

    pub fn create_version(&self, app_id: u64, payload: &VersionPayload) -> Result<DestinationVersion> {
        let response = self
            .client
            .post(self.url(&format!("/apps/{}/versions", app_id)))
            .json(payload)
            .send()
            .map_err(|e| request_error("Create version", e))?;

        let response = expect_status(response, &[201], "Create version")?;
        let envelope: Envelope<DestinationVersion> = parse_json(response, "create version")?;
        Ok(envelope.data)
    }

    /// Start a chunked upload and return its upload id
    pub fn initiate_upload(&self, request: &InitiateUpload) -> Result<String> {
        let url = self.url("/upload/initiate");
        let response = self
            .retry
            .send("Initiate upload", || self.client.post(&url).json(request))?;

        let response = expect_status(response, &[200], "Initiate upload")?;
        let body: InitiateResponse = parse_json(response, "initiate upload")?;

        match body.upload_id {
            Some(serde_json::Value::String(id)) if !id.is_empty() => Ok(id),
            Some(serde_json::Value::Number(id)) => Ok(id.to_string()),
            _ => Err(Error::MalformedResponse(
                "initiate upload response has no upload_id".to_string(),
            )),
        }
    }

    /// Send one chunk; never retried
    pub fn upload_chunk(&self, upload_id: &str, chunk_number: u64, bytes: Vec<u8>) -> Result<()> {
        let form = multipart::Form::new()
            .part(
                "chunk",
                multipart::Part::bytes(bytes).file_name(format!("chunk_{}", chunk_number)),
            )
            .text("chunk_number", chunk_number.to_string());

        let context = format!("Upload chunk {}", chunk_number);
        let response = self
            .client
            .post(self.url(&format!("/upload/{}/chunk", urlencoding::encode(upload_id))))
            .timeout(self.transfer_timeout)
            .multipart(form)
            .send()
            .map_err(|e| request_error(&context, e))?;

        expect_status(response, &[200], &context)?;
        Ok(())
    }

    /// Assemble the uploaded chunks and return the server-side path
    pub fn finalize_upload(&self, upload_id: &str) -> Result<String> {
        let url = self.url(&format!("/upload/{}/finalize", urlencoding::encode(upload_id)));
        let response = self.retry.send("Finalize upload", || {
            self.client
                .post(&url)
                .timeout(self.transfer_timeout.max(self.request_timeout))
                .json(&serde_json::json!({}))
        })?;

        let response = expect_status(response, &[200], "Finalize upload")?;
        let body: FinalizeResponse = parse_json(response, "finalize upload")?;

        body.final_path
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                Error::MalformedResponse("finalize upload response has no final_path".to_string())
            })
    }

    /// Link a finalized upload to a version
    pub fn attach_binary(
        &self,
        app_id: u64,
        version_id: u64,
        final_path: &str,
    ) -> Result<BinaryAttachment> {
        let url = self.url(&format!("/apps/{}/versions/{}/binary", app_id, version_id));
        let payload = serde_json::json!({ "chunked_upload_path": final_path });
        let response = self
            .retry
            .send("Attach binary", || self.client.post(&url).json(&payload))?;

        let response = expect_status(response, &[200], "Attach binary")?;
        let body: AttachResponse = parse_json(response, "attach binary")?;
        Ok(body.data.unwrap_or_default())
    }

    pub fn upload_icon(&self, app_id: u64, icon_path: &Path) -> Result<()> {
        let bytes = std::fs::read(icon_path)?;
        let file_name = icon_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "icon.png".to_string());

        let form = multipart::Form::new().part("image", multipart::Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(self.url(&format!("/apps/{}/icon", app_id)))
            .timeout(self.transfer_timeout)
            .multipart(form)
            .send()
            .map_err(|e| request_error("Upload icon", e))?;

        expect_status(response, &[200, 201], "Upload icon")?;
        Ok(())
    }
}
