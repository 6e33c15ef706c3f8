//! SagemakerRuntimeClient -- [`InferenceEndpoint`] over the SageMaker Runtime
//! `InvokeEndpoint` HTTP API.
//!
//! Requests are signed with SigV4 using credentials resolved once at
//! construction. Credentials never appear in logs or `Debug` output.

use std::time::Duration;

use chrono::Utc;
use colloquy_core::embedding::endpoint::InferenceEndpoint;
use colloquy_types::config::EmbeddingsConfig;
use colloquy_types::embedding::{EndpointError, InvokeRequest};
use serde_json::{Map, Value};

use super::credentials::{AwsCredentials, resolve_credentials, resolve_region};
use super::sigv4::SigningInput;

/// Signing name of the runtime API.
const SERVICE: &str = "sagemaker";

/// Longest endpoint name SageMaker accepts.
const MAX_ENDPOINT_NAME_LEN: usize = 63;

/// Invocation options and the runtime headers they travel in.
const ENDPOINT_KWARG_HEADERS: &[(&str, &str)] = &[
    ("CustomAttributes", "X-Amzn-SageMaker-Custom-Attributes"),
    ("TargetModel", "X-Amzn-SageMaker-Target-Model"),
    ("TargetVariant", "X-Amzn-SageMaker-Target-Variant"),
    ("TargetContainerHostname", "X-Amzn-SageMaker-Target-Container-Hostname"),
    ("InferenceId", "X-Amzn-SageMaker-Inference-Id"),
    ("EnableExplanations", "X-Amzn-SageMaker-Enable-Explanations"),
    ("InferenceComponentName", "X-Amzn-SageMaker-Inference-Component"),
    ("SessionId", "X-Amzn-SageMaker-Session-Id"),
];

/// HTTP client for hosted SageMaker endpoints.
pub struct SagemakerRuntimeClient {
    http: reqwest::Client,
    region: String,
    base_url: String,
    credentials: AwsCredentials,
}

impl SagemakerRuntimeClient {
    pub fn new(
        region: impl Into<String>,
        credentials: AwsCredentials,
        timeout: Duration,
    ) -> Result<Self, EndpointError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EndpointError::Http(format!("failed to create HTTP client: {e}")))?;
        let region = region.into();
        let base_url = format!("https://runtime.sagemaker.{region}.amazonaws.com");

        Ok(Self {
            http,
            region,
            base_url,
            credentials,
        })
    }

    /// Build a client from the `[embeddings]` config section.
    ///
    /// Resolves the region and credentials from the environment when the
    /// config leaves them out.
    pub async fn from_config(config: &EmbeddingsConfig) -> Result<Self, EndpointError> {
        let region = resolve_region(config.region.as_deref())?;
        let credentials = resolve_credentials(config.credentials_profile.as_deref()).await?;
        let client = Self::new(region, credentials, Duration::from_secs(config.timeout_secs))?;

        Ok(match &config.endpoint_url {
            Some(url) => client.with_base_url(url.clone()),
            None => client,
        })
    }

    /// Point the client at a different runtime host (VPC endpoints, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn invocation_url(&self, endpoint_name: &str) -> String {
        format!("{}/endpoints/{endpoint_name}/invocations", self.base_url)
    }
}

/// SageMaker endpoint names: 1-63 alphanumerics or hyphens, with no hyphen
/// at either end.
pub fn validate_endpoint_name(name: &str) -> Result<(), EndpointError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_ENDPOINT_NAME_LEN
        && !name.starts_with('-')
        && !name.ends_with('-')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');

    if valid {
        Ok(())
    } else {
        Err(EndpointError::InvalidRequest(format!(
            "invalid endpoint name '{name}'"
        )))
    }
}

/// Translate endpoint kwargs into runtime request headers.
pub fn endpoint_headers(kwargs: &Map<String, Value>) -> Result<Vec<(String, String)>, EndpointError> {
    let mut headers = Vec::with_capacity(kwargs.len());
    for (key, value) in kwargs {
        let header = ENDPOINT_KWARG_HEADERS
            .iter()
            .find(|(kwarg, _)| kwarg == key)
            .map(|(_, header)| *header)
            .ok_or_else(|| {
                EndpointError::InvalidRequest(format!("unsupported endpoint option '{key}'"))
            })?;

        let value = match value {
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            _ => {
                return Err(EndpointError::InvalidRequest(format!(
                    "endpoint option '{key}' must be a string, number or boolean"
                )));
            }
        };
        headers.push((header.to_string(), value));
    }
    Ok(headers)
}

/// Pull a readable message out of an error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("Message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

impl InferenceEndpoint for SagemakerRuntimeClient {
    async fn invoke(&self, request: InvokeRequest<'_>) -> Result<Vec<u8>, EndpointError> {
        validate_endpoint_name(request.endpoint_name)?;

        let url_string = self.invocation_url(request.endpoint_name);
        let url = reqwest::Url::parse(&url_string)
            .map_err(|e| EndpointError::InvalidRequest(format!("invalid URL {url_string}: {e}")))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(EndpointError::InvalidRequest(format!(
                    "URL has no host: {url_string}"
                )));
            }
        };

        let mut headers = vec![
            ("Content-Type".to_string(), request.content_type.to_string()),
            ("Accept".to_string(), request.accept.to_string()),
        ];
        headers.extend(endpoint_headers(request.endpoint_kwargs)?);

        let signed = self.credentials.signer(&self.region, SERVICE).sign(
            &SigningInput {
                method: "POST",
                host: &host,
                path: url.path(),
                query: url.query().unwrap_or(""),
                headers: &headers,
                payload: &request.body,
            },
            Utc::now(),
        );

        tracing::debug!(
            url = %url,
            endpoint = request.endpoint_name,
            bytes = request.body.len(),
            "SageMaker invoke request"
        );

        let mut builder = self
            .http
            .post(url)
            .header("x-amz-date", &signed.amz_date)
            .header("authorization", &signed.authorization);
        if let Some(token) = &signed.security_token {
            builder = builder.header("x-amz-security-token", token);
        }
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .body(request.body)
            .send()
            .await
            .map_err(|e| EndpointError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), endpoint = request.endpoint_name, "SageMaker invoke failed");
            return Err(EndpointError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| EndpointError::Http(format!("failed to read response body: {e}")))?;
        Ok(bytes.to_vec())
    }
}
