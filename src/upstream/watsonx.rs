//! Hosted-model text generation client.
//! Connection pooling via reqwest, IAM bearer token exchange with caching,
//! and a hard request timeout at this boundary.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{GenerationResult, Generator};
use crate::config::{GenerationParams, UpstreamConfig};
use crate::error::UpstreamError;

const IAM_TOKEN_URL: &str = "https://iam.cloud.ibm.com/identity/token";
const API_VERSION: &str = "2023-05-29";
/// Refresh the bearer token this long before it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

struct BearerToken {
    value: String,
    expires_at: Instant,
}

pub struct WatsonxClient {
    http: reqwest::Client,
    config: UpstreamConfig,
    token: tokio::sync::Mutex<Option<BearerToken>>,
}

impl WatsonxClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(config.request_timeout)
            .build()?;

        info!(model = %config.model_id, region = %config.region, "generation client initialized");

        Ok(Self {
            http,
            config,
            token: tokio::sync::Mutex::new(None),
        })
    }

    fn generation_url(&self) -> String {
        format!(
            "{}/ml/v1/text/generation?version={API_VERSION}",
            self.config.endpoint()
        )
    }

    /// Return a valid bearer token, exchanging the API key when the cached one is stale.
    async fn bearer_token(&self) -> Result<String, UpstreamError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
        }

        debug!("exchanging API key for IAM token");
        let response = self
            .http
            .post(IAM_TOKEN_URL)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", "urn:ibm:params:oauth:grant-type:apikey"),
                ("apikey", self.config.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Auth(format!(
                "token exchange returned {status}: {}",
                truncate(&body, 200)
            )));
        }

        let issued: IamToken = response.json().await?;
        let value = issued.access_token.clone();
        *cached = Some(BearerToken {
            value: issued.access_token,
            expires_at: Instant::now() + Duration::from_secs(issued.expires_in),
        });
        Ok(value)
    }
}

#[async_trait]
impl Generator for WatsonxClient {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<GenerationResult, UpstreamError> {
        let token = self.bearer_token().await?;
        let body = GenerationRequest {
            model_id: &self.config.model_id,
            project_id: &self.config.project_id,
            input: prompt,
            parameters: Parameters {
                decoding_method: "sample",
                params,
            },
        };

        let response = self
            .http
            .post(self.generation_url())
            .bearer_auth(token)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::RateLimited(truncate(&body, 200)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: truncate(&body, 200),
            });
        }

        let document: serde_json::Value = response.json().await?;
        Ok(GenerationResult::Structured(document))
    }

    fn model_name(&self) -> &str {
        &self.config.model_id
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

// --- Wire types ---

#[derive(Serialize)]
struct GenerationRequest<'a> {
    model_id: &'a str,
    project_id: &'a str,
    input: &'a str,
    parameters: Parameters<'a>,
}

#[derive(Serialize)]
struct Parameters<'a> {
    decoding_method: &'static str,
    #[serde(flatten)]
    params: &'a GenerationParams,
}

#[derive(Deserialize)]
struct IamToken {
    access_token: String,
    expires_in: u64,
}
