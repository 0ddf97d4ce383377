use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::config::AppConfig;
use crate::error::BridgeError;
use crate::protocol::gemini::{GenerateRequest, InlineData};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// HTTP client for the fixed target-protocol backend.
///
/// One instance is built at startup and shared by every request; it holds no
/// per-request state. The per-request credential travels as a call argument
/// and is forwarded as `x-goog-api-key`.
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    api_version: String,
    api_client: String,
}

fn build_http_client(config: &AppConfig) -> reqwest::Client {
    let pool_idle_timeout = if config.server.http_pool_idle_timeout_secs == 0 {
        None
    } else {
        Some(Duration::from_secs(config.server.http_pool_idle_timeout_secs))
    };

    let built = reqwest::Client::builder()
        .pool_max_idle_per_host(config.server.http_pool_max_idle_per_host.max(1))
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(config.server.timeout))
        .build();

    match built {
        Ok(client) => client,
        Err(err) => {
            tracing::error!(error = %err, "failed to build configured HTTP client, falling back to default client");
            reqwest::Client::new()
        }
    }
}

impl UpstreamClient {
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: build_http_client(config),
            base_url: config.upstream.base_url.trim_end_matches('/').to_string(),
            api_version: config.upstream.api_version.clone(),
            api_client: config.upstream.api_client.clone(),
        }
    }

    fn model_endpoint(&self, model: &str, action: &str, sse: bool) -> String {
        let mut url = String::with_capacity(
            self.base_url.len() + self.api_version.len() + model.len() + action.len() + 20,
        );
        url.push_str(&self.base_url);
        url.push('/');
        url.push_str(&self.api_version);
        url.push_str("/models/");
        url.push_str(model);
        url.push(':');
        url.push_str(action);
        if sse {
            url.push_str("?alt=sse");
        }
        url
    }

    fn post_json(&self, url: &str, credential: &str) -> reqwest::RequestBuilder {
        self.http
            .post(url)
            .header("x-goog-api-key", credential)
            .header("x-goog-api-client", &self.api_client)
            .header(http::header::CONTENT_TYPE, "application/json")
    }

    /// Call `models/{model}:generateContent` and return the response body.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Transport`] when the call itself fails,
    /// [`BridgeError::Upstream`] carrying the raw body for non-2xx statuses.
    pub async fn generate_content(
        &self,
        model: &str,
        credential: &str,
        request: &GenerateRequest,
    ) -> Result<bytes::Bytes, BridgeError> {
        let url = self.model_endpoint(model, "generateContent", false);
        let response = self
            .post_json(&url, credential)
            .json(request)
            .send()
            .await
            .map_err(|err| BridgeError::Transport(err.to_string()))?;
        Self::success_body(response).await
    }

    /// Call `models/{model}:streamGenerateContent?alt=sse` and return the
    /// response for stream reading.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Transport`] when the call itself fails,
    /// [`BridgeError::Upstream`] carrying the raw body for non-2xx statuses:
    /// an upstream rejection surfaces as a whole error response, never as a
    /// half-translated stream.
    pub async fn stream_generate_content(
        &self,
        model: &str,
        credential: &str,
        request: &GenerateRequest,
    ) -> Result<reqwest::Response, BridgeError> {
        let url = self.model_endpoint(model, "streamGenerateContent", true);
        let response = self
            .post_json(&url, credential)
            .json(request)
            .send()
            .await
            .map_err(|err| BridgeError::Transport(err.to_string()))?;
        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }
        Ok(response)
    }

    /// List backend models.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::generate_content`].
    pub async fn list_models(&self, credential: &str) -> Result<bytes::Bytes, BridgeError> {
        let url = format!("{}/{}/models", self.base_url, self.api_version);
        let response = self
            .http
            .get(&url)
            .header("x-goog-api-key", credential)
            .header("x-goog-api-client", &self.api_client)
            .send()
            .await
            .map_err(|err| BridgeError::Transport(err.to_string()))?;
        Self::success_body(response).await
    }

    /// Call `models/{model}:batchEmbedContents`.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::generate_content`].
    pub async fn batch_embed_contents(
        &self,
        model: &str,
        credential: &str,
        request: &serde_json::Value,
    ) -> Result<bytes::Bytes, BridgeError> {
        let url = self.model_endpoint(model, "batchEmbedContents", false);
        let response = self
            .post_json(&url, credential)
            .json(request)
            .send()
            .await
            .map_err(|err| BridgeError::Transport(err.to_string()))?;
        Self::success_body(response).await
    }

    /// GET a remote image and return it as base64 inline data, using the
    /// response's content type as the MIME type.
    ///
    /// # Errors
    ///
    /// [`BridgeError::FetchError`] for request failures and non-2xx statuses.
    pub async fn fetch_inline_data(&self, url: &str) -> Result<InlineData, BridgeError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| BridgeError::FetchError(format!("GET {url}: {err}")))?;
        if !response.status().is_success() {
            return Err(BridgeError::FetchError(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }

        let mime_type = response
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(FALLBACK_MIME_TYPE)
            .to_string();
        let body = response
            .bytes()
            .await
            .map_err(|err| BridgeError::FetchError(format!("GET {url}: {err}")))?;
        Ok(InlineData {
            mime_type,
            data: BASE64.encode(&body),
        })
    }

    async fn success_body(response: reqwest::Response) -> Result<bytes::Bytes, BridgeError> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| BridgeError::Transport(err.to_string()))?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(BridgeError::Upstream {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn upstream_error(response: reqwest::Response) -> BridgeError {
        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(body) => BridgeError::Upstream { status, body },
            Err(err) => BridgeError::Transport(err.to_string()),
        }
    }
}
