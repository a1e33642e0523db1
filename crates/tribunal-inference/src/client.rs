//! Shared HTTP plumbing for hosted-inference calls.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use tribunal_config::InferenceSettings;

use crate::InferenceError;

/// Authenticated JSON client for one provider.
#[derive(Clone)]
pub(crate) struct HostedClient {
    client: reqwest::Client,
    token: Option<String>,
}

impl HostedClient {
    pub(crate) fn new(settings: &InferenceSettings) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(settings.timeout())
                .build()
                .unwrap_or_default(),
            token: settings.token.clone(),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// POSTs a JSON body and decodes the JSON reply.
    pub(crate) async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, InferenceError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.authorize(self.client.post(url)).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(InferenceError::Api { status: status.as_u16(), message });
        }

        let text = response.text().await?;
        debug!("Inference response from {}: {}", url, text.chars().take(200).collect::<String>());
        serde_json::from_str(&text).map_err(|e| {
            InferenceError::InvalidResponse(format!("{} - body: {}", e, text.chars().take(200).collect::<String>()))
        })
    }

    /// GETs a URL and succeeds on any 2xx status.
    pub(crate) async fn probe(&self, url: &str) -> Result<(), InferenceError> {
        self.get(url).await?;
        info!("Probe ok: {}", url);
        Ok(())
    }

    /// GETs a URL and decodes the JSON reply.
    pub(crate) async fn get_json<R: DeserializeOwned>(&self, url: &str) -> Result<R, InferenceError> {
        let text = self.get(url).await?;
        serde_json::from_str(&text).map_err(|e| InferenceError::InvalidResponse(format!("{}: {}", url, e)))
    }

    async fn get(&self, url: &str) -> Result<String, InferenceError> {
        let response = self.authorize(self.client.get(url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(InferenceError::Api { status: status.as_u16(), message });
        }
        Ok(response.text().await?)
    }
}

/// Joins a base URL and a path segment without doubling slashes.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
