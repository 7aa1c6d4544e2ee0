use serde::Deserialize;
use std::time::Duration;

/// Connectivity check against an OpenAI-compatible gateway.
pub struct GatewayProbe {
    http:     reqwest::Client,
    api_base: String,
    api_key:  Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

impl GatewayProbe {
    pub fn new(api_base: impl Into<String>, api_key: Option<String>) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        Ok(Self { http, api_base: api_base.into(), api_key })
    }

    pub fn models_url(&self) -> String {
        format!("{}/models", self.api_base.trim_end_matches('/'))
    }

    /// Lists the model ids the gateway serves.
    pub async fn list_models(&self) -> Result<Vec<String>, String> {
        let mut request = self.http.get(self.models_url());
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await
            .map_err(|e| format!("Gateway unreachable at {}: {}", self.api_base, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Gateway returned {}: {}", status, body));
        }

        let list: ModelList = response.json().await
            .map_err(|e| format!("Unexpected /models payload: {}", e))?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}
