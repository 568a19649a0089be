//! HTTP client for the AI analysis collaborator

use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use workflow_automation_sdk::{async_trait, AnalysisPreferences, AnalysisService, ServiceError};

/// Environment variable naming the analysis endpoint.
pub const AI_URL_VAR: &str = "WORKFLOW_AUTOMATION_AI_URL";
/// Environment variable holding the bearer token, if the endpoint needs one.
pub const AI_TOKEN_VAR: &str = "WORKFLOW_AUTOMATION_AI_TOKEN";

/// Posts `{query, project_path, preferences}` to a configured endpoint and
/// expects a JSON body with a `suggestions` string array.
pub struct HttpAnalysisService {
    client: reqwest::Client,
    endpoint: Option<String>,
    token: Option<String>,
}

impl HttpAnalysisService {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: Some(endpoint.into()),
            token,
        }
    }

    /// Read endpoint and token from the environment. An unset endpoint is
    /// not an error until an ai_analysis action actually runs.
    pub fn from_env() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: std::env::var(AI_URL_VAR).ok(),
            token: std::env::var(AI_TOKEN_VAR).ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    suggestions: Vec<String>,
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn analyze(
        &self,
        query: &str,
        project_path: &Path,
        preferences: &AnalysisPreferences,
    ) -> Result<Vec<String>, ServiceError> {
        let Some(endpoint) = self.endpoint.as_deref() else {
            return Err(ServiceError::NotConfigured(format!(
                "{} is not set",
                AI_URL_VAR
            )));
        };

        let body = json!({
            "query": query,
            "project_path": project_path.display().to_string(),
            "preferences": preferences,
        });

        let mut request = self.client.post(endpoint).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ServiceError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let parsed: AnalysisResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        Ok(parsed.suggestions)
    }
}
