use super::{build_request_text, http_client, map_send_error, resolve_api_key, Analyzer};
use crate::config::ModelEndpoint;
use crate::error::AnalyzerError;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Google Gemini `generateContent` client, JSON response mode.
pub struct GeminiClient {
    endpoint: ModelEndpoint,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl GeminiClient {
    pub fn new(endpoint: &ModelEndpoint) -> Result<Self, AnalyzerError> {
        let api_key = resolve_api_key(endpoint)?;
        let client = http_client(endpoint)?;
        Ok(Self {
            endpoint: endpoint.clone(),
            api_key,
            client,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl Analyzer for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn analyze(&self, prompt: &str, document_text: &str) -> Result<String, AnalyzerError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint.base_url.trim_end_matches('/'),
            self.endpoint.model
        );
        let text = build_request_text(prompt, document_text);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: &text }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        info!(
            "sending request to Gemini ({}), text length {} chars",
            self.endpoint.model,
            document_text.chars().count()
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .map_err(|e| map_send_error(e, &self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AnalyzerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| AnalyzerError::ResponseParsing(e.to_string()))?;
        info!("received response from Gemini");

        let out: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if out.trim().is_empty() {
            return Err(AnalyzerError::EmptyResponse);
        }
        Ok(out)
    }
}
