use super::{build_request_text, http_client, map_send_error, resolve_api_key, Analyzer};
use crate::config::ModelEndpoint;
use crate::error::AnalyzerError;
use serde::{Deserialize, Serialize};
use tracing::info;

/// OpenAI chat-completions client with `json_object` response format.
pub struct OpenAiClient {
    endpoint: ModelEndpoint,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl OpenAiClient {
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
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl Analyzer for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn analyze(&self, prompt: &str, document_text: &str) -> Result<String, AnalyzerError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.endpoint.base_url.trim_end_matches('/')
        );
        let text = build_request_text(prompt, document_text);
        let body = ChatRequest {
            model: &self.endpoint.model,
            messages: vec![Message {
                role: "user",
                content: &text,
            }],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        info!(
            "sending request to OpenAI ({}), text length {} chars",
            self.endpoint.model,
            document_text.chars().count()
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
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

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| AnalyzerError::ResponseParsing(e.to_string()))?;
        info!("received response from OpenAI");

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|s| !s.trim().is_empty())
            .ok_or(AnalyzerError::EmptyResponse)
    }
}
