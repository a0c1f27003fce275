pub mod gemini;
pub mod mock;
pub mod normalize;
pub mod openai;

use crate::config::{Config, ModelEndpoint};
use crate::error::AnalyzerError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use normalize::{normalize, AnalysisOutput};

/// Which external model client a run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerSelector {
    #[default]
    Gemini,
    Openai,
}

impl AnalyzerSelector {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyzerSelector::Gemini => "gemini",
            AnalyzerSelector::Openai => "openai",
        }
    }
}

/// A long-latency, blocking call to an external model. The output is
/// untrusted text that is expected, but not guaranteed, to be JSON.
pub trait Analyzer {
    fn name(&self) -> &str;
    fn analyze(&self, prompt: &str, document_text: &str) -> Result<String, AnalyzerError>;
}

/// Builds analyzers on demand. Called from the blocking pool, so clients that
/// own their own runtime are created and dropped off the async executor.
pub trait AnalyzerProvider: Send + Sync {
    fn analyzer(&self, selector: AnalyzerSelector) -> Result<Box<dyn Analyzer>, AnalyzerError>;
}

/// Real HTTP clients configured from `[analysis]`.
pub struct ConfiguredAnalyzers {
    cfg: Config,
}

impl ConfiguredAnalyzers {
    pub fn new(cfg: &Config) -> Self {
        Self { cfg: cfg.clone() }
    }
}

impl AnalyzerProvider for ConfiguredAnalyzers {
    fn analyzer(&self, selector: AnalyzerSelector) -> Result<Box<dyn Analyzer>, AnalyzerError> {
        match selector {
            AnalyzerSelector::Gemini => Ok(Box::new(gemini::GeminiClient::new(
                &self.cfg.analysis.gemini,
            )?)),
            AnalyzerSelector::Openai => Ok(Box::new(openai::OpenAiClient::new(
                &self.cfg.analysis.openai,
            )?)),
        }
    }
}

pub(crate) fn resolve_api_key(endpoint: &ModelEndpoint) -> Result<String, AnalyzerError> {
    endpoint
        .api_key_env
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|v| !v.trim().is_empty())
        .ok_or_else(|| AnalyzerError::MissingApiKey(endpoint.api_key_env.clone()))
}

pub(crate) fn http_client(
    endpoint: &ModelEndpoint,
) -> Result<reqwest::blocking::Client, AnalyzerError> {
    let mut builder = reqwest::blocking::Client::builder();
    builder = if endpoint.timeout_seconds > 0 {
        builder.timeout(Duration::from_secs(endpoint.timeout_seconds))
    } else {
        builder.timeout(None)
    };
    builder
        .build()
        .map_err(|e| AnalyzerError::HttpClient(e.to_string()))
}

pub(crate) fn map_send_error(e: reqwest::Error, endpoint: &ModelEndpoint) -> AnalyzerError {
    if e.is_timeout() {
        AnalyzerError::Timeout(endpoint.timeout_seconds)
    } else if e.is_connect() {
        AnalyzerError::HttpClient(format!("cannot connect to {}: {e}", endpoint.base_url))
    } else {
        AnalyzerError::HttpClient(e.to_string())
    }
}

pub const AUDIT_PROMPT: &str = r#"
Role: you are a meticulous proofreader of legal drafting. Treat the text below as a self-contained contract fragment.

Rules:
1. Undefined terms: do not assume definitions live in another document, but ignore the standard commercial lending vocabulary a base credit agreement would define ("Borrower", "Lender", "Administrative Agent", "Business Day", "GAAP", "Material Adverse Effect" and similar). Flag only deal-specific or unusual capitalized terms that are never defined.
2. Logic: verify every date, amount, percentage and cross-reference for internal consistency.
3. Drafting leftovers: flag placeholders such as "[__]", blank lines and template remnants.

Each page is introduced by a "--- Page N ---" marker. Use that N when you cite a page.

Output: return ONLY a JSON object of this form:
{
  "errors": [
    {
      "location": "Page 3, Section 2.1",
      "error": "What is wrong",
      "suggestion": "How to fix it",
      "exact_quote": "verbatim text copied from the page, at most one sentence"
    }
  ]
}
If nothing is wrong, return {"errors": []}.
"#;

pub fn build_request_text(prompt: &str, document_text: &str) -> String {
    format!(
        "{prompt}\n\n--- CONTRACT TEXT BEGINS ---\n{document_text}\n--- CONTRACT TEXT ENDS ---"
    )
}
