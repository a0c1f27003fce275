use crate::analysis::AnalyzerSelector;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub extraction: Extraction,
    #[serde(default)]
    pub analysis: Analysis,
    #[serde(default)]
    pub locating: Locating,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub security: Security,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub pdftotext_exe: String,
    pub normalize_unicode: bool,
    pub max_input_file_bytes: u64,
}
impl Default for Extraction {
    fn default() -> Self {
        Self {
            pdftotext_exe: "pdftotext".into(),
            normalize_unicode: true,
            max_input_file_bytes: 200 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub default_analyzer: AnalyzerSelector,
    #[serde(default = "Analysis::default_gemini")]
    pub gemini: ModelEndpoint,
    #[serde(default = "Analysis::default_openai")]
    pub openai: ModelEndpoint,
}
impl Analysis {
    fn default_gemini() -> ModelEndpoint {
        ModelEndpoint {
            model: "gemini-2.5-flash".into(),
            base_url: "https://generativelanguage.googleapis.com".into(),
            api_key_env: vec!["GEMINI_API_KEY".into(), "GOOGLE_API_KEY".into()],
            timeout_seconds: 300,
        }
    }

    fn default_openai() -> ModelEndpoint {
        ModelEndpoint {
            model: "gpt-4.1".into(),
            base_url: "https://api.openai.com".into(),
            api_key_env: vec!["OPENAI_API_KEY".into()],
            timeout_seconds: 300,
        }
    }
}
impl Default for Analysis {
    fn default() -> Self {
        Self {
            default_analyzer: AnalyzerSelector::default(),
            gemini: Self::default_gemini(),
            openai: Self::default_openai(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEndpoint {
    pub model: String,
    pub base_url: String,
    /// Environment variables tried in order for the API key.
    pub api_key_env: Vec<String>,
    /// Request timeout; 0 disables it.
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Locating {
    pub enabled: bool,
    pub concurrency: usize,
    pub placeholder_quotes: Vec<String>,
}
impl Default for Locating {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrency: 5,
            placeholder_quotes: vec![
                "N/A".into(),
                "none".into(),
                "null".into(),
                "-".into(),
                "...".into(),
                "\u{2026}".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub out_dir: String,
    pub write_report_json: bool,
    pub report_filename: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
            write_report_json: true,
            report_filename: "report.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Security {
    pub reject_url_inputs: bool,
}
impl Default for Security {
    fn default() -> Self {
        Self {
            reject_url_inputs: true,
        }
    }
}
