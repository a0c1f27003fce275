use crate::model::Finding;

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("pdftotext not found. Install poppler: brew install poppler (macOS) or apt install poppler-utils (Linux)")]
    ToolNotFound,

    #[error("document is unreadable: {0}")]
    Unreadable(String),

    #[error("document has no extractable text layer")]
    EmptyTextLayer,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    #[error("page {page} is outside 1..={page_count}")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("page index failure: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("no API key found in any of: {}", .0.join(", "))]
    MissingApiKey(Vec<String>),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("analyzer returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse analyzer response envelope: {0}")]
    ResponseParsing(String),

    #[error("analyzer returned no content")]
    EmptyResponse,
}

/// Run-fatal failures. Each one collapses into a single system finding.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),

    #[error("analyzer output is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("internal failure: {0}")]
    Internal(String),

    #[error("run abandoned by caller before {0}")]
    Abandoned(&'static str),
}

impl PipelineError {
    pub fn into_finding(self) -> Finding {
        match self {
            PipelineError::Extraction(ExtractionError::EmptyTextLayer) => Finding::new(
                "Document",
                "Could not extract text from PDF.",
                "Ensure PDF is text-based, not scanned image.",
            ),
            PipelineError::Extraction(e) => Finding::new(
                "Document",
                &format!("Could not read PDF: {e}"),
                "Ensure the file is a valid, unencrypted PDF.",
            ),
            PipelineError::Analyzer(e) => Finding::new(
                "System",
                &format!("Analysis failed: {e}"),
                "Check system logs and API keys.",
            ),
            PipelineError::InvalidJson(_) => {
                Finding::new("System", "AI returned invalid JSON.", "Retry analysis.")
            }
            PipelineError::Internal(msg) => Finding::new("System", &msg, "Check logs."),
            e @ PipelineError::Abandoned(_) => Finding::new("System", &e.to_string(), "Retry analysis."),
        }
    }
}
