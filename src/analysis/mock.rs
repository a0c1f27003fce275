use super::{Analyzer, AnalyzerProvider, AnalyzerSelector};
use crate::error::AnalyzerError;

/// Findings payload used by mock runs in place of a live analysis call.
pub const MOCK_FINDINGS: &str = r#"{
  "errors": [
    {
      "location": "Page 1, Preamble",
      "error": "The Amendment is dated \"as of\" a date that differs from the date on the cover page.",
      "suggestion": "Use one effective date on the cover page and in the preamble.",
      "exact_quote": "dated as of"
    },
    {
      "location": "Page 1, Section 1.1",
      "error": "\"Incremental Turnaround Date\" is capitalized but never defined.",
      "suggestion": "Add a definition or replace with a defined term.",
      "exact_quote": "Incremental Turnaround Date"
    },
    {
      "location": "Page 2, Section 2.3",
      "error": "Placeholder left in the commitment amount.",
      "suggestion": "Insert the agreed commitment amount.",
      "exact_quote": "[__]"
    },
    {
      "location": "Page 2, Section 2.4",
      "error": "The first payment date falls before the closing date.",
      "suggestion": "Move the first payment date after closing.",
      "exact_quote": "January 15"
    },
    {
      "location": "Page 3, Section 5.1",
      "error": "\"Feburary 30\" is both misspelled and a non-existent date.",
      "suggestion": "Correct the spelling and pick a valid date.",
      "exact_quote": "Feburary 30"
    },
    {
      "location": "Page 4, Signature Block",
      "error": "Signature block names a different borrower entity than the preamble.",
      "suggestion": "Conform the entity name across the document.",
      "exact_quote": "N/A"
    }
  ]
}"#;

/// Canned analyzer for tests and offline runs.
pub struct MockAnalyzer {
    response: Result<String, String>,
}

impl MockAnalyzer {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
        }
    }
}

impl Analyzer for MockAnalyzer {
    fn name(&self) -> &str {
        "mock"
    }

    fn analyze(&self, _prompt: &str, _document_text: &str) -> Result<String, AnalyzerError> {
        self.response
            .clone()
            .map_err(AnalyzerError::HttpClient)
    }
}

/// Provider that hands out the same canned response for every selector.
pub struct MockProvider {
    response: Result<String, String>,
}

impl MockProvider {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
        }
    }
}

impl AnalyzerProvider for MockProvider {
    fn analyzer(&self, _selector: AnalyzerSelector) -> Result<Box<dyn Analyzer>, AnalyzerError> {
        Ok(Box::new(match &self.response {
            Ok(text) => MockAnalyzer::new(text),
            Err(msg) => MockAnalyzer::failing(msg),
        }))
    }
}
