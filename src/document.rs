use serde::{Deserialize, Serialize};

/// One physical page as seen by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub number: u32, // 1-based, physical order
    pub text: String,
    pub width: f64,
    pub height: f64,
}

/// Extracted pages of one input. Immutable once built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pages: Vec<Page>,
}

impl Document {
    pub fn new(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn char_count(&self) -> usize {
        self.pages.iter().map(|p| p.text.chars().count()).sum()
    }

    pub fn has_text(&self) -> bool {
        self.pages.iter().any(|p| !p.text.trim().is_empty())
    }

    /// Full text handed to the analyzer. Page markers keep the analyzer's
    /// page references aligned with physical page numbers.
    pub fn analysis_text(&self) -> String {
        let mut out = String::new();
        for page in &self.pages {
            out.push_str(&format!("--- Page {} ---\n", page.number));
            out.push_str(&page.text);
            if !page.text.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}
