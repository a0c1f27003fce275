use crate::model::Finding;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub job_id: String,
    pub input: String,
    pub input_sha256: String,
    pub analyzer: String,
    pub mock: bool,
    pub started: String,
    pub finished: String,
    pub summary: RunSummary,
    pub errors: Vec<Finding>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub findings: usize,
    pub located: usize,
    pub drifted: usize,
}

impl RunSummary {
    /// `drifted` counts located findings whose first box sits on a page other
    /// than the one named in `location`.
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut s = RunSummary {
            findings: findings.len(),
            ..Default::default()
        };
        for f in findings {
            let Some(first) = f.bounding_boxes.as_ref().and_then(|b| b.first()) else {
                continue;
            };
            s.located += 1;
            if crate::locate::parse_page_hint(&f.location) != Some(first.page) {
                s.drifted += 1;
            }
        }
        s
    }
}
