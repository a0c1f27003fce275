//! Re-locating finding quotes on the page geometry.
//!
//! [`resolver`] searches one task's neighborhood of pages; [`swarm`] runs many
//! tasks with bounded concurrency. Results carry their task's [`FindingId`]
//! and are joined back onto findings by key in [`attach_results`].

pub mod resolver;
pub mod swarm;

use crate::error::LocateError;
use crate::model::{BoundingBox, Finding, Rect};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, warn};

pub use resolver::resolve;
pub use swarm::batch_resolve;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    Sensitive,
    Insensitive,
}

/// Search primitive over one document. Whitespace handling and which case
/// mode to try are the caller's business; implementations only do literal
/// substring search.
pub trait PageIndex {
    fn page_count(&self) -> u32;
    fn page_size(&self, page: u32) -> Result<(f64, f64), LocateError>;
    fn search(&self, page: u32, needle: &str, case: CaseMode) -> Result<Vec<Rect>, LocateError>;
}

/// Opens independent read-only page index views, one per swarm task.
pub trait DocumentSource: Send + Sync + 'static {
    fn open(&self) -> Result<Box<dyn PageIndex + Send>, LocateError>;
}

/// Key of a finding within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FindingId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct LocationTask {
    pub page_hint: u32,
    pub query: String,
    pub owner: FindingId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationResult {
    pub found: bool,
    pub resolved_page: Option<u32>,
    pub rects: Vec<BoundingBox>,
    pub task: LocationTask,
}

impl LocationResult {
    pub fn not_found(task: LocationTask) -> Self {
        Self {
            found: false,
            resolved_page: None,
            rects: Vec::new(),
            task,
        }
    }

    pub fn owner(&self) -> FindingId {
        self.task.owner
    }
}

fn page_hint_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bpage\s*(\d+)").expect("static regex"))
}

/// First `Page <n>` mentioned in a location hint.
pub fn parse_page_hint(location: &str) -> Option<u32> {
    let caps = page_hint_re().captures(location)?;
    caps.get(1)?.as_str().parse().ok().filter(|n| *n > 0)
}

pub fn is_placeholder_quote(quote: &str, placeholders: &[String]) -> bool {
    let q = quote.trim();
    q.is_empty() || placeholders.iter().any(|p| p.trim().eq_ignore_ascii_case(q))
}

/// One task per finding with a usable quote and a parseable page hint.
pub fn build_tasks(findings: &[Finding], placeholders: &[String]) -> Vec<LocationTask> {
    findings
        .iter()
        .enumerate()
        .filter_map(|(i, f)| {
            if is_placeholder_quote(&f.exact_quote, placeholders) {
                debug!("finding {i}: no usable quote, not locating");
                return None;
            }
            let Some(page_hint) = parse_page_hint(&f.location) else {
                debug!("finding {i}: no page in location {:?}, not locating", f.location);
                return None;
            };
            Some(LocationTask {
                page_hint,
                query: f.exact_quote.clone(),
                owner: FindingId(i),
            })
        })
        .collect()
}

/// Keyed join of results onto their owning findings. Only found results
/// write `bounding_boxes`, and each finding is written at most once.
/// Returns how many findings were located.
pub fn attach_results(findings: &mut [Finding], results: Vec<LocationResult>) -> usize {
    let mut by_owner: HashMap<FindingId, LocationResult> = HashMap::with_capacity(results.len());
    for r in results {
        let owner = r.owner();
        if by_owner.contains_key(&owner) {
            warn!("duplicate location result for finding {}; keeping the first", owner.0);
            continue;
        }
        by_owner.insert(owner, r);
    }

    let mut located = 0;
    for (i, finding) in findings.iter_mut().enumerate() {
        let Some(r) = by_owner.remove(&FindingId(i)) else {
            continue;
        };
        if r.found && !r.rects.is_empty() {
            finding.bounding_boxes = Some(r.rects);
            located += 1;
        }
    }
    if !by_owner.is_empty() {
        warn!("{} location results had no matching finding", by_owner.len());
    }
    located
}
