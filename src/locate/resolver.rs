use super::{CaseMode, LocationResult, LocationTask, PageIndex};
use std::borrow::Cow;
use tracing::{debug, warn};

/// Page offsets tried around the hint, in priority order. Analyzers tend to
/// under-count pages, so the previous page beats the next one at equal
/// distance.
pub const NEIGHBORHOOD: [i64; 5] = [0, -1, 1, -2, 2];

/// Queries longer than this (in chars) may fall back to their first half.
pub const LEADING_HALF_MIN_CHARS: usize = 20;

/// Fallbacks tried on each candidate page, in order. Everything after
/// `Exact` ignores case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Exact,
    IgnoreCase,
    CollapsedWhitespace,
    LeadingHalf,
}

impl MatchStrategy {
    pub const ALL: [MatchStrategy; 4] = [
        MatchStrategy::Exact,
        MatchStrategy::IgnoreCase,
        MatchStrategy::CollapsedWhitespace,
        MatchStrategy::LeadingHalf,
    ];

    pub fn case(&self) -> CaseMode {
        match self {
            MatchStrategy::Exact => CaseMode::Sensitive,
            _ => CaseMode::Insensitive,
        }
    }

    /// The needle this strategy searches for, or `None` when it has nothing
    /// to add over the earlier strategies.
    pub fn needle<'a>(&self, query: &'a str) -> Option<Cow<'a, str>> {
        match self {
            MatchStrategy::Exact => Some(Cow::Borrowed(query)),
            MatchStrategy::IgnoreCase => query
                .chars()
                .any(|c| c.is_lowercase() || c.is_uppercase())
                .then_some(Cow::Borrowed(query)),
            MatchStrategy::CollapsedWhitespace => {
                let collapsed = collapse_whitespace(query);
                (collapsed != query).then_some(Cow::Owned(collapsed))
            }
            MatchStrategy::LeadingHalf => {
                let n = query.chars().count();
                if n <= LEADING_HALF_MIN_CHARS {
                    return None;
                }
                let half: String = query.chars().take(n / 2).collect();
                Some(Cow::Owned(half))
            }
        }
    }
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Candidate pages for a hint, in search order, clipped to the document.
pub fn candidate_pages(page_hint: u32, page_count: u32) -> impl Iterator<Item = u32> {
    NEIGHBORHOOD.into_iter().filter_map(move |offset| {
        let page = page_hint as i64 + offset;
        (1..=page_count as i64)
            .contains(&page)
            .then_some(page as u32)
    })
}

/// Resolve one task against a page index. Never fails: index errors on a
/// page are logged and that page counts as a miss.
pub fn resolve(index: &dyn PageIndex, task: LocationTask) -> LocationResult {
    let page_count = index.page_count();

    let hit = candidate_pages(task.page_hint, page_count)
        .flat_map(|page| MatchStrategy::ALL.into_iter().map(move |s| (page, s)))
        .find_map(|(page, strategy)| {
            let needle = strategy.needle(&task.query)?;
            match index.search(page, &needle, strategy.case()) {
                Ok(rects) if !rects.is_empty() => Some((page, strategy, rects)),
                Ok(_) => None,
                Err(e) => {
                    warn!("page search error on page {page}: {e}");
                    None
                }
            }
        });

    let Some((page, strategy, rects)) = hit else {
        debug!(
            "not found: hint={} query={:?}",
            task.page_hint, task.query
        );
        return LocationResult::not_found(task);
    };

    let (width, height) = match index.page_size(page) {
        Ok(size) => size,
        Err(e) => {
            warn!("page size unavailable for page {page}: {e}");
            return LocationResult::not_found(task);
        }
    };

    debug!(
        "found on page {page} (hint {}, {strategy:?}): {} rect(s)",
        task.page_hint,
        rects.len()
    );

    LocationResult {
        found: true,
        resolved_page: Some(page),
        rects: rects
            .into_iter()
            .map(|r| r.to_bounding_box(page, width, height))
            .collect(),
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_follow_priority_and_clip() {
        assert_eq!(candidate_pages(3, 10).collect::<Vec<_>>(), vec![3, 2, 4, 1, 5]);
        assert_eq!(candidate_pages(1, 10).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(candidate_pages(4, 4).collect::<Vec<_>>(), vec![4, 3, 2]);
        assert_eq!(candidate_pages(9, 4).collect::<Vec<_>>(), Vec::<u32>::new());
    }

    #[test]
    fn collapsed_whitespace_only_applies_to_irregular_queries() {
        assert!(MatchStrategy::CollapsedWhitespace.needle("Interest Rate").is_none());
        assert_eq!(
            MatchStrategy::CollapsedWhitespace
                .needle("Interest \n  Rate")
                .as_deref(),
            Some("Interest Rate")
        );
    }

    #[test]
    fn ignore_case_skips_caseless_queries() {
        assert!(MatchStrategy::IgnoreCase.needle("[__]").is_none());
        assert!(MatchStrategy::IgnoreCase.needle("5.2(a)").is_some());
        assert_eq!(MatchStrategy::Exact.case(), CaseMode::Sensitive);
        assert_eq!(MatchStrategy::LeadingHalf.case(), CaseMode::Insensitive);
    }

    #[test]
    fn leading_half_needs_long_query() {
        assert!(MatchStrategy::LeadingHalf.needle("short text").is_none());
        let q = "abcdefghijklmnopqrstuv"; // 22 chars
        assert_eq!(MatchStrategy::LeadingHalf.needle(q).as_deref(), Some("abcdefghijk"));
    }
}
