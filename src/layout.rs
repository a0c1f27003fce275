//! Positioned text layer of a document and the substring search over it.
//!
//! A [`TextLayer`] is the word-level geometry produced by an extractor. It
//! doubles as the page index the locator searches: words on a page are
//! joined with single spaces (lines included), so a quote may span a line
//! break. Every occurrence on the page is reported, one rectangle per line
//! the occurrence touches.

use crate::document::{Document, Page};
use crate::error::LocateError;
use crate::locate::{CaseMode, DocumentSource, PageIndex};
use crate::model::Rect;
use regex::RegexBuilder;
use std::sync::Arc;

const SYNTH_MARGIN: f64 = 72.0;
const SYNTH_LINE_HEIGHT: f64 = 14.0;
const SYNTH_GLYPH_HEIGHT: f64 = 12.0;
const SYNTH_GLYPH_WIDTH: f64 = 6.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub bbox: Rect,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    pub words: Vec<Word>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub number: u32,
    pub width: f64,
    pub height: f64,
    pub lines: Vec<Line>,
}

#[derive(Debug, Clone, Copy)]
struct WordSpan {
    start: usize,
    end: usize,
    line: usize,
    word: usize,
}

impl PageLayout {
    pub fn new(number: u32, width: f64, height: f64) -> Self {
        Self {
            number,
            width,
            height,
            lines: Vec::new(),
        }
    }

    /// Lay plain text out on a fixed monospaced grid, one text line per
    /// layout line. Used for fixtures and for sources without geometry.
    pub fn from_text(number: u32, width: f64, height: f64, text: &str) -> Self {
        let mut page = Self::new(number, width, height);
        for (row, raw) in text.lines().enumerate() {
            let y_min = SYNTH_MARGIN + row as f64 * SYNTH_LINE_HEIGHT;
            let mut line = Line::default();
            let mut current = String::new();
            let mut start_col = 0usize;

            let mut flush = |current: &mut String, start_col: usize, end_col: usize| {
                if current.is_empty() {
                    return;
                }
                line.words.push(Word {
                    text: std::mem::take(current),
                    bbox: Rect {
                        x_min: SYNTH_MARGIN + start_col as f64 * SYNTH_GLYPH_WIDTH,
                        y_min,
                        x_max: SYNTH_MARGIN + end_col as f64 * SYNTH_GLYPH_WIDTH,
                        y_max: y_min + SYNTH_GLYPH_HEIGHT,
                    },
                });
            };

            let mut col = 0usize;
            for ch in raw.chars() {
                if ch.is_whitespace() {
                    flush(&mut current, start_col, col);
                } else {
                    if current.is_empty() {
                        start_col = col;
                    }
                    current.push(ch);
                }
                col += 1;
            }
            flush(&mut current, start_col, col);

            if !line.words.is_empty() {
                page.lines.push(line);
            }
        }
        page
    }

    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| {
                l.words
                    .iter()
                    .map(|w| w.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn word_count(&self) -> usize {
        self.lines.iter().map(|l| l.words.len()).sum()
    }

    /// Exact, case-sensitive search. Returns every occurrence on the page.
    pub fn find(&self, needle: &str) -> Vec<Rect> {
        if needle.is_empty() {
            return Vec::new();
        }
        let (haystack, spans) = self.haystack();
        let hits = haystack
            .match_indices(needle)
            .map(|(start, m)| (start, start + m.len()));
        self.rects_for(&spans, hits)
    }

    /// Like [`find`](Self::find), ignoring Unicode case.
    pub fn find_ignore_case(&self, needle: &str) -> Result<Vec<Rect>, LocateError> {
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let re = RegexBuilder::new(&regex::escape(needle))
            .case_insensitive(true)
            .build()
            .map_err(|e| LocateError::Backend(format!("cannot build case-folded pattern: {e}")))?;
        let (haystack, spans) = self.haystack();
        let hits = re.find_iter(&haystack).map(|m| (m.start(), m.end()));
        Ok(self.rects_for(&spans, hits))
    }

    pub fn search_with(&self, needle: &str, case: CaseMode) -> Result<Vec<Rect>, LocateError> {
        match case {
            CaseMode::Sensitive => Ok(self.find(needle)),
            CaseMode::Insensitive => self.find_ignore_case(needle),
        }
    }

    /// All words joined by single spaces. A line-final word hyphenated after
    /// a letter is glued to the next line without the hyphen or the space.
    fn haystack(&self) -> (String, Vec<WordSpan>) {
        let mut haystack = String::new();
        let mut spans = Vec::with_capacity(self.word_count());
        let mut glue = false;
        for (li, line) in self.lines.iter().enumerate() {
            let last = line.words.len().saturating_sub(1);
            for (wi, word) in line.words.iter().enumerate() {
                if !haystack.is_empty() && !glue {
                    haystack.push(' ');
                }
                glue = false;
                let mut text = word.text.as_str();
                if wi == last && li + 1 < self.lines.len() {
                    if let Some(stem) = hyphen_stem(text) {
                        text = stem;
                        glue = true;
                    }
                }
                let start = haystack.len();
                haystack.push_str(text);
                spans.push(WordSpan {
                    start,
                    end: haystack.len(),
                    line: li,
                    word: wi,
                });
            }
        }
        (haystack, spans)
    }

    fn rects_for(
        &self,
        spans: &[WordSpan],
        hits: impl Iterator<Item = (usize, usize)>,
    ) -> Vec<Rect> {
        let mut out = Vec::new();
        for (m_start, m_end) in hits {
            let mut per_line: Vec<(usize, Rect)> = Vec::new();
            for span in spans.iter().filter(|s| s.start < m_end && s.end > m_start) {
                let word = &self.lines[span.line].words[span.word];
                let rect = clip_word(word, span, m_start, m_end);
                match per_line.last_mut() {
                    Some((line, acc)) if *line == span.line => *acc = acc.union(rect),
                    _ => per_line.push((span.line, rect)),
                }
            }
            out.extend(per_line.into_iter().map(|(_, r)| r));
        }
        out
    }
}

fn hyphen_stem(text: &str) -> Option<&str> {
    let stem = text.strip_suffix('-')?;
    stem.chars().last().filter(|c| c.is_alphabetic())?;
    Some(stem)
}

/// Narrow a word's box to the matched part of it, assuming even glyph widths.
fn clip_word(word: &Word, span: &WordSpan, m_start: usize, m_end: usize) -> Rect {
    let total = word.text.chars().count().max(1) as f64;
    let lo = m_start.max(span.start) - span.start;
    let hi = m_end.min(span.end) - span.start;
    let lo_chars = word.text[..lo].chars().count() as f64;
    let hi_chars = word.text[..hi].chars().count() as f64;
    let w = word.bbox.width();
    Rect {
        x_min: word.bbox.x_min + w * lo_chars / total,
        y_min: word.bbox.y_min,
        x_max: word.bbox.x_min + w * hi_chars / total,
        y_max: word.bbox.y_max,
    }
}

/// Word geometry for every page of a document, in physical order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLayer {
    pages: Vec<PageLayout>,
}

impl TextLayer {
    pub fn new(pages: Vec<PageLayout>) -> Self {
        Self { pages }
    }

    pub fn pages(&self) -> &[PageLayout] {
        &self.pages
    }

    pub fn page(&self, number: u32) -> Option<&PageLayout> {
        if number == 0 {
            return None;
        }
        self.pages.get(number as usize - 1)
    }

    pub fn to_document(&self) -> Document {
        Document::new(
            self.pages
                .iter()
                .enumerate()
                .map(|(i, p)| Page {
                    number: i as u32 + 1,
                    text: p.text(),
                    width: p.width,
                    height: p.height,
                })
                .collect(),
        )
    }

    fn checked_page(&self, page: u32) -> Result<&PageLayout, LocateError> {
        self.page(page).ok_or(LocateError::PageOutOfRange {
            page,
            page_count: self.page_count(),
        })
    }
}

impl PageIndex for TextLayer {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, page: u32) -> Result<(f64, f64), LocateError> {
        let p = self.checked_page(page)?;
        Ok((p.width, p.height))
    }

    fn search(&self, page: u32, needle: &str, case: CaseMode) -> Result<Vec<Rect>, LocateError> {
        self.checked_page(page)?.search_with(needle, case)
    }
}

/// Hands out independent read-only views of one shared text layer.
#[derive(Debug, Clone)]
pub struct LayerSource {
    layer: Arc<TextLayer>,
}

impl LayerSource {
    pub fn new(layer: Arc<TextLayer>) -> Self {
        Self { layer }
    }
}

/// A task-scoped view; dropping it releases the task's hold on the layer.
#[derive(Debug)]
pub struct LayerView {
    layer: Arc<TextLayer>,
}

impl PageIndex for LayerView {
    fn page_count(&self) -> u32 {
        self.layer.page_count()
    }

    fn page_size(&self, page: u32) -> Result<(f64, f64), LocateError> {
        self.layer.page_size(page)
    }

    fn search(&self, page: u32, needle: &str, case: CaseMode) -> Result<Vec<Rect>, LocateError> {
        self.layer.search(page, needle, case)
    }
}

impl DocumentSource for LayerSource {
    fn open(&self) -> Result<Box<dyn PageIndex + Send>, LocateError> {
        Ok(Box::new(LayerView {
            layer: Arc::clone(&self.layer),
        }))
    }
}
