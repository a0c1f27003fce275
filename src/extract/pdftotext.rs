use super::Extractor;
use crate::config::Config;
use crate::error::ExtractionError;
use crate::layout::{Line, PageLayout, TextLayer, Word};
use crate::model::Rect;
use std::path::Path;
use std::process::Command;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

/// Word geometry via poppler's `pdftotext -bbox-layout`.
pub struct PdftotextExtractor {
    exe: String,
    normalize_unicode: bool,
}

impl PdftotextExtractor {
    pub fn new(cfg: &Config) -> Self {
        Self {
            exe: cfg.extraction.pdftotext_exe.clone(),
            normalize_unicode: cfg.extraction.normalize_unicode,
        }
    }

    /// Check if pdftotext is available on the system.
    pub fn is_available(&self) -> bool {
        Command::new(&self.exe)
            .arg("-v")
            .output()
            .map(|o| o.status.success() || !o.stderr.is_empty())
            .unwrap_or(false)
    }
}

impl Extractor for PdftotextExtractor {
    fn extract(&self, input: &Path) -> Result<TextLayer, ExtractionError> {
        let output = Command::new(&self.exe)
            .arg("-bbox-layout")
            .arg("-enc")
            .arg("UTF-8")
            .arg(input)
            .arg("-")
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ExtractionError::ToolNotFound
                } else {
                    ExtractionError::Io(e)
                }
            })?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::Unreadable(format!(
                "pdftotext exited with {code}: {}",
                stderr.trim()
            )));
        }

        let xml = String::from_utf8_lossy(&output.stdout);
        let layer = parse_bbox_layout(&xml, self.normalize_unicode);
        debug!(
            "pdftotext: {} page(s), {} word(s)",
            layer.pages().len(),
            layer.pages().iter().map(|p| p.word_count()).sum::<usize>()
        );

        if layer.pages().is_empty() {
            return Err(ExtractionError::Unreadable("no pages found".into()));
        }
        if layer.pages().iter().all(|p| p.word_count() == 0) {
            return Err(ExtractionError::EmptyTextLayer);
        }
        Ok(layer)
    }

    fn backend_name(&self) -> &str {
        "pdftotext"
    }
}

/// Parse `-bbox-layout` output. pdftotext writes one tag per line, so a line
/// scanner is enough.
fn parse_bbox_layout(xml: &str, normalize_unicode: bool) -> TextLayer {
    let mut pages = Vec::new();
    let mut current_page: Option<PageLayout> = None;
    let mut current_line: Option<Line> = None;

    for raw in xml.lines() {
        let line = raw.trim();

        if line.starts_with("<page ") {
            if let Some(p) = current_page.take() {
                pages.push(p);
            }
            let number = pages.len() as u32 + 1;
            let width = parse_attr_f64(line, "width").unwrap_or(0.0);
            let height = parse_attr_f64(line, "height").unwrap_or(0.0);
            current_page = Some(PageLayout::new(number, width, height));
            continue;
        }

        if line.starts_with("<line ") || line == "<line>" {
            current_line = Some(Line::default());
            continue;
        }

        if line.starts_with("<word ") {
            let (Some(bbox), Some(text)) = (parse_bbox(line), parse_word_text(line)) else {
                continue;
            };
            let mut text = decode_xml_entities(text);
            if normalize_unicode {
                text = text.nfkc().collect();
            }
            let text = text.trim().to_string();
            if text.is_empty() {
                continue;
            }
            if let Some(l) = current_line.as_mut() {
                l.words.push(Word { text, bbox });
            }
            continue;
        }

        if line.starts_with("</line>") {
            if let (Some(l), Some(p)) = (current_line.take(), current_page.as_mut()) {
                if !l.words.is_empty() {
                    p.lines.push(l);
                }
            }
            continue;
        }

        if line.starts_with("</page>") {
            if let Some(p) = current_page.take() {
                pages.push(p);
            }
        }
    }

    if let Some(p) = current_page.take() {
        pages.push(p);
    }
    TextLayer::new(pages)
}

fn parse_attr_f64(tag: &str, name: &str) -> Option<f64> {
    parse_attr(tag, name)?.parse().ok()
}

fn parse_attr<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!(" {}=\"", name);
    let start = tag.find(&needle)? + needle.len();
    let rest = &tag[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}

fn parse_bbox(tag: &str) -> Option<Rect> {
    Some(Rect {
        x_min: parse_attr_f64(tag, "xMin")?,
        y_min: parse_attr_f64(tag, "yMin")?,
        x_max: parse_attr_f64(tag, "xMax")?,
        y_max: parse_attr_f64(tag, "yMax")?,
    })
}

fn parse_word_text(word_tag: &str) -> Option<&str> {
    let start = word_tag.find('>')? + 1;
    let end = word_tag.rfind("</word>")?;
    word_tag.get(start..end)
}

fn decode_xml_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
