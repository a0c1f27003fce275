use serde::{Deserialize, Serialize};

/// One reported issue with the document.
///
/// `bounding_boxes` is only ever written by the location swarm; it stays
/// `None` (and off the wire) for findings that were never located.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub suggestion: String,
    #[serde(default)]
    pub exact_quote: String,
    #[serde(
        rename = "boundingBoxes",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub bounding_boxes: Option<Vec<BoundingBox>>,
    /// Keys the analyzer attached beyond the canonical ones.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Finding {
    pub fn new(location: &str, error: &str, suggestion: &str) -> Self {
        Self {
            location: location.to_string(),
            error: error.to_string(),
            suggestion: suggestion.to_string(),
            ..Default::default()
        }
    }

    pub fn with_quote(mut self, quote: &str) -> Self {
        self.exact_quote = quote.to_string();
        self
    }
}

/// A highlight rectangle in the page's native units (PDF points, origin top-left).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Page the match was actually found on; may drift from the hint.
    pub page: u32,
    pub page_width: f64,
    pub page_height: f64,
}

/// Axis-aligned rectangle as reported by a page index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl Rect {
    pub fn union(self, other: Rect) -> Rect {
        Rect {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn to_bounding_box(self, page: u32, page_width: f64, page_height: f64) -> BoundingBox {
        BoundingBox {
            x: self.x_min,
            y: self.y_min,
            width: self.width(),
            height: self.height(),
            page,
            page_width,
            page_height,
        }
    }
}
