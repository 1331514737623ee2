//! # Style System
//!
//! A closed set of visual style variants attached to template and document
//! nodes. Each variant is an independent serde struct: its own dump is the
//! plain JSON encoding of that struct, with lowercase keys to match the rest
//! of the persisted format.
//!
//! A node holds an ordered list of styles with at most one entry per
//! [`StyleKind`]. Document variants may carry default styles; the effective
//! set is the explicit list followed by every default whose kind is not
//! explicitly set (see [`merge`]).
//!
//! Mapping styles to visual properties is the renderer's business, not ours.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default font family for document text runs.
pub const DEFAULT_FONT_FAMILY: &str = "Helvetica";
/// Default font size in points for document text runs.
pub const DEFAULT_FONT_SIZE: f64 = 12.0;
/// Default text color.
pub const BLACK: &str = "#000000";

/// A single style entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Style {
    Width(Width),
    Height(Height),
    Alignment(Alignment),
    Padding(Padding),
    FontFamily(FontFamily),
    FontSize(FontSize),
    FontColor(FontColor),
    ImageScaling(ImageScaling),
    ImageCompression(ImageCompression),
    LineColor(LineColor),
}

/// The kind of a style, used for de-duplication and override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleKind {
    Width,
    Height,
    Alignment,
    Padding,
    FontFamily,
    FontSize,
    FontColor,
    ImageScaling,
    ImageCompression,
    LineColor,
}

/// Fixed width in points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Width {
    pub value: f64,
}

/// Fixed height in points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Height {
    pub value: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HorizontalAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerticalAlign {
    #[default]
    Top,
    Middle,
    Bottom,
}

/// Content alignment inside the node's region.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    #[serde(default, rename = "horizontalalign")]
    pub horizontal_align: HorizontalAlign,
    #[serde(default, rename = "verticalalign")]
    pub vertical_align: VerticalAlign,
}

/// Padding in points for each edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub right: f64,
    #[serde(default)]
    pub bottom: f64,
    #[serde(default)]
    pub left: f64,
}

impl Padding {
    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FontFamily {
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FontSize {
    pub value: f64,
}

/// Text color as a `#rrggbb` string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontColor {
    pub value: String,
}

impl Default for FontColor {
    fn default() -> Self {
        Self {
            value: BLACK.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scaling {
    #[default]
    FitWidth,
    FitHeight,
    FitArea,
    Resize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageScaling {
    pub value: Scaling,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    #[default]
    Best,
    VeryHigh,
    High,
    Medium,
    Low,
    VeryLow,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageCompression {
    pub value: Compression,
}

/// Stroke color for line nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineColor {
    pub value: String,
}

impl Default for LineColor {
    fn default() -> Self {
        Self {
            value: BLACK.to_string(),
        }
    }
}

impl Style {
    pub fn kind(&self) -> StyleKind {
        match self {
            Style::Width(_) => StyleKind::Width,
            Style::Height(_) => StyleKind::Height,
            Style::Alignment(_) => StyleKind::Alignment,
            Style::Padding(_) => StyleKind::Padding,
            Style::FontFamily(_) => StyleKind::FontFamily,
            Style::FontSize(_) => StyleKind::FontSize,
            Style::FontColor(_) => StyleKind::FontColor,
            Style::ImageScaling(_) => StyleKind::ImageScaling,
            Style::ImageCompression(_) => StyleKind::ImageCompression,
            Style::LineColor(_) => StyleKind::LineColor,
        }
    }

    /// The variant's type name, from which the registry derives its tag.
    pub fn type_name(&self) -> &'static str {
        self.kind().type_name()
    }

    /// Every style variant, as `(type name, constructor)` pairs.
    pub fn known_types() -> Vec<(&'static str, fn() -> Style)> {
        vec![
            entry("Width", || Style::Width(Width::default())),
            entry("Height", || Style::Height(Height::default())),
            entry("Alignment", || Style::Alignment(Alignment::default())),
            entry("Padding", || Style::Padding(Padding::default())),
            entry("FontFamily", || Style::FontFamily(FontFamily::default())),
            entry("FontSize", || Style::FontSize(FontSize::default())),
            entry("FontColor", || Style::FontColor(FontColor::default())),
            entry("ImageScaling", || Style::ImageScaling(ImageScaling::default())),
            entry("ImageCompression", || {
                Style::ImageCompression(ImageCompression::default())
            }),
            entry("LineColor", || Style::LineColor(LineColor::default())),
        ]
    }

    /// Encode this style's own payload.
    pub fn dump(&self) -> Result<Value, serde_json::Error> {
        match self {
            Style::Width(s) => serde_json::to_value(s),
            Style::Height(s) => serde_json::to_value(s),
            Style::Alignment(s) => serde_json::to_value(s),
            Style::Padding(s) => serde_json::to_value(s),
            Style::FontFamily(s) => serde_json::to_value(s),
            Style::FontSize(s) => serde_json::to_value(s),
            Style::FontColor(s) => serde_json::to_value(s),
            Style::ImageScaling(s) => serde_json::to_value(s),
            Style::ImageCompression(s) => serde_json::to_value(s),
            Style::LineColor(s) => serde_json::to_value(s),
        }
    }

    /// Populate this style from its dumped payload. Keys match ignoring case.
    pub fn load(&mut self, data: &Value) -> Result<(), serde_json::Error> {
        let data = lowercase_keys(data);
        match self {
            Style::Width(s) => *s = serde_json::from_value(data)?,
            Style::Height(s) => *s = serde_json::from_value(data)?,
            Style::Alignment(s) => *s = serde_json::from_value(data)?,
            Style::Padding(s) => *s = serde_json::from_value(data)?,
            Style::FontFamily(s) => *s = serde_json::from_value(data)?,
            Style::FontSize(s) => *s = serde_json::from_value(data)?,
            Style::FontColor(s) => *s = serde_json::from_value(data)?,
            Style::ImageScaling(s) => *s = serde_json::from_value(data)?,
            Style::ImageCompression(s) => *s = serde_json::from_value(data)?,
            Style::LineColor(s) => *s = serde_json::from_value(data)?,
        }
        Ok(())
    }

    pub fn width(value: f64) -> Self {
        Style::Width(Width { value })
    }

    pub fn height(value: f64) -> Self {
        Style::Height(Height { value })
    }

    pub fn font_family(value: &str) -> Self {
        Style::FontFamily(FontFamily {
            value: value.to_string(),
        })
    }

    pub fn font_size(value: f64) -> Self {
        Style::FontSize(FontSize { value })
    }

    pub fn font_color(value: &str) -> Self {
        Style::FontColor(FontColor {
            value: value.to_string(),
        })
    }
}

impl StyleKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            StyleKind::Width => "Width",
            StyleKind::Height => "Height",
            StyleKind::Alignment => "Alignment",
            StyleKind::Padding => "Padding",
            StyleKind::FontFamily => "FontFamily",
            StyleKind::FontSize => "FontSize",
            StyleKind::FontColor => "FontColor",
            StyleKind::ImageScaling => "ImageScaling",
            StyleKind::ImageCompression => "ImageCompression",
            StyleKind::LineColor => "LineColor",
        }
    }
}

fn entry(name: &'static str, ctor: fn() -> Style) -> (&'static str, fn() -> Style) {
    (name, ctor)
}

fn lowercase_keys(data: &Value) -> Value {
    match data {
        Value::Object(map) => {
            let mut lowered = Map::new();
            for (k, v) in map {
                lowered.insert(k.to_lowercase(), v.clone());
            }
            Value::Object(lowered)
        }
        other => other.clone(),
    }
}

/// Collapse a style list to one entry per kind. A later entry replaces an
/// earlier one of the same kind in place.
pub fn dedup(styles: Vec<Style>) -> Vec<Style> {
    let mut result: Vec<Style> = Vec::with_capacity(styles.len());
    for style in styles {
        match result.iter_mut().find(|s| s.kind() == style.kind()) {
            Some(existing) => *existing = style,
            None => result.push(style),
        }
    }
    result
}

/// Effective styles: the explicit entries, then each default whose kind the
/// explicit list does not set.
pub fn merge(explicit: &[Style], defaults: &[Style]) -> Vec<Style> {
    let mut result = dedup(explicit.to_vec());
    for style in defaults {
        if !result.iter().any(|s| s.kind() == style.kind()) {
            result.push(style.clone());
        }
    }
    result
}

/// Whether two de-duplicated style lists hold the same entries. Order is
/// not significant: a persisted style bag does not keep it.
pub fn same_set(a: &[Style], b: &[Style]) -> bool {
    a.len() == b.len() && a.iter().all(|s| b.contains(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_explicit_wins() {
        let defaults = vec![Style::font_size(12.0), Style::font_color(BLACK)];
        let explicit = vec![Style::font_size(20.0)];
        let merged = merge(&explicit, &defaults);
        assert_eq!(merged, vec![Style::font_size(20.0), Style::font_color(BLACK)]);
    }

    #[test]
    fn test_merge_without_explicit_is_defaults() {
        let defaults = vec![Style::font_family("Inter")];
        assert_eq!(merge(&[], &defaults), defaults);
    }

    #[test]
    fn test_dedup_later_entry_replaces() {
        let styles = vec![Style::width(10.0), Style::height(5.0), Style::width(30.0)];
        assert_eq!(dedup(styles), vec![Style::width(30.0), Style::height(5.0)]);
    }

    #[test]
    fn test_same_set_ignores_order() {
        let a = vec![Style::width(1.0), Style::height(2.0)];
        let b = vec![Style::height(2.0), Style::width(1.0)];
        assert!(same_set(&a, &b));
        assert!(!same_set(&a, &[Style::width(1.0)]));
        assert!(!same_set(&a, &[Style::width(1.0), Style::height(3.0)]));
    }

    #[test]
    fn test_alignment_dump_uses_lowercase_keys() {
        let style = Style::Alignment(Alignment {
            horizontal_align: HorizontalAlign::Center,
            vertical_align: VerticalAlign::Bottom,
        });
        assert_eq!(
            style.dump().unwrap(),
            json!({"horizontalalign": "Center", "verticalalign": "Bottom"})
        );
    }

    #[test]
    fn test_load_ignores_key_case() {
        let mut style = Style::FontSize(FontSize::default());
        style.load(&json!({"Value": 9.5})).unwrap();
        assert_eq!(style, Style::font_size(9.5));
    }

    #[test]
    fn test_load_rejects_wrong_shape() {
        let mut style = Style::Width(Width::default());
        assert!(style.load(&json!({"value": "wide"})).is_err());
    }

    #[test]
    fn test_known_types_cover_every_kind() {
        for (name, ctor) in Style::known_types() {
            assert_eq!(ctor().type_name(), name);
        }
        assert_eq!(Style::known_types().len(), 10);
    }
}
