//! Document family: model-bound nodes ready for a renderer.
//!
//! A document tree is always derived fresh from a (template, model) pair.
//! Apart from the table engine's merge passes and the post-bind numbering
//! passes, nothing mutates it after binding.

use serde_json::{Map, Value};

use super::{node_kinds, LineType, ListModel};
use crate::codec::{self, Fields, Persist, Schema};
use crate::error::Result;
use crate::registry::{self, Family};
use crate::style::{self, Compression, ImageCompression, ImageScaling, Scaling, Style};

/// A node of a document tree.
#[derive(Debug, Clone)]
pub struct DocNode {
    /// Explicit styles. See [`DocNode::effective_styles`].
    pub styles: Vec<Style>,
    pub editable: Option<bool>,
    pub deletable: Option<bool>,
    pub deleted: Option<bool>,
    pub kind: DocKind,
}

node_kinds! {
    /// The variant-specific data of a document node.
    pub enum DocKind {
        Document(DocDocument),
        Paragraph(DocParagraph),
        Span(DocSpan),
        Section(DocSection),
        Table(DocTable),
        TableRow(DocTableRow),
        TableCell(DocTableCell),
        List(DocList),
        Image(DocImage),
        Line(DocLine),
        Show(DocShow),
        MultiElement(DocMultiElement),
        MultiParagraph(DocMultiParagraph),
        SingleRow(DocSingleRow),
        PageBreak(DocPageBreak),
        Catalog(DocCatalog),
        Expression(DocExpression),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocDocument {
    pub header: Option<Box<DocNode>>,
    pub contents: Vec<DocNode>,
    pub footer: Option<Box<DocNode>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocParagraph {
    pub indent: bool,
    pub spans: Vec<DocNode>,
}

/// A text run, or a group of runs when `spans` is non-empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocSpan {
    pub spans: Vec<DocNode>,
    pub value: Option<String>,
    pub subscript: Option<bool>,
    pub superscript: Option<bool>,
    pub exp: Option<String>,
    /// Number of the referenced expression, filled after binding.
    pub exp_index: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocSection {
    pub level: Option<i32>,
    /// Link target used by catalog entries.
    pub alias: Option<String>,
    pub title: Option<Box<DocNode>>,
    pub contents: Vec<DocNode>,
    pub list_model: Option<ListModel>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocTable {
    pub headers: Vec<DocNode>,
    pub rows: Vec<DocNode>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocTableRow {
    pub cells: Vec<DocNode>,
}

/// A grid slot. A span of `Some(0)` means the slot is absorbed by a
/// neighbour; `None` means the default span of 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocTableCell {
    pub element: Option<Box<DocNode>>,
    pub row_span: Option<u32>,
    pub col_span: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocList {
    pub elements: Vec<DocNode>,
    pub list_model: ListModel,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocImage {
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocLine {
    pub line_type: LineType,
    pub value: f64,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocShow {
    pub contents: Vec<DocNode>,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocMultiElement {
    pub elements: Vec<DocNode>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocMultiParagraph {
    pub paragraphs: Vec<DocNode>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocSingleRow {
    pub elements: Vec<DocNode>,
    pub widths: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocPageBreak;

/// Table of contents: one entry per titled section, without contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocCatalog {
    pub title: Option<Box<DocNode>>,
    pub sections: Vec<DocNode>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocExpression {
    pub id: Option<String>,
    pub element: Option<Box<DocNode>>,
    /// 1-based number in document order, filled after binding.
    pub index: u32,
}

// ─── Attribute descriptors ──────────────────────────────────────────

impl Fields for DocNode {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.scalar("editable", |n| &n.editable, |n| &mut n.editable)?;
        s.scalar("deletable", |n| &n.deletable, |n| &mut n.deletable)?;
        s.scalar("deleted", |n| &n.deleted, |n| &mut n.deleted)
    }
}

impl Fields for DocDocument {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.node("header", |d| &d.header, |d| &mut d.header)?;
        s.nodes("contents", |d| &d.contents, |d| &mut d.contents)?;
        s.node("footer", |d| &d.footer, |d| &mut d.footer)
    }
}

impl Fields for DocParagraph {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.scalar("indent", |p| &p.indent, |p| &mut p.indent)?;
        s.nodes("spans", |p| &p.spans, |p| &mut p.spans)
    }
}

impl Fields for DocSpan {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.nodes("spans", |p| &p.spans, |p| &mut p.spans)?;
        s.scalar("value", |p| &p.value, |p| &mut p.value)?;
        s.scalar("subscript", |p| &p.subscript, |p| &mut p.subscript)?;
        s.scalar("superscript", |p| &p.superscript, |p| &mut p.superscript)?;
        s.scalar("exp", |p| &p.exp, |p| &mut p.exp)?;
        s.scalar("expindex", |p| &p.exp_index, |p| &mut p.exp_index)
    }
}

impl Fields for DocSection {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.scalar("level", |x| &x.level, |x| &mut x.level)?;
        s.scalar("alias", |x| &x.alias, |x| &mut x.alias)?;
        s.node("title", |x| &x.title, |x| &mut x.title)?;
        s.nodes("contents", |x| &x.contents, |x| &mut x.contents)?;
        s.scalar("listmodel", |x| &x.list_model, |x| &mut x.list_model)
    }
}

impl Fields for DocTable {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.nodes("headers", |t| &t.headers, |t| &mut t.headers)?;
        s.nodes("rows", |t| &t.rows, |t| &mut t.rows)
    }
}

impl Fields for DocTableRow {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.nodes("cells", |r| &r.cells, |r| &mut r.cells)
    }
}

impl Fields for DocTableCell {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.node("element", |c| &c.element, |c| &mut c.element)?;
        s.scalar("rowspan", |c| &c.row_span, |c| &mut c.row_span)?;
        s.scalar("colspan", |c| &c.col_span, |c| &mut c.col_span)
    }
}

impl Fields for DocList {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.nodes("elements", |l| &l.elements, |l| &mut l.elements)?;
        s.scalar("listmodel", |l| &l.list_model, |l| &mut l.list_model)
    }
}

impl Fields for DocImage {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.scalar("source", |i| &i.source, |i| &mut i.source)
    }
}

impl Fields for DocLine {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.scalar("linetype", |l| &l.line_type, |l| &mut l.line_type)?;
        s.scalar("value", |l| &l.value, |l| &mut l.value)?;
        s.scalar("color", |l| &l.color, |l| &mut l.color)
    }
}

impl Fields for DocShow {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.nodes("contents", |x| &x.contents, |x| &mut x.contents)?;
        s.scalar("condition", |x| &x.condition, |x| &mut x.condition)
    }
}

impl Fields for DocMultiElement {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.nodes("elements", |m| &m.elements, |m| &mut m.elements)
    }
}

impl Fields for DocMultiParagraph {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.nodes("paragraphs", |m| &m.paragraphs, |m| &mut m.paragraphs)
    }
}

impl Fields for DocSingleRow {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.nodes("elements", |r| &r.elements, |r| &mut r.elements)?;
        s.scalar("widths", |r| &r.widths, |r| &mut r.widths)
    }
}

impl Fields for DocPageBreak {
    fn describe<S: Schema<Self>>(_: &mut S) -> Result<()> {
        Ok(())
    }
}

impl Fields for DocCatalog {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.node("title", |c| &c.title, |c| &mut c.title)?;
        s.nodes("sections", |c| &c.sections, |c| &mut c.sections)
    }
}

impl Fields for DocExpression {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.scalar("id", |e| &e.id, |e| &mut e.id)?;
        s.node("element", |e| &e.element, |e| &mut e.element)?;
        s.scalar("index", |e| &e.index, |e| &mut e.index)
    }
}

// ─── Persistence ────────────────────────────────────────────────────

impl Persist for DocNode {
    fn dump(&self) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert(codec::TYPE_KEY.to_string(), Value::String(self.tag()));
        codec::dump_fields(self, &mut out);
        self.kind.dump_fields(&mut out);
        codec::dump_styles(&self.effective_styles(), &mut out);
        out
    }

    fn load_from(&mut self, data: &Map<String, Value>) -> Result<()> {
        let mut loaded = self.clone();
        let owner = loaded.kind.type_name();
        if let Some(styles) = codec::load_styles(data, owner)? {
            loaded.styles = styles;
        }
        codec::load_fields(&mut loaded, owner, data)?;
        loaded.kind.load_fields(data)?;
        *self = loaded;
        Ok(())
    }

    fn from_value(data: &Value) -> Result<Option<Self>> {
        let Value::Object(map) = data else {
            return Ok(None);
        };
        let Some(tag) = codec::type_tag(map) else {
            log::debug!("skipping document node without a type tag");
            return Ok(None);
        };
        let Some(kind) = registry::documents().instantiate(tag) else {
            log::debug!("skipping unknown document type {:?}", tag);
            return Ok(None);
        };
        let mut node = DocNode::new(kind);
        node.load_from(map)?;
        Ok(Some(node))
    }
}

/// Equality compares content: flags, variant data and effective styles.
impl PartialEq for DocNode {
    fn eq(&self, other: &Self) -> bool {
        self.editable == other.editable
            && self.deletable == other.deletable
            && self.deleted == other.deleted
            && self.kind == other.kind
            && style::same_set(&self.effective_styles(), &other.effective_styles())
    }
}

impl DocKind {
    /// Styles a variant carries unless explicitly overridden.
    pub fn default_styles(&self) -> Vec<Style> {
        match self {
            DocKind::Span(_) => vec![
                Style::font_family(style::DEFAULT_FONT_FAMILY),
                Style::font_size(style::DEFAULT_FONT_SIZE),
                Style::font_color(style::BLACK),
            ],
            DocKind::Image(_) => vec![
                Style::ImageScaling(ImageScaling {
                    value: Scaling::FitWidth,
                }),
                Style::ImageCompression(ImageCompression {
                    value: Compression::Best,
                }),
            ],
            _ => vec![],
        }
    }
}

impl DocNode {
    pub fn new(kind: impl Into<DocKind>) -> Self {
        DocNode {
            styles: vec![],
            editable: None,
            deletable: None,
            deleted: None,
            kind: kind.into(),
        }
    }

    /// The registry tag of this node's variant.
    pub fn tag(&self) -> String {
        registry::short_name(Family::Document, self.kind.type_name())
    }

    /// Explicit styles merged over the variant's defaults.
    pub fn effective_styles(&self) -> Vec<Style> {
        style::merge(&self.styles, &self.kind.default_styles())
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.unwrap_or(false)
    }

    /// A plain text run.
    pub fn text(value: &str) -> Self {
        DocNode::new(DocSpan {
            value: Some(value.to_string()),
            ..Default::default()
        })
    }

    /// Whether the node renders no content.
    pub fn is_empty(&self) -> bool {
        match &self.kind {
            DocKind::Span(span) => span.is_empty(),
            DocKind::Paragraph(p) => p.spans.iter().all(DocNode::is_empty),
            DocKind::MultiElement(m) => m.elements.is_empty(),
            DocKind::MultiParagraph(m) => m.paragraphs.iter().all(DocNode::is_empty),
            _ => false,
        }
    }

    /// Concatenated text of a span or paragraph.
    pub fn full_text(&self) -> String {
        match &self.kind {
            DocKind::Span(span) => span.full_text(),
            DocKind::Paragraph(p) => p.spans.iter().map(DocNode::full_text).collect(),
            _ => String::new(),
        }
    }

    pub fn as_span(&self) -> Option<&DocSpan> {
        match &self.kind {
            DocKind::Span(span) => Some(span),
            _ => None,
        }
    }

    pub fn as_paragraph(&self) -> Option<&DocParagraph> {
        match &self.kind {
            DocKind::Paragraph(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&DocTable> {
        match &self.kind {
            DocKind::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_row(&self) -> Option<&DocTableRow> {
        match &self.kind {
            DocKind::TableRow(row) => Some(row),
            _ => None,
        }
    }

    pub fn as_row_mut(&mut self) -> Option<&mut DocTableRow> {
        match &mut self.kind {
            DocKind::TableRow(row) => Some(row),
            _ => None,
        }
    }

    pub fn as_cell(&self) -> Option<&DocTableCell> {
        match &self.kind {
            DocKind::TableCell(cell) => Some(cell),
            _ => None,
        }
    }

    pub fn as_cell_mut(&mut self) -> Option<&mut DocTableCell> {
        match &mut self.kind {
            DocKind::TableCell(cell) => Some(cell),
            _ => None,
        }
    }

    /// Child nodes in document order, for tree walks.
    pub fn children(&self) -> Vec<&DocNode> {
        fn opt(node: &Option<Box<DocNode>>) -> impl Iterator<Item = &DocNode> {
            node.as_deref().into_iter()
        }
        match &self.kind {
            DocKind::Document(d) => opt(&d.header)
                .chain(d.contents.iter())
                .chain(opt(&d.footer))
                .collect(),
            DocKind::Paragraph(p) => p.spans.iter().collect(),
            DocKind::Span(s) => s.spans.iter().collect(),
            DocKind::Section(s) => opt(&s.title).chain(s.contents.iter()).collect(),
            DocKind::Table(t) => t.headers.iter().chain(t.rows.iter()).collect(),
            DocKind::TableRow(r) => r.cells.iter().collect(),
            DocKind::TableCell(c) => opt(&c.element).collect(),
            DocKind::List(l) => l.elements.iter().collect(),
            DocKind::Show(s) => s.contents.iter().collect(),
            DocKind::MultiElement(m) => m.elements.iter().collect(),
            DocKind::MultiParagraph(m) => m.paragraphs.iter().collect(),
            DocKind::SingleRow(r) => r.elements.iter().collect(),
            DocKind::Catalog(c) => opt(&c.title).collect(),
            DocKind::Expression(e) => opt(&e.element).collect(),
            DocKind::Image(_) | DocKind::Line(_) | DocKind::PageBreak(_) => vec![],
        }
    }

    /// Mutable child nodes in document order.
    pub fn children_mut(&mut self) -> Vec<&mut DocNode> {
        fn opt(node: &mut Option<Box<DocNode>>) -> impl Iterator<Item = &mut DocNode> {
            node.as_deref_mut().into_iter()
        }
        match &mut self.kind {
            DocKind::Document(d) => opt(&mut d.header)
                .chain(d.contents.iter_mut())
                .chain(opt(&mut d.footer))
                .collect(),
            DocKind::Paragraph(p) => p.spans.iter_mut().collect(),
            DocKind::Span(s) => s.spans.iter_mut().collect(),
            DocKind::Section(s) => opt(&mut s.title).chain(s.contents.iter_mut()).collect(),
            DocKind::Table(t) => t.headers.iter_mut().chain(t.rows.iter_mut()).collect(),
            DocKind::TableRow(r) => r.cells.iter_mut().collect(),
            DocKind::TableCell(c) => opt(&mut c.element).collect(),
            DocKind::List(l) => l.elements.iter_mut().collect(),
            DocKind::Show(s) => s.contents.iter_mut().collect(),
            DocKind::MultiElement(m) => m.elements.iter_mut().collect(),
            DocKind::MultiParagraph(m) => m.paragraphs.iter_mut().collect(),
            DocKind::SingleRow(r) => r.elements.iter_mut().collect(),
            DocKind::Catalog(c) => opt(&mut c.title).collect(),
            DocKind::Expression(e) => opt(&mut e.element).collect(),
            DocKind::Image(_) | DocKind::Line(_) | DocKind::PageBreak(_) => vec![],
        }
    }
}

impl DocSpan {
    pub fn is_empty(&self) -> bool {
        if self.spans.is_empty() {
            self.value.as_deref().unwrap_or_default().is_empty() && self.exp.is_none()
        } else {
            self.spans.iter().all(DocNode::is_empty)
        }
    }

    pub fn full_text(&self) -> String {
        if self.spans.is_empty() {
            self.value.clone().unwrap_or_default()
        } else {
            self.spans.iter().map(DocNode::full_text).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_span_dump_includes_default_styles() {
        let dumped = Value::Object(DocNode::text("hi").dump());
        assert_eq!(
            dumped,
            json!({
                "$type": "span",
                "value": "hi",
                "$styles": {
                    "fontfamily": {"value": style::DEFAULT_FONT_FAMILY},
                    "fontsize": {"value": style::DEFAULT_FONT_SIZE},
                    "fontcolor": {"value": "#000000"}
                }
            })
        );
    }

    #[test]
    fn test_explicit_style_overrides_default() {
        let mut node = DocNode::text("hi");
        node.styles.push(Style::font_size(20.0));
        let effective = node.effective_styles();
        assert_eq!(effective.len(), 3);
        assert_eq!(effective[0], Style::font_size(20.0));
    }

    #[test]
    fn test_empty_detection() {
        assert!(DocNode::text("").is_empty());
        assert!(!DocNode::text("x").is_empty());
        assert!(DocNode::new(DocParagraph::default()).is_empty());
        let with_exp = DocNode::new(DocSpan {
            exp: Some("e1".to_string()),
            ..Default::default()
        });
        assert!(!with_exp.is_empty());
        assert!(!DocNode::new(DocImage::default()).is_empty());
    }

    #[test]
    fn test_equality_uses_effective_styles() {
        let plain = DocNode::text("a");
        let mut explicit = DocNode::text("a");
        explicit.styles = plain.effective_styles();
        assert_eq!(plain, explicit);

        let mut bigger = DocNode::text("a");
        bigger.styles.push(Style::font_size(30.0));
        assert_ne!(plain, bigger);
    }

    #[test]
    fn test_failed_load_leaves_node_unchanged() {
        let mut node = DocNode::text("orig");
        node.editable = Some(true);
        let before = node.clone();
        let data = json!({
            "editable": false,
            "$styles": {"fontsize": {"value": 30.0}},
            "value": "new",
            "expindex": -1
        });
        assert!(node.load_from(data.as_object().unwrap()).is_err());
        assert_eq!(node.styles, before.styles);
        assert_eq!(node, before);
    }

    #[test]
    fn test_full_text_of_nested_spans() {
        let node = DocNode::new(DocSpan {
            spans: vec![DocNode::text("H"), DocNode::text("2"), DocNode::text("O")],
            ..Default::default()
        });
        assert_eq!(node.full_text(), "H2O");
    }
}
