//! Template family: author-time nodes with access paths.

use serde_json::{Map, Value};

use super::{node_kinds, AutoCellMerge, LineType, ListModel};
use crate::codec::{self, Fields, Persist, Schema};
use crate::error::Result;
use crate::path;
use crate::registry::{self, Family};
use crate::style::{self, Style};

/// A node of a template tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateNode {
    /// Where this node's data lives, relative to the parent's scope.
    pub access: String,
    pub styles: Vec<Style>,
    pub editable: Option<bool>,
    pub deletable: Option<bool>,
    pub deleted: Option<bool>,
    pub kind: TemplateKind,
}

node_kinds! {
    /// The variant-specific data of a template node.
    pub enum TemplateKind {
        Document(Document),
        Paragraph(Paragraph),
        Span(Span),
        Section(Section),
        Table(Table),
        TableRow(TableRow),
        TableCell(TableCell),
        List(List),
        Image(Image),
        Line(Line),
        Show(Show),
        MultiElement(MultiElement),
        MultiParagraph(MultiParagraph),
        SingleRow(SingleRow),
        PageBreak(PageBreak),
        Catalog(Catalog),
        Expression(Expression),
    }
}

/// Root of a template: optional header and footer around the contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub header: Option<Box<TemplateNode>>,
    pub contents: Vec<TemplateNode>,
    pub footer: Option<Box<TemplateNode>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paragraph {
    /// Indent the first line.
    pub indent: bool,
    pub spans: Vec<TemplateNode>,
}

/// A text run. Takes its text from `value` when set, otherwise from the
/// scalar its access path resolves to, rendered through `format`.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub spans: Vec<TemplateNode>,
    pub value: Option<String>,
    /// Pattern with a `{0}` placeholder, optionally `{0:0.00}`.
    pub format: String,
    pub subscript: Option<bool>,
    pub superscript: Option<bool>,
    /// Id of the expression this span refers to.
    pub exp: Option<String>,
}

impl Default for Span {
    fn default() -> Self {
        Span {
            spans: vec![],
            value: None,
            format: "{0}".to_string(),
            subscript: None,
            superscript: None,
            exp: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Section {
    pub level: Option<i32>,
    pub title: Option<Box<TemplateNode>>,
    pub contents: Vec<TemplateNode>,
    pub list_model: Option<ListModel>,
}

/// A table: header row templates and body row templates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<TemplateNode>,
    pub rows: Vec<TemplateNode>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRow {
    pub cells: Vec<TemplateNode>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableCell {
    pub element: Option<Box<TemplateNode>>,
    /// Merge vertically with identical cells above.
    pub auto_row_span: bool,
    /// Fold into a neighbour when empty.
    pub auto_cell_merge: AutoCellMerge,
    pub row_span: Option<u32>,
    pub col_span: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct List {
    pub elements: Vec<TemplateNode>,
    pub list_model: ListModel,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Image {
    /// Fixed image source; when absent the scope's string value is used.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    pub line_type: LineType,
    pub value: f64,
    pub color: Option<String>,
}

/// Shows its contents only when `condition` resolves to `true`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Show {
    pub contents: Vec<TemplateNode>,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiElement {
    pub elements: Vec<TemplateNode>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiParagraph {
    pub paragraphs: Vec<TemplateNode>,
}

/// Elements laid side by side. Widths above 1 are absolute, widths in
/// (0, 1] are relative, anything else takes an equal share.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SingleRow {
    pub elements: Vec<TemplateNode>,
    pub widths: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageBreak;

/// Table of contents. Entries are collected from the bound document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub title: Option<Box<TemplateNode>>,
}

/// A numbered expression that spans can refer to by `id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    pub id: Option<String>,
    pub element: Option<Box<TemplateNode>>,
}

// ─── Attribute descriptors ──────────────────────────────────────────

impl Fields for TemplateNode {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.scalar("access", |n| &n.access, |n| &mut n.access)?;
        s.scalar("editable", |n| &n.editable, |n| &mut n.editable)?;
        s.scalar("deletable", |n| &n.deletable, |n| &mut n.deletable)?;
        s.scalar("deleted", |n| &n.deleted, |n| &mut n.deleted)
    }
}

impl Fields for Document {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.node("header", |d| &d.header, |d| &mut d.header)?;
        s.nodes("contents", |d| &d.contents, |d| &mut d.contents)?;
        s.node("footer", |d| &d.footer, |d| &mut d.footer)
    }
}

impl Fields for Paragraph {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.scalar("indent", |p| &p.indent, |p| &mut p.indent)?;
        s.nodes("spans", |p| &p.spans, |p| &mut p.spans)
    }
}

impl Fields for Span {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.nodes("spans", |p| &p.spans, |p| &mut p.spans)?;
        s.scalar("value", |p| &p.value, |p| &mut p.value)?;
        s.scalar("format", |p| &p.format, |p| &mut p.format)?;
        s.scalar("subscript", |p| &p.subscript, |p| &mut p.subscript)?;
        s.scalar("superscript", |p| &p.superscript, |p| &mut p.superscript)?;
        s.scalar("exp", |p| &p.exp, |p| &mut p.exp)
    }
}

impl Fields for Section {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.scalar("level", |x| &x.level, |x| &mut x.level)?;
        s.node("title", |x| &x.title, |x| &mut x.title)?;
        s.nodes("contents", |x| &x.contents, |x| &mut x.contents)?;
        s.scalar("listmodel", |x| &x.list_model, |x| &mut x.list_model)
    }
}

impl Fields for Table {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.nodes("headers", |t| &t.headers, |t| &mut t.headers)?;
        s.nodes("rows", |t| &t.rows, |t| &mut t.rows)
    }
}

impl Fields for TableRow {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.nodes("cells", |r| &r.cells, |r| &mut r.cells)
    }
}

impl Fields for TableCell {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.node("element", |c| &c.element, |c| &mut c.element)?;
        s.scalar("autorowspan", |c| &c.auto_row_span, |c| &mut c.auto_row_span)?;
        s.scalar("autocellmerge", |c| &c.auto_cell_merge, |c| &mut c.auto_cell_merge)?;
        s.scalar("rowspan", |c| &c.row_span, |c| &mut c.row_span)?;
        s.scalar("colspan", |c| &c.col_span, |c| &mut c.col_span)
    }
}

impl Fields for List {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.nodes("elements", |l| &l.elements, |l| &mut l.elements)?;
        s.scalar("listmodel", |l| &l.list_model, |l| &mut l.list_model)
    }
}

impl Fields for Image {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.scalar("path", |i| &i.path, |i| &mut i.path)
    }
}

impl Fields for Line {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.scalar("linetype", |l| &l.line_type, |l| &mut l.line_type)?;
        s.scalar("value", |l| &l.value, |l| &mut l.value)?;
        s.scalar("color", |l| &l.color, |l| &mut l.color)
    }
}

impl Fields for Show {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.nodes("contents", |x| &x.contents, |x| &mut x.contents)?;
        s.scalar("condition", |x| &x.condition, |x| &mut x.condition)
    }
}

impl Fields for MultiElement {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.nodes("elements", |m| &m.elements, |m| &mut m.elements)
    }
}

impl Fields for MultiParagraph {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.nodes("paragraphs", |m| &m.paragraphs, |m| &mut m.paragraphs)
    }
}

impl Fields for SingleRow {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.nodes("elements", |r| &r.elements, |r| &mut r.elements)?;
        s.scalar("widths", |r| &r.widths, |r| &mut r.widths)
    }
}

impl Fields for PageBreak {
    fn describe<S: Schema<Self>>(_: &mut S) -> Result<()> {
        Ok(())
    }
}

impl Fields for Catalog {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.node("title", |c| &c.title, |c| &mut c.title)
    }
}

impl Fields for Expression {
    fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
        s.scalar("id", |e| &e.id, |e| &mut e.id)?;
        s.node("element", |e| &e.element, |e| &mut e.element)
    }
}

// ─── Persistence ────────────────────────────────────────────────────

impl Persist for TemplateNode {
    fn dump(&self) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert(
            codec::TYPE_KEY.to_string(),
            Value::String(self.tag()),
        );
        codec::dump_fields(self, &mut out);
        self.kind.dump_fields(&mut out);
        codec::dump_styles(&style::dedup(self.styles.clone()), &mut out);
        out
    }

    fn load_from(&mut self, data: &Map<String, Value>) -> Result<()> {
        // Load into a copy so a decode failure leaves `self` untouched.
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
            log::debug!("skipping template node without a type tag");
            return Ok(None);
        };
        let Some(kind) = registry::templates().instantiate(tag) else {
            log::debug!("skipping unknown template type {:?}", tag);
            return Ok(None);
        };
        let mut node = TemplateNode::new(kind);
        node.load_from(map)?;
        Ok(Some(node))
    }
}

// ─── Construction ───────────────────────────────────────────────────

impl TemplateNode {
    pub fn new(kind: impl Into<TemplateKind>) -> Self {
        TemplateNode {
            access: path::CURRENT.to_string(),
            styles: vec![],
            editable: None,
            deletable: None,
            deleted: None,
            kind: kind.into(),
        }
    }

    /// The registry tag of this node's variant.
    pub fn tag(&self) -> String {
        registry::short_name(Family::Template, self.kind.type_name())
    }

    pub fn with_access(mut self, access: &str) -> Self {
        self.access = access.to_string();
        self
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.styles.push(style);
        self
    }

    pub fn with_styles(mut self, styles: impl IntoIterator<Item = Style>) -> Self {
        self.styles.extend(styles);
        self
    }

    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = Some(editable);
        self
    }

    pub fn with_deletable(mut self, deletable: bool) -> Self {
        self.deletable = Some(deletable);
        self
    }

    pub fn with_deleted(mut self, deleted: bool) -> Self {
        self.deleted = Some(deleted);
        self
    }

    /// A span with fixed text.
    pub fn text(value: &str) -> Self {
        TemplateNode::new(Span {
            value: Some(value.to_string()),
            ..Default::default()
        })
    }

    /// A span whose text comes from the model at `access`.
    pub fn field(access: &str) -> Self {
        TemplateNode::new(Span::default()).with_access(access)
    }

    pub fn paragraph(spans: Vec<TemplateNode>) -> Self {
        TemplateNode::new(Paragraph {
            indent: false,
            spans,
        })
    }

    pub fn section(title: Option<TemplateNode>, contents: Vec<TemplateNode>) -> Self {
        TemplateNode::new(Section {
            title: title.map(Box::new),
            contents,
            ..Default::default()
        })
    }

    pub fn show(condition: &str, contents: Vec<TemplateNode>) -> Self {
        TemplateNode::new(Show {
            contents,
            condition: Some(condition.to_string()),
        })
    }

    pub fn multi(elements: Vec<TemplateNode>) -> Self {
        TemplateNode::new(MultiElement { elements })
    }

    pub fn table(headers: Vec<TemplateNode>, rows: Vec<TemplateNode>) -> Self {
        TemplateNode::new(Table { headers, rows })
    }

    pub fn row(cells: Vec<TemplateNode>) -> Self {
        TemplateNode::new(TableRow { cells })
    }

    pub fn cell(element: Option<TemplateNode>) -> Self {
        TemplateNode::new(TableCell {
            element: element.map(Box::new),
            ..Default::default()
        })
    }

    pub fn as_table_row(&self) -> Option<&TableRow> {
        match &self.kind {
            TemplateKind::TableRow(row) => Some(row),
            _ => None,
        }
    }

    pub fn as_table_cell(&self) -> Option<&TableCell> {
        match &self.kind {
            TemplateKind::TableCell(cell) => Some(cell),
            _ => None,
        }
    }

    pub fn as_table_cell_mut(&mut self) -> Option<&mut TableCell> {
        match &mut self.kind {
            TemplateKind::TableCell(cell) => Some(cell),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dump_paragraph() {
        let node = TemplateNode::paragraph(vec![TemplateNode::field("name")])
            .with_style(Style::font_size(14.0));
        let dumped = Value::Object(node.dump());
        assert_eq!(
            dumped,
            json!({
                "$type": "paragraph",
                "access": ".",
                "indent": false,
                "spans": [
                    {"$type": "span", "access": "name", "format": "{0}"}
                ],
                "$styles": {"fontsize": {"value": 14.0}}
            })
        );
    }

    #[test]
    fn test_load_skips_unknown_children() {
        let data = json!({
            "$type": "multielement",
            "elements": [
                {"$type": "span", "value": "kept"},
                {"$type": "hologram"},
                {"value": "no tag"},
                42
            ]
        });
        let node = TemplateNode::from_value(&data).unwrap().unwrap();
        let TemplateKind::MultiElement(multi) = &node.kind else {
            panic!("expected multielement");
        };
        assert_eq!(multi.elements, vec![TemplateNode::text("kept")]);
    }

    #[test]
    fn test_load_unknown_single_node_leaves_default() {
        let data = json!({"$type": "catalog", "title": {"$type": "hologram"}});
        let node = TemplateNode::from_value(&data).unwrap().unwrap();
        assert_eq!(node, TemplateNode::new(Catalog::default()));
    }

    #[test]
    fn test_load_bad_scalar_fails() {
        let data = json!({"$type": "paragraph", "spans": [{"$type": "span", "subscript": "yes"}]});
        let err = TemplateNode::from_value(&data).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Span"), "{msg}");
        assert!(msg.contains("subscript"), "{msg}");
    }

    #[test]
    fn test_load_is_case_insensitive() {
        let data = json!({"$TYPE": "TableCell", "AutoRowSpan": true, "ColSpan": 2});
        let node = TemplateNode::from_value(&data).unwrap().unwrap();
        let cell = node.as_table_cell().unwrap();
        assert!(cell.auto_row_span);
        assert_eq!(cell.col_span, Some(2));
    }

    #[test]
    fn test_failed_load_leaves_node_unchanged() {
        let mut node = TemplateNode::text("orig");
        let before = node.clone();
        let data = json!({
            "access": "changed",
            "$styles": {"width": {"value": 5.0}},
            "value": "new",
            "subscript": "bad"
        });
        assert!(node.load_from(data.as_object().unwrap()).is_err());
        assert_eq!(node, before);
    }

    #[test]
    fn test_load_replaces_styles() {
        let mut node = TemplateNode::text("x").with_style(Style::width(1.0));
        let data = json!({"$type": "span", "$styles": {"height": {"value": 2.0}}});
        node.load_from(data.as_object().unwrap()).unwrap();
        assert_eq!(node.styles, vec![Style::height(2.0)]);
    }
}
