//! # Renderer Contract
//!
//! A document tree renders itself into a [`Region`]: the abstract drawing
//! surface a typesetting engine provides. Containers open a [`Block`], render
//! their children into it and close it; text runs, images, lines and page
//! breaks are the leaves.
//!
//! The walk skips deleted nodes and absorbed table slots, and passes every
//! node's *effective* styles so a region never needs to know variant
//! defaults. Turning styles into visual properties is the region's job.
//!
//! [`PlainText`] is a reference region that writes readable plain text.

use crate::model::*;
use crate::style::Style;

/// A container opened in a region.
#[derive(Debug, Clone, PartialEq)]
pub enum Block<'a> {
    Document,
    Header,
    Footer,
    Paragraph { indent: bool },
    Section { level: Option<i32>, alias: Option<&'a str> },
    Table,
    TableHeader,
    Row,
    Cell { row_span: u32, col_span: u32 },
    List(ListModel),
    /// One list entry; `ordinal` counts rendered entries from 1.
    Item { model: ListModel, ordinal: usize },
    Show,
    Group,
    SingleRow { widths: Option<&'a [f64]> },
    Catalog,
    CatalogEntry { level: Option<i32>, alias: Option<&'a str> },
    Expression { index: u32 },
}

/// A leaf text run with its inherited script flags.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun<'a> {
    pub text: &'a str,
    pub subscript: bool,
    pub superscript: bool,
    /// Number of the expression this run refers to.
    pub exp_index: Option<u32>,
}

/// A drawable region. Everything but text defaults to a no-op.
pub trait Region {
    fn begin(&mut self, block: &Block<'_>, styles: &[Style]) {
        let _ = (block, styles);
    }

    fn end(&mut self, block: &Block<'_>) {
        let _ = block;
    }

    fn text(&mut self, run: &TextRun<'_>, styles: &[Style]);

    fn image(&mut self, source: Option<&str>, styles: &[Style]) {
        let _ = (source, styles);
    }

    fn line(&mut self, line: &DocLine, styles: &[Style]) {
        let _ = (line, styles);
    }

    fn page_break(&mut self) {}
}

#[derive(Debug, Clone, Copy, Default)]
struct Script {
    subscript: bool,
    superscript: bool,
}

impl DocNode {
    /// Render this node and its live descendants into a region.
    pub fn render(&self, region: &mut dyn Region) {
        if self.is_deleted() {
            return;
        }
        let styles = self.effective_styles();
        match &self.kind {
            DocKind::Document(d) => {
                region.begin(&Block::Document, &styles);
                if let Some(header) = &d.header {
                    within(region, Block::Header, &[], |r| header.render(r));
                }
                render_all(&d.contents, region);
                if let Some(footer) = &d.footer {
                    within(region, Block::Footer, &[], |r| footer.render(r));
                }
                region.end(&Block::Document);
            }
            DocKind::Paragraph(p) => {
                within(region, Block::Paragraph { indent: p.indent }, &styles, |r| {
                    render_all(&p.spans, r)
                });
            }
            DocKind::Span(span) => render_span(span, &styles, Script::default(), region),
            DocKind::Section(s) => {
                if s.contents.is_empty() {
                    return;
                }
                let block = Block::Section {
                    level: s.level,
                    alias: s.alias.as_deref(),
                };
                within(region, block, &styles, |r| {
                    if let Some(title) = &s.title {
                        title.render(r);
                    }
                    render_all(&s.contents, r);
                });
            }
            DocKind::Table(t) => {
                within(region, Block::Table, &styles, |r| {
                    if !t.headers.is_empty() {
                        within(r, Block::TableHeader, &[], |r| render_all(&t.headers, r));
                    }
                    render_all(&t.rows, r);
                });
            }
            DocKind::TableRow(row) => {
                within(region, Block::Row, &styles, |r| render_all(&row.cells, r));
            }
            DocKind::TableCell(cell) => {
                let row_span = cell.row_span.unwrap_or(1);
                let col_span = cell.col_span.unwrap_or(1);
                if row_span == 0 || col_span == 0 {
                    return;
                }
                within(region, Block::Cell { row_span, col_span }, &styles, |r| {
                    if let Some(element) = &cell.element {
                        element.render(r);
                    }
                });
            }
            DocKind::List(list) => {
                within(region, Block::List(list.list_model), &styles, |r| {
                    let live = list.elements.iter().filter(|e| !e.is_deleted());
                    for (i, element) in live.enumerate() {
                        let item = Block::Item {
                            model: list.list_model,
                            ordinal: i + 1,
                        };
                        within(r, item, &[], |r| element.render(r));
                    }
                });
            }
            DocKind::Image(image) => region.image(image.source.as_deref(), &styles),
            DocKind::Line(line) => region.line(line, &styles),
            DocKind::Show(show) => {
                within(region, Block::Show, &styles, |r| render_all(&show.contents, r));
            }
            DocKind::MultiElement(m) => {
                within(region, Block::Group, &styles, |r| render_all(&m.elements, r));
            }
            DocKind::MultiParagraph(m) => {
                within(region, Block::Group, &styles, |r| render_all(&m.paragraphs, r));
            }
            DocKind::SingleRow(row) => {
                let block = Block::SingleRow {
                    widths: row.widths.as_deref(),
                };
                within(region, block, &styles, |r| render_all(&row.elements, r));
            }
            DocKind::PageBreak(_) => region.page_break(),
            DocKind::Catalog(catalog) => {
                within(region, Block::Catalog, &styles, |r| {
                    if let Some(title) = &catalog.title {
                        title.render(r);
                    }
                    for entry in &catalog.sections {
                        let DocKind::Section(section) = &entry.kind else {
                            continue;
                        };
                        let Some(title) = &section.title else {
                            continue;
                        };
                        let block = Block::CatalogEntry {
                            level: section.level,
                            alias: section.alias.as_deref(),
                        };
                        within(r, block, &[], |r| title.render(r));
                    }
                });
            }
            DocKind::Expression(e) => {
                within(region, Block::Expression { index: e.index }, &styles, |r| {
                    if let Some(element) = &e.element {
                        element.render(r);
                    }
                });
            }
        }
    }
}

fn within(
    region: &mut dyn Region,
    block: Block<'_>,
    styles: &[Style],
    body: impl FnOnce(&mut dyn Region),
) {
    region.begin(&block, styles);
    body(region);
    region.end(&block);
}

fn render_all(nodes: &[DocNode], region: &mut dyn Region) {
    for node in nodes {
        node.render(region);
    }
}

/// Nested runs inherit their parent's script flags and, when they carry no
/// explicit styles of their own, its styles.
fn render_span(span: &DocSpan, styles: &[Style], inherited: Script, region: &mut dyn Region) {
    let script = Script {
        subscript: inherited.subscript || span.subscript.unwrap_or(false),
        superscript: inherited.superscript || span.superscript.unwrap_or(false),
    };
    if span.spans.is_empty() {
        let run = TextRun {
            text: span.value.as_deref().unwrap_or_default(),
            subscript: script.subscript,
            superscript: script.superscript,
            exp_index: span.exp_index,
        };
        region.text(&run, styles);
        return;
    }
    for child in span.spans.iter().filter(|c| !c.is_deleted()) {
        let Some(inner) = child.as_span() else {
            child.render(region);
            continue;
        };
        let child_styles = if child.styles.is_empty() {
            styles.to_vec()
        } else {
            child.effective_styles()
        };
        render_span(inner, &child_styles, script, region);
    }
}

// ─── Plain text ─────────────────────────────────────────────────────

/// A region that renders a document as plain text: one line per paragraph,
/// cells separated by `|`, list entries prefixed with their marker.
#[derive(Debug, Default)]
pub struct PlainText {
    out: String,
    cells_in_row: usize,
}

impl PlainText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render a whole tree and return the text.
    pub fn render(node: &DocNode) -> String {
        let mut region = PlainText::new();
        node.render(&mut region);
        region.finish()
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn end_line(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }
}

impl Region for PlainText {
    fn begin(&mut self, block: &Block<'_>, _styles: &[Style]) {
        match block {
            Block::Paragraph { indent: true } => {
                self.end_line();
                self.out.push_str("    ");
            }
            Block::Row => {
                self.end_line();
                self.cells_in_row = 0;
            }
            Block::Cell { .. } => {
                if self.cells_in_row > 0 {
                    self.out.push_str(" | ");
                }
                self.cells_in_row += 1;
            }
            Block::Item { model, ordinal } => {
                self.end_line();
                self.out.push_str(&list_marker(*model, *ordinal));
                self.out.push(' ');
            }
            Block::CatalogEntry { level, .. } => {
                self.end_line();
                let depth = level.unwrap_or(0).max(0) as usize;
                self.out.push_str(&"  ".repeat(depth));
            }
            Block::Paragraph { indent: false } | Block::Section { .. } | Block::Table => {
                self.end_line()
            }
            _ => {}
        }
    }

    fn end(&mut self, block: &Block<'_>) {
        match block {
            Block::Paragraph { .. }
            | Block::Row
            | Block::Item { .. }
            | Block::CatalogEntry { .. }
            | Block::SingleRow { .. } => self.end_line(),
            Block::Expression { index } => {
                if self.out.ends_with('\n') {
                    self.out.pop();
                }
                self.out.push_str(&format!(" ({})", index));
                self.end_line();
            }
            _ => {}
        }
    }

    fn text(&mut self, run: &TextRun<'_>, _styles: &[Style]) {
        self.out.push_str(run.text);
        if let Some(index) = run.exp_index {
            self.out.push_str(&format!("({})", index));
        }
    }

    fn image(&mut self, source: Option<&str>, _styles: &[Style]) {
        self.end_line();
        self.out.push_str(&format!("[image: {}]", source.unwrap_or("")));
        self.end_line();
    }

    fn line(&mut self, line: &DocLine, _styles: &[Style]) {
        if line.line_type == LineType::Horizontal {
            self.end_line();
            self.out.push_str(&"-".repeat(40));
            self.end_line();
        }
    }

    fn page_break(&mut self) {
        self.end_line();
        self.out.push('\u{c}');
    }
}

/// The marker of the `ordinal`-th (1-based) entry of a list.
pub fn list_marker(model: ListModel, ordinal: usize) -> String {
    match model {
        ListModel::None => "*".to_string(),
        ListModel::Number => format!("{}.", ordinal),
        ListModel::UpperRoman => format!("{}.", roman(ordinal)),
        ListModel::LowerRoman => format!("{}.", roman(ordinal).to_lowercase()),
        ListModel::UpperAlphabet => format!("{}.", alphabetic(ordinal)),
        ListModel::LowerAlphabet => format!("{}.", alphabetic(ordinal).to_lowercase()),
        ListModel::Chinese => format!("{}、", chinese(ordinal)),
    }
}

fn roman(mut n: usize) -> String {
    const NUMERALS: [(usize, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for (value, numeral) in NUMERALS {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

/// A, B, …, Z, AA, AB, …
fn alphabetic(mut n: usize) -> String {
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push((b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    letters.iter().rev().collect()
}

fn chinese(n: usize) -> String {
    const DIGITS: [char; 10] = ['零', '一', '二', '三', '四', '五', '六', '七', '八', '九'];
    match n {
        0..=9 => DIGITS[n].to_string(),
        10..=19 => format!("十{}", if n == 10 { String::new() } else { DIGITS[n % 10].to_string() }),
        20..=99 => {
            let tail = if n % 10 == 0 {
                String::new()
            } else {
                DIGITS[n % 10].to_string()
            };
            format!("{}十{}", DIGITS[n / 10], tail)
        }
        _ => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(texts: &[&str]) -> DocNode {
        DocNode::new(DocParagraph {
            indent: false,
            spans: texts.iter().map(|t| DocNode::text(t)).collect(),
        })
    }

    #[test]
    fn test_markers() {
        assert_eq!(list_marker(ListModel::Number, 3), "3.");
        assert_eq!(list_marker(ListModel::UpperRoman, 14), "XIV.");
        assert_eq!(list_marker(ListModel::LowerRoman, 4), "iv.");
        assert_eq!(list_marker(ListModel::UpperAlphabet, 28), "AB.");
        assert_eq!(list_marker(ListModel::LowerAlphabet, 1), "a.");
        assert_eq!(list_marker(ListModel::Chinese, 12), "十二、");
        assert_eq!(list_marker(ListModel::Chinese, 30), "三十、");
        assert_eq!(list_marker(ListModel::None, 5), "*");
    }

    #[test]
    fn test_plain_paragraphs() {
        let doc = DocNode::new(DocMultiElement {
            elements: vec![paragraph(&["Hello, ", "world"]), paragraph(&["Bye"])],
        });
        assert_eq!(PlainText::render(&doc), "Hello, world\nBye\n");
    }

    #[test]
    fn test_deleted_nodes_skipped() {
        let mut hidden = paragraph(&["gone"]);
        hidden.deleted = Some(true);
        let doc = DocNode::new(DocMultiElement {
            elements: vec![hidden, paragraph(&["kept"])],
        });
        assert_eq!(PlainText::render(&doc), "kept\n");
    }

    #[test]
    fn test_list_skips_deleted_in_numbering() {
        let mut gone = DocNode::text("b");
        gone.deleted = Some(true);
        let list = DocNode::new(DocList {
            elements: vec![DocNode::text("a"), gone, DocNode::text("c")],
            list_model: ListModel::Number,
        });
        assert_eq!(PlainText::render(&list), "1. a\n2. c\n");
    }

    #[test]
    fn test_absorbed_cells_not_rendered() {
        let cell = |text: &str, col_span: Option<u32>| {
            DocNode::new(DocTableCell {
                element: Some(Box::new(DocNode::text(text))),
                row_span: None,
                col_span,
            })
        };
        let row = DocNode::new(DocTableRow {
            cells: vec![cell("A", None), cell("", Some(0)), cell("D", Some(2))],
        });
        let table = DocNode::new(DocTable {
            headers: vec![],
            rows: vec![row],
        });
        assert_eq!(PlainText::render(&table), "A | D\n");
    }

    #[test]
    fn test_nested_runs_inherit_script() {
        struct Collect(Vec<(String, bool)>);
        impl Region for Collect {
            fn text(&mut self, run: &TextRun<'_>, _styles: &[Style]) {
                self.0.push((run.text.to_string(), run.subscript));
            }
        }
        let span = DocNode::new(DocSpan {
            spans: vec![DocNode::text("2"), DocNode::text("x")],
            subscript: Some(true),
            ..Default::default()
        });
        let mut region = Collect(vec![]);
        span.render(&mut region);
        assert_eq!(
            region.0,
            vec![("2".to_string(), true), ("x".to_string(), true)]
        );
    }

    #[test]
    fn test_expression_number_suffix() {
        let expr = DocNode::new(DocExpression {
            id: None,
            element: Some(Box::new(paragraph(&["E = mc2"]))),
            index: 4,
        });
        assert_eq!(PlainText::render(&expr), "E = mc2 (4)\n");
    }
}
