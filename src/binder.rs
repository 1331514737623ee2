//! # Binder
//!
//! Walks a template tree against a JSON model and produces a document tree.
//!
//! Every template node carries an access path. A child is bound against
//! `resolve(ambient, child.access)`; when that resolves to an array, the
//! child is bound once per element and the results are spliced into the
//! parent's list in array order. That is the only looping construct.
//! Single-node attributes (a catalog title, a cell element, a document
//! header) resolve their path the same way but never fan out. A section
//! title is the exception: it binds in the section's scope as is.
//!
//! Misses are not errors. An absent value binds as `null`, so spans render
//! empty, arrays expand to nothing and show nodes hide.
//!
//! After the tree is built, two document-wide passes run (both optional, see
//! [`BindOptions`]): expressions are numbered in document order and spans
//! referencing them receive the number, and catalogs collect an entry for
//! every titled section.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{FolioError, Result};
use crate::markup;
use crate::model::*;
use crate::path;
use crate::table::TableLayout;

/// Matches `{0}` and `{0:<format>}` placeholders in a span format.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{0(?::([^}]*))?\}").unwrap());

/// Options for a bind run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BindOptions {
    /// Number expressions and resolve span references to them.
    pub number_expressions: bool,
    /// Fill catalogs with the document's titled sections.
    pub build_catalog: bool,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            number_expressions: true,
            build_catalog: true,
        }
    }
}

/// Binds templates to models. Holds no per-run state, so one binder can be
/// reused for any number of (template, model) pairs.
#[derive(Debug, Clone, Default)]
pub struct Binder {
    options: BindOptions,
}

impl Binder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: BindOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BindOptions {
        &self.options
    }

    /// Bind a root template against a model and run the document passes.
    pub fn bind_document(&self, template: &TemplateNode, model: &Value) -> Result<DocNode> {
        let scope = path::resolve_or_null(model, &template.access);
        let mut doc = self.bind(template, scope).ok_or_else(|| {
            FolioError::Template(format!(
                "root {} produced no output",
                template.kind.type_name()
            ))
        })?;

        if self.options.number_expressions {
            number_expressions(&mut doc);
        }
        if self.options.build_catalog {
            build_catalog(&mut doc);
        }
        Ok(doc)
    }

    /// Bind a child template against the ambient scope: resolve its access
    /// path and fan out over arrays. Hidden nodes contribute nothing.
    pub fn expand(&self, template: &TemplateNode, ambient: &Value) -> Vec<DocNode> {
        match path::resolve_or_null(ambient, &template.access) {
            Value::Array(items) => {
                log::trace!(
                    "{} {:?} expands over {} items",
                    template.kind.type_name(),
                    template.access,
                    items.len()
                );
                items
                    .iter()
                    .filter_map(|item| self.bind(template, item))
                    .collect()
            }
            scope => self.bind(template, scope).into_iter().collect(),
        }
    }

    /// Bind a single-node attribute: resolve its path without fan-out.
    pub fn bind_child(
        &self,
        child: &Option<Box<TemplateNode>>,
        ambient: &Value,
    ) -> Option<Box<DocNode>> {
        let template = child.as_deref()?;
        let scope = path::resolve_or_null(ambient, &template.access);
        self.bind(template, scope).map(Box::new)
    }

    fn expand_all(&self, templates: &[TemplateNode], ambient: &Value) -> Vec<DocNode> {
        templates
            .iter()
            .flat_map(|t| self.expand(t, ambient))
            .collect()
    }

    /// Bind a template against its already-resolved scope. Returns `None`
    /// only for a hidden show node.
    pub fn bind(&self, template: &TemplateNode, scope: &Value) -> Option<DocNode> {
        let kind: DocKind = match &template.kind {
            TemplateKind::Document(d) => DocDocument {
                header: self.bind_child(&d.header, scope),
                contents: self.expand_all(&d.contents, scope),
                footer: self.bind_child(&d.footer, scope),
            }
            .into(),
            TemplateKind::Paragraph(p) => DocParagraph {
                indent: p.indent,
                spans: self.expand_all(&p.spans, scope),
            }
            .into(),
            TemplateKind::Span(span) => self.bind_span(span, scope).into(),
            TemplateKind::Section(s) => DocSection {
                level: s.level,
                alias: None,
                // A title is bound in the section's own scope.
                title: s
                    .title
                    .as_deref()
                    .and_then(|title| self.bind(title, scope))
                    .map(Box::new),
                contents: self.expand_all(&s.contents, scope),
                list_model: s.list_model,
            }
            .into(),
            TemplateKind::Table(table) => TableLayout::new(self).render(table, scope).into(),
            TemplateKind::TableRow(_) => {
                return Some(TableLayout::new(self).bind_row(template, scope));
            }
            TemplateKind::TableCell(_) => {
                return Some(TableLayout::new(self).bind_cell(template, scope).into_node());
            }
            TemplateKind::List(l) => DocList {
                elements: self.expand_all(&l.elements, scope),
                list_model: l.list_model,
            }
            .into(),
            TemplateKind::Image(image) => DocImage {
                source: image
                    .path
                    .clone()
                    .or_else(|| scope.as_str().map(str::to_string)),
            }
            .into(),
            TemplateKind::Line(line) => DocLine {
                line_type: line.line_type,
                value: line.value,
                color: line.color.clone(),
            }
            .into(),
            TemplateKind::Show(show) => {
                if !is_visible(show, scope) {
                    log::trace!("show {:?} hidden", show.condition);
                    return None;
                }
                DocShow {
                    contents: self.expand_all(&show.contents, scope),
                    condition: show.condition.clone(),
                }
                .into()
            }
            TemplateKind::MultiElement(m) => DocMultiElement {
                elements: self.expand_all(&m.elements, scope),
            }
            .into(),
            TemplateKind::MultiParagraph(m) => DocMultiParagraph {
                paragraphs: self.expand_all(&m.paragraphs, scope),
            }
            .into(),
            TemplateKind::SingleRow(r) => DocSingleRow {
                elements: self.expand_all(&r.elements, scope),
                widths: r.widths.clone(),
            }
            .into(),
            TemplateKind::PageBreak(_) => DocPageBreak.into(),
            TemplateKind::Catalog(c) => DocCatalog {
                title: self.bind_child(&c.title, scope),
                sections: vec![],
            }
            .into(),
            TemplateKind::Expression(e) => DocExpression {
                id: e.id.clone(),
                element: self.bind_child(&e.element, scope),
                index: 0,
            }
            .into(),
        };
        Some(inherit(template, kind))
    }

    fn bind_span(&self, span: &Span, scope: &Value) -> DocSpan {
        let literal = span.value.as_deref().filter(|v| !v.trim().is_empty());

        let spans = if !span.spans.is_empty() {
            self.expand_all(&span.spans, scope)
        } else if let Some(text) = literal.filter(|v| markup::has_markup(v)) {
            markup::to_spans(markup::parse(text))
        } else if let Some(text) = scope
            .as_str()
            .filter(|v| literal.is_none() && markup::has_markup(v))
        {
            markup::to_spans(markup::parse(text))
        } else {
            vec![]
        };

        let value = if !spans.is_empty() {
            None
        } else if let Some(text) = literal {
            Some(text.to_string())
        } else {
            format_value(&span.format, scope)
        };

        DocSpan {
            spans,
            value,
            subscript: span.subscript,
            superscript: span.superscript,
            exp: span.exp.clone(),
            exp_index: None,
        }
    }
}

/// Carry styles and flags from a template node onto the node it produced.
pub(crate) fn inherit(template: &TemplateNode, kind: DocKind) -> DocNode {
    DocNode {
        styles: template.styles.clone(),
        editable: template.editable,
        deletable: template.deletable,
        deleted: template.deleted,
        kind,
    }
}

/// A show node without a condition is visible; with one, only when the
/// condition resolves to JSON `true`.
fn is_visible(show: &Show, scope: &Value) -> bool {
    match &show.condition {
        None => true,
        Some(condition) => matches!(path::resolve(scope, condition), Some(Value::Bool(true))),
    }
}

/// Render a scalar into a span format. Returns `None` for null, objects and
/// arrays, which have no text form.
pub fn format_value(format: &str, value: &Value) -> Option<String> {
    let text = value_to_string(value)?;
    let formatted = PLACEHOLDER.replace_all(format, |caps: &regex::Captures| {
        match (caps.get(1), value.as_f64()) {
            (Some(spec), Some(number)) => match NumberFormat::parse(spec.as_str()) {
                Some(fmt) => fmt.apply(number),
                None => text.clone(),
            },
            _ => text.clone(),
        }
    });
    Some(formatted.into_owned())
}

/// A numeric placeholder format. `0.00` style patterns count the digits
/// after the dot and group thousands when they contain a comma; `F2` and
/// `N2` carry the count, and `N` groups thousands.
#[derive(Debug, Clone, Copy, PartialEq)]
struct NumberFormat {
    places: usize,
    grouped: bool,
}

impl NumberFormat {
    fn parse(spec: &str) -> Option<Self> {
        if let Some(rest) = spec.strip_prefix(['F', 'f', 'N', 'n']) {
            let places = if rest.is_empty() { 2 } else { rest.parse().ok()? };
            return Some(NumberFormat {
                places,
                grouped: spec.starts_with(['N', 'n']),
            });
        }
        if !spec.is_empty() && spec.chars().all(|c| matches!(c, '0' | '#' | '.' | ',')) {
            let number = spec.split('.').next().unwrap_or_default();
            return Some(NumberFormat {
                places: spec.find('.').map_or(0, |dot| spec.len() - dot - 1),
                grouped: number.contains(','),
            });
        }
        None
    }

    fn apply(self, number: f64) -> String {
        let text = format!("{:.prec$}", number, prec = self.places);
        if self.grouped {
            group_thousands(&text)
        } else {
            text
        }
    }
}

/// Insert `,` between every three integer digits of a formatted number.
fn group_thousands(text: &str) -> String {
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text),
    };
    let (integer, fraction) = unsigned.split_at(unsigned.find('.').unwrap_or(unsigned.len()));
    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{}{}{}", sign, grouped, fraction)
}

fn value_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

// ─── Document passes ────────────────────────────────────────────────

/// Pre-order walk, skipping deleted subtrees.
fn visit_mut(node: &mut DocNode, f: &mut dyn FnMut(&mut DocNode)) {
    if node.is_deleted() {
        return;
    }
    f(node);
    for child in node.children_mut() {
        visit_mut(child, f);
    }
}

/// Number expressions `1..n` in document order, then point every span's
/// `exp_index` at the number of the expression its `exp` names.
fn number_expressions(doc: &mut DocNode) {
    let mut numbers: HashMap<String, u32> = HashMap::new();
    let mut next = 0;
    visit_mut(doc, &mut |node| {
        if let DocKind::Expression(expr) = &mut node.kind {
            next += 1;
            expr.index = next;
            if let Some(id) = &expr.id {
                numbers.entry(id.clone()).or_insert(next);
            }
        }
    });
    if next == 0 {
        return;
    }
    log::debug!("numbered {} expressions", next);

    visit_mut(doc, &mut |node| {
        if let DocKind::Span(span) = &mut node.kind {
            if let Some(exp) = &span.exp {
                span.exp_index = numbers.get(exp).copied();
            }
        }
    });
}

/// Give every titled section an alias, then fill each catalog with one
/// entry per titled section: title, level and alias, no contents.
fn build_catalog(doc: &mut DocNode) {
    let mut entries: Vec<DocNode> = Vec::new();
    visit_mut(doc, &mut |node| {
        let DocKind::Section(section) = &mut node.kind else {
            return;
        };
        if section.title.is_none() {
            return;
        }
        let alias = section
            .alias
            .get_or_insert_with(|| format!("section-{}", entries.len() + 1))
            .clone();
        entries.push(DocNode {
            styles: node.styles.clone(),
            editable: None,
            deletable: None,
            deleted: None,
            kind: DocSection {
                level: section.level,
                alias: Some(alias),
                title: section.title.clone(),
                contents: vec![],
                list_model: section.list_model,
            }
            .into(),
        });
    });
    if entries.is_empty() {
        return;
    }

    visit_mut(doc, &mut |node| {
        if let DocKind::Catalog(catalog) = &mut node.kind {
            catalog.sections = entries.clone();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn span_text(node: &DocNode) -> Option<&str> {
        node.as_span().and_then(|s| s.value.as_deref())
    }

    #[test]
    fn test_span_from_scope() {
        let doc = Binder::new()
            .bind(&TemplateNode::field("name"), &json!("Alice"))
            .unwrap();
        assert_eq!(span_text(&doc), Some("Alice"));
    }

    #[test]
    fn test_literal_wins_over_scope() {
        let doc = Binder::new()
            .bind(&TemplateNode::text("fixed"), &json!("ignored"))
            .unwrap();
        assert_eq!(span_text(&doc), Some("fixed"));
    }

    #[test]
    fn test_null_scope_renders_empty() {
        let doc = Binder::new().bind(&TemplateNode::field("x"), &Value::Null).unwrap();
        assert_eq!(span_text(&doc), None);
        assert!(doc.is_empty());
    }

    #[test]
    fn test_format_placeholders() {
        assert_eq!(format_value("{0}", &json!(3)), Some("3".to_string()));
        assert_eq!(format_value("{0:0.00}", &json!(3.14159)), Some("3.14".to_string()));
        assert_eq!(format_value("${0:F1}", &json!(2)), Some("$2.0".to_string()));
        assert_eq!(format_value("Total: {0} kg", &json!("5")), Some("Total: 5 kg".to_string()));
        assert_eq!(format_value("{0:0.00}", &json!("n/a")), Some("n/a".to_string()));
        assert_eq!(format_value("{0}", &json!({"a": 1})), None);
    }

    #[test]
    fn test_format_groups_thousands() {
        assert_eq!(format_value("{0:#,##0.00}", &json!(1234.5)), Some("1,234.50".to_string()));
        assert_eq!(format_value("{0:N2}", &json!(1234567.891)), Some("1,234,567.89".to_string()));
        assert_eq!(format_value("{0:N1}", &json!(-1234.5)), Some("-1,234.5".to_string()));
        assert_eq!(format_value("{0:N0}", &json!(999)), Some("999".to_string()));
        assert_eq!(format_value("{0:F2}", &json!(1234.5)), Some("1234.50".to_string()));
        assert_eq!(format_value("{0:0.00}", &json!(1234.5)), Some("1234.50".to_string()));
    }

    #[test]
    fn test_markup_in_scope_value() {
        let doc = Binder::new()
            .bind(&TemplateNode::field("f"), &json!("H<sub>2</sub>O"))
            .unwrap();
        let span = doc.as_span().unwrap();
        assert!(span.value.is_none());
        assert_eq!(span.spans.len(), 3);
        assert_eq!(span.spans[1].as_span().unwrap().subscript, Some(true));
    }

    #[test]
    fn test_expand_over_array() {
        let template = TemplateNode::field("x").with_access("items");
        let model = json!({"items": ["a", "b", "c"]});
        let docs = Binder::new().expand(&template, &model);
        let texts: Vec<_> = docs.iter().filter_map(span_text).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_show_visibility() {
        let show = TemplateNode::show("visible", vec![TemplateNode::text("x")]);
        let binder = Binder::new();
        assert!(binder.bind(&show, &json!({"visible": true})).is_some());
        assert!(binder.bind(&show, &json!({"visible": false})).is_none());
        assert!(binder.bind(&show, &json!({"visible": "yes"})).is_none());
        assert!(binder.bind(&show, &json!({})).is_none());

        let unconditional = TemplateNode::new(Show {
            contents: vec![TemplateNode::text("x")],
            condition: None,
        });
        assert!(binder.bind(&unconditional, &json!({})).is_some());
    }

    #[test]
    fn test_flags_and_styles_propagate() {
        let template = TemplateNode::text("x")
            .with_editable(true)
            .with_deleted(false)
            .with_style(crate::style::Style::font_size(20.0));
        let doc = Binder::new().bind(&template, &Value::Null).unwrap();
        assert_eq!(doc.editable, Some(true));
        assert_eq!(doc.deletable, None);
        assert_eq!(doc.deleted, Some(false));
        assert_eq!(doc.styles, vec![crate::style::Style::font_size(20.0)]);
    }

    #[test]
    fn test_image_source() {
        let binder = Binder::new();
        let from_scope = binder
            .bind(&TemplateNode::new(Image::default()), &json!("logo.png"))
            .unwrap();
        assert_eq!(
            from_scope.kind,
            DocKind::Image(DocImage {
                source: Some("logo.png".to_string())
            })
        );
        let fixed = binder
            .bind(
                &TemplateNode::new(Image {
                    path: Some("fixed.png".to_string()),
                }),
                &json!("logo.png"),
            )
            .unwrap();
        assert_eq!(
            fixed.kind,
            DocKind::Image(DocImage {
                source: Some("fixed.png".to_string())
            })
        );
    }

    #[test]
    fn test_expression_numbering() {
        let expression = |id: &str| {
            TemplateNode::new(Expression {
                id: Some(id.to_string()),
                element: None,
            })
        };
        let reference = TemplateNode::new(Span {
            value: Some("see".to_string()),
            exp: Some("second".to_string()),
            ..Default::default()
        });
        let template = TemplateNode::multi(vec![
            expression("first"),
            expression("skipped").with_deleted(true),
            expression("second"),
            TemplateNode::paragraph(vec![reference]),
        ]);
        let doc = Binder::new().bind_document(&template, &json!({})).unwrap();
        let DocKind::MultiElement(multi) = &doc.kind else {
            panic!("expected multielement");
        };
        let index = |node: &DocNode| match &node.kind {
            DocKind::Expression(e) => e.index,
            _ => panic!("expected expression"),
        };
        assert_eq!(index(&multi.elements[0]), 1);
        assert_eq!(index(&multi.elements[1]), 0);
        assert_eq!(index(&multi.elements[2]), 2);
        let paragraph = multi.elements[3].as_paragraph().unwrap();
        assert_eq!(paragraph.spans[0].as_span().unwrap().exp_index, Some(2));
    }

    #[test]
    fn test_catalog_lists_titled_sections() {
        let template = TemplateNode::multi(vec![
            TemplateNode::new(Catalog::default()),
            TemplateNode::section(
                Some(TemplateNode::text("Intro")),
                vec![TemplateNode::text("body")],
            ),
            TemplateNode::section(None, vec![]),
            TemplateNode::section(Some(TemplateNode::field(".")), vec![]).with_access("chapters"),
        ]);
        let model = json!({"chapters": ["One", "Two"]});
        let doc = Binder::new().bind_document(&template, &model).unwrap();
        let DocKind::MultiElement(multi) = &doc.kind else {
            panic!("expected multielement");
        };
        let DocKind::Catalog(catalog) = &multi.elements[0].kind else {
            panic!("expected catalog");
        };
        assert_eq!(catalog.sections.len(), 3);
        let DocKind::Section(last) = &catalog.sections[2].kind else {
            panic!("expected section");
        };
        assert_eq!(last.alias.as_deref(), Some("section-3"));
        assert!(last.contents.is_empty());
        assert_eq!(last.title.as_deref().map(DocNode::full_text), Some("Two".to_string()));
    }

    #[test]
    fn test_section_title_binds_in_section_scope() {
        let template = TemplateNode::section(
            Some(TemplateNode::field("unused")),
            vec![TemplateNode::text("body")],
        )
        .with_access("heading");
        let docs = Binder::new().expand(&template, &json!({"heading": "Intro"}));
        let DocKind::Section(section) = &docs[0].kind else {
            panic!("expected section");
        };
        assert_eq!(section.title.as_deref().map(DocNode::full_text), Some("Intro".to_string()));
    }

    #[test]
    fn test_passes_can_be_disabled() {
        let options: BindOptions =
            serde_json::from_value(json!({"build_catalog": false})).unwrap();
        assert!(options.number_expressions);
        let template = TemplateNode::multi(vec![
            TemplateNode::new(Catalog::default()),
            TemplateNode::section(Some(TemplateNode::text("Intro")), vec![]),
        ]);
        let doc = Binder::with_options(options)
            .bind_document(&template, &json!({}))
            .unwrap();
        let DocKind::MultiElement(multi) = &doc.kind else {
            panic!("expected multielement");
        };
        assert_eq!(multi.elements[0].kind, DocKind::Catalog(DocCatalog::default()));
    }

    #[test]
    fn test_hidden_root_is_an_error() {
        let template = TemplateNode::show("flag", vec![]);
        let err = Binder::new().bind_document(&template, &json!({})).unwrap_err();
        assert!(matches!(err, FolioError::Template(_)));
    }
}
