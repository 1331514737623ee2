//! # Inline Markup
//!
//! Turns a string with nested pseudo-tags into flat text runs:
//!
//! ```text
//! "H<sub>2</sub>O"  →  [H] [2 (sub)] [O]
//! ```
//!
//! Only same-name tags count toward nesting depth, so `<sub><sub>x</sub></sub>`
//! groups correctly while a `<sup>` inside an open `<sub>` is carried as
//! inner text and picked up when the inner text is scanned in turn. The
//! `sub` and `sup` tags set the subscript and superscript flags on every run
//! inside them; other tag names group text but have no effect.
//!
//! Malformed input never fails. A tag still open at end of input is kept as
//! literal text from its opener on, and a stray closing tag is literal.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{DocNode, DocSpan};

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?(\w+)>").unwrap());

const SUBSCRIPT: &str = "sub";
const SUPERSCRIPT: &str = "sup";

/// A leaf text run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub subscript: bool,
    pub superscript: bool,
}

impl Run {
    pub fn plain(text: &str) -> Self {
        Run {
            text: text.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    subscript: bool,
    superscript: bool,
}

impl Flags {
    fn with_tag(self, name: &str) -> Flags {
        match name {
            SUBSCRIPT => Flags {
                subscript: true,
                ..self
            },
            SUPERSCRIPT => Flags {
                superscript: true,
                ..self
            },
            _ => self,
        }
    }

    fn run(self, text: String) -> Run {
        Run {
            text,
            subscript: self.subscript,
            superscript: self.superscript,
        }
    }
}

/// Pending work: either a finished run or a span of text still to scan.
enum Segment {
    Emit(Run),
    Scan(String, Flags),
}

enum Token<'a> {
    Text(&'a str),
    Open(&'a str, String),
    Close(&'a str, String),
}

/// Whether the string contains anything that looks like a tag.
pub fn has_markup(input: &str) -> bool {
    TAG.is_match(input)
}

/// Parse a string into runs, in reading order.
pub fn parse(input: &str) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut work = vec![Segment::Scan(input.to_string(), Flags::default())];
    while let Some(segment) = work.pop() {
        match segment {
            Segment::Emit(run) => runs.push(run),
            Segment::Scan(text, flags) => {
                let pieces = scan(&text, flags);
                work.extend(pieces.into_iter().rev());
            }
        }
    }
    runs
}

/// Build document spans from parsed runs.
pub fn to_spans(runs: Vec<Run>) -> Vec<DocNode> {
    runs.into_iter()
        .map(|run| {
            DocNode::new(DocSpan {
                value: Some(run.text),
                subscript: run.subscript.then_some(true),
                superscript: run.superscript.then_some(true),
                ..Default::default()
            })
        })
        .collect()
}

fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut last = 0;
    for caps in TAG.captures_iter(input) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            tokens.push(Token::Text(&input[last..whole.start()]));
        }
        let name = caps.get(1).map_or("", |m| m.as_str()).to_lowercase();
        let raw = whole.as_str();
        if raw.starts_with("</") {
            tokens.push(Token::Close(raw, name));
        } else {
            tokens.push(Token::Open(raw, name));
        }
        last = whole.end();
    }
    if last < input.len() {
        tokens.push(Token::Text(&input[last..]));
    }
    tokens
}

/// One level of the scan: top-level text becomes runs, each balanced
/// top-level tag becomes a further span to scan with that tag's flag.
fn scan(input: &str, flags: Flags) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut buffer = String::new();
    // (name, raw opener, depth) of the tag currently open at this level.
    let mut open: Option<(String, &str, usize)> = None;

    for token in tokenize(input) {
        let Some((current, _, depth)) = open.as_mut() else {
            match token {
                Token::Open(raw, name) => {
                    flush(&mut out, &mut buffer, flags);
                    open = Some((name, raw, 1));
                }
                Token::Text(text) | Token::Close(text, _) => buffer.push_str(text),
            }
            continue;
        };
        match token {
            Token::Text(text) => buffer.push_str(text),
            Token::Open(raw, name) => {
                if *current == name {
                    *depth += 1;
                }
                buffer.push_str(raw);
            }
            Token::Close(raw, name) => {
                if *current == name {
                    *depth -= 1;
                }
                if *current != name || *depth > 0 {
                    buffer.push_str(raw);
                    continue;
                }
                let inner = std::mem::take(&mut buffer);
                out.push(Segment::Scan(inner, flags.with_tag(current)));
                open = None;
            }
        }
    }

    if let Some((_, opener, _)) = open {
        log::trace!("unbalanced tag {:?}, keeping as text", opener);
        buffer.insert_str(0, opener);
    }
    flush(&mut out, &mut buffer, flags);
    out
}

fn flush(out: &mut Vec<Segment>, buffer: &mut String, flags: Flags) {
    let text = std::mem::take(buffer);
    if !text.trim().is_empty() {
        out.push(Segment::Emit(flags.run(text)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(text: &str) -> Run {
        Run {
            text: text.to_string(),
            subscript: true,
            superscript: false,
        }
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(parse("hello"), vec![Run::plain("hello")]);
        assert!(!has_markup("hello"));
    }

    #[test]
    fn test_nested_same_tag() {
        let runs = parse("a<sub>b<sub>c</sub>d</sub>e");
        assert_eq!(
            runs,
            vec![Run::plain("a"), sub("b"), sub("c"), sub("d"), Run::plain("e")]
        );
    }

    #[test]
    fn test_sub_and_sup_combine() {
        let runs = parse("x<sub>i<sup>2</sup></sub>");
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0], Run::plain("x"));
        assert_eq!(runs[1], sub("i"));
        assert_eq!(
            runs[2],
            Run {
                text: "2".to_string(),
                subscript: true,
                superscript: true,
            }
        );
        let runs = parse("<sub><sup>2</sup></sub>");
        assert_eq!(
            runs,
            vec![Run {
                text: "2".to_string(),
                subscript: true,
                superscript: true,
            }]
        );
    }

    #[test]
    fn test_whitespace_runs_dropped() {
        let runs = parse("a <sup>2</sup> ");
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0], Run::plain("a "));
        assert!(runs[1].superscript);
    }

    #[test]
    fn test_unknown_tag_groups_without_effect() {
        assert_eq!(parse("<b>bold</b>"), vec![Run::plain("bold")]);
    }

    #[test]
    fn test_tag_names_ignore_case() {
        assert_eq!(parse("<SUB>x</sub>"), vec![sub("x")]);
    }

    #[test]
    fn test_unbalanced_opener_is_literal() {
        assert_eq!(parse("a<sub>b"), vec![Run::plain("a"), Run::plain("<sub>b")]);
        assert_eq!(
            parse("<sub>x<sub>y</sub>"),
            vec![Run::plain("<sub>x<sub>y</sub>")]
        );
    }

    #[test]
    fn test_stray_closer_is_literal() {
        assert_eq!(parse("a</sub>b"), vec![Run::plain("a</sub>b")]);
    }

    #[test]
    fn test_to_spans_sets_flags() {
        let spans = to_spans(parse("H<sub>2</sub>O"));
        assert_eq!(spans.len(), 3);
        let middle = spans[1].as_span().unwrap();
        assert_eq!(middle.value.as_deref(), Some("2"));
        assert_eq!(middle.subscript, Some(true));
        assert_eq!(middle.superscript, None);
        assert_eq!(spans[0].full_text(), "H");
    }
}
