//! # Type Registry
//!
//! Process-wide tables mapping a short variant tag to a constructor, one per
//! family: template kinds, document kinds and styles. Polymorphic load goes
//! through these tables: read the tag, resolve it, instantiate the default
//! variant, then populate it.
//!
//! Tags are derived from the variant's type name. Document types carry a
//! `Doc` marker (`DocParagraph`) that is stripped, so a template node and the
//! document node it produces share one externally visible tag
//! (`"paragraph"`).
//!
//! Each table is filled on first use from the family's `known_types()` list.
//! Inserts are idempotent and the map is sharded, so concurrent first use
//! from several threads neither duplicates nor loses entries.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::model::{DocKind, TemplateKind};
use crate::style::Style;

/// Marker carried by document family type names.
const DOC_PREFIX: &str = "Doc";

/// The node families that own a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Template,
    Document,
    Style,
}

/// A name → constructor table for one family.
pub struct Registry<T> {
    family: Family,
    entries: DashMap<String, fn() -> T>,
}

impl<T> Registry<T> {
    pub fn new(family: Family) -> Self {
        Registry {
            family,
            entries: DashMap::new(),
        }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    /// Register one type. Returns `false` if its tag was already present,
    /// in which case the existing entry is kept.
    pub fn register(&self, type_name: &str, ctor: fn() -> T) -> bool {
        let key = short_name(self.family, type_name);
        match self.entries.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                log::trace!("registered {:?} type {}", self.family, type_name);
                slot.insert(ctor);
                true
            }
        }
    }

    /// Register every `(type name, constructor)` pair of a family.
    pub fn register_all(&self, types: &[(&'static str, fn() -> T)]) {
        for (name, ctor) in types {
            self.register(name, *ctor);
        }
    }

    /// Find the constructor for a tag, ignoring case.
    pub fn resolve(&self, name: &str) -> Option<fn() -> T> {
        let key = name.to_lowercase();
        if let Some(ctor) = self.entries.get(&key) {
            return Some(*ctor);
        }
        // Document tags may still carry the family marker ("docspan").
        if self.family == Family::Document {
            if let Some(stripped) = key.strip_prefix("doc") {
                return self.entries.get(stripped).map(|ctor| *ctor);
            }
        }
        None
    }

    /// Resolve a tag and build the default instance of that variant.
    pub fn instantiate(&self, name: &str) -> Option<T> {
        self.resolve(name).map(|ctor| ctor())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Derive the externally visible tag from a type name.
pub fn short_name(family: Family, type_name: &str) -> String {
    let name = match family {
        Family::Document => strip_doc_prefix(type_name),
        Family::Template | Family::Style => type_name,
    };
    name.to_lowercase()
}

fn strip_doc_prefix(type_name: &str) -> &str {
    match type_name.strip_prefix(DOC_PREFIX) {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_uppercase()) => rest,
        _ => type_name,
    }
}

static TEMPLATES: Lazy<Registry<TemplateKind>> = Lazy::new(|| {
    let registry = Registry::new(Family::Template);
    registry.register_all(&TemplateKind::known_types());
    registry
});

static DOCUMENTS: Lazy<Registry<DocKind>> = Lazy::new(|| {
    let registry = Registry::new(Family::Document);
    registry.register_all(&DocKind::known_types());
    registry
});

static STYLES: Lazy<Registry<Style>> = Lazy::new(|| {
    let registry = Registry::new(Family::Style);
    registry.register_all(&Style::known_types());
    registry
});

/// The template kind registry.
pub fn templates() -> &'static Registry<TemplateKind> {
    &TEMPLATES
}

/// The document kind registry.
pub fn documents() -> &'static Registry<DocKind> {
    &DOCUMENTS
}

/// The style registry.
pub fn styles() -> &'static Registry<Style> {
    &STYLES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_names() {
        assert_eq!(short_name(Family::Template, "Paragraph"), "paragraph");
        assert_eq!(short_name(Family::Document, "DocParagraph"), "paragraph");
        assert_eq!(short_name(Family::Document, "DocDocument"), "document");
        assert_eq!(short_name(Family::Template, "Document"), "document");
        assert_eq!(short_name(Family::Style, "FontSize"), "fontsize");
        // Only a real family marker is stripped.
        assert_eq!(short_name(Family::Document, "Doctor"), "doctor");
    }

    #[test]
    fn test_families_share_tags() {
        for (name, _) in TemplateKind::known_types() {
            let tag = short_name(Family::Template, name);
            assert!(documents().resolve(&tag).is_some(), "no document type for {}", tag);
        }
        assert_eq!(templates().len(), documents().len());
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        assert!(templates().resolve("PARAGRAPH").is_some());
        assert!(styles().resolve("FontColor").is_some());
        assert!(templates().resolve("nope").is_none());
    }

    #[test]
    fn test_document_resolves_prefixed_tag() {
        let kind = documents().instantiate("docspan").unwrap();
        assert_eq!(kind.type_name(), "DocSpan");
        assert!(documents().resolve("document").is_some());
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry: Registry<Style> = Registry::new(Family::Style);
        assert!(registry.register("Width", || Style::width(0.0)));
        assert!(!registry.register("Width", || Style::width(1.0)));
        assert!(!registry.register("WIDTH", || Style::width(2.0)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.instantiate("width"), Some(Style::width(0.0)));
    }

    #[test]
    fn test_concurrent_registration() {
        let registry: Registry<Style> = Registry::new(Family::Style);
        let types = Style::known_types();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| registry.register_all(&types));
            }
        });
        assert_eq!(registry.len(), types.len());
        for (name, _) in &types {
            assert!(registry.resolve(name).is_some());
        }
    }
}
