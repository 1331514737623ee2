//! # Folio
//!
//! Binds reusable document templates to JSON models.
//!
//! A template is authored once, with access paths where the data goes. A
//! model is whatever JSON the caller has at hand. Binding the two yields a
//! document tree: every path resolved, every array expanded into repeated
//! siblings, every table laid out into a grid with its merges applied.
//! Drawing that tree is a renderer's job; the tree only promises to be
//! complete.
//!
//! ## Architecture
//!
//! ```text
//! Template JSON          Model JSON
//!       ↓                     │
//!   [codec]    : Tagged JSON ↔ node trees, via [registry]
//!       ↓                     │
//!   [binder]   ←──────────────┘  Resolve [path]s, fan out arrays,
//!       │                        parse inline [markup]
//!       ├── [table] : Grid expansion, column merge, row span
//!       ↓
//!   Document tree
//!       ↓
//!   [render]   : Walk into an abstract Region
//! ```

pub mod binder;
pub mod codec;
pub mod error;
pub mod markup;
pub mod model;
pub mod path;
pub mod registry;
pub mod render;
pub mod style;
pub mod table;

pub use binder::{BindOptions, Binder};
pub use codec::Persist;
pub use error::{FolioError, Result};
pub use model::{DocKind, DocNode, TemplateKind, TemplateNode};

use serde_json::Value;

/// Bind a template to a model with default options.
///
/// This is the primary entry point. Fails only when the root template
/// produces nothing, i.e. it is a hidden show node.
pub fn bind(template: &TemplateNode, model: &Value) -> Result<DocNode> {
    Binder::new().bind_document(template, model)
}

/// Bind a template and a model given as JSON text.
pub fn bind_json(template_json: &str, model_json: &str) -> Result<DocNode> {
    let template = load_template(template_json)?;
    let model: Value = serde_json::from_str(model_json)?;
    bind(&template, &model)
}

/// Load a persisted template tree.
pub fn load_template(json: &str) -> Result<TemplateNode> {
    codec::from_json(json)
}

/// Load a persisted document tree.
pub fn load_document(json: &str) -> Result<DocNode> {
    codec::from_json(json)
}

/// Write a template or document tree as pretty-printed JSON.
pub fn dump_json<N: Persist>(node: &N) -> Result<String> {
    Ok(serde_json::to_string_pretty(&Value::Object(node.dump()))?)
}
