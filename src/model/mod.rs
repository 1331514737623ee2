//! # Node Model
//!
//! Two parallel node families:
//!
//! - [`TemplateNode`]: author-time structure with access paths, reusable
//!   across any number of models.
//! - [`DocNode`]: the model-bound tree handed to a renderer.
//!
//! Both follow the same shape: a node carries the attributes every variant
//! has (styles, editable/deletable/deleted flags, and for templates the
//! access path) plus a `kind` enum holding the variant-specific data. Each
//! variant struct describes its own attributes to the codec through
//! [`Fields`](crate::codec::Fields).

pub mod document;
pub mod template;

pub use document::*;
pub use template::*;

use serde::{Deserialize, Serialize};

/// Numbering scheme for list and section items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListModel {
    #[default]
    None,
    Number,
    UpperRoman,
    LowerRoman,
    Chinese,
    UpperAlphabet,
    LowerAlphabet,
}

/// Orientation of a line node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineType {
    #[default]
    Horizontal,
    Vertical,
}

/// Direction an empty table cell merges into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutoCellMerge {
    #[default]
    None,
    Left,
    Right,
}

pub(crate) fn kind_entry<T>(name: &'static str, ctor: fn() -> T) -> (&'static str, fn() -> T) {
    (name, ctor)
}

/// Declares a family's kind enum over its variant structs, with the
/// plumbing the registry and the codec need: type names, the list of known
/// types, per-variant field dispatch and `From` conversions.
macro_rules! node_kinds {
    (
        $(#[$meta:meta])*
        pub enum $kind:ident {
            $( $variant:ident($ty:ident) ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub enum $kind {
            $( $variant($ty), )*
        }

        impl $kind {
            /// The variant struct's type name.
            pub fn type_name(&self) -> &'static str {
                match self {
                    $( $kind::$variant(_) => stringify!($ty), )*
                }
            }

            /// Every variant of the family, as `(type name, constructor)`.
            pub fn known_types() -> Vec<(&'static str, fn() -> $kind)> {
                vec![
                    $( $crate::model::kind_entry::<$kind>(
                        stringify!($ty),
                        || $kind::$variant(<$ty>::default()),
                    ), )*
                ]
            }

            pub(crate) fn dump_fields(
                &self,
                out: &mut serde_json::Map<String, serde_json::Value>,
            ) {
                match self {
                    $( $kind::$variant(inner) => $crate::codec::dump_fields(inner, out), )*
                }
            }

            pub(crate) fn load_fields(
                &mut self,
                data: &serde_json::Map<String, serde_json::Value>,
            ) -> $crate::error::Result<()> {
                let owner = self.type_name();
                match self {
                    $( $kind::$variant(inner) => $crate::codec::load_fields(inner, owner, data), )*
                }
            }
        }

        $(
            impl From<$ty> for $kind {
                fn from(value: $ty) -> Self {
                    $kind::$variant(value)
                }
            }
        )*
    };
}

pub(crate) use node_kinds;
