//! Structured error types for folio.
//!
//! Resolution misses (absent model fields, unresolved access paths) are not
//! errors anywhere in the crate. What remains are malformed JSON text,
//! payloads that violate an attribute's declared shape, and a root payload
//! whose type cannot be identified.

use thiserror::Error;

/// Result type alias for folio operations.
pub type Result<T> = std::result::Result<T, FolioError>;

/// The unified error type returned by all public folio API functions.
#[derive(Error, Debug)]
pub enum FolioError {
    /// JSON text failed to parse.
    #[error("Failed to parse JSON: {source}{}", format_hint(.hint))]
    Parse {
        source: serde_json::Error,
        hint: String,
    },

    /// A scalar attribute could not be decoded into its declared type.
    #[error("Load {node} - {attribute} failed, can't be converted to {expected}: {source}")]
    Decode {
        node: String,
        attribute: String,
        expected: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The root payload carries no type tag, or one nothing is registered for.
    #[error("Unknown node type: {0:?}")]
    UnknownType(String),

    /// Binding produced no root output.
    #[error("Template error: {0}")]
    Template(String),
}

fn format_hint(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {}", hint)
    }
}

impl From<serde_json::Error> for FolioError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the expected shape. Check field names and types.".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        FolioError::Parse { source: e, hint }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_carries_hint() {
        let err: FolioError = serde_json::from_str::<serde_json::Value>("{\"a\": 1,}")
            .unwrap_err()
            .into();
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to parse JSON"));
        assert!(msg.contains("Hint: Check for trailing commas"));
    }

    #[test]
    fn decode_error_names_node_and_attribute() {
        let source = serde_json::from_value::<bool>(serde_json::json!("nope")).unwrap_err();
        let err = FolioError::Decode {
            node: "paragraph".to_string(),
            attribute: "indent".to_string(),
            expected: "bool",
            source,
        };
        let msg = err.to_string();
        assert!(msg.contains("paragraph"));
        assert!(msg.contains("indent"));
        assert!(msg.contains("bool"));
    }
}
