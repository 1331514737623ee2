//! # Persisted Tree Codec
//!
//! Both node families persist as JSON objects of the same shape:
//!
//! ```text
//! {
//!   "$type":   "paragraph",          // registry tag of the variant
//!   "indent":  true,                 // scalar / list-of-scalar attributes
//!   "spans":   [ { "$type": ... } ], // node / list-of-node attributes
//!   "$styles": { "fontsize": { "value": 14.0 } }
//! }
//! ```
//!
//! Instead of reflecting over attributes at runtime, every variant lists its
//! attributes once in [`Fields::describe`], naming each one and saying
//! whether it is a scalar, a single node or a node list. The same listing
//! drives both directions: [`Dumper`] reads through the getters and
//! [`Loader`] writes through the mutable getters.
//!
//! Rules shared by both families:
//! - Attribute keys are the lowercased attribute names; matching on load
//!   ignores case. Unknown keys are ignored, missing keys keep the default.
//! - Scalars that encode to `null` and empty node lists are not written.
//! - A scalar that fails to decode aborts the load with
//!   [`FolioError::Decode`].
//! - A nested node without a tag, or with a tag nothing is registered for,
//!   is skipped.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{FolioError, Result};
use crate::path::get_ignore_case;
use crate::registry;
use crate::style::{self, Style};

/// Reserved key holding the variant tag.
pub const TYPE_KEY: &str = "$type";
/// Reserved key holding the style bag.
pub const STYLE_KEY: &str = "$styles";

/// A per-variant attribute descriptor.
pub trait Fields {
    fn describe<S: Schema<Self>>(schema: &mut S) -> Result<()>;
}

/// Visitor over the attributes a [`Fields`] implementation lists.
pub trait Schema<T: ?Sized> {
    /// A scalar, nullable scalar or list-of-scalar attribute.
    fn scalar<V>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> Result<()>
    where
        V: Serialize + DeserializeOwned;

    /// A single optional child node.
    fn node<N: Persist>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &Option<Box<N>>,
        get_mut: fn(&mut T) -> &mut Option<Box<N>>,
    ) -> Result<()>;

    /// A list of child nodes.
    fn nodes<N: Persist>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &Vec<N>,
        get_mut: fn(&mut T) -> &mut Vec<N>,
    ) -> Result<()>;
}

/// A polymorphic node that can be written to and read from the persisted
/// format.
pub trait Persist: Sized {
    /// Write this node, including its type tag and style bag.
    fn dump(&self) -> Map<String, Value>;

    /// Populate this node from a persisted object. The style list is
    /// replaced wholesale when the payload carries a style bag. On error the
    /// node is left as it was.
    fn load_from(&mut self, data: &Map<String, Value>) -> Result<()>;

    /// Resolve the payload's tag, instantiate the variant and load it.
    /// Returns `Ok(None)` when the payload is not an object, has no tag, or
    /// has a tag nothing is registered for.
    fn from_value(data: &Value) -> Result<Option<Self>>;
}

// ─── Dump ───────────────────────────────────────────────────────────

/// Writes attributes of `target` into a JSON object.
pub struct Dumper<'a, T> {
    target: &'a T,
    out: &'a mut Map<String, Value>,
}

impl<T> Schema<T> for Dumper<'_, T> {
    fn scalar<V>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &V,
        _get_mut: fn(&mut T) -> &mut V,
    ) -> Result<()>
    where
        V: Serialize + DeserializeOwned,
    {
        match serde_json::to_value(get(self.target)) {
            Ok(Value::Null) => {}
            Ok(value) => {
                self.out.insert(name.to_string(), value);
            }
            Err(e) => log::warn!("skipping attribute {}: {}", name, e),
        }
        Ok(())
    }

    fn node<N: Persist>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &Option<Box<N>>,
        _get_mut: fn(&mut T) -> &mut Option<Box<N>>,
    ) -> Result<()> {
        if let Some(node) = get(self.target) {
            self.out.insert(name.to_string(), Value::Object(node.dump()));
        }
        Ok(())
    }

    fn nodes<N: Persist>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &Vec<N>,
        _get_mut: fn(&mut T) -> &mut Vec<N>,
    ) -> Result<()> {
        let nodes = get(self.target);
        if !nodes.is_empty() {
            let array = nodes.iter().map(|n| Value::Object(n.dump())).collect();
            self.out.insert(name.to_string(), Value::Array(array));
        }
        Ok(())
    }
}

/// Write every attribute `target` describes into `out`.
pub fn dump_fields<T: Fields>(target: &T, out: &mut Map<String, Value>) {
    let mut dumper = Dumper { target, out };
    if let Err(e) = T::describe(&mut dumper) {
        log::warn!("dump failed: {}", e);
    }
}

/// Write the style bag, if there is anything to write.
pub fn dump_styles(styles: &[Style], out: &mut Map<String, Value>) {
    if styles.is_empty() {
        return;
    }
    let mut bag = Map::new();
    for style in styles {
        match style.dump() {
            Ok(value) => {
                let tag = registry::short_name(registry::Family::Style, style.type_name());
                bag.insert(tag, value);
            }
            Err(e) => log::warn!("skipping style {}: {}", style.type_name(), e),
        }
    }
    out.insert(STYLE_KEY.to_string(), Value::Object(bag));
}

// ─── Load ───────────────────────────────────────────────────────────

/// Reads attributes of `target` from a JSON object.
pub struct Loader<'a, T> {
    target: &'a mut T,
    data: &'a Map<String, Value>,
    owner: &'a str,
}

impl<T> Schema<T> for Loader<'_, T> {
    fn scalar<V>(
        &mut self,
        name: &'static str,
        _get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> Result<()>
    where
        V: Serialize + DeserializeOwned,
    {
        let Some(value) = get_ignore_case(self.data, name) else {
            return Ok(());
        };
        let decoded = serde_json::from_value::<V>(value.clone()).map_err(|source| {
            FolioError::Decode {
                node: self.owner.to_string(),
                attribute: name.to_string(),
                expected: std::any::type_name::<V>(),
                source,
            }
        })?;
        *get_mut(self.target) = decoded;
        Ok(())
    }

    fn node<N: Persist>(
        &mut self,
        name: &'static str,
        _get: fn(&T) -> &Option<Box<N>>,
        get_mut: fn(&mut T) -> &mut Option<Box<N>>,
    ) -> Result<()> {
        let Some(value) = get_ignore_case(self.data, name) else {
            return Ok(());
        };
        if let Some(node) = N::from_value(value)? {
            *get_mut(self.target) = Some(Box::new(node));
        }
        Ok(())
    }

    fn nodes<N: Persist>(
        &mut self,
        name: &'static str,
        _get: fn(&T) -> &Vec<N>,
        get_mut: fn(&mut T) -> &mut Vec<N>,
    ) -> Result<()> {
        let Some(Value::Array(items)) = get_ignore_case(self.data, name) else {
            return Ok(());
        };
        let mut nodes = Vec::with_capacity(items.len());
        for item in items {
            if let Some(node) = N::from_value(item)? {
                nodes.push(node);
            }
        }
        *get_mut(self.target) = nodes;
        Ok(())
    }
}

/// Read every attribute `target` describes from `data`. `owner` names the
/// node type in decode errors.
pub fn load_fields<T: Fields>(
    target: &mut T,
    owner: &str,
    data: &Map<String, Value>,
) -> Result<()> {
    let mut loader = Loader {
        target,
        data,
        owner,
    };
    T::describe(&mut loader)
}

/// Read the style bag. Returns `None` when the payload has no bag. Unknown
/// style keys are skipped.
pub fn load_styles(data: &Map<String, Value>, owner: &str) -> Result<Option<Vec<Style>>> {
    let Some(Value::Object(bag)) = get_ignore_case(data, STYLE_KEY) else {
        return Ok(None);
    };
    let mut styles = Vec::with_capacity(bag.len());
    for (key, value) in bag {
        let Some(mut style) = registry::styles().instantiate(key) else {
            log::debug!("{}: skipping unknown style {:?}", owner, key);
            continue;
        };
        style.load(value).map_err(|source| FolioError::Decode {
            node: owner.to_string(),
            attribute: format!("{}.{}", STYLE_KEY, key),
            expected: style.type_name(),
            source,
        })?;
        styles.push(style);
    }
    Ok(Some(style::dedup(styles)))
}

/// The type tag of a persisted node, if it has one.
pub fn type_tag(data: &Map<String, Value>) -> Option<&str> {
    get_ignore_case(data, TYPE_KEY).and_then(Value::as_str)
}

/// Parse JSON text into a node, failing if the root cannot be identified.
pub fn from_json<N: Persist>(json: &str) -> Result<N> {
    let value: Value = serde_json::from_str(json)?;
    N::from_value(&value)?.ok_or_else(|| {
        let tag = value
            .as_object()
            .and_then(type_tag)
            .unwrap_or_default()
            .to_string();
        FolioError::UnknownType(tag)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq)]
    struct Probe {
        name: Option<String>,
        count: u32,
        weights: Vec<f64>,
    }

    impl Fields for Probe {
        fn describe<S: Schema<Self>>(s: &mut S) -> Result<()> {
            s.scalar("name", |p| &p.name, |p| &mut p.name)?;
            s.scalar("count", |p| &p.count, |p| &mut p.count)?;
            s.scalar("weights", |p| &p.weights, |p| &mut p.weights)
        }
    }

    #[test]
    fn test_dump_skips_null_scalars() {
        let probe = Probe {
            name: None,
            count: 3,
            weights: vec![0.5],
        };
        let mut out = Map::new();
        dump_fields(&probe, &mut out);
        assert_eq!(Value::Object(out), json!({"count": 3, "weights": [0.5]}));
    }

    #[test]
    fn test_load_matches_keys_ignoring_case() {
        let data = json!({"NAME": "x", "Count": 7, "unknown": true});
        let mut probe = Probe::default();
        load_fields(&mut probe, "Probe", data.as_object().unwrap()).unwrap();
        assert_eq!(probe.name.as_deref(), Some("x"));
        assert_eq!(probe.count, 7);
        assert!(probe.weights.is_empty());
    }

    #[test]
    fn test_load_decode_failure_names_owner_and_attribute() {
        let data = json!({"count": "seven"});
        let mut probe = Probe::default();
        let err = load_fields(&mut probe, "Probe", data.as_object().unwrap()).unwrap_err();
        match err {
            FolioError::Decode {
                node, attribute, ..
            } => {
                assert_eq!(node, "Probe");
                assert_eq!(attribute, "count");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_styles_skips_unknown_keys() {
        let data = json!({"$styles": {"fontsize": {"value": 9.0}, "sparkle": {}}});
        let styles = load_styles(data.as_object().unwrap(), "Span").unwrap().unwrap();
        assert_eq!(styles, vec![Style::font_size(9.0)]);
    }

    #[test]
    fn test_load_styles_absent_bag() {
        let data = json!({"value": 1});
        assert!(load_styles(data.as_object().unwrap(), "Span").unwrap().is_none());
    }

    #[test]
    fn test_dump_styles_keys_by_variant() {
        let mut out = Map::new();
        dump_styles(&[Style::width(40.0)], &mut out);
        assert_eq!(Value::Object(out), json!({"$styles": {"width": {"value": 40.0}}}));
    }
}
