use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde_json::{Map, Value};

use super::store::{FormError, FormResult};

/// A dot-separated location inside a nested value tree.
///
/// The empty string parses to the root path, which addresses the whole tree.
/// Every other segment must be non-empty; there is no escaping, so a field
/// name cannot itself contain a `.`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    pub fn parse(raw: &str) -> FormResult<Self> {
        if raw.is_empty() {
            return Ok(Self::root());
        }
        let segments = raw.split('.').map(str::to_owned).collect::<Vec<_>>();
        if segments.iter().any(String::is_empty) {
            return Err(FormError::InvalidPath(raw.to_owned()));
        }
        Ok(Self(segments))
    }

    /// Single-segment path for a literal top-level key.
    pub(super) fn key(segment: impl Into<String>) -> Self {
        Self(vec![segment.into()])
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// First segment, i.e. the top-level key this path lives under.
    pub fn head(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl FromStr for FieldPath {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq<str> for FieldPath {
    fn eq(&self, other: &str) -> bool {
        FieldPath::parse(other).is_ok_and(|path| path == *self)
    }
}

impl PartialEq<&str> for FieldPath {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

pub fn resolve_get<'a>(root: &'a Map<String, Value>, path: &FieldPath) -> Option<&'a Value> {
    let (leaf, parents) = path.segments().split_last()?;
    let mut node = root;
    for segment in parents {
        node = node.get(segment)?.as_object()?;
    }
    node.get(leaf)
}

/// Writes `value` at `path`, creating empty objects for missing
/// intermediates, and returns the value previously stored at the leaf.
///
/// An intermediate that exists but is not an object is left alone and
/// reported as [`FormError::NotAMapping`]; nothing is written in that case.
pub fn resolve_set(
    root: &mut Map<String, Value>,
    path: &FieldPath,
    value: Value,
) -> FormResult<Option<Value>> {
    let Some((leaf, parents)) = path.segments().split_last() else {
        return Err(FormError::EmptyPath);
    };

    let mut node = root;
    for segment in parents {
        let entry = node
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        node = match entry {
            Value::Object(next) => next,
            _ => {
                return Err(FormError::NotAMapping {
                    path: path.to_string(),
                    segment: segment.clone(),
                });
            }
        };
    }
    Ok(node.insert(leaf.clone(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn parse_splits_on_dots_and_keeps_root_empty() {
        let path = FieldPath::parse("contacts.email").expect("valid path");
        assert_eq!(path.segments(), ["contacts", "email"]);
        assert_eq!(path.to_string(), "contacts.email");
        assert_eq!(path.head(), Some("contacts"));

        let root = FieldPath::parse("").expect("root path");
        assert!(root.is_root());
        assert_eq!(root, FieldPath::root());
    }

    #[test]
    fn parse_rejects_empty_segments() {
        for raw in ["a..b", ".a", "a.", "."] {
            assert!(
                matches!(FieldPath::parse(raw), Err(FormError::InvalidPath(bad)) if bad == raw),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn resolve_get_walks_objects_only() {
        let root = tree(json!({ "a": { "b": { "c": 1 } }, "leaf": "x" }));

        let hit = resolve_get(&root, &FieldPath::parse("a.b.c").expect("path"));
        assert_eq!(hit, Some(&json!(1)));
        assert_eq!(
            resolve_get(&root, &FieldPath::parse("a.missing.c").expect("path")),
            None
        );
        assert_eq!(
            resolve_get(&root, &FieldPath::parse("leaf.inner").expect("path")),
            None
        );
    }

    #[test]
    fn resolve_set_creates_intermediates_without_touching_siblings() {
        let mut root = tree(json!({ "a": { "keep": true } }));
        let previous =
            resolve_set(&mut root, &FieldPath::parse("a.b.c").expect("path"), json!("v"))
                .expect("set");

        assert_eq!(previous, None);
        assert_eq!(Value::Object(root), json!({ "a": { "keep": true, "b": { "c": "v" } } }));
    }

    #[test]
    fn resolve_set_returns_previous_leaf() {
        let mut root = tree(json!({ "name": "old" }));
        let previous = resolve_set(&mut root, &FieldPath::parse("name").expect("path"), json!("new"))
            .expect("set");
        assert_eq!(previous, Some(json!("old")));
    }

    #[test]
    fn resolve_set_refuses_root_and_scalar_intermediates() {
        let mut root = tree(json!({ "leaf": 3 }));

        assert!(matches!(
            resolve_set(&mut root, &FieldPath::root(), json!(1)),
            Err(FormError::EmptyPath)
        ));
        assert!(matches!(
            resolve_set(&mut root, &FieldPath::parse("leaf.x").expect("path"), json!(1)),
            Err(FormError::NotAMapping { segment, .. }) if segment == "leaf"
        ));
        assert_eq!(Value::Object(root), json!({ "leaf": 3 }));
    }
}
