//! The YAML node tree.

#![allow(clippy::module_name_repetitions)]

use std::hash::{Hash, Hasher};
use std::ops::Index;

use garnet_scanner::YamlVersion;
use hashlink::LinkedHashMap;
use ordered_float::OrderedFloat;

/// The type contained in the [`NodeValue::Sequence`] variant.
pub type Sequence = Vec<Node>;
/// The type contained in the [`NodeValue::Mapping`] variant.
///
/// Iteration order matches the order of the keys in the document.
pub type Mapping = LinkedHashMap<Node, Node>;

/// The payload of a [`Node`].
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum NodeValue {
    /// A null value (`~`, `null`, an omitted mapping value).
    Null,
    /// A boolean value.
    Boolean(bool),
    /// A signed 64-bit integer.
    Integer(i64),
    /// An IEEE-754 double. `+inf`, `-inf` and `NaN` are representable;
    /// [`OrderedFloat`] supplies the total order and hash that make floats
    /// usable as mapping keys.
    FloatingPoint(OrderedFloat<f64>),
    /// A UTF-8 string; may be empty.
    String(String),
    /// An ordered list of child nodes; may be empty.
    Sequence(Sequence),
    /// An ordered collection of key-value pairs with unique keys.
    Mapping(Mapping),
}

/// The role an anchor name plays on the node carrying it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AnchorRole {
    /// The node defines the anchor (`&name`).
    Anchor,
    /// The node was produced by an alias referencing the anchor (`*name`).
    Alias,
}

/// An anchor name attached to a node, together with its role.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Anchor {
    /// The anchor name, never empty.
    pub name: String,
    /// Whether the node defines the anchor or aliases it.
    pub role: AnchorRole,
}

/// A node of the deserialized YAML tree.
///
/// A node is a [`NodeValue`] plus the optional properties it carried in the
/// source: an anchor name (with its role), a tag in its verbatim textual
/// form, and the YAML version of the enclosing document.
///
/// Equality and hashing consider the value only, so nodes can be looked up
/// in mappings without reconstructing their properties.
///
/// # Examples
///
/// ```
/// use garnet::Node;
///
/// let doc = garnet::parse("a: [1, 2]").unwrap();
/// assert_eq!(doc["a"][1].as_integer().unwrap(), 2);
/// assert!(doc["a"].is_sequence());
/// ```
#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) value: NodeValue,
    pub(crate) anchor: Option<Anchor>,
    pub(crate) tag: Option<String>,
    pub(crate) version: YamlVersion,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

macro_rules! define_as (
    ($name:ident, $t:ident, $variant:ident) => (
/// Get a copy of the inner value if the node is a `$t`.
#[must_use]
pub fn $name(&self) -> Option<$t> {
    match self.value {
        NodeValue::$variant(v) => Some(v),
        _ => None,
    }
}
    );
);

macro_rules! define_as_ref (
    ($name:ident, $t:ty, $variant:ident) => (
/// Get a reference to the inner value if the node is the matching variant.
#[must_use]
pub fn $name(&self) -> Option<$t> {
    match self.value {
        NodeValue::$variant(ref v) => Some(v),
        _ => None,
    }
}
    );
);

macro_rules! define_into (
    ($name:ident, $t:ty, $variant:ident) => (
/// Get the inner value if the node is the matching variant, consuming the node.
#[must_use]
pub fn $name(self) -> Option<$t> {
    match self.value {
        NodeValue::$variant(v) => Some(v),
        _ => None,
    }
}
    );
);

macro_rules! define_is (
    ($name:ident, $pattern:pat) => (
/// Return whether the node's value matches the variant.
#[must_use]
pub fn $name(&self) -> bool {
    matches!(self.value, $pattern)
}
    );
);

impl Node {
    /// Create a node from a bare value, without properties.
    #[must_use]
    pub fn new(value: NodeValue) -> Node {
        Node {
            value,
            anchor: None,
            tag: None,
            version: YamlVersion::default(),
        }
    }

    /// Return the node's value.
    #[must_use]
    pub fn value(&self) -> &NodeValue {
        &self.value
    }

    define_as!(as_bool, bool, Boolean);
    define_as!(as_integer, i64, Integer);

    define_as_ref!(as_str, &str, String);
    define_as_ref!(as_vec, &Sequence, Sequence);
    define_as_ref!(as_mapping, &Mapping, Mapping);

    define_into!(into_string, String, String);
    define_into!(into_vec, Sequence, Sequence);
    define_into!(into_mapping, Mapping, Mapping);

    define_is!(is_null, NodeValue::Null);
    define_is!(is_boolean, NodeValue::Boolean(_));
    define_is!(is_integer, NodeValue::Integer(_));
    define_is!(is_floating_point, NodeValue::FloatingPoint(_));
    define_is!(is_string, NodeValue::String(_));
    define_is!(is_sequence, NodeValue::Sequence(_));
    define_is!(is_mapping, NodeValue::Mapping(_));

    /// Return the `f64` value if the node is a floating point number.
    #[must_use]
    pub fn as_floating_point(&self) -> Option<f64> {
        match self.value {
            NodeValue::FloatingPoint(v) => Some(v.into_inner()),
            _ => None,
        }
    }

    /// Return the anchor name attached to the node, if any.
    #[must_use]
    pub fn anchor_name(&self) -> Option<&str> {
        self.anchor.as_ref().map(|a| a.name.as_str())
    }

    /// Return whether the node defines an anchor.
    #[must_use]
    pub fn is_anchor(&self) -> bool {
        matches!(self.anchor, Some(Anchor { role: AnchorRole::Anchor, .. }))
    }

    /// Return whether the node was produced by an alias.
    #[must_use]
    pub fn is_alias(&self) -> bool {
        matches!(self.anchor, Some(Anchor { role: AnchorRole::Alias, .. }))
    }

    /// Return the tag attached to the node in its verbatim source form
    /// (e.g. `!!str`, `!local`, `!<tag:example.com,2000:foo>`), if any.
    #[must_use]
    pub fn tag_name(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Return the YAML version of the document this node came from.
    #[must_use]
    pub fn yaml_version(&self) -> YamlVersion {
        self.version
    }

    /// Look up a value in a mapping node by string key.
    ///
    /// Returns `None` if the node is not a mapping or the key is absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping()
            .and_then(|m| m.get(&Node::from(key)))
    }

    /// Return the number of children of a sequence or mapping node.
    ///
    /// Returns `None` for scalar nodes.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match &self.value {
            NodeValue::Sequence(v) => Some(v.len()),
            NodeValue::Mapping(m) => Some(m.len()),
            _ => None,
        }
    }

    /// Return whether a sequence or mapping node has no children.
    ///
    /// Returns `None` for scalar nodes.
    #[must_use]
    pub fn is_empty(&self) -> Option<bool> {
        self.len().map(|l| l == 0)
    }
}

impl From<bool> for Node {
    fn from(v: bool) -> Node {
        Node::new(NodeValue::Boolean(v))
    }
}

impl From<i64> for Node {
    fn from(v: i64) -> Node {
        Node::new(NodeValue::Integer(v))
    }
}

impl From<f64> for Node {
    fn from(v: f64) -> Node {
        Node::new(NodeValue::FloatingPoint(OrderedFloat(v)))
    }
}

impl From<&str> for Node {
    fn from(v: &str) -> Node {
        Node::new(NodeValue::String(v.to_owned()))
    }
}

impl From<String> for Node {
    fn from(v: String) -> Node {
        Node::new(NodeValue::String(v))
    }
}

impl From<Sequence> for Node {
    fn from(v: Sequence) -> Node {
        Node::new(NodeValue::Sequence(v))
    }
}

impl From<Mapping> for Node {
    fn from(v: Mapping) -> Node {
        Node::new(NodeValue::Mapping(v))
    }
}

impl<'a> Index<&'a str> for Node {
    type Output = Node;

    /// Index into a mapping node by string key.
    ///
    /// # Panics
    /// Panics if the node is not a mapping or the key is absent. Use
    /// [`Node::get`] for a fallible lookup.
    fn index(&self, idx: &'a str) -> &Node {
        self.get(idx)
            .unwrap_or_else(|| panic!("no such key in the mapping: {idx:?}"))
    }
}

impl Index<usize> for Node {
    type Output = Node;

    /// Index into a sequence node by position, or into a mapping node by
    /// integer key.
    ///
    /// # Panics
    /// Panics if the node is neither, or if the entry is absent.
    fn index(&self, idx: usize) -> &Node {
        match &self.value {
            NodeValue::Sequence(v) => v
                .get(idx)
                .unwrap_or_else(|| panic!("sequence index out of bounds: {idx}")),
            NodeValue::Mapping(m) => m
                .get(&Node::from(idx as i64))
                .unwrap_or_else(|| panic!("no such key in the mapping: {idx}")),
            _ => panic!("cannot index into a scalar node"),
        }
    }
}

impl IntoIterator for Node {
    type Item = Node;
    type IntoIter = NodeIter;

    fn into_iter(self) -> Self::IntoIter {
        NodeIter {
            nodes: self.into_vec().unwrap_or_default().into_iter(),
        }
    }
}

/// An iterator over the elements of a sequence [`Node`].
pub struct NodeIter {
    nodes: std::vec::IntoIter<Node>,
}

impl Iterator for NodeIter {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        self.nodes.next()
    }
}

#[cfg(test)]
mod test {
    use super::{Node, NodeValue};

    #[test]
    fn test_equality_ignores_properties() {
        let bare = Node::from("key");
        let mut tagged = Node::from("key");
        tagged.tag = Some("!!str".to_owned());
        assert_eq!(bare, tagged);
    }

    #[test]
    fn test_accessors() {
        let node = Node::from(42i64);
        assert_eq!(node.as_integer(), Some(42));
        assert_eq!(node.as_str(), None);
        assert!(Node::new(NodeValue::Null).is_null());
    }
}
