#![allow(clippy::bool_assert_comparison)]
#![allow(clippy::float_cmp)]

use garnet::{Node, NodeValue};

#[test]
fn test_api() {
    let s = "
- name: Ogre
  position: [0, 5, 0]
  powers:
    - name: Club
      damage: 10
    - name: Fist
      damage: 8
- name: Dragon
  position: [1, 0, 10]
  powers:
    - name: Fire Breath
      damage: 25
- name: Wizard
  position: [5, -3, 0]
  powers:
    - name: Acid Rain
      damage: 50
";
    let doc = garnet::parse(s).unwrap();

    assert_eq!(doc[0]["name"].as_str().unwrap(), "Ogre");
    assert_eq!(doc[1]["position"][2].as_integer().unwrap(), 10);
    assert_eq!(doc[2]["powers"][0]["damage"].as_integer().unwrap(), 50);
    assert_eq!(doc.len(), Some(3));
}

#[test]
fn test_coerce() {
    let s = "---
a: 1
b: 2.2
c: [1, 2]
";
    let doc = garnet::parse(s).unwrap();
    assert_eq!(doc["a"].as_integer().unwrap(), 1i64);
    assert_eq!(doc["b"].as_floating_point().unwrap(), 2.2f64);
    assert_eq!(doc["c"][1].as_integer().unwrap(), 2i64);
    assert!(doc.get("d").is_none());
}

#[test]
fn test_mapping_with_flow_sequence_value() {
    let doc = garnet::parse("foo: [1, 2, 3]").unwrap();
    assert!(doc.is_mapping());
    let seq = doc["foo"].as_vec().unwrap();
    assert_eq!(seq.len(), 3);
    assert_eq!(seq[0].as_integer(), Some(1));
    assert_eq!(seq[1].as_integer(), Some(2));
    assert_eq!(seq[2].as_integer(), Some(3));
}

#[test]
fn test_anchor_redefinition() {
    let doc = garnet::parse("- &a 10\n- *a\n- &a 20\n- *a\n").unwrap();
    let seq = doc.as_vec().unwrap();
    let values: Vec<i64> = seq.iter().map(|n| n.as_integer().unwrap()).collect();
    assert_eq!(values, [10, 10, 20, 20]);
    assert!(seq[0].is_anchor());
    assert!(seq[1].is_alias());
    assert_eq!(seq[1].anchor_name(), Some("a"));
}

#[test]
fn test_literal_block_value() {
    let doc = garnet::parse("key: |\n  line1\n  line2\n").unwrap();
    assert_eq!(doc["key"].as_str().unwrap(), "line1\nline2\n");
}

#[test]
fn test_folded_block_value() {
    let doc = garnet::parse("key: >\n  a\n  b\n\n  c\n").unwrap();
    assert_eq!(doc["key"].as_str().unwrap(), "a b\nc\n");
}

#[test]
fn test_nested_flow() {
    let doc = garnet::parse("{a: [1, {b: 2}], c: ~}").unwrap();
    assert_eq!(doc["a"][0].as_integer().unwrap(), 1);
    assert_eq!(doc["a"][1]["b"].as_integer().unwrap(), 2);
    assert!(doc["c"].is_null());
}

#[test]
fn test_anchored_block_mapping() {
    let s = "
a1: &DEFAULT
    b1: 4
    b2: d
a2: *DEFAULT
";
    let doc = garnet::parse(s).unwrap();
    assert_eq!(doc["a2"]["b1"].as_integer().unwrap(), 4);
    assert_eq!(doc["a2"]["b2"].as_str().unwrap(), "d");
    assert!(doc["a1"].is_anchor());
    assert!(doc["a2"].is_alias());
}

#[test]
fn test_alias_is_a_value_copy() {
    // The anchored value is captured as it was completed; aliases do not
    // share identity with the tree.
    let doc = garnet::parse("a: &x {k: 1}\nb: *x\n").unwrap();
    assert_eq!(doc["a"], doc["b"]);
    assert_eq!(doc["b"]["k"].as_integer().unwrap(), 1);
}

#[test]
fn test_empty_input_is_null() {
    assert!(garnet::parse("").unwrap().is_null());
    assert!(garnet::parse(" ").unwrap().is_null());
    assert!(garnet::parse("# only a comment\n").unwrap().is_null());
}

#[test]
fn test_simple_block_sequence() {
    let doc = garnet::parse("test:\n  - 'foo'\n  - bar").unwrap();
    assert_eq!(doc["test"][0].as_str().unwrap(), "foo");
    assert_eq!(doc["test"][1].as_str().unwrap(), "bar");
}

#[test]
fn test_root_sequence_of_mappings() {
    let doc = garnet::parse("- a: 1\n  b: 2\n- c: 3\n").unwrap();
    let seq = doc.as_vec().unwrap();
    assert_eq!(seq.len(), 2);
    assert_eq!(seq[0]["a"].as_integer(), Some(1));
    assert_eq!(seq[0]["b"].as_integer(), Some(2));
    assert_eq!(seq[1]["c"].as_integer(), Some(3));
}

#[test]
fn test_mixed_sequence_entries() {
    let doc = garnet::parse("- a: 1\n- 5\n").unwrap();
    let seq = doc.as_vec().unwrap();
    assert!(seq[0].is_mapping());
    assert_eq!(seq[1].as_integer(), Some(5));
}

#[test]
fn test_nested_block_sequences() {
    let doc = garnet::parse("- - 1\n  - 2\n- 3\n").unwrap();
    let seq = doc.as_vec().unwrap();
    assert_eq!(seq[0][0].as_integer(), Some(1));
    assert_eq!(seq[0][1].as_integer(), Some(2));
    assert_eq!(seq[1].as_integer(), Some(3));
}

#[test]
fn test_empty_block_sequence_entries() {
    let doc = garnet::parse("- -\n  - 123\n  -\n-\n").unwrap();
    let seq = doc.as_vec().unwrap();
    assert_eq!(seq.len(), 2);
    let inner = seq[0].as_vec().unwrap();
    assert!(inner[0].is_null());
    assert_eq!(inner[1].as_integer(), Some(123));
    assert!(inner[2].is_null());
    assert!(seq[1].is_null());
}

#[test]
fn test_nested_block_mappings() {
    let s = "a:
  b:
    c: 1
    d: 2
  e: 3
f: 4
";
    let doc = garnet::parse(s).unwrap();
    assert_eq!(doc["a"]["b"]["c"].as_integer(), Some(1));
    assert_eq!(doc["a"]["b"]["d"].as_integer(), Some(2));
    assert_eq!(doc["a"]["e"].as_integer(), Some(3));
    assert_eq!(doc["f"].as_integer(), Some(4));
}

#[test]
fn test_mapping_values_split_across_lines() {
    let s = "foo:
  bar
baz:
  123
null:
  {false: 3.14}
qux:
  [r, g, b]
";
    let doc = garnet::parse(s).unwrap();
    assert_eq!(doc["foo"].as_str().unwrap(), "bar");
    assert_eq!(doc["baz"].as_integer(), Some(123));
    let null_key = Node::new(NodeValue::Null);
    let mapping = doc.as_mapping().unwrap();
    let under_null = mapping.get(&null_key).unwrap();
    assert_eq!(
        under_null
            .as_mapping()
            .unwrap()
            .get(&Node::from(false))
            .unwrap()
            .as_floating_point(),
        Some(3.14)
    );
    assert_eq!(doc["qux"][1].as_str().unwrap(), "g");
}

#[test]
fn test_block_sequence_at_key_indentation() {
    let s = "a:
- 1
- 2
b: 3
";
    let doc = garnet::parse(s).unwrap();
    assert_eq!(doc["a"][0].as_integer(), Some(1));
    assert_eq!(doc["a"][1].as_integer(), Some(2));
    assert_eq!(doc["b"].as_integer(), Some(3));
}

#[test]
fn test_omitted_values_are_null() {
    let doc = garnet::parse("a:\nb: 1\n").unwrap();
    assert!(doc["a"].is_null());
    assert_eq!(doc["b"].as_integer(), Some(1));

    let doc = garnet::parse("{a, b: 1}").unwrap();
    assert!(doc["a"].is_null());
    assert_eq!(doc["b"].as_integer(), Some(1));

    // A `:` directly against the closing brace or the separator.
    let doc = garnet::parse("{a:}").unwrap();
    assert!(doc["a"].is_null());

    let doc = garnet::parse("k: {a:, b: 2}\nk2: v\n").unwrap();
    assert!(doc["k"]["a"].is_null());
    assert_eq!(doc["k"]["b"].as_integer(), Some(2));
    assert_eq!(doc["k2"].as_str().unwrap(), "v");
}

#[test]
fn test_empty_mapping_values_with_siblings() {
    let s = "foo:
bar:
  foo:
  bar:
baz:
";
    let doc = garnet::parse(s).unwrap();
    assert_eq!(doc.len(), Some(3));
    assert!(doc["foo"].is_null());
    assert!(doc["bar"].is_mapping());
    assert!(doc["bar"]["foo"].is_null());
    assert!(doc["bar"]["bar"].is_null());
    assert!(doc["baz"].is_null());
}

#[test]
fn test_mapping_after_empty_sequence_entries() {
    let s = "test:
    - coords:
      -
      -
      name: \"a\"
";
    let doc = garnet::parse(s).unwrap();
    let entry = &doc["test"][0];
    assert_eq!(entry["coords"].len(), Some(2));
    assert!(entry["coords"][0].is_null());
    assert!(entry["coords"][1].is_null());
    assert_eq!(entry["name"].as_str().unwrap(), "a");
}

#[test]
fn test_anchored_value_with_sibling_key() {
    let doc = garnet::parse("a: &x\nb: 1\n").unwrap();
    assert!(doc["a"].is_null());
    assert!(doc["a"].is_anchor());
    assert_eq!(doc["b"].as_integer(), Some(1));
}

#[test]
fn test_explicit_keys() {
    let doc = garnet::parse("? foo\n: bar\nbaz: qux\n").unwrap();
    assert_eq!(doc["foo"].as_str().unwrap(), "bar");
    assert_eq!(doc["baz"].as_str().unwrap(), "qux");
}

#[test]
fn test_explicit_sequence_key() {
    let doc = garnet::parse("? - a\n  - b\n: value\n").unwrap();
    let mapping = doc.as_mapping().unwrap();
    let (key, value) = mapping.iter().next().unwrap();
    assert_eq!(key[0].as_str().unwrap(), "a");
    assert_eq!(key[1].as_str().unwrap(), "b");
    assert_eq!(value.as_str().unwrap(), "value");
}

#[test]
fn test_flow_pair_inside_sequence() {
    let doc = garnet::parse("[a: b, c]").unwrap();
    let seq = doc.as_vec().unwrap();
    assert_eq!(seq[0]["a"].as_str().unwrap(), "b");
    assert_eq!(seq[1].as_str().unwrap(), "c");
}

#[test]
fn test_sequence_iteration() {
    let doc = garnet::parse("- 1\n- 2\n- 3\n").unwrap();
    let sum: i64 = doc.into_iter().map(|n| n.as_integer().unwrap()).sum();
    assert_eq!(sum, 6);
}

#[test]
fn test_keys_with_flow_indicator_characters() {
    let doc = garnet::parse("foo{bar: baz\n").unwrap();
    assert_eq!(doc["foo{bar"].as_str().unwrap(), "baz");

    let doc = garnet::parse("a: b, c\n").unwrap();
    assert_eq!(doc["a"].as_str().unwrap(), "b, c");
}

#[test]
fn test_comments_are_discarded() {
    let s = "# header
a: 1 # trailing
# between
b: 2
";
    let doc = garnet::parse(s).unwrap();
    assert_eq!(doc["a"].as_integer(), Some(1));
    assert_eq!(doc["b"].as_integer(), Some(2));
}

#[test]
fn test_crlf_input_parses_identically() {
    let unix = garnet::parse("a: 1\nb:\n  - x\n").unwrap();
    let dos = garnet::parse("a: 1\r\nb:\r\n  - x\r\n").unwrap();
    assert_eq!(unix, dos);
}
