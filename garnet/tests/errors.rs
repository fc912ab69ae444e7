//! Failure semantics: every error is fatal, carries a position, and keeps a
//! stable message.

use garnet::{LoadError, ScanErrorKind};

fn parse_err(input: &str) -> LoadError {
    garnet::parse(input).unwrap_err()
}

#[test]
fn test_duplicate_mapping_keys() {
    let err = parse_err("foo: bar\nfoo: baz");
    assert!(err.to_string().contains("Detected duplication in mapping keys."));

    let err = parse_err("{a: 1, a: 2}");
    assert!(err.to_string().contains("Detected duplication in mapping keys."));
}

#[test]
fn test_forward_alias_is_rejected() {
    let err = parse_err("foo: *anchor");
    assert!(err
        .to_string()
        .contains("The given anchor name must appear prior to the alias node."));
}

#[test]
fn test_alias_before_anchor_on_same_document_is_rejected() {
    let err = parse_err("a: *x\nb: &x 1\n");
    assert!(err
        .to_string()
        .contains("must appear prior to the alias node."));
}

#[test]
fn test_tab_indentation_is_rejected() {
    let err = parse_err("foo:\n\tbar: 1");
    assert!(err.to_string().contains("tab characters"));
}

#[test]
fn test_unsupported_yaml_version() {
    let err = parse_err("%YAML 1.3\n---\nfoo: bar");
    assert!(err.to_string().contains("Unsupported YAML version."));
}

#[test]
fn test_directives_require_document_start() {
    let err = parse_err("%YAML 1.2\nfoo: bar");
    assert!(err
        .to_string()
        .contains("directives must be terminated by an end of directives marker (---)."));
}

#[test]
fn test_duplicate_yaml_directive() {
    let err = parse_err("%YAML 1.1\n%YAML 1.2\n---\nfoo: bar");
    assert!(err
        .to_string()
        .contains("YAML version cannot be specified more than once."));
}

#[test]
fn test_unknown_directive_alone_is_fine() {
    let doc = garnet::parse("%INVALID foo bar").unwrap();
    assert!(doc.is_null());
}

#[test]
fn test_missing_key_separator() {
    let err = parse_err("1:\n1");
    assert!(err.to_string().contains("missing key separator"));

    let err = parse_err("abc:\n  def: ghi\n  jkl mno");
    assert!(err.to_string().contains("missing key separator"));
}

#[test]
fn test_key_separator_without_key() {
    for input in ["- : foo", ": foo"] {
        let err = parse_err(input);
        assert!(
            err.to_string().contains("A key separator found without key."),
            "{input}: {err}"
        );
    }
}

#[test]
fn test_multiple_keys_on_one_line() {
    let err = parse_err("a: b: c");
    assert!(err
        .to_string()
        .contains("multiple mapping keys are specified on the same line."));
}

#[test]
fn test_unclosed_flow_container() {
    let err = parse_err("foo: [1, 2");
    assert!(err.to_string().contains("unclosed flow container"));

    let err = parse_err("foo: {a: 1");
    assert!(err.to_string().contains("unclosed flow container"));
}

#[test]
fn test_value_separator_outside_flow() {
    let err = parse_err(", foo");
    assert!(err
        .to_string()
        .contains("A value separator(,) must not appear outside flow containers."));
}

#[test]
fn test_empty_flow_element() {
    let err = parse_err("[1,,2]");
    assert!(err.to_string().contains("empty element in a flow container"));

    let err = parse_err("[, 1]");
    assert!(err.to_string().contains("empty element in a flow container"));

    // A trailing comma is legal.
    assert!(garnet::parse("[1, 2, ]").is_ok());
}

#[test]
fn test_missing_flow_separator() {
    let err = parse_err("[1 2]");
    assert!(err
        .to_string()
        .contains("detected a missing value separator (,) in a flow container."));
}

#[test]
fn test_sequence_entry_without_prefix() {
    let err = parse_err("- 1\n2\n");
    assert!(err
        .to_string()
        .contains("detected a missing sequence entry prefix (- )."));
}

#[test]
fn test_invalid_indentation() {
    let err = parse_err("a:\n  b: 1\n c: 2\n");
    assert!(err.to_string().contains("Detected invalid indentation."));
}

#[test]
fn test_mixing_sequence_and_mapping_at_root() {
    let err = parse_err("- 1\nkey: x\n");
    assert!(matches!(err, LoadError::Parse(0, _)));
}

#[test]
fn test_control_character_error_carries_position() {
    let err = parse_err("foo: \"a\x01b\"");
    let LoadError::Parse(document, scan) = &err else {
        panic!("expected a parse error, got {err:?}");
    };
    assert_eq!(*document, 0);
    assert_eq!(scan.kind(), ScanErrorKind::Parse);
    assert_eq!(
        scan.info(),
        "Control character U+0001 (SOH) must be escaped to \\u0001."
    );
    assert_eq!(scan.marker().line(), 0);
}

#[test]
fn test_out_of_range_integer() {
    let err = parse_err("a: 9223372036854775808");
    let LoadError::Parse(_, scan) = &err else {
        panic!("expected a parse error, got {err:?}");
    };
    assert_eq!(scan.kind(), ScanErrorKind::OutOfRange);
}

#[test]
fn test_invalid_encoding() {
    let err = garnet::parse(&b"a: \xc3\x28"[..]).unwrap_err();
    let LoadError::Decode(scan) = &err else {
        panic!("expected a decode error, got {err:?}");
    };
    assert_eq!(scan.kind(), ScanErrorKind::InvalidEncoding);
}

#[test]
fn test_error_in_second_document_reports_its_index() {
    let err = garnet::parse_all("---\nok: 1\n---\nfoo: bar\nfoo: baz\n").unwrap_err();
    assert_eq!(err.document(), 1);
    assert!(err.marker().is_some());
}

#[test]
fn test_unterminated_quoted_scalar() {
    let err = parse_err("a: 'oops");
    assert!(err
        .to_string()
        .contains("Invalid end of input buffer in a single-quoted string token."));
}
