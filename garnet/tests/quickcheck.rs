#[macro_use]
extern crate quickcheck;

use quickcheck::TestResult;

quickcheck! {
    // Mapping iteration order always equals the order of first appearance
    // of each key in the source.
    fn test_mapping_order_preservation(xs: Vec<i64>) -> TestResult {
        let mut keys = xs;
        keys.sort_unstable();
        keys.dedup();
        if keys.is_empty() {
            return TestResult::discard();
        }

        let source: String = keys
            .iter()
            .map(|k| format!("{k}: 0\n"))
            .collect();
        let doc = match garnet::parse(source) {
            Ok(doc) => doc,
            Err(err) => return TestResult::error(err.to_string()),
        };
        let parsed: Vec<i64> = doc
            .as_mapping()
            .unwrap()
            .keys()
            .map(|k| k.as_integer().unwrap())
            .collect();
        TestResult::from_bool(parsed == keys)
    }

    // A flow sequence of integers reads back as the same integers.
    fn test_flow_sequence_roundtrip(xs: Vec<i64>) -> TestResult {
        let source = format!(
            "[{}]",
            xs.iter().map(i64::to_string).collect::<Vec<_>>().join(", ")
        );
        let doc = match garnet::parse(source) {
            Ok(doc) => doc,
            Err(err) => return TestResult::error(err.to_string()),
        };
        let parsed: Vec<i64> = doc
            .as_vec()
            .unwrap()
            .iter()
            .map(|n| n.as_integer().unwrap())
            .collect();
        TestResult::from_bool(parsed == xs)
    }
}
