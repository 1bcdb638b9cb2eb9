//! Verify parsing and planning against JSON test vectors stored in
//! `test-vectors/`.
//!
//! Plans are compared as serialized JSON, field by field, so a vector only
//! pins down what it lists.

use req_core::{runner, Error};
use serde_json::Value;

fn cases(raw: &str) -> Vec<Value> {
    let vectors: Value = serde_json::from_str(raw).unwrap();
    vectors["cases"].as_array().unwrap().clone()
}

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

#[test]
fn plan_test_vectors() {
    for case in cases(include_str!("../../test-vectors/plans.json")) {
        let name = case["name"].as_str().unwrap();
        let input = case["input"].as_str().unwrap();
        let plan = runner::plan_for(input).unwrap_or_else(|e| panic!("{name}: {e}"));
        let actual = serde_json::to_value(&plan).unwrap();

        for (field, expected) in case["expected"].as_object().unwrap() {
            assert_eq!(&actual[field], expected, "{name}: field {field}");
        }
        for field in case["absent"].as_array().into_iter().flatten() {
            let field = field.as_str().unwrap();
            assert!(actual.get(field).is_none(), "{name}: {field} should be absent");
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn error_test_vectors() {
    for case in cases(include_str!("../../test-vectors/errors.json")) {
        let name = case["name"].as_str().unwrap();
        let input = case["input"].as_str().unwrap();
        let err = match runner::plan_for(input) {
            Ok(plan) => panic!("{name}: expected an error, got {plan:?}"),
            Err(err) => err,
        };

        assert_eq!(
            u64::from(err.exit_code()),
            case["exit_code"].as_u64().unwrap(),
            "{name}: exit code"
        );
        let message = case["message"].as_str().unwrap();
        assert!(err.to_string().contains(message), "{name}: {err}");
        assert_eq!(err.suggestion(), case["suggestion"].as_str(), "{name}: suggestion");

        if let Error::Parse(parse) = &err {
            if let Some(position) = case["position"].as_u64() {
                assert_eq!(parse.position as u64, position, "{name}: position");
            }
            if let Some(token) = case["token"].as_str() {
                assert_eq!(parse.token, token, "{name}: token");
            }
        }
    }
}
