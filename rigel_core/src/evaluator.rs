//! Condition evaluation - the per-message matching algorithm.
//!
//! Pure functions only: the same inputs always give the same verdict.
//!
//! ```text
//! message ──extract_field(path)──► extracted ──evaluate(condition, declared, calls)──► bool
//! ```

use crate::error::EvaluationError;
use crate::requirement::Condition;
use serde_json::Value;
use std::cmp::Ordering;

/// Evaluates one condition.
///
/// `extracted` is ignored for `ReceivedCount`, which compares `call_count`
/// against the declared count exactly.
pub fn evaluate(
    condition: Condition,
    extracted: Option<&Value>,
    declared: &Value,
    call_count: u64,
) -> Result<bool, EvaluationError> {
    let value = || extracted.ok_or(EvaluationError::MissingValue(condition));

    match condition {
        Condition::ReceivedCount => declared
            .as_u64()
            .map(|target| call_count == target)
            .ok_or_else(|| EvaluationError::InvalidCallCount(declared.clone())),
        Condition::Equals => equals(value()?, declared),
        Condition::Different => equals(value()?, declared).map(|eq| !eq),
        Condition::Greater => compare(value()?, declared).map(Ordering::is_gt),
        Condition::GreaterOrEqual => compare(value()?, declared).map(Ordering::is_ge),
        Condition::Lesser => compare(value()?, declared).map(Ordering::is_lt),
        Condition::LesserOrEqual => compare(value()?, declared).map(Ordering::is_le),
    }
}

/// Walks a dotted path (`pose.position.x`, `ranges.0`) into a message.
pub fn extract_field<'a>(message: &'a Value, path: &str) -> Result<&'a Value, EvaluationError> {
    let missing = || EvaluationError::MissingField {
        path: path.to_string(),
    };

    path.split('.').try_fold(message, |node, segment| match node {
        Value::Object(map) => map.get(segment).ok_or_else(missing),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index))
            .ok_or_else(missing),
        _ => Err(missing()),
    })
}

/// Name of a JSON kind, for error messages.
fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(extracted: &Value, declared: &Value) -> EvaluationError {
    EvaluationError::TypeMismatch {
        extracted: kind(extracted),
        declared: kind(declared),
    }
}

fn equals(extracted: &Value, declared: &Value) -> Result<bool, EvaluationError> {
    match (extracted, declared) {
        (Value::Number(_), Value::Number(_)) => {
            compare(extracted, declared).map(|ord| ord == Ordering::Equal)
        }
        _ if kind(extracted) == kind(declared) => Ok(extracted == declared),
        _ => Err(mismatch(extracted, declared)),
    }
}

fn compare(extracted: &Value, declared: &Value) -> Result<Ordering, EvaluationError> {
    match (extracted, declared) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                return Ok(a.cmp(&b));
            }
            if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
                return Ok(a.cmp(&b));
            }
            let (a, b) = (a.as_f64(), b.as_f64());
            match (a, b) {
                (Some(a), Some(b)) => a
                    .partial_cmp(&b)
                    .ok_or(EvaluationError::Unorderable("number")),
                _ => Err(EvaluationError::Unorderable("number")),
            }
        }
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        _ if kind(extracted) == kind(declared) => Err(EvaluationError::Unorderable(kind(declared))),
        _ => Err(mismatch(extracted, declared)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_condition_table() {
        let five = json!(5);
        assert!(evaluate(Condition::Equals, Some(&five), &json!(5), 0).unwrap());
        assert!(evaluate(Condition::GreaterOrEqual, Some(&five), &json!(5), 0).unwrap());
        assert!(!evaluate(Condition::Lesser, Some(&five), &json!(5), 0).unwrap());
        assert!(evaluate(Condition::LesserOrEqual, Some(&five), &json!(5), 0).unwrap());
        assert!(!evaluate(Condition::Greater, Some(&five), &json!(5), 0).unwrap());
        assert!(evaluate(Condition::Greater, Some(&five), &json!(4), 0).unwrap());
        assert!(evaluate(Condition::Different, Some(&five), &json!(6), 0).unwrap());
    }

    #[test]
    fn test_received_count_is_exact() {
        assert!(evaluate(Condition::ReceivedCount, None, &json!(3), 3).unwrap());
        assert!(!evaluate(Condition::ReceivedCount, None, &json!(3), 2).unwrap());
        assert!(!evaluate(Condition::ReceivedCount, None, &json!(3), 4).unwrap());
    }

    #[test]
    fn test_integer_and_float_compare_numerically() {
        assert!(evaluate(Condition::Equals, Some(&json!(5)), &json!(5.0), 0).unwrap());
        assert!(evaluate(Condition::Lesser, Some(&json!(2.5)), &json!(3), 0).unwrap());
        assert!(evaluate(Condition::Greater, Some(&json!(u64::MAX)), &json!(1), 0).unwrap());
    }

    #[test]
    fn test_strings_and_bools() {
        assert!(evaluate(Condition::Equals, Some(&json!("done")), &json!("done"), 0).unwrap());
        assert!(!evaluate(Condition::Equals, Some(&json!("running")), &json!("done"), 0).unwrap());
        assert!(evaluate(Condition::Greater, Some(&json!("b")), &json!("a"), 0).unwrap());
        assert!(evaluate(Condition::Greater, Some(&json!(true)), &json!(false), 0).unwrap());
    }

    #[test]
    fn test_type_mismatch_is_error() {
        let result = evaluate(Condition::Equals, Some(&json!("5")), &json!(5), 0);
        assert_eq!(
            result,
            Err(EvaluationError::TypeMismatch {
                extracted: "string",
                declared: "number"
            })
        );
        assert!(evaluate(Condition::Different, Some(&json!(null)), &json!(1), 0).is_err());
    }

    #[test]
    fn test_unorderable_kinds() {
        let list = json!([1, 2]);
        assert!(evaluate(Condition::Equals, Some(&list), &json!([1, 2]), 0).unwrap());
        assert_eq!(
            evaluate(Condition::Greater, Some(&list), &json!([1]), 0),
            Err(EvaluationError::Unorderable("array"))
        );
    }

    #[test]
    fn test_missing_value() {
        assert_eq!(
            evaluate(Condition::Equals, None, &json!(1), 0),
            Err(EvaluationError::MissingValue(Condition::Equals))
        );
    }

    #[test]
    fn test_extract_field_paths() {
        let message = json!({
            "state": "done",
            "pose": { "position": { "x": 1.5 } },
            "ranges": [0.1, 0.2, 0.3]
        });

        assert_eq!(extract_field(&message, "state").unwrap(), &json!("done"));
        assert_eq!(extract_field(&message, "pose.position.x").unwrap(), &json!(1.5));
        assert_eq!(extract_field(&message, "ranges.2").unwrap(), &json!(0.3));
        assert!(matches!(
            extract_field(&message, "pose.orientation"),
            Err(EvaluationError::MissingField { .. })
        ));
        assert!(extract_field(&message, "ranges.x").is_err());
        assert!(extract_field(&message, "state.inner").is_err());
    }

    proptest! {
        #[test]
        fn evaluate_is_pure(a in -1000i64..1000, b in -1000i64..1000, calls in 0u64..10) {
            for condition in Condition::all() {
                let first = evaluate(condition, Some(&json!(a)), &json!(b), calls);
                let second = evaluate(condition, Some(&json!(a)), &json!(b), calls);
                prop_assert_eq!(first, second);
            }
        }

        #[test]
        fn equals_and_different_are_complements(a in -50i64..50, b in -50i64..50) {
            let eq = evaluate(Condition::Equals, Some(&json!(a)), &json!(b), 0).unwrap();
            let ne = evaluate(Condition::Different, Some(&json!(a)), &json!(b), 0).unwrap();
            prop_assert_ne!(eq, ne);
        }

        #[test]
        fn ordering_matches_integers(a in -50i64..50, b in -50i64..50) {
            let (a_value, b_value) = (json!(a), json!(b));
            prop_assert_eq!(
                evaluate(Condition::Greater, Some(&a_value), &b_value, 0).unwrap(),
                a > b
            );
            prop_assert_eq!(
                evaluate(Condition::LesserOrEqual, Some(&a_value), &b_value, 0).unwrap(),
                a <= b
            );
        }
    }
}
