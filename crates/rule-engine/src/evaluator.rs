//! Condition evaluator for business rules

use crate::error::RuleError;
use crate::model::{Condition, ConditionResult, Operator, RuleContext};
use crate::resolver::FieldValue;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;

/// Evaluator for rule conditions
///
/// Conditions are fail-closed: anything that goes wrong while applying an
/// operator produces a `false` result, never an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// Create a new condition evaluator
    pub fn new() -> Self {
        Self
    }

    /// Evaluate every condition in declared order, without short-circuiting
    pub fn evaluate_all(
        &self,
        conditions: &[Condition],
        context: &RuleContext,
    ) -> Vec<ConditionResult> {
        conditions
            .iter()
            .map(|condition| self.evaluate(condition, context))
            .collect()
    }

    /// Evaluate a single condition
    pub fn evaluate(&self, condition: &Condition, context: &RuleContext) -> ConditionResult {
        let actual = context.resolve(&condition.field);

        let result = match self.apply(&condition.operator, actual, condition.value.as_ref()) {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(
                    condition_id = %condition.id,
                    field = %condition.field,
                    "Condition evaluation failed, treating as false: {}",
                    e
                );
                false
            }
        };

        ConditionResult {
            condition_id: condition.id.clone(),
            field: condition.field.clone(),
            operator: condition.operator.clone(),
            expected_value: condition.value.clone(),
            actual_value: actual.as_value().cloned(),
            result,
        }
    }

    /// Apply an operator to a resolved value and the expected literal
    fn apply(
        &self,
        operator: &Operator,
        actual: FieldValue<'_>,
        expected: Option<&Value>,
    ) -> Result<bool, RuleError> {
        let expected = expected.unwrap_or(&Value::Null);

        let result = match operator {
            Operator::Equals => actual.as_value().is_some_and(|a| values_equal(a, expected)),
            Operator::NotEquals => !actual.as_value().is_some_and(|a| values_equal(a, expected)),
            Operator::GreaterThan => ordering(actual, expected).is_some_and(Ordering::is_gt),
            Operator::LessThan => ordering(actual, expected).is_some_and(Ordering::is_lt),
            Operator::GreaterEqual => ordering(actual, expected).is_some_and(Ordering::is_ge),
            Operator::LessEqual => ordering(actual, expected).is_some_and(Ordering::is_le),
            Operator::Contains => match actual.as_value() {
                Some(a) => coerce_string(a).contains(&coerce_string(expected)),
                None => false,
            },
            Operator::NotContains => {
                let haystack = actual.as_value().map(coerce_string).unwrap_or_default();
                !haystack.contains(&coerce_string(expected))
            }
            Operator::In => match expected {
                Value::Array(set) => actual
                    .as_value()
                    .is_some_and(|a| set.iter().any(|item| values_equal(a, item))),
                _ => false,
            },
            Operator::NotIn => match expected {
                Value::Array(set) => !actual
                    .as_value()
                    .is_some_and(|a| set.iter().any(|item| values_equal(a, item))),
                _ => false,
            },
            Operator::Matches => self.evaluate_matches(actual, expected)?,
            Operator::Exists => actual.exists(),
            Operator::NotExists => !actual.exists(),
            Operator::Unknown(name) => {
                tracing::warn!("Unknown condition operator '{}'", name);
                return Err(RuleError::UnsupportedOperator(name.clone()));
            }
        };

        Ok(result)
    }

    /// Evaluate a `matches` condition; the pattern is compiled on every call
    fn evaluate_matches(
        &self,
        actual: FieldValue<'_>,
        pattern: &Value,
    ) -> Result<bool, RuleError> {
        let Some(pattern) = pattern.as_str() else {
            return Err(RuleError::InvalidPattern(pattern.to_string()));
        };
        let Some(actual) = actual.as_value() else {
            return Ok(false);
        };

        let regex = Regex::new(pattern).map_err(|e| RuleError::InvalidPattern(e.to_string()))?;
        Ok(regex.is_match(&coerce_string(actual)))
    }
}

/// Strict equality, treating numbers by value (`35 == 35.0`)
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            x == y || matches!((x.as_f64(), y.as_f64()), (Some(l), Some(r)) if l == r)
        }
        _ => a == b,
    }
}

/// Native ordering between the resolved value and the expected literal
///
/// Strings compare lexicographically; numbers (and numeric strings paired
/// with a number) compare numerically. Absent values and any other pairing
/// are unordered.
fn ordering(actual: FieldValue<'_>, expected: &Value) -> Option<Ordering> {
    let actual = actual.as_value()?;
    match (actual, expected) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => as_number(actual)?.partial_cmp(&as_number(expected)?),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// String form used by containment and pattern checks
fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(coerce_string).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}
