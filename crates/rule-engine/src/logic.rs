//! Boolean expressions over condition results for `custom` rules

use crate::error::RuleError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A boolean expression tree referencing conditions by id
///
/// ```json
/// {"type": "and", "operands": [
///     {"type": "condition", "id": "overdue"},
///     {"type": "not", "operand": {"type": "condition", "id": "vip"}}
/// ]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogicExpr {
    /// Result of the condition with this id
    Condition { id: String },
    /// Logical AND of the operands
    And { operands: Vec<LogicExpr> },
    /// Logical OR of the operands
    Or { operands: Vec<LogicExpr> },
    /// Negate an expression
    Not { operand: Box<LogicExpr> },
}

impl LogicExpr {
    /// Parse and structurally check a stored expression
    pub fn parse(value: &Value) -> Result<Self, RuleError> {
        let expr: LogicExpr = serde_json::from_value(value.clone())
            .map_err(|e| RuleError::InvalidCustomLogic(e.to_string()))?;
        expr.check_shape()?;
        Ok(expr)
    }

    fn check_shape(&self) -> Result<(), RuleError> {
        match self {
            Self::Condition { id } if id.is_empty() => Err(RuleError::InvalidCustomLogic(
                "condition reference has an empty id".to_string(),
            )),
            Self::Condition { .. } => Ok(()),
            Self::And { operands } | Self::Or { operands } => {
                if operands.is_empty() {
                    return Err(RuleError::InvalidCustomLogic(
                        "and/or groups need at least one operand".to_string(),
                    ));
                }
                operands.iter().try_for_each(Self::check_shape)
            }
            Self::Not { operand } => operand.check_shape(),
        }
    }

    /// Ids of every condition the expression references, in order of appearance
    pub fn referenced_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids<'a>(&'a self, ids: &mut Vec<&'a str>) {
        match self {
            Self::Condition { id } => ids.push(id.as_str()),
            Self::And { operands } | Self::Or { operands } => {
                for operand in operands {
                    operand.collect_ids(ids);
                }
            }
            Self::Not { operand } => operand.collect_ids(ids),
        }
    }

    /// Evaluate against already computed condition results keyed by id
    pub fn evaluate(&self, results: &HashMap<&str, bool>) -> Result<bool, RuleError> {
        match self {
            Self::Condition { id } => results
                .get(id.as_str())
                .copied()
                .ok_or_else(|| RuleError::UnknownConditionReference(id.clone())),
            Self::And { operands } => {
                for operand in operands {
                    if !operand.evaluate(results)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or { operands } => {
                for operand in operands {
                    if operand.evaluate(results)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Not { operand } => Ok(!operand.evaluate(results)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({"type": "or", "operands": [
            {"type": "condition", "id": "a"},
            {"type": "and", "operands": [
                {"type": "condition", "id": "b"},
                {"type": "not", "operand": {"type": "condition", "id": "c"}}
            ]}
        ]})
    }

    #[test]
    fn test_parse_and_evaluate() {
        let expr = LogicExpr::parse(&sample()).unwrap();
        assert_eq!(expr.referenced_ids(), vec!["a", "b", "c"]);

        let results = HashMap::from([("a", false), ("b", true), ("c", false)]);
        assert!(expr.evaluate(&results).unwrap());

        let results = HashMap::from([("a", false), ("b", true), ("c", true)]);
        assert!(!expr.evaluate(&results).unwrap());
    }

    #[test]
    fn test_rejects_malformed_expressions() {
        assert!(LogicExpr::parse(&json!("a AND b")).is_err());
        assert!(LogicExpr::parse(&json!({"type": "xor", "operands": []})).is_err());
        assert!(LogicExpr::parse(&json!({"type": "and", "operands": []})).is_err());
        assert!(LogicExpr::parse(&json!({"type": "condition", "id": ""})).is_err());
    }

    #[test]
    fn test_unknown_reference_is_an_error() {
        let expr = LogicExpr::parse(&json!({"type": "condition", "id": "zzz"})).unwrap();
        let err = expr.evaluate(&HashMap::new()).unwrap_err();
        assert!(matches!(err, RuleError::UnknownConditionReference(id) if id == "zzz"));
    }
}
