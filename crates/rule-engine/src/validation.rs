//! Structural validation of business rules

use crate::error::RuleError;
use crate::logic::LogicExpr;
use crate::model::{ActionType, BusinessRule, ConditionLogic, Operator};
use serde::Serialize;
use std::collections::HashSet;

/// Outcome of validating a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Convert into a `Result`, carrying the error list on failure
    pub fn into_result(self) -> Result<(), RuleError> {
        if self.valid {
            Ok(())
        } else {
            Err(RuleError::Validation(self.errors))
        }
    }
}

/// Check a rule for structural problems; never fails, returns every problem found
pub fn validate_rule(rule: &BusinessRule) -> ValidationReport {
    let mut errors = Vec::new();

    if rule.name.trim().is_empty() {
        errors.push("Rule name is required".to_string());
    }
    if rule.category.trim().is_empty() {
        errors.push("Rule category is required".to_string());
    }
    if rule.conditions.is_empty() {
        errors.push("At least one condition is required".to_string());
    }
    if rule.actions.is_empty() {
        errors.push("At least one action is required".to_string());
    }

    let mut seen_ids = HashSet::new();
    for (index, condition) in rule.conditions.iter().enumerate() {
        if !seen_ids.insert(condition.id.as_str()) {
            errors.push(format!("Condition {index}: duplicate id '{}'", condition.id));
        }
        if condition.field.trim().is_empty() {
            errors.push(format!("Condition {index}: field is required"));
        }
        if let Operator::Unknown(name) = &condition.operator {
            errors.push(format!("Condition {index}: unknown operator '{name}'"));
        } else if !condition.operator.is_presence_check() && condition.value.is_none() {
            errors.push(format!(
                "Condition {index}: value is required for operator '{}'",
                condition.operator
            ));
        }
    }

    for (index, action) in rule.actions.iter().enumerate() {
        match &action.action_type {
            ActionType::SetValue if action.target.is_none() => {
                errors.push(format!("Action {index}: set_value requires a target"));
            }
            ActionType::SendNotification if !action.parameters.contains_key("message") => {
                errors.push(format!(
                    "Action {index}: send_notification requires parameters.message"
                ));
            }
            ActionType::ApplyDiscount
                if action.value.is_none() && !action.parameters.contains_key("percent") =>
            {
                errors.push(format!(
                    "Action {index}: apply_discount requires a value or parameters.percent"
                ));
            }
            ActionType::Unknown(name) => {
                errors.push(format!("Action {index}: unknown action type '{name}'"));
            }
            _ => {}
        }
    }

    if rule.condition_logic == ConditionLogic::Custom {
        match &rule.custom_logic {
            None => errors.push(
                "Custom logic expression is required when conditionLogic is 'custom'".to_string(),
            ),
            Some(raw) => match LogicExpr::parse(raw) {
                Ok(expr) => {
                    for id in expr.referenced_ids() {
                        if !seen_ids.contains(id) {
                            let err = RuleError::UnknownConditionReference(id.to_string());
                            errors.push(err.to_string());
                        }
                    }
                }
                Err(e) => errors.push(e.to_string()),
            },
        }
    }

    ValidationReport::from_errors(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, Condition};
    use serde_json::json;

    fn valid_rule() -> BusinessRule {
        BusinessRule::new("Overdue", "billing")
            .with_condition(Condition::new("billing.daysPastDue", Operator::GreaterThan, 30))
            .with_action(Action::new(ActionType::SetValue).with_target("flag").with_value(true))
    }

    #[test]
    fn test_valid_rule() {
        let report = validate_rule(&valid_rule());
        assert!(report.valid, "{:?}", report.errors);
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_missing_basics() {
        let rule = BusinessRule::new("  ", "");
        let report = validate_rule(&rule);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 4);
    }

    #[test]
    fn test_condition_value_rules() {
        let rule = valid_rule()
            .with_condition(Condition::presence("customer.id", Operator::Exists))
            .with_condition(Condition::presence("customer.name", Operator::Equals))
            .with_condition(Condition::new("x", Operator::Unknown("near".into()), 1));
        let report = validate_rule(&rule);
        assert_eq!(
            report.errors,
            vec![
                "Condition 2: value is required for operator 'equals'",
                "Condition 3: unknown operator 'near'",
            ]
        );
    }

    #[test]
    fn test_action_requirements() {
        let rule = valid_rule()
            .with_action(Action::new(ActionType::SetValue))
            .with_action(Action::new(ActionType::SendNotification))
            .with_action(Action::new(ActionType::ApplyDiscount))
            .with_action(Action::new(ActionType::ApplyDiscount).with_parameter("percent", 10))
            .with_action(Action::new(ActionType::Unknown("teleport".into())));
        let report = validate_rule(&rule);
        assert_eq!(
            report.errors,
            vec![
                "Action 1: set_value requires a target",
                "Action 2: send_notification requires parameters.message",
                "Action 3: apply_discount requires a value or parameters.percent",
                "Action 5: unknown action type 'teleport'",
            ]
        );
    }

    #[test]
    fn test_custom_logic_is_parsed() {
        let mut rule = valid_rule().with_logic(ConditionLogic::Custom);
        assert!(!validate_rule(&rule).valid);

        rule.custom_logic = Some(json!("c1 AND c2"));
        let report = validate_rule(&rule);
        assert!(report.errors[0].starts_with("Invalid custom logic"));

        let id = rule.conditions[0].id.clone();
        rule.custom_logic = Some(json!({"type": "or", "operands": [
            {"type": "condition", "id": id},
            {"type": "condition", "id": "ghost"}
        ]}));
        let report = validate_rule(&rule);
        assert_eq!(
            report.errors,
            vec!["Custom logic references unknown condition: ghost"]
        );
    }
}
