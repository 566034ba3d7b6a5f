//! End-to-end tests: registry -> orchestrator -> evaluator / executor

use async_trait::async_trait;
use parking_lot::Mutex;
use rule_engine::{
    Action, ActionHandlers, ActionType, BusinessRule, Condition, ConditionLogic, EngineConfig,
    HandlerError, HandlerResult, ImportOptions, Operator, Parameters, RuleContext, RuleFilter,
    RuleOrchestrator, RuleRegistry,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Records every delegated call as (action type, parameters)
#[derive(Default)]
struct RecordingHandlers {
    calls: Mutex<Vec<(String, Value)>>,
}

impl RecordingHandlers {
    fn record(&self, kind: &str, parameters: &Parameters) {
        self.calls
            .lock()
            .push((kind.to_string(), Value::Object(parameters.clone())));
    }

    fn kinds(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(k, _)| k.clone()).collect()
    }
}

#[async_trait]
impl ActionHandlers for RecordingHandlers {
    async fn send_notification(
        &self,
        parameters: &Parameters,
        context: &RuleContext,
    ) -> HandlerResult {
        self.record("send_notification", parameters);
        // Notifications can read what earlier actions wrote
        let reason = context
            .resolve("metadata.rejection_reason")
            .as_value()
            .cloned()
            .unwrap_or(Value::Null);
        Ok(json!({ "sent": true, "reason": reason }))
    }

    async fn suspend_service(
        &self,
        parameters: &Parameters,
        _context: &RuleContext,
    ) -> HandlerResult {
        self.record("suspend_service", parameters);
        Ok(json!({ "suspended": true }))
    }

    async fn create_task(&self, parameters: &Parameters, _context: &RuleContext) -> HandlerResult {
        self.record("create_task", parameters);
        Err(HandlerError::new("task queue offline"))
    }
}

fn billing_context() -> RuleContext {
    RuleContext::new(json!({
        "billing": {"daysPastDue": 35, "amount": 120},
        "customer": {"status": "active", "tier": "gold"},
        "service": {"id": "svc-42"},
        "portal": "admin",
        "metadata": {}
    }))
}

fn overdue_rule() -> BusinessRule {
    BusinessRule::new("Suspend overdue accounts", "billing")
        .with_id("overdue")
        .with_priority(800)
        .with_condition(Condition::new("billing.daysPastDue", Operator::GreaterThan, 30))
        .with_condition(Condition::new("customer.status", Operator::Equals, "active"))
        .with_action(
            Action::new(ActionType::SetValue)
                .with_target("collections")
                .with_value("flagged"),
        )
        .with_action(Action::new(ActionType::SuspendService).with_parameter("reason", "overdue"))
}

#[tokio::test]
async fn scenario_a_all_conditions_match_and_actions_run() {
    let handlers = Arc::new(RecordingHandlers::default());
    let orchestrator = RuleOrchestrator::new(EngineConfig::default(), handlers.clone());
    let mut ctx = RuleContext::new(json!({
        "billing": {"daysPastDue": 35},
        "customer": {"status": "active"},
        "portal": "admin",
        "metadata": {}
    }));

    let results = orchestrator.execute_rules(&[overdue_rule()], &mut ctx).await;

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert!(result.matched);
    assert_eq!(result.conditions_evaluated.len(), 2);
    assert!(result.conditions_evaluated.iter().all(|c| c.result));
    assert_eq!(result.actions_executed.len(), 2);
    assert!(result.actions_executed.iter().all(|a| a.executed));
    assert_eq!(ctx.metadata().unwrap()["collections"], "flagged");
    assert_eq!(handlers.kinds(), vec!["suspend_service"]);
}

#[tokio::test]
async fn scenario_b_higher_priority_runs_first() {
    let low = BusinessRule::new("low", "billing").with_id("low").with_priority(500);
    let high = BusinessRule::new("high", "billing").with_id("high").with_priority(800);

    let mut registry = RuleRegistry::with_default_handlers(EngineConfig::default());
    registry.add_rules([low, high]);

    let mut ctx = billing_context();
    let results = registry.execute_rules(&mut ctx, &RuleFilter::default()).await;

    let order: Vec<_> = results.iter().map(|r| r.rule_id.as_str()).collect();
    assert_eq!(order, vec!["high", "low"]);
}

#[tokio::test]
async fn scenario_c_presence_through_null() {
    let orchestrator = RuleOrchestrator::with_default_handlers(EngineConfig::default());
    let mut ctx = RuleContext::new(json!({"a": {"b": null}}));

    let exists = BusinessRule::new("exists", "x")
        .with_condition(Condition::presence("a.b.c", Operator::Exists));
    let not_exists = BusinessRule::new("not_exists", "x")
        .with_condition(Condition::presence("a.b.c", Operator::NotExists));

    let results = orchestrator.execute_rules(&[exists, not_exists], &mut ctx).await;
    assert!(!results[0].conditions_evaluated[0].result);
    assert_eq!(results[0].conditions_evaluated[0].actual_value, None);
    assert!(results[1].conditions_evaluated[0].result);
}

#[tokio::test]
async fn scenario_d_fixed_discount() {
    let orchestrator = RuleOrchestrator::with_default_handlers(EngineConfig::default());
    let rule = BusinessRule::new("loyalty discount", "billing").with_action(
        Action::new(ActionType::ApplyDiscount)
            .with_parameter("discountType", "fixed")
            .with_value(25),
    );
    let mut ctx = billing_context();

    let result = orchestrator.execute_rule(&rule, &mut ctx).await;
    let action = &result.actions_executed[0];
    assert!(action.executed);
    assert_eq!(action.result, Some(json!({"discount": 25, "applied": true})));
}

#[tokio::test]
async fn scenario_e_unknown_webhook_endpoint_fails_action_not_rule() {
    let config = EngineConfig::default().with_endpoint("crm", "https://crm.example.com/hooks");
    let orchestrator = RuleOrchestrator::with_default_handlers(config);
    let rule = BusinessRule::new("notify partner", "integrations")
        .with_condition(Condition::new("customer.status", Operator::Equals, "active"))
        .with_action(Action::new(ActionType::ExecuteWebhook).with_parameter("endpoint", "unknown"))
        .with_action(Action::new(ActionType::ExecuteWebhook).with_parameter("endpoint", "crm"));
    let mut ctx = billing_context();

    let result = orchestrator.execute_rule(&rule, &mut ctx).await;
    assert!(result.matched);
    assert!(result.error.is_none());
    assert!(!result.actions_executed[0].executed);
    assert_eq!(
        result.actions_executed[0].error.as_deref(),
        Some("Webhook endpoint not configured")
    );
    assert!(result.actions_executed[1].executed);
}

#[tokio::test]
async fn failing_handler_does_not_block_later_actions() {
    let handlers = Arc::new(RecordingHandlers::default());
    let orchestrator = RuleOrchestrator::new(EngineConfig::default(), handlers.clone());
    let rule = BusinessRule::new("reject and notify", "approvals")
        .with_action(Action::new(ActionType::CreateTask).with_parameter("title", "review"))
        .with_action(Action::new(ActionType::RejectRequest).with_value("credit limit exceeded"))
        .with_action(
            Action::new(ActionType::SendNotification).with_parameter("message", "rejected"),
        );
    let mut ctx = billing_context();

    let result = orchestrator.execute_rule(&rule, &mut ctx).await;
    let executed: Vec<_> = result.actions_executed.iter().map(|a| a.executed).collect();
    assert_eq!(executed, vec![false, true, true]);
    assert_eq!(result.actions_executed[0].error.as_deref(), Some("task queue offline"));
    assert_eq!(
        result.actions_executed[2].result.as_ref().unwrap()["reason"],
        "credit limit exceeded"
    );
    assert_eq!(handlers.kinds(), vec!["create_task", "send_notification"]);
}

#[tokio::test]
async fn evaluation_is_deterministic() {
    let orchestrator = RuleOrchestrator::with_default_handlers(EngineConfig::default());
    let rule = overdue_rule().with_logic(ConditionLogic::Any);
    let ctx = billing_context();

    let first = orchestrator.execute_rule(&rule, &mut ctx.clone()).await;
    let second = orchestrator.execute_rule(&rule, &mut ctx.clone()).await;
    assert_eq!(first.conditions_evaluated, second.conditions_evaluated);
}

#[tokio::test]
async fn import_with_one_invalid_rule() {
    let mut registry = RuleRegistry::with_default_handlers(EngineConfig::default());
    let payload = json!({
        "version": "1.0",
        "rules": [
            overdue_rule(),
            {
                "id": "broken",
                "name": "missing value",
                "category": "billing",
                "conditions": [{"id": "c1", "field": "billing.amount", "operator": "greater_than"}],
                "actions": [{"id": "a1", "type": "log_event"}]
            },
            overdue_rule().with_id("overdue-2"),
        ]
    });

    let report = registry.import_rules(&payload, ImportOptions::default());
    assert_eq!(report.imported, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("index 1"), "{}", report.errors[0]);

    let mut ctx = billing_context();
    let results = registry
        .execute_rules(&mut ctx, &RuleFilter::default().portal("admin"))
        .await;
    assert_eq!(results.len(), 2);
    assert_eq!(registry.get_execution_audit_log().len(), 2);
}

#[tokio::test]
async fn dry_run_previews_without_side_effects() {
    let handlers = Arc::new(RecordingHandlers::default());
    let mut registry =
        RuleRegistry::new(RuleOrchestrator::new(EngineConfig::default(), handlers.clone()));
    registry.add_rule(overdue_rule());
    let ctx = billing_context();

    let preview = registry.test_rule("overdue", &ctx).await.unwrap();
    assert!(preview.matched);
    assert!(preview.actions_executed.is_empty());
    assert!(handlers.kinds().is_empty());
    assert!(ctx.metadata().unwrap().is_empty());
}
