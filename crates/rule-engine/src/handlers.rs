//! Injected handlers for delegated actions
//!
//! The engine never talks to notification, task, billing or webhook systems
//! itself. Each delegated action kind has one method on [`ActionHandlers`];
//! implementors override the ones they back with real systems and inherit
//! logging-only defaults for the rest.

use crate::error::HandlerError;
use crate::model::RuleContext;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

/// Result payload returned by a handler
pub type HandlerResult = Result<Value, HandlerError>;

/// Parameter bag passed to handlers
pub type Parameters = Map<String, Value>;

/// Call contract for delegated action kinds
///
/// Every method receives the action's parameters (with `value` and `target`
/// folded in when the action carries them) and the current context.
#[async_trait]
pub trait ActionHandlers: Send + Sync {
    async fn send_notification(
        &self,
        parameters: &Parameters,
        _context: &RuleContext,
    ) -> HandlerResult {
        tracing::info!(
            target: "rule_engine::actions",
            "Notification: {}",
            param_str(parameters, "message").unwrap_or("")
        );
        Ok(json!({
            "sent": true,
            "channel": param_str(parameters, "channel").unwrap_or("email"),
            "recipient": parameters.get("recipient").cloned().unwrap_or(Value::Null),
        }))
    }

    async fn create_task(
        &self,
        parameters: &Parameters,
        _context: &RuleContext,
    ) -> HandlerResult {
        let task_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            target: "rule_engine::actions",
            "Created task {}: {}",
            task_id,
            param_str(parameters, "title").unwrap_or("untitled")
        );
        Ok(json!({ "taskId": task_id, "created": true }))
    }

    async fn apply_discount(
        &self,
        parameters: &Parameters,
        context: &RuleContext,
    ) -> HandlerResult {
        default_apply_discount(parameters, context)
    }

    async fn suspend_service(
        &self,
        parameters: &Parameters,
        context: &RuleContext,
    ) -> HandlerResult {
        let service_id = context
            .resolve("service.id")
            .as_value()
            .cloned()
            .unwrap_or(Value::Null);
        tracing::info!(target: "rule_engine::actions", "Suspending service {}", service_id);
        Ok(json!({
            "suspended": true,
            "serviceId": service_id,
            "reason": parameters.get("reason").cloned().unwrap_or(Value::Null),
        }))
    }

    async fn escalate(
        &self,
        parameters: &Parameters,
        _context: &RuleContext,
    ) -> HandlerResult {
        let level = parameters.get("level").cloned().unwrap_or(json!(1));
        tracing::info!(target: "rule_engine::actions", "Escalating to level {}", level);
        Ok(json!({ "escalated": true, "level": level }))
    }

    async fn log_event(
        &self,
        parameters: &Parameters,
        _context: &RuleContext,
    ) -> HandlerResult {
        let event = param_str(parameters, "event").unwrap_or("rule_event");
        tracing::info!(target: "rule_engine::actions", event, "Rule event logged");
        Ok(json!({ "logged": true, "event": event }))
    }

    async fn trigger_workflow(
        &self,
        parameters: &Parameters,
        _context: &RuleContext,
    ) -> HandlerResult {
        let workflow_id = param_str(parameters, "workflowId")
            .ok_or_else(|| HandlerError::new("Workflow id not specified"))?;
        tracing::info!(target: "rule_engine::actions", "Triggering workflow {}", workflow_id);
        Ok(json!({ "triggered": true, "workflowId": workflow_id }))
    }

    /// `url` is the already resolved endpoint for `parameters.endpoint`
    async fn execute_webhook(
        &self,
        url: &str,
        parameters: &Parameters,
        _context: &RuleContext,
    ) -> HandlerResult {
        tracing::info!(target: "rule_engine::actions", "Webhook dispatch to {}", url);
        Ok(json!({
            "dispatched": true,
            "endpoint": parameters.get("endpoint").cloned().unwrap_or(Value::Null),
            "url": url,
        }))
    }
}

/// Handlers that only log; every method uses the trait defaults
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHandlers;

#[async_trait]
impl ActionHandlers for DefaultHandlers {}

/// Compute `{discount, applied}` from the action parameters
///
/// Fixed discounts return `value` unchanged; percentage discounts take
/// `percent` (or `value`) of `billing.amount`.
pub fn default_apply_discount(parameters: &Parameters, context: &RuleContext) -> HandlerResult {
    let discount_type = param_str(parameters, "discountType").unwrap_or_else(|| {
        if parameters.contains_key("percent") {
            "percentage"
        } else {
            "fixed"
        }
    });

    let discount = match discount_type {
        "percentage" | "percent" => {
            let percent = parameters
                .get("percent")
                .or_else(|| parameters.get("value"))
                .and_then(Value::as_f64)
                .ok_or_else(|| HandlerError::new("Discount percentage not specified"))?;
            let amount = context
                .resolve("billing.amount")
                .as_value()
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            json!(amount * percent / 100.0)
        }
        "fixed" => match parameters.get("value") {
            Some(value @ Value::Number(_)) => value.clone(),
            _ => return Err(HandlerError::new("Discount amount not specified")),
        },
        other => {
            return Err(HandlerError::new(format!("Unsupported discount type: {other}")));
        }
    };

    Ok(json!({ "discount": discount, "applied": true }))
}

fn param_str<'a>(parameters: &'a Parameters, key: &str) -> Option<&'a str> {
    parameters.get(key).and_then(Value::as_str)
}
