//! Action executor for business rules

use crate::error::HandlerError;
use crate::handlers::{ActionHandlers, Parameters};
use crate::model::{Action, ActionResult, ActionType, RuleContext};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;

/// Error reported for actions that run past the rule's time budget
pub const TIME_LIMIT_EXCEEDED: &str = "Rule execution time limit exceeded";

/// Error reported when `execute_webhook` names an unmapped endpoint
pub const WEBHOOK_NOT_CONFIGURED: &str = "Webhook endpoint not configured";

/// Executor for rule actions
pub struct ActionExecutor {
    handlers: Arc<dyn ActionHandlers>,
    endpoints: HashMap<String, String>,
}

impl ActionExecutor {
    /// Create a new action executor
    pub fn new(handlers: Arc<dyn ActionHandlers>, endpoints: HashMap<String, String>) -> Self {
        Self {
            handlers,
            endpoints,
        }
    }

    /// Execute a rule's actions in declared order
    ///
    /// A failing action never stops the ones after it. When `deadline` is
    /// set, each action runs under the remaining budget; once it is spent the
    /// current and all later actions are reported as not executed.
    pub async fn execute_actions(
        &self,
        rule_id: &str,
        actions: &[Action],
        context: &mut RuleContext,
        deadline: Option<Instant>,
    ) -> Vec<ActionResult> {
        let mut results = Vec::with_capacity(actions.len());

        for (index, action) in actions.iter().enumerate() {
            let result = match deadline {
                None => self.execute(action, context).await,
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        ActionResult::failure(action, TIME_LIMIT_EXCEEDED)
                    } else {
                        tokio::time::timeout(remaining, self.execute(action, context))
                            .await
                            .unwrap_or_else(|_| ActionResult::failure(action, TIME_LIMIT_EXCEEDED))
                    }
                }
            };

            if let Some(error) = &result.error {
                tracing::warn!(
                    rule_id,
                    action_index = index,
                    action_type = %action.action_type,
                    "Action failed: {}",
                    error
                );
            }
            results.push(result);
        }

        results
    }

    /// Execute a single action, capturing any failure in the result
    pub async fn execute(&self, action: &Action, context: &mut RuleContext) -> ActionResult {
        match self.execute_action(action, context).await {
            Ok(result) => ActionResult::success(action, result),
            Err(e) => ActionResult::failure(action, e.to_string()),
        }
    }

    async fn execute_action(
        &self,
        action: &Action,
        context: &mut RuleContext,
    ) -> Result<Option<Value>, HandlerError> {
        let handlers = self.handlers.as_ref();

        let result = match &action.action_type {
            ActionType::SetValue => {
                if let Some(target) = &action.target {
                    write_metadata(context, target.clone(), value_or_null(action));
                }
                return Ok(None);
            }
            ActionType::UpdateStatus => {
                if let Some(target) = &action.target {
                    write_metadata(context, format!("{target}_status"), value_or_null(action));
                }
                return Ok(None);
            }
            ActionType::ApproveRequest => {
                write_metadata(context, "approval_status".to_string(), Value::from("approved"));
                return Ok(None);
            }
            ActionType::RejectRequest => {
                let reason = action
                    .value
                    .clone()
                    .or_else(|| action.parameters.get("reason").cloned())
                    .unwrap_or_else(|| Value::from("Rejected by business rule"));
                write_metadata(context, "approval_status".to_string(), Value::from("rejected"));
                write_metadata(context, "rejection_reason".to_string(), reason);
                return Ok(None);
            }
            ActionType::SendNotification => {
                handlers.send_notification(&handler_parameters(action), context).await?
            }
            ActionType::CreateTask => {
                handlers.create_task(&handler_parameters(action), context).await?
            }
            ActionType::ApplyDiscount => {
                handlers.apply_discount(&handler_parameters(action), context).await?
            }
            ActionType::SuspendService => {
                handlers.suspend_service(&handler_parameters(action), context).await?
            }
            ActionType::Escalate => handlers.escalate(&handler_parameters(action), context).await?,
            ActionType::LogEvent => handlers.log_event(&handler_parameters(action), context).await?,
            ActionType::TriggerWorkflow => {
                handlers.trigger_workflow(&handler_parameters(action), context).await?
            }
            ActionType::ExecuteWebhook => {
                let url = action
                    .parameters
                    .get("endpoint")
                    .and_then(Value::as_str)
                    .and_then(|name| self.endpoints.get(name))
                    .ok_or_else(|| HandlerError::new(WEBHOOK_NOT_CONFIGURED))?;
                handlers
                    .execute_webhook(url, &handler_parameters(action), context)
                    .await?
            }
            ActionType::Unknown(name) => {
                return Err(HandlerError::new(format!("Unknown action type: {name}")));
            }
        };

        Ok(Some(result))
    }
}

/// Write into `context.metadata`; a context without metadata is left alone
fn write_metadata(context: &mut RuleContext, key: String, value: Value) {
    if let Some(metadata) = context.metadata_mut() {
        metadata.insert(key, value);
    }
}

fn value_or_null(action: &Action) -> Value {
    action.value.clone().unwrap_or(Value::Null)
}

/// Parameters handed to a delegated handler, with `value`/`target` folded in
fn handler_parameters(action: &Action) -> Parameters {
    let mut parameters = action.parameters.clone();
    if let Some(value) = &action.value {
        parameters
            .entry("value")
            .or_insert_with(|| value.clone());
    }
    if let Some(target) = &action.target {
        parameters
            .entry("target")
            .or_insert_with(|| Value::from(target.as_str()));
    }
    parameters
}
