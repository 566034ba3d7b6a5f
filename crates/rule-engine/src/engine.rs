//! Rule orchestrator: filters, orders, evaluates and audits rule sets

use crate::audit::AuditLog;
use crate::config::EngineConfig;
use crate::error::RuleError;
use crate::evaluator::ConditionEvaluator;
use crate::executor::ActionExecutor;
use crate::handlers::{ActionHandlers, DefaultHandlers};
use crate::logic::LogicExpr;
use crate::model::{BusinessRule, ConditionLogic, ConditionResult, ExecutionResult, RuleContext};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;

/// Runs rule sets against a context
///
/// Execution is strictly sequential: rules run one at a time in priority
/// order and every action of a rule completes before the next starts, so
/// metadata written early in a batch is visible to everything after it.
pub struct RuleOrchestrator {
    config: EngineConfig,
    evaluator: ConditionEvaluator,
    executor: ActionExecutor,
    audit: AuditLog,
}

impl RuleOrchestrator {
    /// Create an orchestrator with injected action handlers
    pub fn new(config: EngineConfig, handlers: Arc<dyn ActionHandlers>) -> Self {
        let executor = ActionExecutor::new(handlers, config.endpoints.clone());
        let audit = AuditLog::new(config.audit_capacity);
        Self {
            config,
            evaluator: ConditionEvaluator::new(),
            executor,
            audit,
        }
    }

    /// Create an orchestrator whose delegated actions only log
    pub fn with_default_handlers(config: EngineConfig) -> Self {
        Self::new(config, Arc::new(DefaultHandlers))
    }

    /// Execute every active, portal-visible rule in descending priority
    ///
    /// Rules with equal priority keep their input order. One result is
    /// produced per executed rule; a failing rule never stops the batch.
    pub async fn execute_rules<'a, I>(
        &self,
        rules: I,
        context: &mut RuleContext,
    ) -> Vec<ExecutionResult>
    where
        I: IntoIterator<Item = &'a BusinessRule>,
    {
        let portal = context.portal().map(str::to_owned);

        let mut total = 0usize;
        let mut candidates: Vec<&BusinessRule> = rules
            .into_iter()
            .inspect(|_| total += 1)
            .filter(|rule| rule.is_executable_for(portal.as_deref()))
            .collect();
        // Vec::sort_by is stable
        candidates.sort_by(|a, b| b.priority.cmp(&a.priority));

        if self.config.debug {
            tracing::info!(
                "Executing {} of {} rules (portal: {:?})",
                candidates.len(),
                total,
                portal
            );
        }

        let mut results = Vec::with_capacity(candidates.len());
        for rule in candidates {
            let result = self.execute_rule(rule, context).await;
            if self.config.audit_enabled {
                self.audit.record(result.clone());
            }
            results.push(result);
        }

        results
    }

    /// Evaluate a single rule and, when it matches, run its actions
    ///
    /// No status or portal filtering and no auditing happens here.
    pub async fn execute_rule(
        &self,
        rule: &BusinessRule,
        context: &mut RuleContext,
    ) -> ExecutionResult {
        let start = Instant::now();
        let deadline = self.config.max_execution_time().map(|budget| start + budget);

        match self.run_rule(rule, context, deadline).await {
            Ok(mut result) => {
                result.execution_time_ms = start.elapsed().as_millis() as u64;
                if self.config.debug {
                    tracing::info!(
                        rule_id = %rule.id,
                        matched = result.matched,
                        conditions = result.conditions_evaluated.len(),
                        actions = result.actions_executed.len(),
                        "Rule '{}' evaluated in {}ms",
                        rule.name,
                        result.execution_time_ms
                    );
                }
                result
            }
            Err(e) => {
                tracing::error!(rule_id = %rule.id, "Rule '{}' failed: {}", rule.name, e);
                ExecutionResult::failed(rule, e.to_string(), start.elapsed().as_millis() as u64)
            }
        }
    }

    async fn run_rule(
        &self,
        rule: &BusinessRule,
        context: &mut RuleContext,
        deadline: Option<Instant>,
    ) -> Result<ExecutionResult, RuleError> {
        // Every condition is evaluated, even under `any`, so the trail is complete
        let conditions_evaluated = self.evaluator.evaluate_all(&rule.conditions, context);
        let matched = combine(rule, &conditions_evaluated)?;

        let actions_executed = if matched {
            self.executor
                .execute_actions(&rule.id, &rule.actions, context, deadline)
                .await
        } else {
            Vec::new()
        };

        Ok(ExecutionResult {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            matched,
            conditions_evaluated,
            actions_executed,
            execution_time_ms: 0,
            executed_at: Utc::now(),
            error: None,
        })
    }

    /// Snapshot of the audit log, oldest first
    pub fn audit_log(&self) -> Vec<ExecutionResult> {
        self.audit.entries()
    }

    pub fn clear_audit_log(&self) {
        self.audit.clear();
    }
}

/// Combine condition results according to the rule's logic
///
/// Both `all` and `any` match vacuously when there are no conditions.
fn combine(rule: &BusinessRule, results: &[ConditionResult]) -> Result<bool, RuleError> {
    match rule.condition_logic {
        ConditionLogic::All => Ok(results.iter().all(|r| r.result)),
        ConditionLogic::Any => Ok(results.is_empty() || results.iter().any(|r| r.result)),
        ConditionLogic::Custom => match &rule.custom_logic {
            Some(raw) => {
                let expr = LogicExpr::parse(raw)?;
                let by_id: HashMap<&str, bool> = results
                    .iter()
                    .map(|r| (r.condition_id.as_str(), r.result))
                    .collect();
                expr.evaluate(&by_id)
            }
            None => {
                tracing::warn!(
                    rule_id = %rule.id,
                    "Custom logic rule has no expression, requiring all conditions"
                );
                Ok(results.iter().all(|r| r.result))
            }
        },
    }
}
