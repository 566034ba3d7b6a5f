//! Data models for the rule engine

use crate::resolver::{self, FieldValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// A complete business rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessRule {
    /// Unique identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form grouping (billing, support, provisioning, ...)
    pub category: String,
    /// Predicates over the context, evaluated in declared order
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// How condition results combine into a match
    #[serde(default)]
    pub condition_logic: ConditionLogic,
    /// Structured expression used when `condition_logic` is `custom`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_logic: Option<Value>,
    /// Effects run in declared order when the rule matches
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Higher runs first
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub status: RuleStatus,
    /// Portals the rule applies to; empty means every portal
    #[serde(default)]
    pub portal_scope: BTreeSet<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

/// Lifecycle status of a rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    #[default]
    Active,
    Inactive,
    Draft,
    Archived,
}

impl RuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Draft => "draft",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a rule's condition results are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionLogic {
    /// Every condition must hold
    #[default]
    All,
    /// At least one condition must hold
    Any,
    /// Evaluate `custom_logic` over the condition results
    Custom,
}

/// A single predicate over a context field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub id: String,
    /// Dotted path into the context (e.g. "billing.daysPastDue")
    pub field: String,
    pub operator: Operator,
    /// Literal to compare against; unused by `exists`/`not_exists`
    ///
    /// A present `null` is the null literal, distinct from a missing key.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
    /// Type hint for rule authors, never enforced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Condition {
    /// Create a condition with a generated id
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            field: field.into(),
            operator,
            value: Some(value.into()),
            data_type: None,
        }
    }

    /// Create a presence check (`exists` / `not_exists`) without a value
    pub fn presence(field: impl Into<String>, operator: Operator) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            field: field.into(),
            operator,
            value: None,
            data_type: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Condition operators
///
/// Names outside the known set deserialize into [`Operator::Unknown`] so a
/// stored rule with a typo still loads; such conditions always evaluate to
/// `false`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
    Contains,
    NotContains,
    In,
    NotIn,
    Matches,
    Exists,
    NotExists,
    Unknown(String),
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::GreaterEqual => "greater_equal",
            Self::LessEqual => "less_equal",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Matches => "matches",
            Self::Exists => "exists",
            Self::NotExists => "not_exists",
            Self::Unknown(name) => name,
        }
    }

    /// Whether the operator ignores `Condition::value`
    pub fn is_presence_check(&self) -> bool {
        matches!(self, Self::Exists | Self::NotExists)
    }
}

impl From<String> for Operator {
    fn from(s: String) -> Self {
        match s.as_str() {
            "equals" => Self::Equals,
            "not_equals" => Self::NotEquals,
            "greater_than" => Self::GreaterThan,
            "less_than" => Self::LessThan,
            "greater_equal" => Self::GreaterEqual,
            "less_equal" => Self::LessEqual,
            "contains" => Self::Contains,
            "not_contains" => Self::NotContains,
            "in" => Self::In,
            "not_in" => Self::NotIn,
            "matches" => Self::Matches,
            "exists" => Self::Exists,
            "not_exists" => Self::NotExists,
            _ => Self::Unknown(s),
        }
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        match op {
            Operator::Unknown(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single effect performed when a rule matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// Metadata key written by local mutations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Open parameter bag interpreted per action type
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
}

impl Action {
    /// Create an action with a generated id
    pub fn new(action_type: ActionType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action_type,
            target: None,
            value: None,
            parameters: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Action kinds
///
/// Like [`Operator`], unrecognized names load as [`ActionType::Unknown`];
/// the executor reports them as hard failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    SetValue,
    UpdateStatus,
    ApproveRequest,
    RejectRequest,
    SendNotification,
    CreateTask,
    ApplyDiscount,
    SuspendService,
    Escalate,
    LogEvent,
    TriggerWorkflow,
    ExecuteWebhook,
    Unknown(String),
}

impl ActionType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::SetValue => "set_value",
            Self::UpdateStatus => "update_status",
            Self::ApproveRequest => "approve_request",
            Self::RejectRequest => "reject_request",
            Self::SendNotification => "send_notification",
            Self::CreateTask => "create_task",
            Self::ApplyDiscount => "apply_discount",
            Self::SuspendService => "suspend_service",
            Self::Escalate => "escalate",
            Self::LogEvent => "log_event",
            Self::TriggerWorkflow => "trigger_workflow",
            Self::ExecuteWebhook => "execute_webhook",
            Self::Unknown(name) => name,
        }
    }
}

impl From<String> for ActionType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "set_value" => Self::SetValue,
            "update_status" => Self::UpdateStatus,
            "approve_request" => Self::ApproveRequest,
            "reject_request" => Self::RejectRequest,
            "send_notification" => Self::SendNotification,
            "create_task" => Self::CreateTask,
            "apply_discount" => Self::ApplyDiscount,
            "suspend_service" => Self::SuspendService,
            "escalate" => Self::Escalate,
            "log_event" => Self::LogEvent,
            "trigger_workflow" => Self::TriggerWorkflow,
            "execute_webhook" => Self::ExecuteWebhook,
            _ => Self::Unknown(s),
        }
    }
}

impl From<ActionType> for String {
    fn from(t: ActionType) -> Self {
        match t {
            ActionType::Unknown(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partial update for a rule; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub conditions: Option<Vec<Condition>>,
    #[serde(default)]
    pub condition_logic: Option<ConditionLogic>,
    #[serde(default)]
    pub custom_logic: Option<Option<Value>>,
    #[serde(default)]
    pub actions: Option<Vec<Action>>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub status: Option<RuleStatus>,
    #[serde(default)]
    pub portal_scope: Option<BTreeSet<String>>,
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default)]
    pub updated_by: Option<String>,
}

impl BusinessRule {
    /// Create an active rule with a generated id and no conditions or actions
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            category: category.into(),
            conditions: Vec::new(),
            condition_logic: ConditionLogic::All,
            custom_logic: None,
            actions: Vec::new(),
            priority: 0,
            status: RuleStatus::Active,
            portal_scope: BTreeSet::new(),
            tags: BTreeSet::new(),
            created_at: now,
            updated_at: now,
            created_by: None,
            updated_by: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_logic(mut self, logic: ConditionLogic) -> Self {
        self.condition_logic = logic;
        self
    }

    pub fn with_custom_logic(mut self, expression: Value) -> Self {
        self.condition_logic = ConditionLogic::Custom;
        self.custom_logic = Some(expression);
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_status(mut self, status: RuleStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_portal(mut self, portal: impl Into<String>) -> Self {
        self.portal_scope.insert(portal.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Whether the rule applies to `portal` (empty scope applies everywhere)
    pub fn is_visible_to(&self, portal: Option<&str>) -> bool {
        if self.portal_scope.is_empty() {
            return true;
        }
        portal.is_some_and(|p| self.portal_scope.contains(p))
    }

    /// Whether the rule can be picked up for execution from `portal`
    pub fn is_executable_for(&self, portal: Option<&str>) -> bool {
        self.status == RuleStatus::Active && self.is_visible_to(portal)
    }

    /// Apply a partial update to this rule
    pub fn apply_update(&mut self, update: RuleUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(conditions) = update.conditions {
            self.conditions = conditions;
        }
        if let Some(logic) = update.condition_logic {
            self.condition_logic = logic;
        }
        if let Some(custom_logic) = update.custom_logic {
            self.custom_logic = custom_logic;
        }
        if let Some(actions) = update.actions {
            self.actions = actions;
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(portal_scope) = update.portal_scope {
            self.portal_scope = portal_scope;
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        if update.updated_by.is_some() {
            self.updated_by = update.updated_by;
        }
        self.updated_at = Utc::now();
    }
}

/// Structured input a rule set is evaluated against
///
/// Wraps an arbitrary JSON value (usually an object with `customer`,
/// `service`, `billing`, `user`, `portal`, `timestamp` and `metadata`).
/// `metadata` is a scratch map shared by every action and rule of one
/// batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleContext {
    data: Value,
}

impl RuleContext {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    /// Parse a context from JSON text
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            data: serde_json::from_str(json)?,
        })
    }

    /// Ensure a `metadata` map exists so local mutations take effect
    pub fn with_metadata(mut self) -> Self {
        if let Value::Object(map) = &mut self.data {
            map.entry("metadata")
                .or_insert_with(|| Value::Object(Map::new()));
        }
        self
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Resolve a dotted field path
    pub fn resolve(&self, path: &str) -> FieldValue<'_> {
        resolver::resolve(&self.data, path)
    }

    /// Portal the request originates from
    pub fn portal(&self) -> Option<&str> {
        self.data.get("portal").and_then(Value::as_str)
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.data.get("metadata").and_then(Value::as_object)
    }

    pub fn metadata_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.data.get_mut("metadata").and_then(Value::as_object_mut)
    }
}

/// Outcome of a single condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionResult {
    pub condition_id: String,
    pub field: String,
    pub operator: Operator,
    pub expected_value: Option<Value>,
    /// `None` when the field path did not resolve
    pub actual_value: Option<Value>,
    pub result: bool,
}

/// Outcome of a single action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub action_id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub executed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn success(action: &Action, result: Option<Value>) -> Self {
        Self {
            action_id: action.id.clone(),
            action_type: action.action_type.clone(),
            executed: true,
            result,
            error: None,
        }
    }

    pub fn failure(action: &Action, error: impl Into<String>) -> Self {
        Self {
            action_id: action.id.clone(),
            action_type: action.action_type.clone(),
            executed: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Outcome of one rule within a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub rule_id: String,
    pub rule_name: String,
    pub matched: bool,
    pub conditions_evaluated: Vec<ConditionResult>,
    pub actions_executed: Vec<ActionResult>,
    /// Wall-clock time spent on the rule
    pub execution_time_ms: u64,
    pub executed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Result for a rule whose evaluation failed unexpectedly
    pub fn failed(rule: &BusinessRule, error: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            matched: false,
            conditions_evaluated: Vec::new(),
            actions_executed: Vec::new(),
            execution_time_ms,
            executed_at: Utc::now(),
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_deserialization() {
        let json = r#"
        {
            "id": "overdue-suspend",
            "name": "Suspend overdue accounts",
            "category": "billing",
            "conditionLogic": "all",
            "priority": 800,
            "status": "active",
            "portalScope": ["admin"],
            "conditions": [
                {
                    "id": "c1",
                    "field": "billing.daysPastDue",
                    "operator": "greater_than",
                    "value": 30
                }
            ],
            "actions": [
                {"id": "a1", "type": "suspend_service", "parameters": {"reason": "overdue"}}
            ]
        }
        "#;

        let rule: BusinessRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.id, "overdue-suspend");
        assert_eq!(rule.priority, 800);
        assert_eq!(rule.conditions[0].operator, Operator::GreaterThan);
        assert_eq!(rule.actions[0].action_type, ActionType::SuspendService);
        assert!(rule.portal_scope.contains("admin"));
    }

    #[test]
    fn test_unknown_names_survive_round_trip() {
        let condition: Condition = serde_json::from_value(json!({
            "id": "c1", "field": "x", "operator": "sounds_like", "value": "y"
        }))
        .unwrap();
        assert_eq!(condition.operator, Operator::Unknown("sounds_like".into()));

        let action: Action =
            serde_json::from_value(json!({"id": "a1", "type": "teleport"})).unwrap();
        assert_eq!(action.action_type, ActionType::Unknown("teleport".into()));
        assert_eq!(serde_json::to_value(&action).unwrap()["type"], "teleport");
    }

    #[test]
    fn test_null_value_is_distinct_from_missing() {
        let literal: Condition = serde_json::from_value(
            json!({"id": "c1", "field": "customer.closedAt", "operator": "equals", "value": null}),
        )
        .unwrap();
        assert_eq!(literal.value, Some(Value::Null));
        assert_eq!(serde_json::to_value(&literal).unwrap()["value"], Value::Null);

        let presence: Condition = serde_json::from_value(
            json!({"id": "c2", "field": "customer.closedAt", "operator": "exists"}),
        )
        .unwrap();
        assert_eq!(presence.value, None);
    }

    #[test]
    fn test_portal_visibility() {
        let open = BusinessRule::new("open", "billing");
        assert!(open.is_visible_to(None));
        assert!(open.is_visible_to(Some("customer")));

        let scoped = BusinessRule::new("scoped", "billing").with_portal("admin");
        assert!(scoped.is_visible_to(Some("admin")));
        assert!(!scoped.is_visible_to(Some("customer")));
        assert!(!scoped.is_visible_to(None));

        let draft = BusinessRule::new("draft", "billing").with_status(RuleStatus::Draft);
        assert!(!draft.is_executable_for(Some("admin")));
    }

    #[test]
    fn test_apply_update_bumps_timestamp() {
        let mut rule = BusinessRule::new("r", "billing");
        let before = rule.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        rule.apply_update(RuleUpdate {
            priority: Some(10),
            updated_by: Some("ops".into()),
            ..Default::default()
        });
        assert_eq!(rule.priority, 10);
        assert_eq!(rule.name, "r");
        assert_eq!(rule.updated_by.as_deref(), Some("ops"));
        assert!(rule.updated_at > before);
    }

    #[test]
    fn test_context_metadata_access() {
        let mut ctx = RuleContext::new(json!({"portal": "admin"}));
        assert_eq!(ctx.portal(), Some("admin"));
        assert!(ctx.metadata_mut().is_none());

        let mut ctx = ctx.with_metadata();
        ctx.metadata_mut()
            .unwrap()
            .insert("k".into(), json!(1));
        assert_eq!(ctx.metadata().unwrap()["k"], json!(1));
    }
}
