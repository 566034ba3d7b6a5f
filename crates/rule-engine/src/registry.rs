//! Rule registry: storage, indexing, validation and interchange

use crate::config::EngineConfig;
use crate::engine::RuleOrchestrator;
use crate::error::{Result, RuleError};
use crate::model::{BusinessRule, ExecutionResult, RuleContext, RuleStatus, RuleUpdate};
use crate::validation::{self, ValidationReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::instrument;

/// Interchange format version written by [`RuleRegistry::export_rules`]
pub const EXPORT_VERSION: &str = "1.0";

/// Portal bucket used in statistics for rules without a portal scope
pub const ALL_PORTALS: &str = "all";

/// Conjunctive filters over rules
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleFilter {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub portal: Option<String>,
    /// Matches rules carrying at least one of these tags
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl RuleFilter {
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn portal(mut self, portal: impl Into<String>) -> Self {
        self.portal = Some(portal.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn matches(&self, rule: &BusinessRule) -> bool {
        if let Some(category) = &self.category {
            if rule.category != *category {
                return false;
            }
        }
        if let Some(portal) = &self.portal {
            if !rule.is_visible_to(Some(portal)) {
                return false;
            }
        }
        self.tags.is_empty() || self.tags.iter().any(|tag| rule.tags.contains(tag))
    }
}

/// Counts of rules by status, category and portal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleStatistics {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub by_portal: BTreeMap<String, usize>,
}

/// Export envelope of the interchange format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleExport {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub rules: Vec<BusinessRule>,
}

/// Options for [`RuleRegistry::import_rules`]
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ImportOptions {
    /// Replace existing rules with the same id instead of skipping them
    #[serde(default)]
    pub overwrite: bool,
}

/// Outcome of an import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

/// Owns the rule collection and its category index
///
/// The id map is the source of truth; `order` keeps insertion order and
/// `by_category` is maintained on every mutation. Not internally
/// synchronized: callers sharing a registry across tasks must wrap it.
pub struct RuleRegistry {
    rules: HashMap<String, BusinessRule>,
    order: Vec<String>,
    by_category: HashMap<String, Vec<String>>,
    orchestrator: RuleOrchestrator,
}

impl RuleRegistry {
    /// Create an empty registry executing through `orchestrator`
    pub fn new(orchestrator: RuleOrchestrator) -> Self {
        Self {
            rules: HashMap::new(),
            order: Vec::new(),
            by_category: HashMap::new(),
            orchestrator,
        }
    }

    /// Create an empty registry with logging-only action handlers
    pub fn with_default_handlers(config: EngineConfig) -> Self {
        Self::new(RuleOrchestrator::with_default_handlers(config))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Store a rule as-is, replacing any rule with the same id
    #[instrument(skip(self, rule), fields(rule_id = %rule.id))]
    pub fn add_rule(&mut self, rule: BusinessRule) -> Option<BusinessRule> {
        let id = rule.id.clone();
        let category = rule.category.clone();

        let previous = self.rules.insert(id.clone(), rule);
        match &previous {
            Some(old) => self.unindex(&old.category, &id),
            None => self.order.push(id.clone()),
        }
        self.by_category.entry(category).or_default().push(id);

        tracing::info!("Added rule");
        previous
    }

    /// Validate a rule and store it only if it passes
    pub fn add_valid_rule(&mut self, rule: BusinessRule) -> Result<()> {
        validation::validate_rule(&rule).into_result()?;
        self.add_rule(rule);
        Ok(())
    }

    /// Store several rules; returns how many were added
    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = BusinessRule>) -> usize {
        let mut added = 0;
        for rule in rules {
            self.add_rule(rule);
            added += 1;
        }
        added
    }

    /// Merge a partial update into a stored rule
    #[instrument(skip(self, update))]
    pub fn update_rule(&mut self, id: &str, update: RuleUpdate) -> Result<BusinessRule> {
        let rule = self
            .rules
            .get_mut(id)
            .ok_or_else(|| RuleError::NotFound(id.to_string()))?;

        let old_category = rule.category.clone();
        rule.apply_update(update);
        let updated = rule.clone();

        if updated.category != old_category {
            self.unindex(&old_category, id);
            self.by_category
                .entry(updated.category.clone())
                .or_default()
                .push(id.to_string());
        }

        tracing::info!("Updated rule");
        Ok(updated)
    }

    /// Remove a rule and its index entries
    #[instrument(skip(self))]
    pub fn remove_rule(&mut self, id: &str) -> Result<BusinessRule> {
        let rule = self
            .rules
            .remove(id)
            .ok_or_else(|| RuleError::NotFound(id.to_string()))?;

        self.order.retain(|existing| existing != id);
        self.unindex(&rule.category, id);

        tracing::info!("Removed rule '{}'", rule.name);
        Ok(rule)
    }

    fn unindex(&mut self, category: &str, id: &str) {
        if let Some(ids) = self.by_category.get_mut(category) {
            ids.retain(|existing| existing != id);
            if ids.is_empty() {
                self.by_category.remove(category);
            }
        }
    }

    pub fn get_rule(&self, id: &str) -> Option<&BusinessRule> {
        self.rules.get(id)
    }

    /// Every rule, in insertion order
    pub fn get_all_rules(&self) -> Vec<&BusinessRule> {
        self.order.iter().filter_map(|id| self.rules.get(id)).collect()
    }

    /// Rules in `category`, in insertion order
    pub fn get_rules_by_category(&self, category: &str) -> Vec<&BusinessRule> {
        self.by_category
            .get(category)
            .map(|ids| ids.iter().filter_map(|id| self.rules.get(id)).collect())
            .unwrap_or_default()
    }

    /// Rules visible to `portal` (unscoped rules included), any status
    pub fn get_rules_by_portal(&self, portal: &str) -> Vec<&BusinessRule> {
        self.iter_rules()
            .filter(|rule| rule.is_visible_to(Some(portal)))
            .collect()
    }

    pub fn get_active_rules(&self) -> Vec<&BusinessRule> {
        self.iter_rules()
            .filter(|rule| rule.status == RuleStatus::Active)
            .collect()
    }

    /// Categories that currently have at least one rule
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = self.by_category.keys().map(String::as_str).collect();
        categories.sort_unstable();
        categories
    }

    fn iter_rules(&self) -> impl Iterator<Item = &BusinessRule> {
        self.order.iter().filter_map(|id| self.rules.get(id))
    }

    /// Execute active rules matching `filters` against `context`
    pub async fn execute_rules(
        &self,
        context: &mut RuleContext,
        filters: &RuleFilter,
    ) -> Vec<ExecutionResult> {
        let selected = self
            .iter_rules()
            .filter(|rule| rule.status == RuleStatus::Active && filters.matches(rule));
        self.orchestrator.execute_rules(selected, context).await
    }

    /// Dry-run a rule: evaluate its conditions without running any action
    ///
    /// The rule is probed regardless of its status or portal scope, against a
    /// copy of `context`; nothing is written to the audit log.
    pub async fn test_rule(&self, id: &str, context: &RuleContext) -> Result<ExecutionResult> {
        let rule = self
            .rules
            .get(id)
            .ok_or_else(|| RuleError::NotFound(id.to_string()))?;

        let mut probe = rule.clone();
        probe.actions.clear();
        probe.status = RuleStatus::Active;
        probe.portal_scope.clear();

        let mut scratch = context.clone();
        Ok(self.orchestrator.execute_rule(&probe, &mut scratch).await)
    }

    pub fn validate_rule(&self, rule: &BusinessRule) -> ValidationReport {
        validation::validate_rule(rule)
    }

    pub fn get_rule_statistics(&self) -> RuleStatistics {
        let mut stats = RuleStatistics {
            total: self.rules.len(),
            ..Default::default()
        };

        for rule in self.rules.values() {
            *stats.by_status.entry(rule.status.to_string()).or_default() += 1;
            *stats.by_category.entry(rule.category.clone()).or_default() += 1;
            if rule.portal_scope.is_empty() {
                *stats.by_portal.entry(ALL_PORTALS.to_string()).or_default() += 1;
            }
            for portal in &rule.portal_scope {
                *stats.by_portal.entry(portal.clone()).or_default() += 1;
            }
        }

        stats
    }

    /// Export rules matching `filters` (any status) in insertion order
    pub fn export_rules(&self, filters: &RuleFilter) -> RuleExport {
        RuleExport {
            version: EXPORT_VERSION.to_string(),
            exported_at: Utc::now(),
            rules: self
                .iter_rules()
                .filter(|rule| filters.matches(rule))
                .cloned()
                .collect(),
        }
    }

    pub fn export_rules_json(&self, filters: &RuleFilter) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export_rules(filters))?)
    }

    /// Import rules from an export envelope or a bare list
    ///
    /// Each rule is deserialized and validated on its own; invalid rules and
    /// id collisions (without `overwrite`) are skipped and reported by index.
    #[instrument(skip(self, payload))]
    pub fn import_rules(&mut self, payload: &Value, options: ImportOptions) -> ImportReport {
        let mut report = ImportReport::default();

        let items = match payload {
            Value::Array(items) => items,
            Value::Object(envelope) => match envelope.get("rules") {
                Some(Value::Array(items)) => items,
                _ => {
                    report.errors.push(
                        RuleError::InvalidPayload("export envelope has no rules list".into())
                            .to_string(),
                    );
                    return report;
                }
            },
            _ => {
                report.errors.push(
                    RuleError::InvalidPayload(
                        "expected a list of rules or an export envelope".into(),
                    )
                    .to_string(),
                );
                return report;
            }
        };

        for (index, item) in items.iter().enumerate() {
            let rule: BusinessRule = match serde_json::from_value(item.clone()) {
                Ok(rule) => rule,
                Err(e) => {
                    report.skipped += 1;
                    report.errors.push(format!("Rule at index {index}: {e}"));
                    continue;
                }
            };

            let validation = validation::validate_rule(&rule);
            if !validation.valid {
                report.skipped += 1;
                report.errors.push(format!(
                    "Rule at index {index} ({}): {}",
                    rule.name,
                    validation.errors.join("; ")
                ));
                continue;
            }

            if self.rules.contains_key(&rule.id) && !options.overwrite {
                report.skipped += 1;
                report.errors.push(format!(
                    "Rule at index {index}: rule '{}' already exists",
                    rule.id
                ));
                continue;
            }

            self.add_rule(rule);
            report.imported += 1;
        }

        if report.skipped > 0 {
            tracing::warn!(
                "Imported {} rules, skipped {}",
                report.imported, report.skipped
            );
        } else {
            tracing::info!("Imported {} rules", report.imported);
        }
        report
    }

    /// Import rules from JSON text
    pub fn import_rules_json(
        &mut self,
        json: &str,
        options: ImportOptions,
    ) -> Result<ImportReport> {
        let payload: Value = serde_json::from_str(json)?;
        Ok(self.import_rules(&payload, options))
    }

    pub fn get_execution_audit_log(&self) -> Vec<ExecutionResult> {
        self.orchestrator.audit_log()
    }

    pub fn clear_execution_audit_log(&self) {
        self.orchestrator.clear_audit_log();
    }
}
