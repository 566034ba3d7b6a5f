//! Business rule automation engine
//!
//! Evaluates prioritized rules (conditions plus actions) against a
//! structured context, dispatching delegated actions to injected handlers
//! and recording an audit trail of every execution.

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod handlers;
pub mod logic;
pub mod model;
pub mod persistence;
pub mod registry;
pub mod resolver;
pub mod validation;

pub use config::EngineConfig;
pub use engine::RuleOrchestrator;
pub use error::{HandlerError, Result, RuleError};
pub use handlers::{ActionHandlers, DefaultHandlers, HandlerResult, Parameters};
pub use logic::LogicExpr;
pub use model::*;
pub use registry::{
    ImportOptions, ImportReport, RuleExport, RuleFilter, RuleRegistry, RuleStatistics,
};
pub use resolver::FieldValue;
pub use validation::{validate_rule, ValidationReport};
