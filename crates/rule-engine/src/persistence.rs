//! Interchange file helpers for rule exports

use crate::error::RuleError;
use crate::registry::RuleExport;
use serde_json::Value;
use std::path::Path;
use tokio::fs;

/// Read an interchange file as raw JSON, ready for `RuleRegistry::import_rules`
///
/// A missing file yields an empty rule list.
pub async fn load_export(path: &Path) -> Result<Value, RuleError> {
    match fs::read_to_string(path).await {
        Ok(contents) => {
            let payload: Value = serde_json::from_str(&contents)?;
            tracing::info!("Loaded rule interchange file {:?}", path);
            Ok(payload)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No rules file found at {:?}, starting fresh", path);
            Ok(Value::Array(Vec::new()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Write an export to a JSON file atomically
pub async fn save_export(path: &Path, export: &RuleExport) -> Result<(), RuleError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(export)?;

    // Write to a temp file, then rename over the target
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &json).await?;
    fs::rename(&tmp_path, path).await?;

    tracing::debug!("Saved {} rules to {:?}", export.rules.len(), path);
    Ok(())
}
