//! Dotted field-path resolution over untyped context values

use serde_json::Value;

/// Result of resolving a field path
///
/// `Absent` means the path did not lead anywhere; a JSON `null` stored at
/// the path is `Present(&Value::Null)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Absent,
    Present(&'a Value),
}

impl<'a> FieldValue<'a> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn as_value(&self) -> Option<&'a Value> {
        match self {
            Self::Absent => None,
            Self::Present(v) => Some(v),
        }
    }

    /// Present and not `null`
    pub fn exists(&self) -> bool {
        matches!(self, Self::Present(v) if !v.is_null())
    }
}

/// Walk `path` (e.g. "billing.invoices.0.amount") through `root`
///
/// Object keys are matched verbatim, numeric segments index arrays. Any
/// segment that cannot be followed yields `Absent`; this never fails.
pub fn resolve<'a>(root: &'a Value, path: &str) -> FieldValue<'a> {
    if path.is_empty() {
        return FieldValue::Absent;
    }

    let mut current = root;
    for part in path.split('.') {
        let next = match current {
            Value::Object(map) => map.get(part),
            Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return FieldValue::Absent,
        }
    }

    FieldValue::Present(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_nested_paths() {
        let data = json!({
            "customer": {"status": "active", "tier": {"name": "gold"}},
            "billing": {"invoices": [{"amount": 10}, {"amount": 20}]}
        });

        assert_eq!(
            resolve(&data, "customer.status"),
            FieldValue::Present(&json!("active"))
        );
        assert_eq!(
            resolve(&data, "customer.tier.name"),
            FieldValue::Present(&json!("gold"))
        );
        assert_eq!(
            resolve(&data, "billing.invoices.1.amount"),
            FieldValue::Present(&json!(20))
        );
    }

    #[test]
    fn test_missing_segments_are_absent() {
        let data = json!({"a": {"b": null}, "list": [1]});

        assert!(resolve(&data, "missing").is_absent());
        assert!(resolve(&data, "a.x.y").is_absent());
        assert!(resolve(&data, "a.b.c").is_absent());
        assert!(resolve(&data, "list.5").is_absent());
        assert!(resolve(&data, "list.first").is_absent());
        assert!(resolve(&data, "").is_absent());
    }

    #[test]
    fn test_null_is_present_but_does_not_exist() {
        let data = json!({"a": {"b": null}});
        let value = resolve(&data, "a.b");
        assert_eq!(value, FieldValue::Present(&Value::Null));
        assert!(!value.exists());
    }
}
