//! In-process execution audit log

use crate::model::ExecutionResult;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Append-only log of execution results, bounded to `capacity` entries
///
/// When full, the oldest entry is evicted. Callers that need durable history
/// must copy entries out with [`AuditLog::entries`].
pub struct AuditLog {
    entries: Mutex<VecDeque<ExecutionResult>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn record(&self, result: ExecutionResult) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(result);
    }

    /// Snapshot of the retained entries, oldest first
    pub fn entries(&self) -> Vec<ExecutionResult> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BusinessRule;

    fn result(name: &str) -> ExecutionResult {
        ExecutionResult::failed(&BusinessRule::new(name, "test"), "x", 0)
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let log = AuditLog::new(2);
        log.record(result("a"));
        log.record(result("b"));
        log.record(result("c"));

        let names: Vec<_> = log.entries().into_iter().map(|r| r.rule_name).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn test_clear() {
        let log = AuditLog::new(4);
        log.record(result("a"));
        assert_eq!(log.len(), 1);
        log.clear();
        assert!(log.is_empty());
    }
}
