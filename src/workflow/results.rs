//! Collection point for per-role reports.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::crew::TaskReport;

/// Map from role to its latest report. Pure collection, no logic.
#[derive(Default)]
pub struct ResultAggregator {
    reports: RwLock<HashMap<String, TaskReport>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, report: TaskReport) {
        self.reports.write().insert(report.role.clone(), report);
    }

    pub fn extend(&self, reports: impl IntoIterator<Item = TaskReport>) {
        let mut guard = self.reports.write();
        for report in reports {
            guard.insert(report.role.clone(), report);
        }
    }

    pub fn get(&self, role: &str) -> Option<TaskReport> {
        self.reports.read().get(role).cloned()
    }

    pub fn snapshot(&self) -> HashMap<String, TaskReport> {
        self.reports.read().clone()
    }

    pub fn len(&self) -> usize {
        self.reports.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.read().is_empty()
    }
}
