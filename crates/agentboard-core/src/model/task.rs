// ── Task summary ──

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    #[default]
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    /// Whether the task has stopped for good.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// One unit of agent work.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    pub status: TaskStatus,
    /// 0 to 100.
    pub progress: f64,
    /// Unix milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Task {
    /// Wall-clock duration in milliseconds, once the task has ended.
    pub fn duration_ms(&self) -> Option<i64> {
        Some(self.end_time? - self.start_time?)
    }
}

/// Payload of the `tasks` channel.
///
/// The backend may send only `tasks`, only the counters, or both.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskSummary {
    pub tasks: Vec<Task>,
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub running: u64,
    pub pending: u64,
    pub cancelled: u64,
}

impl TaskSummary {
    /// Tasks with the given status.
    pub fn with_status(&self, status: TaskStatus) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.status == status)
    }

    /// Recompute the counters from the task list.
    pub fn recount(&mut self) {
        let count = |status| {
            u64::try_from(self.tasks.iter().filter(|t| t.status == status).count())
                .unwrap_or(u64::MAX)
        };
        let (completed, failed, running, pending, cancelled) = (
            count(TaskStatus::Completed),
            count(TaskStatus::Failed),
            count(TaskStatus::Running),
            count(TaskStatus::Pending),
            count(TaskStatus::Cancelled),
        );
        self.total = u64::try_from(self.tasks.len()).unwrap_or(u64::MAX);
        self.completed = completed;
        self.failed = failed;
        self.running = running;
        self.pending = pending;
        self.cancelled = cancelled;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_backend_task_list() {
        let mut summary: TaskSummary = serde_json::from_value(json!({
            "tasks": [
                { "id": "a", "name": "scan", "status": "running", "progress": 40,
                  "startTime": 1000, "agentId": "main", "agentName": "Main Agent" },
                { "id": "b", "name": "lint", "status": "completed", "progress": 100,
                  "startTime": 1000, "endTime": 4000 },
                { "id": "c", "name": "odd", "status": "paused", "progress": 0, "error": null }
            ]
        }))
        .unwrap();

        assert_eq!(summary.total, 0);
        summary.recount();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.running, 1);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.tasks[2].status, TaskStatus::Unknown);
        assert_eq!(summary.tasks[1].duration_ms(), Some(3000));
        assert_eq!(summary.tasks[0].duration_ms(), None);
        assert_eq!(summary.with_status(TaskStatus::Running).count(), 1);
    }

    #[test]
    fn counters_only_payload() {
        let summary: TaskSummary = serde_json::from_value(json!({ "total": 3 })).unwrap();
        assert_eq!(summary.total, 3);
        assert!(summary.tasks.is_empty());
    }

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }
}
