//! Dashboard statistics: a pure projection over the in-memory collections.
//!
//! Nothing here is persisted. The controller recomputes the whole struct
//! whenever its project or task list changes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{Project, Task, TaskStatus};

/// Maximum number of entries in the recent-activity feed.
pub const RECENT_ACTIVITY_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    TaskCreated,
    TaskCompleted,
    TaskUpdated,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskCreated => "task_created",
            Self::TaskCompleted => "task_completed",
            Self::TaskUpdated => "task_updated",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub description: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DashboardStatistics {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub in_progress_tasks: usize,
    pub todo_tasks: usize,
    pub total_projects: usize,
    pub completion_percent: u8,
    pub recent_activity: Vec<ActivityEntry>,
}

impl DashboardStatistics {
    pub fn compute(projects: &[Project], tasks: &[Task]) -> Self {
        let mut todo = 0usize;
        let mut in_progress = 0usize;
        let mut done = 0usize;
        for task in tasks {
            match task.status {
                TaskStatus::Todo => todo += 1,
                TaskStatus::InProgress => in_progress += 1,
                TaskStatus::Done => done += 1,
            }
        }
        let total = todo + in_progress + done;

        Self {
            total_tasks: total,
            completed_tasks: done,
            in_progress_tasks: in_progress,
            todo_tasks: todo,
            total_projects: projects.len(),
            completion_percent: completion_percent(done, total),
            recent_activity: recent_activity(tasks),
        }
    }

    pub fn count_for(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Todo => self.todo_tasks,
            TaskStatus::InProgress => self.in_progress_tasks,
            TaskStatus::Done => self.completed_tasks,
        }
    }
}

/// `round(100 * completed / total)`, rounding halves up; 0 for an empty set.
pub fn completion_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total) as u128;
    let total = total as u128;
    let rounded = (200 * completed + total) / (2 * total);
    rounded.min(100) as u8
}

fn recent_activity(tasks: &[Task]) -> Vec<ActivityEntry> {
    let mut ordered: Vec<&Task> = tasks.iter().collect();
    ordered.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
    ordered
        .into_iter()
        .take(RECENT_ACTIVITY_LIMIT)
        .map(|task| {
            let (kind, verb) = if task.status == TaskStatus::Done {
                (ActivityKind::TaskCompleted, "Completed")
            } else if task.created_at == task.updated_at {
                (ActivityKind::TaskCreated, "Created")
            } else {
                (ActivityKind::TaskUpdated, "Updated")
            };
            ActivityEntry {
                id: task.id.clone(),
                kind,
                description: format!("{} \"{}\"", verb, task.title),
                timestamp: task.updated_at,
            }
        })
        .collect()
}

/// Number of tasks per project id.
pub fn project_task_counts(tasks: &[Task]) -> HashMap<&str, u32> {
    let mut counts = HashMap::new();
    for task in tasks {
        *counts.entry(task.project_id.as_str()).or_insert(0) += 1;
    }
    counts
}
