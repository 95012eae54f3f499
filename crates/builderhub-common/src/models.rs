use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A record that lives in a keyed collection.
///
/// `version` is the server-assigned timestamp used to decide whether a
/// snapshot is at least as new as a locally applied optimistic value.
pub trait Entity {
    fn id(&self) -> &str;
    fn version(&self) -> i64;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_count: Option<u32>,
}

impl Entity for Project {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> i64 {
        self.created_at
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    /// Board column order.
    pub const ALL: [TaskStatus; 3] = [Self::Todo, Self::InProgress, Self::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }

    /// Column heading shown on the board.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Todo => "To Do",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub acceptance_criteria: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Entity for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> i64 {
        self.updated_at
    }
}

/// The backend sends `""` for an unassigned task.
fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

impl Entity for User {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> i64 {
        self.created_at
    }
}

// Board view types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardView {
    pub project: Option<Project>,
    pub columns: Vec<ColumnView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnView {
    pub status: TaskStatus,
    pub tasks: Vec<Task>,
}

impl BoardView {
    /// Group tasks into one column per status, in board order. Tasks keep
    /// their relative order within a column.
    pub fn group(project: Option<Project>, tasks: &[Task]) -> Self {
        let columns = TaskStatus::ALL
            .iter()
            .map(|status| ColumnView {
                status: *status,
                tasks: tasks.iter().filter(|t| t.status == *status).cloned().collect(),
            })
            .collect();
        Self { project, columns }
    }

    pub fn column(&self, status: TaskStatus) -> Option<&ColumnView> {
        self.columns.iter().find(|c| c.status == status)
    }
}
