use serde::{Deserialize, Serialize};

/// Which dashboard panel is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Overview,
    Projects,
    Tasks,
    Board,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Projects => "projects",
            Self::Tasks => "tasks",
            Self::Board => "board",
        }
    }
}

impl std::str::FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overview" | "dashboard" => Ok(Self::Overview),
            "projects" => Ok(Self::Projects),
            "tasks" => Ok(Self::Tasks),
            "board" => Ok(Self::Board),
            other => Err(format!("unknown view: {}", other)),
        }
    }
}

/// The single modal that may be open. `editing` holds the id being edited;
/// `None` means a create form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    ProjectForm { editing: Option<String> },
    TaskForm { editing: Option<String> },
    ConfirmDelete { project: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// A user-visible toast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NotificationLevel::Error
    }
}
