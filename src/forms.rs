//! Form validation.
//!
//! These are the same guards the web forms apply on submit. They run before
//! any gateway call so that obviously bad input never reaches the backend;
//! the backend stays the authority. Lengths are counted in characters on
//! trimmed input (passwords are taken as typed).

use std::sync::LazyLock;

use builderhub_common::{Project, Task, TaskStatus};
use regex::Regex;

use crate::errors::ValidationErrors;
use crate::gateway::{NewProject, NewTask, ProjectChanges, TaskChanges};

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

pub const PROJECT_NAME_MIN: usize = 3;
pub const PROJECT_NAME_MAX: usize = 100;
pub const PROJECT_DESCRIPTION_MAX: usize = 500;
pub const TASK_TITLE_MIN: usize = 3;
pub const TASK_TITLE_MAX: usize = 100;
pub const TASK_DESCRIPTION_MIN: usize = 10;
pub const NAME_MIN: usize = 2;
pub const PASSWORD_MIN: usize = 8;

fn chars(s: &str) -> usize {
    s.chars().count()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

fn check_email(errors: &mut ValidationErrors, email: &str) {
    if email.is_empty() {
        errors.push("email", "Email is required");
    } else if !is_valid_email(email) {
        errors.push("email", "Please enter a valid email address");
    }
}

// ── Projects ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectForm {
    pub name: String,
    pub description: String,
}

impl ProjectForm {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    /// Prefill for editing.
    pub fn from_project(project: &Project) -> Self {
        Self::new(project.name.clone(), project.description.clone())
    }

    pub fn validate(&self) -> Result<NewProject, ValidationErrors> {
        let name = self.name.trim();
        let description = self.description.trim();
        let mut errors = ValidationErrors::new();

        if name.is_empty() {
            errors.push("name", "Project name is required");
        } else if chars(name) < PROJECT_NAME_MIN {
            errors.push("name", "Project name must be at least 3 characters");
        } else if chars(name) > PROJECT_NAME_MAX {
            errors.push("name", "Project name must be less than 100 characters");
        }
        if chars(description) > PROJECT_DESCRIPTION_MAX {
            errors.push("description", "Description must be less than 500 characters");
        }

        errors.into_result(NewProject {
            name: name.to_string(),
            description: description.to_string(),
        })
    }

    /// Validated update payload. Both fields are always sent, as the edit
    /// form does.
    pub fn changes(&self) -> Result<ProjectChanges, ValidationErrors> {
        let valid = self.validate()?;
        Ok(ProjectChanges {
            name: Some(valid.name),
            description: Some(valid.description),
        })
    }
}

// ── Tasks ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskForm {
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub acceptance_criteria: String,
    pub assignee_id: Option<String>,
    /// Only meaningful when editing; creation always starts in `todo`.
    pub status: Option<TaskStatus>,
}

impl TaskForm {
    pub fn new(
        project_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            title: title.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn from_task(task: &Task) -> Self {
        Self {
            project_id: task.project_id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            acceptance_criteria: task.acceptance_criteria.clone(),
            assignee_id: task.assignee_id.clone(),
            status: Some(task.status),
        }
    }

    fn check(&self) -> ValidationErrors {
        let title = self.title.trim();
        let description = self.description.trim();
        let mut errors = ValidationErrors::new();

        if self.project_id.trim().is_empty() {
            errors.push("project_id", "Please select a project");
        }
        if title.is_empty() {
            errors.push("title", "Task title is required");
        } else if chars(title) < TASK_TITLE_MIN {
            errors.push("title", "Title must be at least 3 characters");
        } else if chars(title) > TASK_TITLE_MAX {
            errors.push("title", "Title must be less than 100 characters");
        }
        if description.is_empty() {
            errors.push("description", "Description is required");
        } else if chars(description) < TASK_DESCRIPTION_MIN {
            errors.push("description", "Description must be at least 10 characters");
        }
        errors
    }

    fn assignee(&self) -> Option<String> {
        self.assignee_id
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
    }

    pub fn validate(&self) -> Result<NewTask, ValidationErrors> {
        self.check().into_result(NewTask {
            project_id: self.project_id.trim().to_string(),
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            acceptance_criteria: self.acceptance_criteria.trim().to_string(),
            assignee_id: self.assignee(),
        })
    }

    pub fn changes(&self) -> Result<TaskChanges, ValidationErrors> {
        self.check().into_result(TaskChanges {
            title: Some(self.title.trim().to_string()),
            description: Some(self.description.trim().to_string()),
            status: self.status,
            acceptance_criteria: Some(self.acceptance_criteria.trim().to_string()),
            assignee_id: self.assignee(),
        })
    }
}

// ── Authentication ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginMethod {
    #[default]
    Password,
    MagicLink,
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl LoginForm {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Returns a normalized copy (trimmed email) when valid.
    pub fn validate(&self, method: LoginMethod) -> Result<Self, ValidationErrors> {
        let email = self.email.trim();
        let mut errors = ValidationErrors::new();
        check_email(&mut errors, email);
        if method == LoginMethod::Password && self.password.is_empty() {
            errors.push("password", "Password is required");
        }
        errors.into_result(Self::new(email, self.password.clone()))
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl std::fmt::Debug for SignupForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupForm")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl SignupForm {
    pub fn validate(&self, method: LoginMethod) -> Result<Self, ValidationErrors> {
        let name = self.name.trim();
        let email = self.email.trim();
        let mut errors = ValidationErrors::new();

        if name.is_empty() {
            errors.push("name", "Name is required");
        } else if chars(name) < NAME_MIN {
            errors.push("name", "Name must be at least 2 characters");
        }
        check_email(&mut errors, email);

        if method == LoginMethod::Password {
            if self.password.is_empty() {
                errors.push("password", "Password is required");
            } else if chars(&self.password) < PASSWORD_MIN {
                errors.push("password", "Password must be at least 8 characters");
            }
            if self.confirm_password.is_empty() {
                errors.push("confirm_password", "Please confirm your password");
            } else if self.password != self.confirm_password {
                errors.push("confirm_password", "Passwords do not match");
            }
        }

        errors.into_result(Self {
            name: name.to_string(),
            email: email.to_string(),
            password: self.password.clone(),
            confirm_password: self.confirm_password.clone(),
        })
    }
}
