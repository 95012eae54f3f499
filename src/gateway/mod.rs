//! Remote data gateway: typed wrappers over the backend REST API.
//!
//! `DataGateway` is the seam the dashboard controller, the auth service and
//! the live-collection fallback all call through. `HttpGateway` is the
//! production implementation; tests substitute in-memory doubles.
//!
//! | Operation                     | Request                                   |
//! |-------------------------------|-------------------------------------------|
//! | `list_projects`               | `GET /api/projects`                       |
//! | `create_project`              | `POST /api/projects`                      |
//! | `update_project`              | `PUT /api/projects/{id}`                  |
//! | `delete_project`              | `DELETE /api/projects/{id}`               |
//! | `list_tasks`                  | `GET /api/tasks[?project_id=]`            |
//! | `create_task`                 | `POST /api/tasks`                         |
//! | `update_task`                 | `PUT /api/tasks/{id}`                     |
//! | `delete_task`                 | `DELETE /api/tasks/{id}`                  |
//! | `login_password`              | `POST /api/auth/login-password`           |
//! | `request_magic_link`          | `POST /api/auth/magic-link`               |
//! | `signup`                      | `POST /api/auth/signup`                   |
//! | `signup_password`             | `POST /api/auth/signup-password`          |
//! | `verify_magic_link`           | `POST /api/auth/verify-magic-link?token=` |
//! | `current_user`                | `GET /api/auth/me`                        |
//! | `generate_acceptance_criteria`| `POST /api/ai/generate-acceptance-criteria` |

pub mod http;

use async_trait::async_trait;
use builderhub_common::{Project, Task, TaskStatus, User};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::GatewayError;
use crate::realtime::{Collection, CollectionQuery};
use crate::session::RequestContext;

pub use http::HttpGateway;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewProject {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTask {
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub acceptance_criteria: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
}

impl TaskChanges {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

// ── Response payload types ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub user: Option<Value>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MagicLinkResponse {
    #[serde(default)]
    pub magic_link: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Generated acceptance criteria. The backend returns either a list of
/// criteria or a single block of text.
#[derive(Debug, Clone, PartialEq)]
pub enum AcceptanceCriteria {
    List(Vec<String>),
    Text(String),
}

impl AcceptanceCriteria {
    /// Interpret the `criteria` field of the generation response.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(text) => Some(Self::Text(text)),
            Value::Array(items) => Some(Self::List(items.into_iter().map(value_text).collect())),
            Value::Object(map) => {
                // Structured payloads carry the list under some key; take the
                // first array we find.
                let list = map.values().find_map(|v| v.as_array().cloned());
                match list {
                    Some(items) => Some(Self::List(items.into_iter().map(value_text).collect())),
                    None => serde_json::to_string_pretty(&map).ok().map(Self::Text),
                }
            }
            other => Some(Self::Text(other.to_string())),
        }
    }

    /// Render for an acceptance-criteria text field: one `• item` line per
    /// list entry, text unchanged.
    pub fn format(&self) -> String {
        match self {
            Self::List(items) => items
                .iter()
                .map(|c| format!("• {}", c))
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Text(text) => text.clone(),
        }
    }
}

fn value_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

// ── Gateway trait ─────────────────────────────────────────────────────

/// One method per backend operation. Every call issues exactly one request
/// and either resolves with data or fails with a typed `GatewayError`; none
/// of them touch shared state.
#[async_trait]
pub trait DataGateway: Send + Sync {
    async fn list_projects(&self, ctx: &RequestContext) -> Result<Vec<Project>, GatewayError>;

    async fn create_project(
        &self,
        ctx: &RequestContext,
        project: &NewProject,
    ) -> Result<Project, GatewayError>;

    async fn update_project(
        &self,
        ctx: &RequestContext,
        id: &str,
        changes: &ProjectChanges,
    ) -> Result<Project, GatewayError>;

    async fn delete_project(&self, ctx: &RequestContext, id: &str) -> Result<(), GatewayError>;

    async fn list_tasks(
        &self,
        ctx: &RequestContext,
        project_id: Option<&str>,
    ) -> Result<Vec<Task>, GatewayError>;

    async fn create_task(&self, ctx: &RequestContext, task: &NewTask) -> Result<Task, GatewayError>;

    async fn update_task(
        &self,
        ctx: &RequestContext,
        id: &str,
        changes: &TaskChanges,
    ) -> Result<Task, GatewayError>;

    async fn delete_task(&self, ctx: &RequestContext, id: &str) -> Result<(), GatewayError>;

    async fn login_password(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
    ) -> Result<TokenResponse, GatewayError>;

    async fn request_magic_link(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> Result<MagicLinkResponse, GatewayError>;

    /// Magic-link signup. Returns the backend's message, if any.
    async fn signup(
        &self,
        ctx: &RequestContext,
        email: &str,
        name: &str,
    ) -> Result<Option<String>, GatewayError>;

    async fn signup_password(
        &self,
        ctx: &RequestContext,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<TokenResponse, GatewayError>;

    async fn verify_magic_link(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<TokenResponse, GatewayError>;

    async fn current_user(&self, ctx: &RequestContext) -> Result<User, GatewayError>;

    async fn generate_acceptance_criteria(
        &self,
        ctx: &RequestContext,
        title: &str,
        description: &str,
    ) -> Result<AcceptanceCriteria, GatewayError>;

    /// REST equivalent of a live-collection query, used when a subscription
    /// cannot be established. Filtering on `project_id` is pushed to the
    /// backend; the rest of the query is applied locally.
    async fn list_collection(
        &self,
        ctx: &RequestContext,
        query: &CollectionQuery,
    ) -> Result<Vec<Value>, GatewayError> {
        let docs = match query.collection {
            Collection::Projects => to_documents(self.list_projects(ctx).await?)?,
            Collection::Tasks => {
                let project_id = query.filter_str("project_id");
                to_documents(self.list_tasks(ctx, project_id).await?)?
            }
            Collection::Users => {
                return Err(GatewayError::Unsupported(
                    "the users collection has no REST endpoint".to_string(),
                ));
            }
        };
        Ok(query.apply(docs))
    }
}

/// Serialize records into the JSON documents live collections carry.
pub fn to_documents<T: Serialize>(items: Vec<T>) -> Result<Vec<Value>, GatewayError> {
    items
        .into_iter()
        .map(|item| {
            serde_json::to_value(item).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_changes_only_serializes_set_fields() {
        let changes = TaskChanges::status(TaskStatus::Done);
        assert_eq!(
            serde_json::to_value(&changes).unwrap(),
            json!({"status": "done"})
        );
    }

    #[test]
    fn test_new_task_omits_missing_assignee() {
        let task = NewTask {
            project_id: "p1".into(),
            title: "Write docs".into(),
            description: "Document every endpoint".into(),
            acceptance_criteria: String::new(),
            assignee_id: None,
        };
        let value = serde_json::to_value(&task).unwrap();
        assert!(value.get("assignee_id").is_none());
        assert_eq!(value["project_id"], "p1");
    }

    #[test]
    fn test_token_response_defaults_token_type() {
        let resp: TokenResponse = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        assert_eq!(resp.token_type, "bearer");
        assert!(resp.user.is_none());
    }

    #[test]
    fn test_criteria_from_list() {
        let criteria = AcceptanceCriteria::from_value(json!(["Loads in 2s", "Works offline"]));
        assert_eq!(
            criteria,
            Some(AcceptanceCriteria::List(vec![
                "Loads in 2s".to_string(),
                "Works offline".to_string()
            ]))
        );
        assert_eq!(
            criteria.unwrap().format(),
            "• Loads in 2s\n• Works offline"
        );
    }

    #[test]
    fn test_criteria_from_text() {
        let criteria = AcceptanceCriteria::from_value(json!("Given a user...")).unwrap();
        assert_eq!(criteria.format(), "Given a user...");
    }

    #[test]
    fn test_criteria_from_object_takes_nested_list() {
        let criteria =
            AcceptanceCriteria::from_value(json!({"criteria": ["a", 2]})).unwrap();
        assert_eq!(
            criteria,
            AcceptanceCriteria::List(vec!["a".to_string(), "2".to_string()])
        );
    }

    #[test]
    fn test_criteria_null_is_none() {
        assert!(AcceptanceCriteria::from_value(Value::Null).is_none());
    }
}
