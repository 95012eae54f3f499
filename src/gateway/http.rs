//! reqwest-backed `DataGateway` against the BuilderHub REST backend.

use std::time::Duration;

use async_trait::async_trait;
use builderhub_common::{Project, Task, User};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::{
    AcceptanceCriteria, DataGateway, MagicLinkResponse, NewProject, NewTask, ProjectChanges,
    TaskChanges, TokenResponse,
};
use crate::config::HubConfig;
use crate::errors::GatewayError;
use crate::session::RequestContext;

const USER_AGENT: &str = concat!("builderhub/", env!("CARGO_PKG_VERSION"));

/// List endpoints answer either `{"projects": [...]}` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProjectList {
    Envelope { projects: Vec<Project> },
    Bare(Vec<Project>),
}

impl ProjectList {
    fn into_vec(self) -> Vec<Project> {
        match self {
            Self::Envelope { projects } => projects,
            Self::Bare(projects) => projects,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TaskList {
    Envelope { tasks: Vec<Task> },
    Bare(Vec<Task>),
}

impl TaskList {
    fn into_vec(self) -> Vec<Task> {
        match self {
            Self::Envelope { tasks } => tasks,
            Self::Bare(tasks) => tasks,
        }
    }
}

#[derive(Deserialize)]
struct CriteriaResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    criteria: Value,
    #[serde(default)]
    error: Option<String>,
}

fn default_success() -> bool {
    true
}

/// Pull a human-readable message out of an error body. FastAPI sends
/// `{"detail": "..."}` or, for 422s, `{"detail": [{"msg": "..."}, ...]}`;
/// the web proxy layer sends `{"error": "..."}`.
pub(crate) fn parse_error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail") {
        Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
        Some(Value::Array(items)) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if !msgs.is_empty() {
                return Some(msgs.join("; "));
            }
        }
        _ => {}
    }
    value
        .get("error")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GatewayError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &HubConfig) -> Result<Self, GatewayError> {
        Self::new(config.api_base_url(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, ctx: &RequestContext, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self
            .client
            .request(method, url)
            .header("Content-Type", "application/json");
        match ctx.credentials.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and return the response once it is known to be a success.
    /// Non-2xx responses become typed errors; cancellation of `ctx` aborts
    /// the in-flight request.
    async fn execute(
        &self,
        ctx: &RequestContext,
        builder: RequestBuilder,
        op: &'static str,
    ) -> Result<reqwest::Response, GatewayError> {
        if ctx.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }
        tracing::debug!(op, "backend request");

        let response = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(GatewayError::Cancelled),
            result = builder.send() => result.map_err(|e| {
                tracing::warn!(op, error = %e, "backend unreachable");
                GatewayError::NetworkError(e.to_string())
            })?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = GatewayError::from_status(status.as_u16(), parse_error_detail(&body));
            tracing::warn!(op, status = status.as_u16(), error = %err, "backend returned error");
            return Err(err);
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        builder: RequestBuilder,
        op: &'static str,
    ) -> Result<T, GatewayError> {
        let response = self.execute(ctx, builder, op).await?;
        let body = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(GatewayError::Cancelled),
            body = response.bytes() => body.map_err(|e| GatewayError::NetworkError(e.to_string()))?,
        };
        serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(op, error = %e, "unexpected response shape");
            GatewayError::InvalidResponse(format!("{}: {}", op, e))
        })
    }
}

#[async_trait]
impl DataGateway for HttpGateway {
    async fn list_projects(&self, ctx: &RequestContext) -> Result<Vec<Project>, GatewayError> {
        let builder = self.request(ctx, Method::GET, "/api/projects");
        let list: ProjectList = self.send_json(ctx, builder, "list_projects").await?;
        Ok(list.into_vec())
    }

    async fn create_project(
        &self,
        ctx: &RequestContext,
        project: &NewProject,
    ) -> Result<Project, GatewayError> {
        let builder = self.request(ctx, Method::POST, "/api/projects").json(project);
        self.send_json(ctx, builder, "create_project").await
    }

    async fn update_project(
        &self,
        ctx: &RequestContext,
        id: &str,
        changes: &ProjectChanges,
    ) -> Result<Project, GatewayError> {
        let path = format!("/api/projects/{}", id);
        let builder = self.request(ctx, Method::PUT, &path).json(changes);
        self.send_json(ctx, builder, "update_project").await
    }

    async fn delete_project(&self, ctx: &RequestContext, id: &str) -> Result<(), GatewayError> {
        let path = format!("/api/projects/{}", id);
        let builder = self.request(ctx, Method::DELETE, &path);
        self.execute(ctx, builder, "delete_project").await?;
        Ok(())
    }

    async fn list_tasks(
        &self,
        ctx: &RequestContext,
        project_id: Option<&str>,
    ) -> Result<Vec<Task>, GatewayError> {
        let mut builder = self.request(ctx, Method::GET, "/api/tasks");
        if let Some(project_id) = project_id {
            builder = builder.query(&[("project_id", project_id)]);
        }
        let list: TaskList = self.send_json(ctx, builder, "list_tasks").await?;
        Ok(list.into_vec())
    }

    async fn create_task(&self, ctx: &RequestContext, task: &NewTask) -> Result<Task, GatewayError> {
        let builder = self.request(ctx, Method::POST, "/api/tasks").json(task);
        self.send_json(ctx, builder, "create_task").await
    }

    async fn update_task(
        &self,
        ctx: &RequestContext,
        id: &str,
        changes: &TaskChanges,
    ) -> Result<Task, GatewayError> {
        let path = format!("/api/tasks/{}", id);
        let builder = self.request(ctx, Method::PUT, &path).json(changes);
        self.send_json(ctx, builder, "update_task").await
    }

    async fn delete_task(&self, ctx: &RequestContext, id: &str) -> Result<(), GatewayError> {
        let path = format!("/api/tasks/{}", id);
        let builder = self.request(ctx, Method::DELETE, &path);
        self.execute(ctx, builder, "delete_task").await?;
        Ok(())
    }

    async fn login_password(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
    ) -> Result<TokenResponse, GatewayError> {
        let builder = self
            .request(ctx, Method::POST, "/api/auth/login-password")
            .json(&json!({ "email": email, "password": password }));
        self.send_json(ctx, builder, "login_password").await
    }

    async fn request_magic_link(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> Result<MagicLinkResponse, GatewayError> {
        let builder = self
            .request(ctx, Method::POST, "/api/auth/magic-link")
            .json(&json!({ "email": email }));
        self.send_json(ctx, builder, "request_magic_link").await
    }

    async fn signup(
        &self,
        ctx: &RequestContext,
        email: &str,
        name: &str,
    ) -> Result<Option<String>, GatewayError> {
        let builder = self
            .request(ctx, Method::POST, "/api/auth/signup")
            .json(&json!({ "email": email, "name": name }));
        let body: Value = self.send_json(ctx, builder, "signup").await?;
        Ok(body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn signup_password(
        &self,
        ctx: &RequestContext,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<TokenResponse, GatewayError> {
        let builder = self
            .request(ctx, Method::POST, "/api/auth/signup-password")
            .json(&json!({ "email": email, "name": name, "password": password }));
        self.send_json(ctx, builder, "signup_password").await
    }

    async fn verify_magic_link(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<TokenResponse, GatewayError> {
        let builder = self
            .request(ctx, Method::POST, "/api/auth/verify-magic-link")
            .query(&[("token", token)]);
        self.send_json(ctx, builder, "verify_magic_link").await
    }

    async fn current_user(&self, ctx: &RequestContext) -> Result<User, GatewayError> {
        let builder = self.request(ctx, Method::GET, "/api/auth/me");
        self.send_json(ctx, builder, "current_user").await
    }

    async fn generate_acceptance_criteria(
        &self,
        ctx: &RequestContext,
        title: &str,
        description: &str,
    ) -> Result<AcceptanceCriteria, GatewayError> {
        let builder = self
            .request(ctx, Method::POST, "/api/ai/generate-acceptance-criteria")
            .json(&json!({ "task_title": title, "task_description": description }));
        let resp: CriteriaResponse = self
            .send_json(ctx, builder, "generate_acceptance_criteria")
            .await?;
        if !resp.success {
            return Err(GatewayError::ValidationOrServerError {
                status: 200,
                message: resp
                    .error
                    .unwrap_or_else(|| "Failed to generate acceptance criteria".to_string()),
            });
        }
        AcceptanceCriteria::from_value(resp.criteria).ok_or_else(|| {
            GatewayError::InvalidResponse("criteria missing from generation response".to_string())
        })
    }
}
