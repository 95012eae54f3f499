//! In-memory `DataGateway` double shared by unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use builderhub_common::{Project, Task, TaskStatus, User};
use tokio::sync::Notify;

use crate::errors::GatewayError;
use crate::gateway::{
    AcceptanceCriteria, DataGateway, MagicLinkResponse, NewProject, NewTask, ProjectChanges,
    TaskChanges, TokenResponse,
};
use crate::session::RequestContext;

pub fn project(id: &str, name: &str) -> Project {
    Project {
        id: id.to_string(),
        name: name.to_string(),
        description: String::new(),
        owner_id: "u1".to_string(),
        created_at: 1,
        task_count: None,
    }
}

pub fn task(id: &str, project_id: &str, status: TaskStatus, updated_at: i64) -> Task {
    Task {
        id: id.to_string(),
        project_id: project_id.to_string(),
        title: format!("Task {}", id),
        description: "A task description".to_string(),
        status,
        acceptance_criteria: String::new(),
        assignee_id: None,
        created_at: 1,
        updated_at,
    }
}

#[derive(Default)]
pub struct FakeGateway {
    projects: Mutex<Vec<Project>>,
    tasks: Mutex<Vec<Task>>,
    calls: Mutex<Vec<(String, Option<String>)>>,
    failures: Mutex<HashMap<String, GatewayError>>,
    user: Mutex<Option<User>>,
    criteria: Mutex<Option<AcceptanceCriteria>>,
    update_gate: Mutex<Option<Arc<Notify>>>,
    next_id: Mutex<u32>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_projects(&self, projects: Vec<Project>) {
        *self.projects.lock().unwrap() = projects;
    }

    pub fn set_tasks(&self, tasks: Vec<Task>) {
        *self.tasks.lock().unwrap() = tasks;
    }

    pub fn set_user(&self, user: User) {
        *self.user.lock().unwrap() = Some(user);
    }

    pub fn set_criteria(&self, criteria: AcceptanceCriteria) {
        *self.criteria.lock().unwrap() = Some(criteria);
    }

    /// Make every future call to `op` fail with `err`.
    pub fn fail(&self, op: &str, err: GatewayError) {
        self.failures.lock().unwrap().insert(op.to_string(), err);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Hold `update_task` calls until the returned handle is notified.
    pub fn gate_updates(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.update_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(o, _)| o == op).count()
    }

    /// Bearer token seen on the most recent call, if any.
    pub fn last_token(&self) -> Option<String> {
        self.calls.lock().unwrap().last().and_then(|(_, t)| t.clone())
    }

    fn record(&self, ctx: &RequestContext, op: &str) -> Result<(), GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push((op.to_string(), ctx.credentials.token().map(str::to_string)));
        if ctx.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }
        match self.failures.lock().unwrap().get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        format!("{}-{}", prefix, next)
    }

    fn not_found(what: &str) -> GatewayError {
        GatewayError::NotFound {
            message: format!("{} not found", what),
        }
    }
}

#[async_trait]
impl DataGateway for FakeGateway {
    async fn list_projects(&self, ctx: &RequestContext) -> Result<Vec<Project>, GatewayError> {
        self.record(ctx, "list_projects")?;
        Ok(self.projects.lock().unwrap().clone())
    }

    async fn create_project(
        &self,
        ctx: &RequestContext,
        project: &NewProject,
    ) -> Result<Project, GatewayError> {
        self.record(ctx, "create_project")?;
        let created = Project {
            id: self.next_id("p"),
            name: project.name.clone(),
            description: project.description.clone(),
            owner_id: "u1".to_string(),
            created_at: 100,
            task_count: Some(0),
        };
        self.projects.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_project(
        &self,
        ctx: &RequestContext,
        id: &str,
        changes: &ProjectChanges,
    ) -> Result<Project, GatewayError> {
        self.record(ctx, "update_project")?;
        let mut projects = self.projects.lock().unwrap();
        let project = projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Self::not_found("Project"))?;
        if let Some(name) = &changes.name {
            project.name = name.clone();
        }
        if let Some(description) = &changes.description {
            project.description = description.clone();
        }
        Ok(project.clone())
    }

    async fn delete_project(&self, ctx: &RequestContext, id: &str) -> Result<(), GatewayError> {
        self.record(ctx, "delete_project")?;
        let mut projects = self.projects.lock().unwrap();
        let before = projects.len();
        projects.retain(|p| p.id != id);
        if projects.len() == before {
            return Err(Self::not_found("Project"));
        }
        Ok(())
    }

    async fn list_tasks(
        &self,
        ctx: &RequestContext,
        project_id: Option<&str>,
    ) -> Result<Vec<Task>, GatewayError> {
        self.record(ctx, "list_tasks")?;
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| project_id.is_none_or(|p| t.project_id == p))
            .cloned()
            .collect())
    }

    async fn create_task(&self, ctx: &RequestContext, task: &NewTask) -> Result<Task, GatewayError> {
        self.record(ctx, "create_task")?;
        let created = Task {
            id: self.next_id("t"),
            project_id: task.project_id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            status: TaskStatus::Todo,
            acceptance_criteria: task.acceptance_criteria.clone(),
            assignee_id: task.assignee_id.clone(),
            created_at: 200,
            updated_at: 200,
        };
        self.tasks.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_task(
        &self,
        ctx: &RequestContext,
        id: &str,
        changes: &TaskChanges,
    ) -> Result<Task, GatewayError> {
        self.record(ctx, "update_task")?;
        let gate = self.update_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Self::not_found("Task"))?;
        if let Some(title) = &changes.title {
            task.title = title.clone();
        }
        if let Some(description) = &changes.description {
            task.description = description.clone();
        }
        if let Some(status) = changes.status {
            task.status = status;
        }
        if let Some(criteria) = &changes.acceptance_criteria {
            task.acceptance_criteria = criteria.clone();
        }
        if changes.assignee_id.is_some() {
            task.assignee_id = changes.assignee_id.clone();
        }
        task.updated_at += 1;
        Ok(task.clone())
    }

    async fn delete_task(&self, ctx: &RequestContext, id: &str) -> Result<(), GatewayError> {
        self.record(ctx, "delete_task")?;
        let mut tasks = self.tasks.lock().unwrap();
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Err(Self::not_found("Task"));
        }
        Ok(())
    }

    async fn login_password(
        &self,
        ctx: &RequestContext,
        email: &str,
        _password: &str,
    ) -> Result<TokenResponse, GatewayError> {
        self.record(ctx, "login_password")?;
        Ok(TokenResponse {
            access_token: format!("token-for-{}", email),
            token_type: "bearer".to_string(),
            user: None,
        })
    }

    async fn request_magic_link(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> Result<MagicLinkResponse, GatewayError> {
        self.record(ctx, "request_magic_link")?;
        Ok(MagicLinkResponse {
            magic_link: Some(format!("http://localhost:3000/auth/verify?token=link-{}", email)),
            message: "Magic link sent".to_string(),
        })
    }

    async fn signup(
        &self,
        ctx: &RequestContext,
        _email: &str,
        _name: &str,
    ) -> Result<Option<String>, GatewayError> {
        self.record(ctx, "signup")?;
        Ok(Some("Check your email".to_string()))
    }

    async fn signup_password(
        &self,
        ctx: &RequestContext,
        email: &str,
        _name: &str,
        _password: &str,
    ) -> Result<TokenResponse, GatewayError> {
        self.record(ctx, "signup_password")?;
        Ok(TokenResponse {
            access_token: format!("signup-token-for-{}", email),
            token_type: "bearer".to_string(),
            user: None,
        })
    }

    async fn verify_magic_link(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<TokenResponse, GatewayError> {
        self.record(ctx, "verify_magic_link")?;
        Ok(TokenResponse {
            access_token: format!("verified-{}", token),
            token_type: "bearer".to_string(),
            user: None,
        })
    }

    async fn current_user(&self, ctx: &RequestContext) -> Result<User, GatewayError> {
        self.record(ctx, "current_user")?;
        self.user
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| GatewayError::Unauthorized {
                message: "Invalid token".to_string(),
            })
    }

    async fn generate_acceptance_criteria(
        &self,
        ctx: &RequestContext,
        _title: &str,
        _description: &str,
    ) -> Result<AcceptanceCriteria, GatewayError> {
        self.record(ctx, "generate_acceptance_criteria")?;
        Ok(self
            .criteria
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| AcceptanceCriteria::List(vec!["It works".to_string()])))
    }
}
