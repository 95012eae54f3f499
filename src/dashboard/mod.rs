//! Dashboard state controller.
//!
//! Owns the in-memory project and task lists for one dashboard session and
//! turns user intents into gateway calls. Every intent follows the same
//! shape: validate, call the gateway, then on success splice the result in
//! by id and notify, or on failure notify and leave state untouched.
//!
//! Board moves are the exception: the card moves locally at once and the
//! update runs on a spawned task. Its outcome comes back over a channel and
//! is applied by `process_events` or `settle`.

pub mod state;

use std::collections::HashMap;
use std::sync::Arc;

use builderhub_common::time::now_millis;
use builderhub_common::{
    BoardView, DashboardStatistics, Project, Task, TaskStatus, project_task_counts,
};
use tokio::sync::mpsc;

use crate::errors::{ControllerError, GatewayError, ValidationErrors};
use crate::forms::{ProjectForm, TaskForm};
use crate::gateway::{DataGateway, TaskChanges};
use crate::session::RequestContext;

pub use state::{Modal, Notification, NotificationLevel, View};

/// Result of a fire-and-forget status update.
#[derive(Debug)]
struct MoveOutcome {
    task_id: String,
    seq: u64,
    previous: TaskStatus,
    requested: TaskStatus,
    result: Result<Task, GatewayError>,
}

pub struct DashboardController {
    gateway: Arc<dyn DataGateway>,
    scope: RequestContext,
    projects: Vec<Project>,
    tasks: Vec<Task>,
    selected_project: Option<String>,
    view: View,
    modal: Option<Modal>,
    loading: bool,
    stats: DashboardStatistics,
    notifications: Vec<Notification>,
    moves_tx: mpsc::UnboundedSender<MoveOutcome>,
    moves_rx: mpsc::UnboundedReceiver<MoveOutcome>,
    moves_in_flight: usize,
    move_seq: u64,
    latest_move: HashMap<String, u64>,
}

impl DashboardController {
    /// `scope` supplies the credentials for every call; cancelling it (see
    /// `teardown`) abandons anything still in flight.
    pub fn new(gateway: Arc<dyn DataGateway>, scope: RequestContext) -> Self {
        let (moves_tx, moves_rx) = mpsc::unbounded_channel();
        Self {
            gateway,
            scope,
            projects: Vec::new(),
            tasks: Vec::new(),
            selected_project: None,
            view: View::default(),
            modal: None,
            loading: false,
            stats: DashboardStatistics::default(),
            notifications: Vec::new(),
            moves_tx,
            moves_rx,
            moves_in_flight: 0,
            move_seq: 0,
            latest_move: HashMap::new(),
        }
    }

    // ── Read side ────────────────────────────────────────────────────

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn stats(&self) -> &DashboardStatistics {
        &self.stats
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn modal(&self) -> Option<&Modal> {
        self.modal.as_ref()
    }

    pub fn selected_project(&self) -> Option<&str> {
        self.selected_project.as_deref()
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Tasks of the selected project, or all tasks when none is selected.
    pub fn visible_tasks(&self) -> Vec<&Task> {
        match &self.selected_project {
            Some(id) => self.tasks.iter().filter(|t| &t.project_id == id).collect(),
            None => self.tasks.iter().collect(),
        }
    }

    pub fn tasks_by_status(&self, status: TaskStatus) -> Vec<&Task> {
        self.visible_tasks()
            .into_iter()
            .filter(|t| t.status == status)
            .collect()
    }

    pub fn board(&self) -> BoardView {
        let project = self
            .selected_project
            .as_deref()
            .and_then(|id| self.project(id))
            .cloned();
        let tasks: Vec<Task> = self.visible_tasks().into_iter().cloned().collect();
        BoardView::group(project, &tasks)
    }

    /// Projects with `task_count` filled from the loaded tasks.
    pub fn projects_with_counts(&self) -> Vec<Project> {
        let counts = project_task_counts(&self.tasks);
        self.projects
            .iter()
            .map(|p| Project {
                task_count: Some(counts.get(p.id.as_str()).copied().unwrap_or(0)),
                ..p.clone()
            })
            .collect()
    }

    // ── Navigation and modals ────────────────────────────────────────

    pub fn set_view(&mut self, view: View) {
        self.view = view;
    }

    /// Select a project and switch to its task list. `None` clears the
    /// selection.
    pub fn select_project(&mut self, id: Option<&str>) -> Result<(), ControllerError> {
        match id {
            Some(id) => {
                if self.project(id).is_none() {
                    return Err(ControllerError::UnknownProject { id: id.to_string() });
                }
                self.selected_project = Some(id.to_string());
                self.view = View::Tasks;
            }
            None => self.selected_project = None,
        }
        Ok(())
    }

    pub fn open_project_form(&mut self, editing: Option<&str>) {
        self.modal = Some(Modal::ProjectForm {
            editing: editing.map(str::to_string),
        });
    }

    pub fn open_task_form(&mut self, editing: Option<&str>) {
        self.modal = Some(Modal::TaskForm {
            editing: editing.map(str::to_string),
        });
    }

    pub fn request_delete_project(&mut self, id: &str) -> Result<(), ControllerError> {
        if self.project(id).is_none() {
            return Err(ControllerError::UnknownProject { id: id.to_string() });
        }
        self.modal = Some(Modal::ConfirmDelete {
            project: id.to_string(),
        });
        Ok(())
    }

    pub fn close_modal(&mut self) {
        self.modal = None;
    }

    // ── Loading and snapshots ────────────────────────────────────────

    /// Fetch projects and tasks concurrently. On failure the previous lists
    /// stay in place.
    pub async fn load(&mut self) -> Result<(), ControllerError> {
        self.loading = true;
        let ctx = self.scope.child();
        let (projects, tasks) = tokio::join!(
            self.gateway.list_projects(&ctx),
            self.gateway.list_tasks(&ctx, None)
        );
        self.loading = false;

        match (projects, tasks) {
            (Ok(projects), Ok(tasks)) => {
                tracing::info!(projects = projects.len(), tasks = tasks.len(), "dashboard loaded");
                self.projects = projects;
                self.tasks = tasks;
                self.recompute();
                Ok(())
            }
            (Err(e), _) | (_, Err(e)) => Err(self.fail("Failed to load data", e)),
        }
    }

    pub fn apply_project_snapshot(&mut self, projects: Vec<Project>) {
        self.projects = projects;
        self.recompute();
    }

    pub fn apply_task_snapshot(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.recompute();
    }

    // ── Project intents ──────────────────────────────────────────────

    pub async fn create_project(&mut self, form: &ProjectForm) -> Result<Project, ControllerError> {
        let payload = form.validate()?;
        let ctx = self.scope.child();
        match self.gateway.create_project(&ctx, &payload).await {
            Ok(project) => {
                self.notify(Notification::success(
                    "Project created",
                    format!("{} has been created successfully.", project.name),
                ));
                self.projects.push(project.clone());
                self.modal = None;
                self.recompute();
                Ok(project)
            }
            Err(e) => Err(self.fail("Error", e)),
        }
    }

    pub async fn update_project(
        &mut self,
        id: &str,
        form: &ProjectForm,
    ) -> Result<Project, ControllerError> {
        if self.project(id).is_none() {
            return Err(ControllerError::UnknownProject { id: id.to_string() });
        }
        let changes = form.changes()?;
        let ctx = self.scope.child();
        match self.gateway.update_project(&ctx, id, &changes).await {
            Ok(project) => {
                self.notify(Notification::success(
                    "Project updated",
                    format!("{} has been updated successfully.", project.name),
                ));
                replace_by_id(&mut self.projects, id, project.clone(), |p| &p.id);
                self.modal = None;
                self.recompute();
                Ok(project)
            }
            Err(e) => Err(self.fail("Error", e)),
        }
    }

    /// Delete a project. Its tasks are dropped from the local list too.
    pub async fn delete_project(&mut self, id: &str) -> Result<(), ControllerError> {
        let Some(name) = self.project(id).map(|p| p.name.clone()) else {
            return Err(ControllerError::UnknownProject { id: id.to_string() });
        };
        let ctx = self.scope.child();
        match self.gateway.delete_project(&ctx, id).await {
            Ok(()) => {
                self.projects.retain(|p| p.id != id);
                self.tasks.retain(|t| t.project_id != id);
                if self.selected_project.as_deref() == Some(id) {
                    self.selected_project = None;
                }
                self.modal = None;
                self.recompute();
                self.notify(Notification::success(
                    "Project deleted",
                    format!("{} has been deleted successfully.", name),
                ));
                Ok(())
            }
            Err(e) => Err(self.fail("Error", e)),
        }
    }

    /// Carry out the delete the open confirmation modal asks for.
    pub async fn confirm_delete(&mut self) -> Result<(), ControllerError> {
        match self.modal.clone() {
            Some(Modal::ConfirmDelete { project }) => self.delete_project(&project).await,
            _ => Ok(()),
        }
    }

    // ── Task intents ─────────────────────────────────────────────────

    pub async fn create_task(&mut self, form: &TaskForm) -> Result<Task, ControllerError> {
        let payload = form.validate()?;
        let ctx = self.scope.child();
        match self.gateway.create_task(&ctx, &payload).await {
            Ok(task) => {
                self.notify(Notification::success(
                    "Task created",
                    format!("\"{}\" has been created.", task.title),
                ));
                self.tasks.push(task.clone());
                self.modal = None;
                self.recompute();
                Ok(task)
            }
            Err(e) => Err(self.fail("Error", e)),
        }
    }

    pub async fn update_task(&mut self, id: &str, form: &TaskForm) -> Result<Task, ControllerError> {
        if self.task(id).is_none() {
            return Err(ControllerError::UnknownTask { id: id.to_string() });
        }
        let changes = form.changes()?;
        let ctx = self.scope.child();
        match self.gateway.update_task(&ctx, id, &changes).await {
            Ok(task) => {
                self.notify(Notification::success(
                    "Task updated",
                    format!("\"{}\" has been updated.", task.title),
                ));
                replace_by_id(&mut self.tasks, id, task.clone(), |t| &t.id);
                // A form save supersedes any board move still in flight.
                self.latest_move.remove(id);
                self.modal = None;
                self.recompute();
                Ok(task)
            }
            Err(e) => Err(self.fail("Error", e)),
        }
    }

    pub async fn delete_task(&mut self, id: &str) -> Result<(), ControllerError> {
        let Some(title) = self.task(id).map(|t| t.title.clone()) else {
            return Err(ControllerError::UnknownTask { id: id.to_string() });
        };
        let ctx = self.scope.child();
        match self.gateway.delete_task(&ctx, id).await {
            Ok(()) => {
                self.tasks.retain(|t| t.id != id);
                self.latest_move.remove(id);
                self.recompute();
                self.notify(Notification::success(
                    "Task deleted",
                    format!("\"{}\" has been deleted.", title),
                ));
                Ok(())
            }
            Err(e) => Err(self.fail("Error", e)),
        }
    }

    /// Move a card to another column. The local card changes immediately and
    /// one update is issued in the background; this never waits on it.
    /// Returns `false` when the task already has that status.
    pub fn move_task(&mut self, id: &str, status: TaskStatus) -> Result<bool, ControllerError> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return Err(ControllerError::UnknownTask { id: id.to_string() });
        };
        if task.status == status {
            return Ok(false);
        }

        let previous = task.status;
        task.status = status;
        task.updated_at = now_millis();
        let title = task.title.clone();

        self.move_seq += 1;
        let seq = self.move_seq;
        self.latest_move.insert(id.to_string(), seq);
        self.moves_in_flight += 1;

        let gateway = Arc::clone(&self.gateway);
        let ctx = self.scope.child();
        let tx = self.moves_tx.clone();
        let task_id = id.to_string();
        tokio::spawn(async move {
            let result = gateway
                .update_task(&ctx, &task_id, &TaskChanges::status(status))
                .await;
            // The controller may be gone; nothing to deliver to.
            let _ = tx.send(MoveOutcome {
                task_id,
                seq,
                previous,
                requested: status,
                result,
            });
        });

        tracing::debug!(task = id, from = %previous, to = %status, "task moved");
        self.recompute();
        self.notify(Notification::success(
            "Task updated",
            format!("\"{}\" moved to {}", title, status.as_str().replace('_', " ")),
        ));
        Ok(true)
    }

    /// Number of board moves whose outcome has not been applied yet.
    pub fn pending_moves(&self) -> usize {
        self.moves_in_flight
    }

    /// Apply move outcomes that have already arrived, without waiting.
    pub fn process_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(outcome) = self.moves_rx.try_recv() {
            self.apply_move(outcome);
            applied += 1;
        }
        applied
    }

    /// Wait for every in-flight move and apply its outcome.
    pub async fn settle(&mut self) {
        while self.moves_in_flight > 0 {
            match self.moves_rx.recv().await {
                Some(outcome) => self.apply_move(outcome),
                None => break,
            }
        }
    }

    fn apply_move(&mut self, outcome: MoveOutcome) {
        self.moves_in_flight = self.moves_in_flight.saturating_sub(1);
        let is_latest = self.latest_move.get(&outcome.task_id) == Some(&outcome.seq);
        if is_latest {
            self.latest_move.remove(&outcome.task_id);
        }

        match outcome.result {
            Ok(task) => {
                if is_latest {
                    replace_by_id(&mut self.tasks, &outcome.task_id, task, |t| &t.id);
                    self.recompute();
                }
            }
            Err(GatewayError::Cancelled) => {}
            Err(e) => {
                if is_latest
                    && let Some(task) = self.tasks.iter_mut().find(|t| t.id == outcome.task_id)
                    && task.status == outcome.requested
                {
                    task.status = outcome.previous;
                    self.recompute();
                }
                tracing::warn!(task = %outcome.task_id, error = %e, "task move failed");
                self.notify(Notification::error("Failed to move task", e.user_message()));
            }
        }
    }

    // ── Acceptance criteria ──────────────────────────────────────────

    /// Ask the backend to draft acceptance criteria; returns text ready for
    /// the form field.
    pub async fn generate_acceptance_criteria(
        &mut self,
        title: &str,
        description: &str,
    ) -> Result<String, ControllerError> {
        if title.trim().is_empty() || description.trim().is_empty() {
            let message = "Please provide both title and description before generating criteria";
            self.notify(Notification::error("Missing information", message));
            let mut errors = ValidationErrors::new();
            errors.push("acceptance_criteria", message);
            return Err(errors.into());
        }
        let ctx = self.scope.child();
        match self
            .gateway
            .generate_acceptance_criteria(&ctx, title.trim(), description.trim())
            .await
        {
            Ok(criteria) => {
                self.notify(Notification::success(
                    "Criteria generated",
                    "AI-generated acceptance criteria have been added.",
                ));
                Ok(criteria.format())
            }
            Err(e) => Err(self.fail("Generation failed", e)),
        }
    }

    /// Cancel the controller's request scope. Anything still in flight
    /// resolves as cancelled and is discarded.
    pub fn teardown(&mut self) {
        self.scope.cancel.cancel();
    }

    // ── Internals ────────────────────────────────────────────────────

    fn recompute(&mut self) {
        self.stats = DashboardStatistics::compute(&self.projects, &self.tasks);
    }

    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    /// Turn a gateway failure into a notification (unless the scope was
    /// torn down) and the error returned to the caller.
    fn fail(&mut self, title: &str, err: GatewayError) -> ControllerError {
        if err != GatewayError::Cancelled {
            tracing::warn!(error = %err, "{}", title);
            self.notify(Notification::error(title, err.user_message()));
        }
        ControllerError::Gateway(err)
    }
}

fn replace_by_id<T>(items: &mut [T], id: &str, replacement: T, key: impl Fn(&T) -> &String) {
    if let Some(slot) = items.iter_mut().find(|item| key(item) == id) {
        *slot = replacement;
    }
}
