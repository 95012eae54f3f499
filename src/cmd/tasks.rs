//! Task commands: `builderhub tasks ...` and `builderhub criteria`.

use anyhow::Result;
use builderhub::builderhub_common::time::{format_relative, now_millis};
use builderhub::builderhub_common::{Task, TaskStatus};
use builderhub::config::HubConfig;
use builderhub::dashboard::DashboardController;
use builderhub::forms::TaskForm;
use console::style;

use super::super::TasksCommands;
use super::{Client, controller_failure, invalid_input, print_notifications, spinner};

pub fn status_label(status: TaskStatus) -> console::StyledObject<&'static str> {
    match status {
        TaskStatus::Todo => style(status.title()).dim(),
        TaskStatus::InProgress => style(status.title()).yellow(),
        TaskStatus::Done => style(status.title()).green(),
    }
}

pub fn print_task(dashboard: &DashboardController, task: &Task, now: i64) {
    let project = dashboard
        .project(&task.project_id)
        .map(|p| p.name.as_str())
        .unwrap_or("unknown project");
    println!(
        "{}  [{}]  {}  {}",
        style(&task.id).dim(),
        status_label(task.status),
        style(&task.title).bold(),
        style(format!("{} · {}", project, format_relative(task.updated_at, now))).dim()
    );
}

pub async fn cmd_tasks(config: &HubConfig, command: TasksCommands) -> Result<()> {
    let client = Client::connect(config)?;

    match command {
        TasksCommands::List { project } => {
            let mut dashboard = client.loaded_dashboard().await?;
            if let Err(e) = dashboard.select_project(project.as_deref()) {
                return Err(controller_failure(&mut dashboard, e));
            }
            let mut tasks = dashboard.visible_tasks();
            if tasks.is_empty() {
                println!("No tasks yet.");
                return Ok(());
            }
            tasks.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            let now = now_millis();
            for task in &tasks {
                print_task(&dashboard, task, now);
            }
            println!();
            println!("{} task(s)", tasks.len());
        }
        TasksCommands::Create {
            project,
            title,
            description,
            criteria,
            generate_criteria,
            assignee,
        } => {
            let mut dashboard = client.dashboard()?;
            let mut form = TaskForm::new(project, title, description);
            form.assignee_id = assignee;
            form.acceptance_criteria = criteria.unwrap_or_default();
            form.validate().map_err(|errors| invalid_input(&errors))?;

            if generate_criteria {
                let pb = spinner("Generating acceptance criteria...");
                let generated = dashboard
                    .generate_acceptance_criteria(&form.title, &form.description)
                    .await;
                pb.finish_and_clear();
                match generated {
                    Ok(text) => form.acceptance_criteria = text,
                    Err(e) => return Err(controller_failure(&mut dashboard, e)),
                }
            }

            let task = match dashboard.create_task(&form).await {
                Ok(task) => task,
                Err(e) => return Err(controller_failure(&mut dashboard, e)),
            };
            print_notifications(dashboard.take_notifications());
            println!("id: {}", task.id);
        }
        TasksCommands::Update {
            id,
            title,
            description,
            status,
            criteria,
            assignee,
        } => {
            let mut dashboard = client.loaded_dashboard().await?;
            let Some(existing) = dashboard.task(&id) else {
                anyhow::bail!("Task {} not found", id);
            };
            let mut form = TaskForm::from_task(existing);
            if let Some(title) = title {
                form.title = title;
            }
            if let Some(description) = description {
                form.description = description;
            }
            if let Some(status) = status {
                form.status = Some(status);
            }
            if let Some(criteria) = criteria {
                form.acceptance_criteria = criteria;
            }
            if let Some(assignee) = assignee {
                form.assignee_id = Some(assignee);
            }
            dashboard.open_task_form(Some(&id));
            if let Err(e) = dashboard.update_task(&id, &form).await {
                return Err(controller_failure(&mut dashboard, e));
            }
            print_notifications(dashboard.take_notifications());
        }
        TasksCommands::Delete { id } => {
            let mut dashboard = client.loaded_dashboard().await?;
            if let Err(e) = dashboard.delete_task(&id).await {
                return Err(controller_failure(&mut dashboard, e));
            }
            print_notifications(dashboard.take_notifications());
        }
        TasksCommands::Move { id, status } => {
            let mut dashboard = client.loaded_dashboard().await?;
            match dashboard.move_task(&id, status) {
                Ok(true) => {}
                Ok(false) => {
                    println!("Task is already in {}", status.title());
                    return Ok(());
                }
                Err(e) => return Err(controller_failure(&mut dashboard, e)),
            }
            dashboard.settle().await;
            let notifications = dashboard.take_notifications();
            let failed = notifications.iter().any(|n| n.is_error());
            print_notifications(notifications);
            if failed {
                anyhow::bail!("Task {} was not moved", id);
            }
        }
    }

    Ok(())
}

pub async fn cmd_criteria(config: &HubConfig, title: &str, description: &str) -> Result<()> {
    let client = Client::connect(config)?;
    let mut dashboard = client.dashboard()?;
    let pb = spinner("Generating acceptance criteria...");
    let result = dashboard.generate_acceptance_criteria(title, description).await;
    pb.finish_and_clear();
    match result {
        Ok(text) => {
            print_notifications(dashboard.take_notifications());
            println!();
            println!("{}", text);
            Ok(())
        }
        Err(e) => Err(controller_failure(&mut dashboard, e)),
    }
}
