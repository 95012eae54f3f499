//! Project commands: `builderhub projects ...`.

use anyhow::Result;
use builderhub::config::HubConfig;
use builderhub::forms::ProjectForm;
use console::style;
use dialoguer::Confirm;

use super::super::ProjectsCommands;
use super::{Client, controller_failure, print_notifications};

pub async fn cmd_projects(config: &HubConfig, command: ProjectsCommands, yes: bool) -> Result<()> {
    let client = Client::connect(config)?;

    match command {
        ProjectsCommands::List => {
            let dashboard = client.loaded_dashboard().await?;
            let projects = dashboard.projects_with_counts();
            if projects.is_empty() {
                println!("No projects yet.");
                println!("Create one with: builderhub projects create <name>");
                return Ok(());
            }
            for project in &projects {
                println!(
                    "{}  {}  {}",
                    style(&project.id).dim(),
                    style(&project.name).bold(),
                    style(format!("({} tasks)", project.task_count.unwrap_or(0))).cyan()
                );
                if !project.description.is_empty() {
                    println!("    {}", project.description);
                }
            }
            println!();
            println!("{} project(s)", projects.len());
        }
        ProjectsCommands::Create { name, description } => {
            // Validation runs before any request, so nothing is loaded first.
            let mut dashboard = client.dashboard()?;
            let form = ProjectForm::new(name, description);
            let project = match dashboard.create_project(&form).await {
                Ok(project) => project,
                Err(e) => return Err(controller_failure(&mut dashboard, e)),
            };
            print_notifications(dashboard.take_notifications());
            println!("id: {}", project.id);
        }
        ProjectsCommands::Update {
            id,
            name,
            description,
        } => {
            let mut dashboard = client.loaded_dashboard().await?;
            let Some(existing) = dashboard.project(&id) else {
                anyhow::bail!("Project {} not found", id);
            };
            let mut form = ProjectForm::from_project(existing);
            if let Some(name) = name {
                form.name = name;
            }
            if let Some(description) = description {
                form.description = description;
            }
            dashboard.open_project_form(Some(&id));
            if let Err(e) = dashboard.update_project(&id, &form).await {
                return Err(controller_failure(&mut dashboard, e));
            }
            print_notifications(dashboard.take_notifications());
        }
        ProjectsCommands::Delete { id } => {
            let mut dashboard = client.loaded_dashboard().await?;
            if let Err(e) = dashboard.request_delete_project(&id) {
                return Err(controller_failure(&mut dashboard, e));
            }
            let (name, task_count) = dashboard
                .projects_with_counts()
                .into_iter()
                .find(|p| p.id == id)
                .map(|p| (p.name, p.task_count.unwrap_or(0)))
                .unwrap_or_default();

            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!(
                        "Delete project '{}' and its {} task(s)? This cannot be undone",
                        name, task_count
                    ))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    dashboard.close_modal();
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            if let Err(e) = dashboard.confirm_delete().await {
                return Err(controller_failure(&mut dashboard, e));
            }
            print_notifications(dashboard.take_notifications());
        }
    }

    Ok(())
}
