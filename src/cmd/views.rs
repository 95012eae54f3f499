//! Read-only dashboard views: `stats` and `board`.

use anyhow::Result;
use builderhub::builderhub_common::time::{format_relative, now_millis};
use builderhub::config::HubConfig;
use builderhub::dashboard::View;
use console::style;

use super::tasks::status_label;
use super::{Client, controller_failure};

pub async fn cmd_stats(config: &HubConfig) -> Result<()> {
    let client = Client::connect(config)?;
    let dashboard = client.loaded_dashboard().await?;
    let stats = dashboard.stats();

    println!();
    println!("{}", style("Dashboard").bold());
    println!("=========");
    println!();
    println!("  Projects:     {}", stats.total_projects);
    println!("  Tasks:        {}", stats.total_tasks);
    println!("  To Do:        {}", stats.todo_tasks);
    println!("  In Progress:  {}", stats.in_progress_tasks);
    println!("  Done:         {}", stats.completed_tasks);
    println!(
        "  Completion:   {}",
        style(format!("{}%", stats.completion_percent)).cyan()
    );
    println!();

    if stats.recent_activity.is_empty() {
        println!("No recent activity");
    } else {
        println!("{}", style("Recent activity").bold());
        let now = now_millis();
        for entry in &stats.recent_activity {
            println!(
                "  {}  {}",
                entry.description,
                style(format_relative(entry.timestamp, now)).dim()
            );
        }
    }
    println!();
    Ok(())
}

pub async fn cmd_board(config: &HubConfig, project: Option<&str>) -> Result<()> {
    let client = Client::connect(config)?;
    let mut dashboard = client.loaded_dashboard().await?;
    if let Err(e) = dashboard.select_project(project) {
        return Err(controller_failure(&mut dashboard, e));
    }
    dashboard.set_view(View::Board);

    let board = dashboard.board();
    println!();
    match &board.project {
        Some(project) => println!("{}", style(&project.name).bold()),
        None => println!("{}", style("All projects").bold()),
    }
    for column in &board.columns {
        println!();
        println!("{} ({})", status_label(column.status), column.tasks.len());
        if column.tasks.is_empty() {
            println!("  {}", style("No tasks").dim());
        }
        for task in &column.tasks {
            let assignee = task
                .assignee_id
                .as_deref()
                .map(|a| format!(" @{}", a))
                .unwrap_or_default();
            println!(
                "  {} {}{}",
                style(&task.id).dim(),
                task.title,
                style(assignee).cyan()
            );
        }
    }
    println!();
    Ok(())
}
