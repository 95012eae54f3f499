use anyhow::{Context, Result};
use builderhub::builderhub_common::TaskStatus;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "builderhub")]
#[command(version, about = "Project and task dashboard client for the BuilderHub backend")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip confirmation prompts
    #[arg(long, global = true)]
    pub yes: bool,

    /// Path to config.toml. Defaults to <config dir>/builderhub/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend origin. Overrides config.toml and BUILDERHUB_API_URL
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session token
    Login {
        /// Email a sign-in link instead of asking for a password
        #[arg(long)]
        magic_link: bool,
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account
    Signup {
        /// Sign up without a password; a sign-in link is emailed
        #[arg(long)]
        magic_link: bool,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Exchange a magic-link token for a session
    Verify { token: String },
    /// Forget the stored session token
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Manage projects
    Projects {
        #[command(subcommand)]
        command: ProjectsCommands,
    },
    /// Manage tasks
    Tasks {
        #[command(subcommand)]
        command: TasksCommands,
    },
    /// Show dashboard statistics and recent activity
    Stats,
    /// Show tasks grouped into board columns
    Board {
        /// Only show tasks for this project
        #[arg(short, long)]
        project: Option<String>,
    },
    /// Draft acceptance criteria for a task
    Criteria { title: String, description: String },
    /// Follow a collection and reprint it whenever it changes
    Watch {
        /// projects or tasks
        collection: String,
        /// Only follow tasks for this project
        #[arg(short, long)]
        project: Option<String>,
    },
    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ProjectsCommands {
    /// List projects with their task counts
    List,
    /// Create a project
    Create {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Change a project's name or description
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a project and its tasks
    Delete { id: String },
}

#[derive(Subcommand, Clone)]
pub enum TasksCommands {
    /// List tasks, newest first
    List {
        #[arg(short, long)]
        project: Option<String>,
    },
    /// Create a task
    Create {
        /// Project the task belongs to
        #[arg(short, long)]
        project: String,
        title: String,
        description: String,
        /// Acceptance criteria text
        #[arg(long, conflicts_with = "generate_criteria")]
        criteria: Option<String>,
        /// Draft acceptance criteria from the title and description first
        #[arg(long)]
        generate_criteria: bool,
        #[arg(long)]
        assignee: Option<String>,
    },
    /// Edit a task's fields
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        criteria: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
    },
    /// Delete a task
    Delete { id: String },
    /// Move a task to another board column (todo, in_progress, done)
    Move { id: String, status: TaskStatus },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default config.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(builderhub::config::default_config_path);
    let config = cmd::load_config(&config_path, cli.api_url.as_deref())
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    let _log_guard = builderhub::logging::init(
        config.logging.format,
        cli.verbose,
        config.logging.directory.as_deref(),
    )?;

    match &cli.command {
        Commands::Config { command } => {
            cmd::cmd_config(&config_path, &config, command.clone())?;
        }
        Commands::Login { magic_link, email } => {
            cmd::cmd_login(&config, email.as_deref(), *magic_link).await?;
        }
        Commands::Signup {
            magic_link,
            email,
            name,
        } => {
            cmd::cmd_signup(&config, email.as_deref(), name.as_deref(), *magic_link).await?;
        }
        Commands::Verify { token } => cmd::cmd_verify(&config, token).await?,
        Commands::Logout => cmd::cmd_logout(&config)?,
        Commands::Whoami => cmd::cmd_whoami(&config).await?,
        Commands::Projects { command } => {
            cmd::cmd_projects(&config, command.clone(), cli.yes).await?;
        }
        Commands::Tasks { command } => cmd::cmd_tasks(&config, command.clone()).await?,
        Commands::Stats => cmd::cmd_stats(&config).await?,
        Commands::Board { project } => cmd::cmd_board(&config, project.as_deref()).await?,
        Commands::Criteria { title, description } => {
            cmd::cmd_criteria(&config, title, description).await?;
        }
        Commands::Watch {
            collection,
            project,
        } => {
            cmd::cmd_watch(&config, collection, project.as_deref()).await?;
        }
    }

    Ok(())
}
