//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module      | Commands handled                                  |
//! |-------------|---------------------------------------------------|
//! | `auth`      | `Login`, `Signup`, `Verify`, `Logout`, `Whoami`   |
//! | `projects`  | `Projects`                                        |
//! | `tasks`     | `Tasks`, `Criteria`                               |
//! | `views`     | `Stats`, `Board`                                  |
//! | `watch`     | `Watch`                                           |
//! | `config`    | `Config`                                          |

pub mod auth;
pub mod config;
pub mod projects;
pub mod tasks;
pub mod views;
pub mod watch;

pub use auth::{cmd_login, cmd_logout, cmd_signup, cmd_verify, cmd_whoami};
pub use config::{cmd_config, load_config};
pub use projects::cmd_projects;
pub use tasks::{cmd_criteria, cmd_tasks};
pub use views::{cmd_board, cmd_stats};
pub use watch::cmd_watch;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use builderhub::auth::AuthService;
use builderhub::config::HubConfig;
use builderhub::dashboard::{DashboardController, Notification};
use builderhub::errors::{AuthError, ControllerError, ValidationErrors};
use builderhub::gateway::{DataGateway, HttpGateway};
use builderhub::session::{FileTokenStore, RequestContext, TokenStore};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Gateway and auth service wired from the effective configuration.
pub struct Client {
    pub gateway: Arc<dyn DataGateway>,
    pub auth: AuthService,
}

impl Client {
    pub fn connect(config: &HubConfig) -> Result<Self> {
        let gateway: Arc<dyn DataGateway> = Arc::new(HttpGateway::from_config(config)?);
        let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(config.token_file()));
        Ok(Self {
            auth: AuthService::new(Arc::clone(&gateway), store),
            gateway,
        })
    }

    /// Request scope carrying the stored token, if any.
    pub fn context(&self) -> Result<RequestContext> {
        Ok(RequestContext::new(self.auth.credentials()?))
    }

    pub fn dashboard(&self) -> Result<DashboardController> {
        Ok(DashboardController::new(
            Arc::clone(&self.gateway),
            self.context()?,
        ))
    }

    /// A dashboard with projects and tasks already fetched.
    pub async fn loaded_dashboard(&self) -> Result<DashboardController> {
        let mut dashboard = self.dashboard()?;
        let pb = spinner("Loading dashboard...");
        let result = dashboard.load().await;
        pb.finish_and_clear();
        if let Err(e) = result {
            return Err(controller_failure(&mut dashboard, e));
        }
        Ok(dashboard)
    }
}

pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn print_notifications(notifications: Vec<Notification>) {
    for n in notifications {
        if n.is_error() {
            eprintln!(
                "{} {} {}",
                style("✗").red(),
                style(&n.title).red().bold(),
                n.description
            );
        } else {
            println!(
                "{} {} {}",
                style("✓").green(),
                style(&n.title).bold(),
                style(&n.description).dim()
            );
        }
    }
}

pub fn print_field_errors(errors: &ValidationErrors) {
    for e in errors.iter() {
        eprintln!("  {} {}: {}", style("•").red(), style(e.field).yellow(), e.message);
    }
}

/// Flush the dashboard's notifications and turn the intent failure into the
/// command's error.
pub fn controller_failure(dashboard: &mut DashboardController, err: ControllerError) -> anyhow::Error {
    print_notifications(dashboard.take_notifications());
    match err {
        ControllerError::Validation(errors) => invalid_input(&errors),
        other => other.into(),
    }
}

pub fn auth_failure(err: AuthError) -> anyhow::Error {
    match err {
        AuthError::Validation(errors) => invalid_input(&errors),
        other => other.into(),
    }
}

pub fn invalid_input(errors: &ValidationErrors) -> anyhow::Error {
    eprintln!("{}", style("Invalid input:").red().bold());
    print_field_errors(errors);
    anyhow::anyhow!("{} field(s) failed validation", errors.len())
}
