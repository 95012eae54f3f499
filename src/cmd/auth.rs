//! Session commands: `login`, `signup`, `verify`, `logout`, `whoami`.

use anyhow::Result;
use builderhub::auth::AuthOutcome;
use builderhub::config::HubConfig;
use builderhub::forms::{LoginForm, LoginMethod, SignupForm};
use builderhub::session::RequestContext;
use console::style;
use dialoguer::{Input, Password};

use super::{Client, auth_failure, spinner};

fn method(magic_link: bool) -> LoginMethod {
    if magic_link {
        LoginMethod::MagicLink
    } else {
        LoginMethod::Password
    }
}

fn prompt_text(label: &str, given: Option<&str>) -> Result<String> {
    match given {
        Some(value) => Ok(value.to_string()),
        None => Ok(Input::<String>::new()
            .with_prompt(label)
            .allow_empty(true)
            .interact_text()?),
    }
}

fn report_outcome(outcome: AuthOutcome) {
    match outcome {
        AuthOutcome::Authenticated(_) => {
            println!("{} Signed in", style("✓").green());
        }
        AuthOutcome::MagicLinkSent { message, link } => {
            println!("{} {}", style("✓").green(), message);
            if let Some(link) = link {
                println!();
                println!("Sign-in link: {}", style(link).cyan());
            }
            println!();
            println!("Then run `builderhub verify <token>` with the token from the link.");
        }
    }
}

pub async fn cmd_login(config: &HubConfig, email: Option<&str>, magic_link: bool) -> Result<()> {
    let client = Client::connect(config)?;
    let method = method(magic_link);
    let email = prompt_text("Email", email)?;
    let password = match method {
        LoginMethod::Password => Password::new().with_prompt("Password").interact()?,
        LoginMethod::MagicLink => String::new(),
    };

    let form = LoginForm::new(email, password);
    let pb = spinner("Signing in...");
    let result = client
        .auth
        .login(&RequestContext::anonymous(), &form, method)
        .await;
    pb.finish_and_clear();
    report_outcome(result.map_err(auth_failure)?);
    Ok(())
}

pub async fn cmd_signup(
    config: &HubConfig,
    email: Option<&str>,
    name: Option<&str>,
    magic_link: bool,
) -> Result<()> {
    let client = Client::connect(config)?;
    let method = method(magic_link);
    let name = prompt_text("Name", name)?;
    let email = prompt_text("Email", email)?;
    let (password, confirm_password) = match method {
        LoginMethod::Password => (
            Password::new().with_prompt("Password").interact()?,
            Password::new().with_prompt("Confirm password").interact()?,
        ),
        LoginMethod::MagicLink => (String::new(), String::new()),
    };

    let form = SignupForm {
        name,
        email,
        password,
        confirm_password,
    };
    let result = client
        .auth
        .signup(&RequestContext::anonymous(), &form, method)
        .await;
    report_outcome(result.map_err(auth_failure)?);
    Ok(())
}

pub async fn cmd_verify(config: &HubConfig, token: &str) -> Result<()> {
    let client = Client::connect(config)?;
    client
        .auth
        .verify_magic_link(&RequestContext::anonymous(), token)
        .await
        .map_err(auth_failure)?;
    println!("{} Signed in", style("✓").green());
    Ok(())
}

pub fn cmd_logout(config: &HubConfig) -> Result<()> {
    let client = Client::connect(config)?;
    client.auth.logout()?;
    println!("Signed out");
    Ok(())
}

pub async fn cmd_whoami(config: &HubConfig) -> Result<()> {
    let client = Client::connect(config)?;
    match client.auth.check_session(&RequestContext::anonymous()).await? {
        Some(user) => {
            let name = user.name.as_deref().unwrap_or(&user.email);
            println!("{} <{}>", style(name).bold(), user.email);
            if !user.role.is_empty() {
                println!("Role: {}", user.role);
            }
        }
        None => {
            println!("Not signed in. Run `builderhub login` first.");
        }
    }
    Ok(())
}
