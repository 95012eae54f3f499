//! Login, signup and session checks on top of the gateway and token store.

use std::sync::Arc;

use builderhub_common::User;

use crate::errors::{AuthError, GatewayError};
use crate::forms::{LoginForm, LoginMethod, SignupForm};
use crate::gateway::{DataGateway, TokenResponse};
use crate::session::{Credentials, RequestContext, TokenStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// A token was issued and persisted.
    Authenticated(Credentials),
    /// The backend sent (or would send) a magic link.
    MagicLinkSent {
        message: String,
        link: Option<String>,
    },
}

pub struct AuthService {
    gateway: Arc<dyn DataGateway>,
    store: Arc<dyn TokenStore>,
}

impl AuthService {
    pub fn new(gateway: Arc<dyn DataGateway>, store: Arc<dyn TokenStore>) -> Self {
        Self { gateway, store }
    }

    /// Credentials for the stored token, anonymous if there is none.
    pub fn credentials(&self) -> Result<Credentials, AuthError> {
        Ok(self.store.credentials()?)
    }

    fn persist(&self, token: TokenResponse) -> Result<Credentials, AuthError> {
        self.store.save(&token.access_token)?;
        Ok(Credentials::bearer(token.access_token))
    }

    pub async fn login(
        &self,
        ctx: &RequestContext,
        form: &LoginForm,
        method: LoginMethod,
    ) -> Result<AuthOutcome, AuthError> {
        let form = form.validate(method)?;
        match method {
            LoginMethod::Password => {
                let token = self
                    .gateway
                    .login_password(ctx, &form.email, &form.password)
                    .await?;
                tracing::info!(email = %form.email, "logged in");
                Ok(AuthOutcome::Authenticated(self.persist(token)?))
            }
            LoginMethod::MagicLink => {
                let resp = self.gateway.request_magic_link(ctx, &form.email).await?;
                Ok(AuthOutcome::MagicLinkSent {
                    message: resp.message,
                    link: resp.magic_link,
                })
            }
        }
    }

    pub async fn signup(
        &self,
        ctx: &RequestContext,
        form: &SignupForm,
        method: LoginMethod,
    ) -> Result<AuthOutcome, AuthError> {
        let form = form.validate(method)?;
        match method {
            LoginMethod::Password => {
                let token = self
                    .gateway
                    .signup_password(ctx, &form.email, &form.name, &form.password)
                    .await?;
                tracing::info!(email = %form.email, "account created");
                Ok(AuthOutcome::Authenticated(self.persist(token)?))
            }
            LoginMethod::MagicLink => {
                let message = self.gateway.signup(ctx, &form.email, &form.name).await?;
                Ok(AuthOutcome::MagicLinkSent {
                    message: message
                        .unwrap_or_else(|| "Check your email for a sign-in link.".to_string()),
                    link: None,
                })
            }
        }
    }

    /// Exchange a magic-link token for a session token.
    pub async fn verify_magic_link(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<Credentials, AuthError> {
        let resp = self.gateway.verify_magic_link(ctx, token.trim()).await?;
        self.persist(resp)
    }

    /// Who the stored token belongs to. Any failure other than cancellation
    /// means the token is no longer usable, so it is removed.
    pub async fn check_session(&self, ctx: &RequestContext) -> Result<Option<User>, AuthError> {
        let credentials = self.store.credentials()?;
        if !credentials.is_authenticated() {
            return Ok(None);
        }
        let scoped = RequestContext {
            credentials,
            cancel: ctx.cancel.child_token(),
        };
        match self.gateway.current_user(&scoped).await {
            Ok(user) => Ok(Some(user)),
            Err(GatewayError::Cancelled) => Err(GatewayError::Cancelled.into()),
            Err(e) => {
                tracing::warn!(error = %e, "stored session rejected; clearing token");
                self.store.clear()?;
                Ok(None)
            }
        }
    }

    pub fn logout(&self) -> Result<(), AuthError> {
        self.store.clear()?;
        tracing::info!("logged out");
        Ok(())
    }
}
