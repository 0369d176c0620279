//! Route guards. Both decide from a one-shot read of the current session;
//! neither holds a subscription past the decision.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    components::toast::{self, Notification, Notifier},
    error::ApiError,
    router::login_redirect,
    state::{auth::AuthService, permissions::Role, session::Session},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    Redirect(String),
}

/// What the guards need from the auth layer.
#[async_trait]
pub trait SessionSource: Send + Sync {
    fn current_session(&self) -> Option<Session>;
    async fn refresh_session(&self) -> Result<String, ApiError>;
    fn can_access_route(&self, roles: &[Role]) -> bool;
}

#[async_trait]
impl SessionSource for AuthService {
    fn current_session(&self) -> Option<Session> {
        AuthService::current_session(self)
    }

    async fn refresh_session(&self) -> Result<String, ApiError> {
        AuthService::refresh_session(self).await
    }

    fn can_access_route(&self, roles: &[Role]) -> bool {
        AuthService::can_access_route(self, roles)
    }
}

pub struct AuthGuard {
    source: Arc<dyn SessionSource>,
    login_route: String,
}

impl AuthGuard {
    pub fn new(source: Arc<dyn SessionSource>, login_route: impl Into<String>) -> Self {
        Self {
            source,
            login_route: login_route.into(),
        }
    }

    /// Admits a signed-in user. An expired session gets one refresh
    /// attempt first; anything else goes to login with `returnUrl` set.
    pub async fn can_activate(&self, url: &str) -> GuardOutcome {
        let Some(session) = self.source.current_session() else {
            tracing::debug!(url, "No session; redirecting to login");
            return GuardOutcome::Redirect(login_redirect(&self.login_route, url));
        };

        if session.is_expired(Utc::now()) {
            if let Err(err) = self.source.refresh_session().await {
                tracing::info!(url, error = %err, "Expired session could not be refreshed");
                return GuardOutcome::Redirect(login_redirect(&self.login_route, url));
            }
        }
        GuardOutcome::Allow
    }
}

pub struct RoleGuard {
    source: Arc<dyn SessionSource>,
    notifier: Option<Arc<dyn Notifier>>,
    login_route: String,
    default_route: String,
}

impl RoleGuard {
    pub fn new(
        source: Arc<dyn SessionSource>,
        notifier: Option<Arc<dyn Notifier>>,
        login_route: impl Into<String>,
        default_route: impl Into<String>,
    ) -> Self {
        Self {
            source,
            notifier,
            login_route: login_route.into(),
            default_route: default_route.into(),
        }
    }

    /// Signed-out users go to login silently. Users without one of
    /// `required_roles` go to the default route with a toast.
    pub fn can_activate(&self, url: &str, required_roles: &[Role]) -> GuardOutcome {
        if self.source.current_session().is_none() {
            return GuardOutcome::Redirect(self.login_route.clone());
        }
        if required_roles.is_empty() || self.source.can_access_route(required_roles) {
            return GuardOutcome::Allow;
        }

        tracing::info!(url, ?required_roles, "Route denied for current role");
        toast::dispatch(self.notifier.as_deref(), Notification::permission_denied());
        GuardOutcome::Redirect(self.default_route.clone())
    }
}
