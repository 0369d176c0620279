//! Session lifecycle: login, logout, token refresh and the proactive
//! expiration timer.
//!
//! ```text
//!                 login / hydrate
//!  Unauthenticated ───────────────▶ Authenticated
//!        ▲   ▲                        │      ▲
//!        │   │ logout                 │ 401 / timer
//!        │   └────────────────────────┤      │ refresh ok
//!        │        refresh failed      ▼      │
//!        └──────────────────────── Refreshing
//! ```
//!
//! The session is owned here and only changed by `login`, `refresh_token`
//! and `logout`. Everyone else reads it through [`AuthService::current_user`],
//! [`AuthService::current_session`] or the [`AuthService::subscribe`] stream.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::{sync::watch, task::JoinHandle};
use validator::Validate;

use crate::{
    api::types::{LoginRequest, Locale, RefreshTokenRequest, TokenResponse, User},
    config::PortalConfig,
    error::ApiError,
    http::{HttpRequest, Transport},
    router::Navigator,
    state::{
        permissions::{Permission, Role},
        refresh::RefreshGate,
        session::{Session, SessionStore},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Unauthenticated,
    Authenticated,
    Refreshing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthSnapshot {
    pub status: AuthStatus,
    pub user: Option<User>,
}

#[derive(Clone)]
pub struct AuthService {
    inner: Arc<AuthInner>,
}

struct AuthInner {
    api_base_url: String,
    login_route: String,
    refresh_lead: Duration,
    refresh_floor: Duration,
    mock_session: bool,
    store: SessionStore,
    transport: Arc<dyn Transport>,
    navigator: Arc<dyn Navigator>,
    session: Mutex<Option<Session>>,
    state: watch::Sender<AuthSnapshot>,
    timer: Mutex<Option<JoinHandle<()>>>,
    refresh_gate: RefreshGate,
}

impl Drop for AuthInner {
    fn drop(&mut self) {
        let timer = self.timer.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = timer.take() {
            handle.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Delay until the proactive refresh: `lead` before expiry, but never
/// sooner than `floor` from now.
pub fn refresh_delay(
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    lead: Duration,
    floor: Duration,
) -> Duration {
    let remaining = (expires_at - now).to_std().unwrap_or(Duration::ZERO);
    remaining.saturating_sub(lead).max(floor)
}

impl AuthService {
    pub fn new(
        config: &PortalConfig,
        store: SessionStore,
        transport: Arc<dyn Transport>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (state, _) = watch::channel(AuthSnapshot {
            status: AuthStatus::Unauthenticated,
            user: None,
        });
        Self {
            inner: Arc::new(AuthInner {
                api_base_url: config.api_base_url.clone(),
                login_route: config.login_route.clone(),
                refresh_lead: config.refresh_lead,
                refresh_floor: config.refresh_floor,
                mock_session: config.mock_session,
                store,
                transport,
                navigator,
                session: Mutex::new(None),
                state,
                timer: Mutex::new(None),
                refresh_gate: RefreshGate::new(),
            }),
        }
    }

    /// Hydrates the session from durable storage. Never fails: unreadable
    /// or unrecoverable state degrades to logged out.
    pub async fn initialize(&self) {
        let stored = match self.inner.store.load() {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(error = %err, "Stored session unreadable; starting logged out");
                self.clear_local();
                return;
            }
        };

        let Some(session) = stored else {
            if self.inner.mock_session {
                self.establish_mock_session();
            } else {
                tracing::debug!("No stored session");
            }
            return;
        };

        if !session.is_expired(Utc::now()) {
            tracing::info!(user_id = %session.user.id, "Restored stored session");
            self.adopt(session);
            return;
        }

        tracing::info!(user_id = %session.user.id, "Stored session expired; attempting refresh");
        if let Err(err) = self.refresh_session().await {
            tracing::warn!(error = %err, "Could not recover expired session");
            self.clear_local();
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn status(&self) -> AuthStatus {
        self.inner.state.borrow().status
    }

    pub fn current_user(&self) -> Option<User> {
        lock(&self.inner.session).as_ref().map(|s| s.user.clone())
    }

    pub fn current_session(&self) -> Option<Session> {
        lock(&self.inner.session).clone()
    }

    pub fn is_authenticated(&self) -> bool {
        lock(&self.inner.session).is_some()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.store.access_token()
    }

    pub fn stored_refresh_token(&self) -> Option<String> {
        self.inner.store.refresh_token()
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        lock(&self.inner.session)
            .as_ref()
            .is_some_and(|s| s.user.role.grants(permission))
    }

    /// Whether the current user holds one of `roles`. Super admins pass
    /// every check; no session never passes.
    pub fn can_access_route(&self, roles: &[Role]) -> bool {
        lock(&self.inner.session).as_ref().is_some_and(|s| {
            s.user.role == Role::SuperAdmin || roles.is_empty() || roles.contains(&s.user.role)
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.inner.api_base_url, path)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<Session, ApiError> {
        request.validate()?;
        let body = serde_json::to_value(&request)
            .map_err(|e| ApiError::unknown(format!("Failed to encode request: {}", e)))?;
        let response = self
            .inner
            .transport
            .send(HttpRequest::post(self.endpoint("/auth/login")).json(body))
            .await?;

        if !response.is_success() {
            let error = ApiError::from_response(response.status, &response.body)
                .with_request("POST", "/auth/login");
            tracing::warn!(status = error.status, code = %error.code, "Login rejected");
            return Err(error);
        }

        let tokens: TokenResponse = response.json()?;
        let session = self.establish(tokens)?;
        tracing::info!(user_id = %session.user.id, role = %session.user.role, "Logged in");
        Ok(session)
    }

    /// Exchanges `refresh_token` for a new session. Any failure ends the
    /// session before the error is returned.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Session, ApiError> {
        self.publish_status(AuthStatus::Refreshing);
        let result = match self.request_refresh(refresh_token).await {
            Ok(mut tokens) => {
                // Refresh renews credentials only; the signed-in identity stays.
                if let Some(user) = self.current_user() {
                    tokens.user = user;
                }
                self.establish(tokens)
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(session) => {
                tracing::info!(user_id = %session.user.id, expires_at = %session.expires_at, "Token refreshed");
                Ok(session)
            }
            Err(err) => {
                tracing::warn!(error = %err, code = %err.code, "Token refresh failed; logging out");
                self.logout();
                Err(err)
            }
        }
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<TokenResponse, ApiError> {
        let body = serde_json::to_value(RefreshTokenRequest {
            refresh_token: refresh_token.to_string(),
        })
        .map_err(|e| ApiError::unknown(format!("Failed to encode request: {}", e)))?;
        let response = self
            .inner
            .transport
            .send(HttpRequest::post(self.endpoint("/auth/refresh-token")).json(body))
            .await?;
        if !response.is_success() {
            return Err(ApiError::from_response(response.status, &response.body)
                .with_request("POST", "/auth/refresh-token"));
        }
        response.json()
    }

    /// Single-flight refresh using the stored refresh token. Callers that
    /// arrive while a refresh is pending share its outcome. Without a
    /// stored refresh token the session ends and no request is made.
    pub async fn refresh_session(&self) -> Result<String, ApiError> {
        let weak: Weak<AuthInner> = Arc::downgrade(&self.inner);
        self.inner
            .refresh_gate
            .run(move || {
                async move {
                    let inner = weak
                        .upgrade()
                        .ok_or_else(|| ApiError::unknown("Auth service shut down"))?;
                    let service = AuthService { inner };
                    let Some(refresh_token) = service.stored_refresh_token() else {
                        tracing::warn!("No refresh token available; ending session");
                        service.logout();
                        return Err(ApiError::unauthorized("No refresh token available"));
                    };
                    service
                        .refresh_token(&refresh_token)
                        .await
                        .map(|session| session.access_token)
                }
                .boxed()
            })
            .await
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh_gate.is_refreshing()
    }

    /// Ends the session and sends the user to the login route. Safe to call
    /// with no active session.
    pub fn logout(&self) {
        self.cancel_timer();
        let had_session = lock(&self.inner.session).take().is_some();
        if let Err(err) = self.inner.store.clear() {
            tracing::warn!(error = %err, "Failed to clear stored session");
        }
        self.publish(AuthStatus::Unauthenticated, None);
        if had_session {
            tracing::info!("Logged out");
        }
        self.inner.navigator.navigate(&self.inner.login_route);
    }

    fn establish(&self, tokens: TokenResponse) -> Result<Session, ApiError> {
        let session = Session::issue(tokens, Utc::now());
        if let Err(err) = self.inner.store.save(&session) {
            self.clear_local();
            return Err(ApiError::unknown(format!("Failed to store session: {}", err)));
        }
        self.adopt(session.clone());
        Ok(session)
    }

    fn adopt(&self, session: Session) {
        let user = session.user.clone();
        let expires_at = session.expires_at;
        *lock(&self.inner.session) = Some(session);
        self.publish(AuthStatus::Authenticated, Some(user));
        self.arm_expiration_timer(expires_at);
    }

    fn clear_local(&self) {
        self.cancel_timer();
        lock(&self.inner.session).take();
        if let Err(err) = self.inner.store.clear() {
            tracing::warn!(error = %err, "Failed to clear stored session");
        }
        self.publish(AuthStatus::Unauthenticated, None);
    }

    fn establish_mock_session(&self) {
        tracing::warn!("Mock session enabled; signing in a local demo administrator");
        let tokens = TokenResponse {
            user: User {
                id: "mock-admin".to_string(),
                email: "admin@autoinsure.local".to_string(),
                display_name: "Demo Administrator".to_string(),
                role: Role::Admin,
                locale: Locale::Th,
            },
            access_token: format!("mock-access-{}", uuid::Uuid::new_v4()),
            refresh_token: format!("mock-refresh-{}", uuid::Uuid::new_v4()),
            expires_in: 3600,
        };
        if let Err(err) = self.establish(tokens) {
            tracing::warn!(error = %err, "Failed to establish mock session");
        }
    }

    fn publish(&self, status: AuthStatus, user: Option<User>) {
        self.inner.state.send_replace(AuthSnapshot { status, user });
    }

    fn publish_status(&self, status: AuthStatus) {
        self.inner.state.send_modify(|snapshot| snapshot.status = status);
    }

    fn arm_expiration_timer(&self, expires_at: DateTime<Utc>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime; proactive token refresh disabled");
            return;
        };
        let delay = refresh_delay(
            expires_at,
            Utc::now(),
            self.inner.refresh_lead,
            self.inner.refresh_floor,
        );
        let weak = Arc::downgrade(&self.inner);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            // Detach before refreshing so the re-armed timer does not abort this task.
            lock(&inner.timer).take();
            let service = AuthService { inner };
            tracing::info!("Access token nearing expiry; refreshing proactively");
            if let Err(err) = service.refresh_session().await {
                tracing::warn!(error = %err, "Proactive token refresh failed");
            }
        });
        tracing::debug!(delay_secs = delay.as_secs(), "Armed token expiration timer");
        if let Some(previous) = lock(&self.inner.timer).replace(handle) {
            previous.abort();
        }
    }

    fn cancel_timer(&self) {
        if let Some(handle) = lock(&self.inner.timer).take() {
            handle.abort();
        }
    }
}
