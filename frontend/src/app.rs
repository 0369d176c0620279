//! Wires the collaborators into a running portal client.

use std::sync::Arc;

use crate::{
    api::ApiClient,
    components::{
        guard::{AuthGuard, GuardOutcome, RoleGuard, SessionSource},
        toast::{LogNotifier, Notifier},
    },
    config::PortalConfig,
    http::{
        error::RetryPolicy, AuthInterceptor, ErrorInterceptor, LoadingInterceptor,
        LoadingTracker, Pipeline, ReqwestTransport, Transport,
    },
    router::{find_route, InMemoryNavigator, Navigator},
    state::{auth::AuthService, session::SessionStore},
    utils::storage::{FileStorage, KeyValueStore},
};

pub struct Portal {
    pub config: PortalConfig,
    pub auth: AuthService,
    pub api: ApiClient,
    pub loading: LoadingTracker,
    navigator: Arc<dyn Navigator>,
    auth_guard: AuthGuard,
    role_guard: RoleGuard,
}

impl Portal {
    /// Builds the standard pipeline (loading, auth, error, transport) and
    /// hydrates the session before returning.
    pub async fn assemble(
        config: PortalConfig,
        storage: Arc<dyn KeyValueStore>,
        transport: Arc<dyn Transport>,
        navigator: Arc<dyn Navigator>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        let store = SessionStore::new(storage, &config.token_key, &config.user_key);
        let auth = AuthService::new(&config, store, transport.clone(), navigator.clone());
        let loading = LoadingTracker::new();

        let pipeline = Pipeline::builder(transport)
            .layer(LoadingInterceptor::new(loading.clone()))
            .layer(AuthInterceptor::new(auth.clone()))
            .layer(ErrorInterceptor::new(
                RetryPolicy {
                    retries: config.retry_count,
                    base_delay: config.retry_base_delay,
                },
                notifier.clone(),
            ))
            .build();
        let api = ApiClient::new(pipeline, config.api_base_url.clone());

        let source: Arc<dyn SessionSource> = Arc::new(auth.clone());
        let auth_guard = AuthGuard::new(source.clone(), config.login_route.clone());
        let role_guard = RoleGuard::new(
            source,
            notifier,
            config.login_route.clone(),
            config.default_route.clone(),
        );

        auth.initialize().await;
        tracing::info!(
            api = %config.api_base_url,
            authenticated = auth.is_authenticated(),
            "Portal client ready"
        );

        Self {
            config,
            auth,
            api,
            loading,
            navigator,
            auth_guard,
            role_guard,
        }
    }

    /// File-backed storage, the reqwest transport and log-based toasts.
    pub async fn bootstrap(config: PortalConfig) -> anyhow::Result<Self> {
        let storage = Arc::new(FileStorage::new(config.storage_path.clone()));
        let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
        let navigator = Arc::new(InMemoryNavigator::new());
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
        Ok(Self::assemble(config, storage, transport, navigator, Some(notifier)).await)
    }

    /// Runs the route's guards and navigates to `url` or to the redirect.
    pub async fn open(&self, url: &str) -> GuardOutcome {
        let outcome = match find_route(url) {
            Some(route) if route.requires_auth => match self.auth_guard.can_activate(url).await {
                GuardOutcome::Allow => self.role_guard.can_activate(url, route.roles),
                redirect => redirect,
            },
            _ => GuardOutcome::Allow,
        };
        match &outcome {
            GuardOutcome::Allow => self.navigator.navigate(url),
            GuardOutcome::Redirect(target) => self.navigator.navigate(target),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::toast::InMemoryNotifier;
    use crate::state::permissions::Role;
    use crate::test_support::{
        fixtures, test_config,
        transport::{FakeTransport, GET, POST},
    };
    use crate::utils::storage::MemoryStorage;
    use serde_json::json;

    const REFRESH: &str = "/api/auth/refresh-token";

    struct Setup {
        storage: Arc<MemoryStorage>,
        transport: Arc<FakeTransport>,
        navigator: Arc<InMemoryNavigator>,
        notifier: Arc<InMemoryNotifier>,
    }

    impl Setup {
        fn new() -> Self {
            Self {
                storage: Arc::new(MemoryStorage::new()),
                transport: FakeTransport::new(),
                navigator: Arc::new(InMemoryNavigator::new()),
                notifier: Arc::new(InMemoryNotifier::new()),
            }
        }

        fn store(&self) -> SessionStore {
            SessionStore::new(self.storage.clone(), "auth_token", "current_user")
        }

        async fn portal(&self) -> Portal {
            Portal::assemble(
                test_config(),
                self.storage.clone(),
                self.transport.clone(),
                self.navigator.clone(),
                Some(self.notifier.clone()),
            )
            .await
        }
    }

    #[tokio::test]
    async fn expired_session_refreshes_once_then_opens_route() {
        let setup = Setup::new();
        setup.store().save(&fixtures::session("stale", "r", -120)).unwrap();
        setup.transport.mock(|when, then| {
            when.method(POST).path(REFRESH);
            then.status(200)
                .json_body(fixtures::token_json("fresh", "r2", 3600, "CUSTOMER"));
        });

        let portal = setup.portal().await;
        let outcome = portal.open("/policies").await;

        assert_eq!(outcome, GuardOutcome::Allow);
        assert_eq!(setup.transport.calls_to(REFRESH), 1);
        assert_eq!(setup.navigator.current().as_deref(), Some("/policies"));
    }

    #[tokio::test]
    async fn unrecoverable_session_lands_on_login() {
        let setup = Setup::new();
        setup.store().save(&fixtures::session("stale", "r", -120)).unwrap();
        setup.transport.mock(|when, then| {
            when.method(POST).path(REFRESH);
            then.status(401);
        });

        let portal = setup.portal().await;
        let outcome = portal.open("/policies").await;

        assert_eq!(
            outcome,
            GuardOutcome::Redirect("/auth/login?returnUrl=/policies".into())
        );
        assert_eq!(setup.transport.calls_to(REFRESH), 1);
        assert!(setup
            .navigator
            .current()
            .is_some_and(|url| url.starts_with("/auth/login")));
    }

    #[tokio::test]
    async fn customer_is_bounced_from_admin_routes() {
        let setup = Setup::new();
        setup
            .store()
            .save(&fixtures::session_for("a", "r", 3600, Role::Customer))
            .unwrap();

        let portal = setup.portal().await;

        assert_eq!(
            portal.open("/admin/policies").await,
            GuardOutcome::Redirect("/dashboard".into())
        );
        assert_eq!(setup.notifier.drain().len(), 1);
        assert_eq!(portal.open("/claims").await, GuardOutcome::Allow);
        assert_eq!(portal.open("/auth/login").await, GuardOutcome::Allow);
    }

    #[tokio::test]
    async fn api_calls_carry_the_session_token() {
        let setup = Setup::new();
        setup.store().save(&fixtures::session("access-1", "r", 3600)).unwrap();
        setup.transport.mock(|when, then| {
            when.method(GET).path("/api/dashboard/stats");
            then.status(200).json_body(json!({
                "totalPolicies": 1,
                "activePolicies": 1,
                "pendingClaims": 0,
                "approvedClaims": 0,
                "totalPremium": 8900.0
            }));
        });

        let portal = setup.portal().await;
        let stats = portal.api.dashboard_stats().await.unwrap();

        assert_eq!(stats.total_policies, 1);
        let sent = setup.transport.requests_to("/api/dashboard/stats");
        assert_eq!(sent[0].bearer_token(), Some("access-1"));
        assert!(!portal.loading.is_loading());
    }
}
