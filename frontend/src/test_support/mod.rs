pub mod fixtures;
pub mod transport;

use std::sync::Arc;

use crate::{
    config::PortalConfig,
    router::InMemoryNavigator,
    state::{auth::AuthService, session::SessionStore},
    utils::storage::MemoryStorage,
};

use transport::FakeTransport;

pub const API_BASE: &str = "http://portal.test/api";

pub fn test_config() -> PortalConfig {
    PortalConfig {
        api_base_url: API_BASE.to_string(),
        ..PortalConfig::default()
    }
}

pub struct AuthHarness {
    pub service: AuthService,
    pub store: SessionStore,
    pub storage: Arc<MemoryStorage>,
    pub transport: Arc<FakeTransport>,
    pub navigator: Arc<InMemoryNavigator>,
    pub config: PortalConfig,
}

pub fn auth_harness() -> AuthHarness {
    auth_harness_with(|_| {})
}

pub fn auth_harness_with(adjust: impl FnOnce(&mut PortalConfig)) -> AuthHarness {
    let mut config = test_config();
    adjust(&mut config);
    let storage = Arc::new(MemoryStorage::new());
    let store = SessionStore::new(storage.clone(), &config.token_key, &config.user_key);
    let transport = FakeTransport::new();
    let navigator = Arc::new(InMemoryNavigator::new());
    let service = AuthService::new(
        &config,
        store.clone(),
        transport.clone(),
        navigator.clone(),
    );
    AuthHarness {
        service,
        store,
        storage,
        transport,
        navigator,
        config,
    }
}
