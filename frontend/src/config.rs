use std::{env, path::PathBuf, time::Duration};

use anyhow::anyhow;
use reqwest::Url;

use crate::router::{DASHBOARD_ROUTE, LOGIN_ROUTE};

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub api_base_url: String,
    pub storage_path: PathBuf,
    /// Storage key of the access token; refresh token and expiry use
    /// `<token_key>_refresh` and `<token_key>_expires`.
    pub token_key: String,
    pub user_key: String,
    pub retry_count: u32,
    pub retry_base_delay: Duration,
    pub request_timeout: Duration,
    /// How long before expiry the proactive refresh fires.
    pub refresh_lead: Duration,
    /// Minimum delay before the proactive refresh fires.
    pub refresh_floor: Duration,
    pub login_route: String,
    pub default_route: String,
    /// Establish a local demo session when nothing is stored. Never enable
    /// against a real backend.
    pub mock_session: bool,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api".to_string(),
            storage_path: PathBuf::from(".autoinsure-session.json"),
            token_key: "auth_token".to_string(),
            user_key: "current_user".to_string(),
            retry_count: 2,
            retry_base_delay: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(30),
            refresh_lead: Duration::from_secs(5 * 60),
            refresh_floor: Duration::from_secs(60),
            login_route: LOGIN_ROUTE.to_string(),
            default_route: DASHBOARD_ROUTE.to_string(),
            mock_session: false,
        }
    }
}

impl PortalConfig {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let api_base_url = lookup("PORTAL_API_BASE_URL")
            .unwrap_or(defaults.api_base_url)
            .trim_end_matches('/')
            .to_string();
        Url::parse(&api_base_url)
            .map_err(|e| anyhow!("Invalid PORTAL_API_BASE_URL value {}: {}", api_base_url, e))?;

        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Ok(PortalConfig {
            api_base_url,
            storage_path: lookup("PORTAL_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_path),
            token_key: lookup("PORTAL_TOKEN_KEY").unwrap_or(defaults.token_key),
            user_key: lookup("PORTAL_USER_KEY").unwrap_or(defaults.user_key),
            retry_count: parsed("PORTAL_RETRY_COUNT")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.retry_count),
            retry_base_delay: parsed("PORTAL_RETRY_BASE_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_base_delay),
            request_timeout: parsed("PORTAL_REQUEST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            refresh_lead: parsed("PORTAL_REFRESH_LEAD_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.refresh_lead),
            refresh_floor: parsed("PORTAL_REFRESH_FLOOR_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.refresh_floor),
            login_route: lookup("PORTAL_LOGIN_ROUTE").unwrap_or(defaults.login_route),
            default_route: lookup("PORTAL_DEFAULT_ROUTE").unwrap_or(defaults.default_route),
            mock_session: lookup("PORTAL_MOCK_SESSION")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.mock_session),
        })
    }
}
