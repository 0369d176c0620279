use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use autoinsure_frontend::{
    api::types::LoginRequest, components::guard::GuardOutcome, router::DASHBOARD_ROUTE, Portal,
    PortalConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = PortalConfig::load()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autoinsure_frontend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(api = %config.api_base_url, "Starting AutoInsure portal client");
    let portal = Portal::bootstrap(config).await?;

    if !portal.auth.is_authenticated() {
        match (std::env::var("PORTAL_EMAIL"), std::env::var("PORTAL_PASSWORD")) {
            (Ok(email), Ok(password)) => {
                portal
                    .auth
                    .login(LoginRequest { email, password })
                    .await
                    .context("Login failed")?;
            }
            _ => {
                tracing::warn!("No stored session; set PORTAL_EMAIL and PORTAL_PASSWORD to sign in");
                return Ok(());
            }
        }
    }

    match portal.open(DASHBOARD_ROUTE).await {
        GuardOutcome::Allow => {
            let stats = portal
                .api
                .dashboard_stats()
                .await
                .context("Failed to load dashboard statistics")?;
            tracing::info!(
                total_policies = stats.total_policies,
                active_policies = stats.active_policies,
                pending_claims = stats.pending_claims,
                approved_claims = stats.approved_claims,
                total_premium = stats.total_premium,
                "Dashboard statistics"
            );
        }
        GuardOutcome::Redirect(target) => {
            tracing::warn!(%target, "Dashboard not accessible");
        }
    }
    Ok(())
}
