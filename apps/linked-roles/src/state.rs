//! Wiring of the shared handler state.

use domain_linked_roles::providers::{build_http_client, user_agent};
use domain_linked_roles::{
    DiscordEndpoints, InMemoryPendingLinkStore, LinkedRolesState, PostgresLinkedIdentityRepository,
    SiteRegistry,
};
use database::postgres::DatabaseConnection;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;

/// Links live in Postgres; pending hops only in this process.
pub type AppState = LinkedRolesState<PostgresLinkedIdentityRepository, InMemoryPendingLinkStore>;

pub fn build_state(config: &Config, db: DatabaseConnection) -> eyre::Result<AppState> {
    let sites = SiteRegistry::from_file(&config.linking.sites_file)?;
    if sites.is_empty() {
        warn!(path = %config.linking.sites_file, "No sites configured, every request will be turned away");
    }

    let agent = user_agent(
        env!("CARGO_PKG_NAME"),
        config.version(),
        config.linking.invite_url.as_deref(),
    );
    let http = build_http_client(config.linking.http_timeout(), &agent)?;
    info!(user_agent = %agent, timeout = ?config.linking.http_timeout(), "Outbound HTTP client ready");

    Ok(LinkedRolesState::new(
        Arc::new(sites),
        PostgresLinkedIdentityRepository::new(db),
        InMemoryPendingLinkStore::new(),
        http,
        DiscordEndpoints::new(
            config.linking.discord_api_url.clone(),
            config.linking.discord_oauth_url.clone(),
        ),
        config.linking.redirect_uri.clone(),
    ))
}
