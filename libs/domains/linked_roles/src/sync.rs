//! Pushing linked-role metadata, with one lazy token refresh on 401.

use reqwest::StatusCode;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::models::{LinkedIdentity, RoleConnection, TokenPair};
use crate::providers::discord::ROLE_CONNECTIONS_SCOPE;
use crate::providers::{DiscordClient, ProviderError};
use crate::repository::LinkedIdentityRepository;
use crate::sites::SiteRegistry;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Unknown site: {0}")]
    UnknownSite(String),

    #[error("Role connection update rejected with status {0}")]
    Rejected(u16),

    #[error("Link disappeared while refreshing")]
    LinkGone,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How a detached push ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Updated,
    UpdatedAfterRefresh,
    /// Refresh failed or lost `role_connections.write`; the link was deleted
    Unlinked,
    Failed(String),
}

impl From<SyncError> for SyncOutcome {
    fn from(err: SyncError) -> Self {
        SyncOutcome::Failed(err.to_string())
    }
}

/// Published once per finished background push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    pub discord_user: String,
    pub site: String,
    pub outcome: SyncOutcome,
}

#[derive(Clone)]
pub struct MetadataSyncService<R> {
    repo: R,
    sites: Arc<SiteRegistry>,
    discord: DiscordClient,
    events: broadcast::Sender<SyncEvent>,
}

impl<R: LinkedIdentityRepository> MetadataSyncService<R> {
    pub fn new(repo: R, sites: Arc<SiteRegistry>, discord: DiscordClient) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            repo,
            sites,
            discord,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Look up the link and push its metadata in the background.
    ///
    /// Returns `false` without touching the network when nothing is linked.
    /// The push outcome is only observable through [`subscribe`](Self::subscribe).
    pub async fn sync(&self, discord_user: &str, site: &str) -> StoreResult<bool> {
        let Some(identity) = self.repo.find(discord_user, site).await? else {
            debug!(user = discord_user, site, "No stored link");
            return Ok(false);
        };

        let service = self.clone();
        tokio::spawn(async move {
            let outcome = service.push(&identity).await;
            let _ = service.events.send(SyncEvent {
                discord_user: identity.discord_user,
                site: identity.site,
                outcome,
            });
        });

        Ok(true)
    }

    pub async fn push(&self, identity: &LinkedIdentity) -> SyncOutcome {
        let user = identity.discord_user.as_str();
        let site = identity.site.as_str();

        match self.put(identity).await {
            Ok(StatusCode::OK) => {
                info!(user, site, "Updated role connection");
                SyncOutcome::Updated
            }
            Ok(StatusCode::UNAUTHORIZED) => {
                debug!(user, site, "Access token rejected, refreshing");
                self.refresh(user, site, &identity.refresh_token).await
            }
            Ok(status) => {
                warn!(user, site, status = status.as_u16(), "Role connection update failed");
                SyncError::Rejected(status.as_u16()).into()
            }
            Err(e) => {
                warn!(user, site, error = %e, "Role connection update failed");
                e.into()
            }
        }
    }

    /// Swap the refresh token for a new pair and push once more.
    ///
    /// A failed exchange, or one that drops `role_connections.write`, deletes
    /// the link. A 401 on the retried push is final.
    pub async fn refresh(&self, discord_user: &str, site: &str, refresh_token: &str) -> SyncOutcome {
        let Some(config) = self.sites.get(site) else {
            return SyncError::UnknownSite(site.to_string()).into();
        };

        let granted = match self.discord.refresh(config, refresh_token).await {
            Ok(granted) if granted.has_scopes(&[ROLE_CONNECTIONS_SCOPE]) => granted,
            Ok(granted) => {
                warn!(
                    user = discord_user,
                    site,
                    scopes = %granted.scope_list(),
                    "Refreshed token lacks role_connections.write"
                );
                return self.unlink(discord_user, site).await;
            }
            Err(e) => {
                warn!(user = discord_user, site, error = %e, "Token refresh failed");
                return self.unlink(discord_user, site).await;
            }
        };

        match self.retry_after_refresh(discord_user, site, &granted.tokens).await {
            Ok(()) => {
                info!(user = discord_user, site, "Updated role connection after refresh");
                SyncOutcome::UpdatedAfterRefresh
            }
            Err(e) => {
                warn!(user = discord_user, site, error = %e, "Role connection update failed after refresh");
                e.into()
            }
        }
    }

    async fn retry_after_refresh(
        &self,
        discord_user: &str,
        site: &str,
        tokens: &TokenPair,
    ) -> Result<(), SyncError> {
        if !self.repo.update_tokens(discord_user, site, tokens).await? {
            return Err(SyncError::LinkGone);
        }

        let identity = self
            .repo
            .find(discord_user, site)
            .await?
            .ok_or(SyncError::LinkGone)?;

        match self.put(&identity).await? {
            StatusCode::OK => Ok(()),
            status => Err(SyncError::Rejected(status.as_u16())),
        }
    }

    async fn put(&self, identity: &LinkedIdentity) -> Result<StatusCode, SyncError> {
        let config = self
            .sites
            .get(&identity.site)
            .ok_or_else(|| SyncError::UnknownSite(identity.site.clone()))?;

        let connection = RoleConnection::for_identity(&config.name, identity);
        Ok(self
            .discord
            .put_role_connection(config, &identity.access_token, &connection)
            .await?)
    }

    async fn unlink(&self, discord_user: &str, site: &str) -> SyncOutcome {
        match self.repo.delete(discord_user, site).await {
            Ok(_) => {
                info!(user = discord_user, site, "Removed link");
                SyncOutcome::Unlinked
            }
            Err(e) => {
                error!(user = discord_user, site, error = %e, "Failed to remove link");
                SyncError::Store(e).into()
            }
        }
    }
}
