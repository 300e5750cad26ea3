//! The two-hop OAuth2 handshake: chat platform first, then the wiki.

use oauth2::url::Url;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{LinkError, LinkResult};
use crate::models::{LinkedIdentity, PendingLink};
use crate::pending::{self, PendingLinkStore};
use crate::providers::discord::{IDENTIFY_SCOPE, ROLE_CONNECTIONS_SCOPE};
use crate::providers::{DiscordClient, MediaWikiClient};
use crate::repository::LinkedIdentityRepository;
use crate::sites::{SiteConfig, SiteRegistry};
use crate::sync::MetadataSyncService;

#[derive(Clone)]
pub struct LinkingService<R, P> {
    sites: Arc<SiteRegistry>,
    repo: R,
    pending: P,
    discord: DiscordClient,
    wiki: MediaWikiClient,
    sync: MetadataSyncService<R>,
    /// Public URL of `/linked_role`
    redirect_uri: String,
}

impl<R, P> LinkingService<R, P>
where
    R: LinkedIdentityRepository,
    P: PendingLinkStore,
{
    pub fn new(
        sites: Arc<SiteRegistry>,
        repo: R,
        pending: P,
        discord: DiscordClient,
        wiki: MediaWikiClient,
        sync: MetadataSyncService<R>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            sites,
            repo,
            pending,
            discord,
            wiki,
            sync,
            redirect_uri: redirect_uri.into().trim_end_matches('/').to_string(),
        }
    }

    fn site(&self, site: &str) -> LinkResult<&SiteConfig> {
        self.sites
            .get(site)
            .ok_or_else(|| LinkError::UnknownSite(site.to_string()))
    }

    fn site_redirect_uri(&self, site: &str) -> String {
        format!("{}/{}", self.redirect_uri, site)
    }

    /// Hop 1, first leg: where to send the browser.
    pub fn discord_authorize_url(&self, site: &str) -> LinkResult<Url> {
        let config = self.site(site)?;
        self.discord
            .authorize_url(config, &self.site_redirect_uri(site))
            .map_err(LinkError::upstream("Building the authorize URL"))
    }

    /// Hop 1 callback: trade the code, park the chat-side tokens and return
    /// the wiki authorize URL for hop 2.
    pub async fn complete_discord_hop(&self, site: &str, code: &str) -> LinkResult<Url> {
        let config = self.site(site)?;

        let granted = self
            .discord
            .exchange_code(config, code, &self.site_redirect_uri(site))
            .await
            .map_err(LinkError::upstream("Discord token exchange"))?;

        if !granted.has_scopes(&[IDENTIFY_SCOPE, ROLE_CONNECTIONS_SCOPE]) {
            return Err(LinkError::InsufficientScope(granted.scope_list()));
        }

        let user = self
            .discord
            .current_user(&granted.tokens.access_token)
            .await
            .map_err(LinkError::upstream("Discord user lookup"))?;

        let state = pending::park(
            &self.pending,
            &config.client_id,
            PendingLink {
                site: site.to_string(),
                discord_user: user.id.clone(),
                tokens: granted.tokens,
            },
        )
        .await;

        info!(
            user = %user.id,
            name = user.username.as_deref().unwrap_or_default(),
            site,
            "Chat account authorized, continuing on the wiki"
        );

        self.wiki
            .authorize_url(config, &state, &self.redirect_uri)
            .map_err(LinkError::upstream("Building the wiki authorize URL"))
    }

    /// Hop 2 callback: resolve the state, identify the wiki account and
    /// persist the link. A metadata push is started in the background.
    ///
    /// The pending entry survives a failed exchange, lookup or write, so the
    /// wiki callback can be retried. It is consumed only once the link is
    /// stored, and whichever caller consumes it first wins.
    pub async fn complete_wiki_hop(&self, code: &str, state: &str) -> LinkResult<LinkedIdentity> {
        let link = self.pending.get(state).await.ok_or(LinkError::UnknownState)?;
        let config = self.site(&link.site)?;

        let wiki_token = self
            .wiki
            .exchange_code(config, code, &self.redirect_uri)
            .await
            .map_err(LinkError::upstream("Wiki token exchange"))?;

        let profile = self
            .wiki
            .profile(config, &wiki_token)
            .await
            .map_err(LinkError::upstream("Wiki profile lookup"))?;

        let identity = LinkedIdentity {
            discord_user: link.discord_user,
            wiki_userid: profile.sub,
            wiki_username: profile.username,
            site: link.site,
            access_token: link.tokens.access_token,
            refresh_token: link.tokens.refresh_token,
        };

        self.repo.upsert(identity.clone()).await?;
        if self.pending.take(state).await.is_none() {
            return Err(LinkError::UnknownState);
        }
        info!(
            user = %identity.discord_user,
            site = %identity.site,
            wiki_user = %identity.wiki_username,
            "Linked accounts"
        );

        let sync = self.sync.clone();
        let (user, site) = (identity.discord_user.clone(), identity.site.clone());
        tokio::spawn(async move {
            if let Err(e) = sync.sync(&user, &site).await {
                warn!(user = %user, site = %site, error = %e, "Initial metadata sync failed");
            }
        });

        Ok(identity)
    }
}
