pub mod discord;
pub mod mediawiki;

pub use discord::{DiscordClient, DiscordEndpoints, DiscordUser};
pub use mediawiki::{MediaWikiClient, WikiProfile};

use std::time::Duration;
use thiserror::Error;

/// Failures talking to either identity provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport(err.to_string())
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// `Discord Linked Wiki Roles/{version} (Discord; {package}[; {invite}])`
pub fn user_agent(package: &str, version: &str, invite: Option<&str>) -> String {
    let mut agent = format!("Discord Linked Wiki Roles/{} (Discord; {}", version, package);
    if let Some(invite) = invite {
        agent.push_str("; ");
        agent.push_str(invite);
    }
    agent.push(')');
    agent
}

/// The one outbound client shared by both providers.
///
/// Redirects are never followed; the OAuth2 token endpoints must answer directly.
pub fn build_http_client(timeout: Duration, user_agent: &str) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(user_agent)
        .build()
}
