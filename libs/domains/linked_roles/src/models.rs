use serde::{Deserialize, Serialize};

/// Access/refresh token pair issued by the chat platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Chat-side half of a link, parked between the two OAuth hops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLink {
    pub site: String,
    pub discord_user: String,
    pub tokens: TokenPair,
}

/// A completed link between a chat user and a wiki account.
///
/// At most one exists per `(discord_user, site)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedIdentity {
    pub discord_user: String,
    pub wiki_userid: String,
    pub wiki_username: String,
    pub site: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl LinkedIdentity {
    pub fn tokens(&self) -> TokenPair {
        TokenPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }

    pub fn with_tokens(mut self, tokens: TokenPair) -> Self {
        self.access_token = tokens.access_token;
        self.refresh_token = tokens.refresh_token;
        self
    }
}

/// Body of the role-connection PUT
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleConnection {
    pub platform_name: String,
    pub platform_username: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl RoleConnection {
    /// Wiki name as platform, wiki username as account, no metadata values.
    pub fn for_identity(platform_name: &str, identity: &LinkedIdentity) -> Self {
        Self {
            platform_name: platform_name.to_string(),
            platform_username: identity.wiki_username.clone(),
            metadata: serde_json::Map::new(),
        }
    }
}
