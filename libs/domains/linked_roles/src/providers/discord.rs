use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::url::Url;
use oauth2::{
    AuthorizationCode, ClientId, ClientSecret, RedirectUrl, RefreshToken, Scope, TokenResponse,
    TokenUrl,
};
use reqwest::StatusCode;
use serde::Deserialize;

use super::{ProviderError, ProviderResult};
use crate::models::{RoleConnection, TokenPair};
use crate::sites::SiteConfig;

pub const IDENTIFY_SCOPE: &str = "identify";
pub const ROLE_CONNECTIONS_SCOPE: &str = "role_connections.write";

/// Base URLs of the chat platform. Overridable so tests can point at a fake.
#[derive(Debug, Clone)]
pub struct DiscordEndpoints {
    /// REST base, e.g. `https://discord.com/api/v10`
    pub api_url: String,
    /// Host serving `/oauth2/authorize` and `/api/oauth2/token`
    pub oauth_url: String,
}

impl DiscordEndpoints {
    pub fn new(api_url: impl Into<String>, oauth_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            oauth_url: oauth_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn authorize_url(&self) -> String {
        format!("{}/oauth2/authorize", self.oauth_url)
    }

    fn token_url(&self) -> String {
        format!("{}/api/oauth2/token", self.oauth_url)
    }
}

impl Default for DiscordEndpoints {
    fn default() -> Self {
        Self::new("https://discord.com/api/v10", "https://discord.com")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// Token pair plus the scopes the user actually granted
#[derive(Debug, Clone)]
pub struct GrantedTokens {
    pub tokens: TokenPair,
    pub scopes: Vec<String>,
}

impl GrantedTokens {
    pub fn has_scopes(&self, required: &[&str]) -> bool {
        required
            .iter()
            .all(|needed| self.scopes.iter().any(|granted| granted == needed))
    }

    pub fn scope_list(&self) -> String {
        self.scopes.join(" ")
    }

    fn from_response(token: &BasicTokenResponse) -> ProviderResult<Self> {
        let refresh_token = token
            .refresh_token()
            .ok_or_else(|| ProviderError::InvalidResponse("no refresh_token issued".to_string()))?;

        Ok(Self {
            tokens: TokenPair {
                access_token: token.access_token().secret().clone(),
                refresh_token: refresh_token.secret().clone(),
            },
            scopes: token
                .scopes()
                .map(|scopes| scopes.iter().map(|s| s.as_str().to_owned()).collect())
                .unwrap_or_default(),
        })
    }
}

#[derive(Clone)]
pub struct DiscordClient {
    http: reqwest::Client,
    endpoints: DiscordEndpoints,
}

impl DiscordClient {
    pub fn new(http: reqwest::Client, endpoints: DiscordEndpoints) -> Self {
        Self { http, endpoints }
    }

    /// Authorization URL for hop 1: silent consent, identity plus role-connection write access.
    pub fn authorize_url(&self, site: &SiteConfig, redirect_uri: &str) -> ProviderResult<Url> {
        let scope = format!("{} {}", IDENTIFY_SCOPE, ROLE_CONNECTIONS_SCOPE);
        Url::parse_with_params(
            &self.endpoints.authorize_url(),
            &[
                ("client_id", site.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("prompt", "none"),
            ],
        )
        .map_err(|e| ProviderError::InvalidUrl(e.to_string()))
    }

    pub async fn exchange_code(
        &self,
        site: &SiteConfig,
        code: &str,
        redirect_uri: &str,
    ) -> ProviderResult<GrantedTokens> {
        let client = BasicClient::new(ClientId::new(site.client_id.clone()))
            .set_client_secret(ClientSecret::new(site.client_secret.clone()))
            .set_token_uri(
                TokenUrl::new(self.endpoints.token_url())
                    .map_err(|e| ProviderError::InvalidUrl(e.to_string()))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(redirect_uri.to_string())
                    .map_err(|e| ProviderError::InvalidUrl(e.to_string()))?,
            );

        let token = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| ProviderError::TokenExchange(e.to_string()))?;

        GrantedTokens::from_response(&token)
    }

    /// `grant_type=refresh_token`, asking for `role_connections.write` again.
    pub async fn refresh(
        &self,
        site: &SiteConfig,
        refresh_token: &str,
    ) -> ProviderResult<GrantedTokens> {
        let client = BasicClient::new(ClientId::new(site.client_id.clone()))
            .set_client_secret(ClientSecret::new(site.client_secret.clone()))
            .set_token_uri(
                TokenUrl::new(self.endpoints.token_url())
                    .map_err(|e| ProviderError::InvalidUrl(e.to_string()))?,
            );

        let token = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .add_scope(Scope::new(ROLE_CONNECTIONS_SCOPE.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| ProviderError::TokenExchange(e.to_string()))?;

        GrantedTokens::from_response(&token)
    }

    pub async fn current_user(&self, access_token: &str) -> ProviderResult<DiscordUser> {
        let response = self
            .http
            .get(format!("{}/users/@me", self.endpoints.api_url))
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    /// PUT the role connection. Any HTTP status is returned as-is; only transport
    /// failures are errors.
    pub async fn put_role_connection(
        &self,
        site: &SiteConfig,
        access_token: &str,
        connection: &RoleConnection,
    ) -> ProviderResult<StatusCode> {
        let response = self
            .http
            .put(format!(
                "{}/users/@me/applications/{}/role-connection",
                self.endpoints.api_url, site.client_id
            ))
            .bearer_auth(access_token)
            .json(connection)
            .send()
            .await?;

        Ok(response.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn site() -> SiteConfig {
        SiteConfig {
            site: "en".into(),
            client_id: "111".into(),
            client_secret: "secret".into(),
            name: "Example Wiki".into(),
            wiki: "https://wiki.example.org/w/".into(),
            wiki_client: "wc".into(),
            wiki_secret: "ws".into(),
            verifying_key: None,
        }
    }

    fn client(server: &MockServer) -> DiscordClient {
        let http = super::super::build_http_client(Duration::from_secs(5), "test-agent").unwrap();
        DiscordClient::new(
            http,
            DiscordEndpoints::new(format!("{}/api/v10", server.uri()), server.uri()),
        )
    }

    #[test]
    fn test_authorize_url_parameters() {
        let client = DiscordClient::new(reqwest::Client::new(), DiscordEndpoints::default());
        let url = client
            .authorize_url(&site(), "https://bridge.example.org/linked_role/en")
            .unwrap();

        assert_eq!(url.path(), "/oauth2/authorize");
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "111");
        assert_eq!(params["scope"], "identify role_connections.write");
        assert_eq!(params["prompt"], "none");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["redirect_uri"], "https://bridge.example.org/linked_role/en");
    }

    #[test]
    fn test_has_scopes() {
        let granted = GrantedTokens {
            tokens: TokenPair {
                access_token: "a".into(),
                refresh_token: "r".into(),
            },
            scopes: vec!["identify".into()],
        };
        assert!(granted.has_scopes(&[IDENTIFY_SCOPE]));
        assert!(!granted.has_scopes(&[IDENTIFY_SCOPE, ROLE_CONNECTIONS_SCOPE]));
    }

    #[tokio::test]
    async fn test_exchange_code_reads_scopes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/oauth2/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access",
                "refresh_token": "refresh",
                "token_type": "Bearer",
                "expires_in": 604800,
                "scope": "identify role_connections.write"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let granted = client(&server)
            .exchange_code(&site(), "code", "https://bridge.example.org/linked_role/en")
            .await
            .unwrap();

        assert_eq!(granted.tokens.access_token, "access");
        assert_eq!(granted.tokens.refresh_token, "refresh");
        assert!(granted.has_scopes(&[IDENTIFY_SCOPE, ROLE_CONNECTIONS_SCOPE]));
    }

    #[tokio::test]
    async fn test_refresh_rejected_by_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/oauth2/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })),
            )
            .mount(&server)
            .await;

        let err = client(&server).refresh(&site(), "stale").await.unwrap_err();
        assert!(matches!(err, ProviderError::TokenExchange(_)));
    }

    #[tokio::test]
    async fn test_put_role_connection_returns_status() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v10/users/@me/applications/111/role-connection"))
            .and(header("authorization", "Bearer access"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let status = client(&server)
            .put_role_connection(
                &site(),
                "access",
                &RoleConnection {
                    platform_name: "Example Wiki".into(),
                    platform_username: "Example".into(),
                    metadata: Default::default(),
                },
            )
            .await
            .unwrap();

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_current_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v10/users/@me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "42", "username": "someone" })))
            .mount(&server)
            .await;

        let user = client(&server).current_user("access").await.unwrap();
        assert_eq!(user.id, "42");
    }
}
