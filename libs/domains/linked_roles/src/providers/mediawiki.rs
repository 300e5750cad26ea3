use oauth2::url::Url;
use serde::Deserialize;
use serde_json::Value;

use super::{ProviderError, ProviderResult};
use crate::sites::SiteConfig;

/// Identity returned by `rest.php/oauth2/resource/profile`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiProfile {
    pub sub: String,
    pub username: String,
}

#[derive(Debug, Default, Deserialize)]
struct TokenBody {
    access_token: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProfileBody {
    sub: Option<Value>,
    username: Option<String>,
}

/// `sub` is numeric on most wikis; store it as text either way.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Client for the MediaWiki OAuth extension's `rest.php/oauth2` endpoints
#[derive(Clone)]
pub struct MediaWikiClient {
    http: reqwest::Client,
}

impl MediaWikiClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub fn authorize_url(&self, site: &SiteConfig, state: &str, redirect_uri: &str) -> ProviderResult<Url> {
        Url::parse_with_params(
            &format!("{}rest.php/oauth2/authorize", site.wiki),
            &[
                ("response_type", "code"),
                ("state", state),
                ("redirect_uri", redirect_uri),
                ("client_id", site.wiki_client.as_str()),
            ],
        )
        .map_err(|e| ProviderError::InvalidUrl(e.to_string()))
    }

    /// Returns the wiki access token. Upstream `message`/`error` is kept in the error.
    pub async fn exchange_code(
        &self,
        site: &SiteConfig,
        code: &str,
        redirect_uri: &str,
    ) -> ProviderResult<String> {
        let response = self
            .http
            .post(format!("{}rest.php/oauth2/access_token", site.wiki))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", site.wiki_client.as_str()),
                ("client_secret", site.wiki_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body: TokenBody = response.json().await.unwrap_or_default();

        match body.access_token {
            Some(token) if status.is_success() && !token.is_empty() => Ok(token),
            _ => Err(ProviderError::Status {
                status: status.as_u16(),
                message: body.message.or(body.error).unwrap_or_default(),
            }),
        }
    }

    pub async fn profile(&self, site: &SiteConfig, access_token: &str) -> ProviderResult<WikiProfile> {
        let response = self
            .http
            .get(format!("{}rest.php/oauth2/resource/profile", site.wiki))
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

        let body: ProfileBody = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        match (body.sub.as_ref().and_then(id_string), body.username) {
            (Some(sub), Some(username)) if !username.is_empty() => Ok(WikiProfile { sub, username }),
            _ => Err(ProviderError::InvalidResponse(
                "profile lacks sub or username".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn site(wiki: String) -> SiteConfig {
        SiteConfig {
            site: "en".into(),
            client_id: "111".into(),
            client_secret: "secret".into(),
            name: "Example Wiki".into(),
            wiki,
            wiki_client: "wiki-client".into(),
            wiki_secret: "wiki-secret".into(),
            verifying_key: None,
        }
    }

    #[test]
    fn test_authorize_url() {
        let client = MediaWikiClient::new(reqwest::Client::new());
        let url = client
            .authorize_url(
                &site("https://wiki.example.org/w/".into()),
                "state-token",
                "https://bridge.example.org/linked_role",
            )
            .unwrap();

        assert_eq!(url.path(), "/w/rest.php/oauth2/authorize");
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["state"], "state-token");
        assert_eq!(params["client_id"], "wiki-client");
        assert_eq!(params["response_type"], "code");
    }

    #[tokio::test]
    async fn test_exchange_code_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/w/rest.php/oauth2/access_token"))
            .and(body_string_contains("client_secret=wiki-secret"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "wiki-token" })))
            .mount(&server)
            .await;

        let token = MediaWikiClient::new(reqwest::Client::new())
            .exchange_code(&site(format!("{}/w/", server.uri())), "code", "https://bridge/linked_role")
            .await
            .unwrap();
        assert_eq!(token, "wiki-token");
    }

    #[tokio::test]
    async fn test_exchange_code_keeps_upstream_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/w/rest.php/oauth2/access_token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "message": "Authorization code has expired"
            })))
            .mount(&server)
            .await;

        let err = MediaWikiClient::new(reqwest::Client::new())
            .exchange_code(&site(format!("{}/w/", server.uri())), "code", "https://bridge/linked_role")
            .await
            .unwrap_err();

        match err {
            ProviderError::Status { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Authorization code has expired");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_profile_accepts_numeric_sub() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/rest.php/oauth2/resource/profile"))
            .and(header("authorization", "Bearer wiki-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sub": 1234, "username": "Example" })))
            .mount(&server)
            .await;

        let profile = MediaWikiClient::new(reqwest::Client::new())
            .profile(&site(format!("{}/w/", server.uri())), "wiki-token")
            .await
            .unwrap();

        assert_eq!(
            profile,
            WikiProfile {
                sub: "1234".into(),
                username: "Example".into()
            }
        );
    }

    #[tokio::test]
    async fn test_profile_without_username_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/rest.php/oauth2/resource/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sub": "1234" })))
            .mount(&server)
            .await;

        let result = MediaWikiClient::new(reqwest::Client::new())
            .profile(&site(format!("{}/w/", server.uri())), "wiki-token")
            .await;
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }
}
