use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use axum_helpers::page_headers;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{InteractionError, LinkError, found};
use crate::interactions::{InteractionDispatcher, InteractionResponse};
use crate::linking::LinkingService;
use crate::pending::PendingLinkStore;
use crate::providers::{DiscordClient, DiscordEndpoints, MediaWikiClient};
use crate::repository::LinkedIdentityRepository;
use crate::signature::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::sites::SiteRegistry;
use crate::sync::MetadataSyncService;

pub const CLOSE_TAB_PAGE: &str = r#"<body style="display: flex; justify-content: center; align-items: center;"><big>You can close this tab now!</big></body>"#;
pub const TEAPOT_PAGE: &str =
    r#"<img width="400" src="https://http.cat/418"><br><strong>I'm a teapot</strong>"#;

/// Application state shared by every handler
#[derive(Clone)]
pub struct LinkedRolesState<R, P> {
    pub sites: Arc<SiteRegistry>,
    pub linking: LinkingService<R, P>,
    pub dispatcher: InteractionDispatcher<R>,
    pub sync: MetadataSyncService<R>,
}

impl<R, P> LinkedRolesState<R, P>
where
    R: LinkedIdentityRepository,
    P: PendingLinkStore,
{
    /// Wire every component around one repository, one pending store and one HTTP client.
    pub fn new(
        sites: Arc<SiteRegistry>,
        repo: R,
        pending: P,
        http: reqwest::Client,
        endpoints: DiscordEndpoints,
        redirect_uri: impl Into<String>,
    ) -> Self {
        let discord = DiscordClient::new(http.clone(), endpoints);
        let wiki = MediaWikiClient::new(http);
        let sync = MetadataSyncService::new(repo.clone(), sites.clone(), discord.clone());

        Self {
            linking: LinkingService::new(
                sites.clone(),
                repo,
                pending,
                discord,
                wiki,
                sync.clone(),
                redirect_uri,
            ),
            dispatcher: InteractionDispatcher::new(sync.clone()),
            sync,
            sites,
        }
    }
}

fn param<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// `GET /linked_role/{site}`: start hop 1, or finish it when `code` is present.
async fn discord_hop<R: LinkedIdentityRepository, P: PendingLinkStore>(
    State(state): State<LinkedRolesState<R, P>>,
    Path(site): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, LinkError> {
    let target = match param(&params, "code") {
        None => state.linking.discord_authorize_url(&site)?,
        Some(code) => state.linking.complete_discord_hop(&site, code).await?,
    };

    Ok(found(target.as_str()))
}

/// `GET /linked_role?code&state`: hop 2 callback.
async fn wiki_callback<R: LinkedIdentityRepository, P: PendingLinkStore>(
    State(state): State<LinkedRolesState<R, P>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, LinkError> {
    let code = param(&params, "code").ok_or(LinkError::MissingParameter("code"))?;
    let oauth_state = param(&params, "state").ok_or(LinkError::MissingParameter("state"))?;

    state.linking.complete_wiki_hop(code, oauth_state).await?;

    Ok(Html(CLOSE_TAB_PAGE).into_response())
}

/// `POST /linked_role/{site}`: signed interaction webhook.
async fn interaction<R: LinkedIdentityRepository, P: PendingLinkStore>(
    State(state): State<LinkedRolesState<R, P>>,
    Path(site): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<InteractionResponse>, InteractionError> {
    signature::verify_request(
        state.sites.get(&site),
        header_str(&headers, SIGNATURE_HEADER),
        header_str(&headers, TIMESTAMP_HEADER),
        &body,
    )?;

    let payload =
        serde_json::from_slice(&body).map_err(|e| InteractionError::InvalidBody(e.to_string()))?;

    Ok(Json(state.dispatcher.dispatch(payload, &site).await))
}

async fn unauthorized() -> StatusCode {
    StatusCode::UNAUTHORIZED
}

async fn teapot() -> Response {
    (StatusCode::IM_A_TEAPOT, Html(TEAPOT_PAGE)).into_response()
}

/// Unmatched paths: browsers go home, webhooks are refused, everything else is a teapot.
async fn fallback(method: Method) -> Response {
    match method {
        Method::GET => found("/"),
        Method::POST => StatusCode::UNAUTHORIZED.into_response(),
        _ => teapot().await,
    }
}

pub fn router<R, P>(state: LinkedRolesState<R, P>) -> Router
where
    R: LinkedIdentityRepository,
    P: PendingLinkStore,
{
    Router::new()
        .route(
            "/linked_role",
            get(wiki_callback::<R, P>)
                .head(teapot)
                .post(unauthorized)
                .fallback(teapot),
        )
        .route(
            "/linked_role/{site}",
            get(discord_hop::<R, P>)
                .head(teapot)
                .post(interaction::<R, P>)
                .fallback(teapot),
        )
        .fallback(fallback)
        .layer(middleware::from_fn(page_headers))
        .with_state(state)
}
