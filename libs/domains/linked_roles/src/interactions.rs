//! Classifying and answering inbound chat interactions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::repository::LinkedIdentityRepository;
use crate::sync::MetadataSyncService;

pub const UPDATING_MESSAGE: &str = "Updating your linked role connection!";
pub const NO_CONNECTION_MESSAGE: &str = "No connection exists yet!";
pub const UNKNOWN_MESSAGE: &str = "Unknown interaction!";

const PING: u64 = 1;
const APPLICATION_COMMAND: u64 = 2;
const CHAT_INPUT: u64 = 1;
const PONG: u8 = 1;
const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;
const EPHEMERAL: u64 = 1 << 6;

#[derive(Debug, Default, Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: Option<u64>,
    pub data: Option<CommandData>,
    pub member: Option<Member>,
    pub user: Option<User>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommandData {
    #[serde(rename = "type")]
    pub kind: Option<u64>,
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Member {
    pub user: Option<User>,
}

#[derive(Debug, Default, Deserialize)]
pub struct User {
    pub id: String,
}

impl Interaction {
    /// Guild invocations carry `member.user`, DMs carry `user`.
    pub fn invoking_user(&self) -> Option<&str> {
        self.member
            .as_ref()
            .and_then(|member| member.user.as_ref())
            .or(self.user.as_ref())
            .map(|user| user.id.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum InteractionKind<'a> {
    Ping,
    Update { user: &'a str },
    Unknown,
}

pub fn classify(interaction: &Interaction) -> InteractionKind<'_> {
    match (interaction.kind, interaction.data.as_ref()) {
        (Some(PING), _) => InteractionKind::Ping,
        (Some(APPLICATION_COMMAND), Some(data))
            if data.kind == Some(CHAT_INPUT) && data.name.as_deref() == Some("update") =>
        {
            match interaction.invoking_user() {
                Some(user) => InteractionKind::Update { user },
                None => InteractionKind::Unknown,
            }
        }
        _ => InteractionKind::Unknown,
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct MessageData {
    pub content: String,
    pub flags: u64,
    pub allowed_mentions: AllowedMentions,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<MessageData>,
}

impl InteractionResponse {
    pub fn pong() -> Self {
        Self {
            kind: PONG,
            data: None,
        }
    }

    /// Ephemeral reply that pings nobody
    pub fn ephemeral(content: &str) -> Self {
        Self {
            kind: CHANNEL_MESSAGE_WITH_SOURCE,
            data: Some(MessageData {
                content: content.to_string(),
                flags: EPHEMERAL,
                allowed_mentions: AllowedMentions { parse: Vec::new() },
            }),
        }
    }
}

/// Answers verified interactions for one deployment.
#[derive(Clone)]
pub struct InteractionDispatcher<R> {
    sync: MetadataSyncService<R>,
}

impl<R: LinkedIdentityRepository> InteractionDispatcher<R> {
    pub fn new(sync: MetadataSyncService<R>) -> Self {
        Self { sync }
    }

    /// Never fails: unknown shapes get the generic reply, store errors the
    /// "no connection" one.
    pub async fn dispatch(&self, payload: Value, site: &str) -> InteractionResponse {
        let interaction: Interaction = serde_json::from_value(payload).unwrap_or_default();

        match classify(&interaction) {
            InteractionKind::Ping => InteractionResponse::pong(),
            InteractionKind::Update { user } => {
                info!(user, site, "Update command received");
                match self.sync.sync(user, site).await {
                    Ok(true) => InteractionResponse::ephemeral(UPDATING_MESSAGE),
                    Ok(false) => InteractionResponse::ephemeral(NO_CONNECTION_MESSAGE),
                    Err(e) => {
                        error!(user, site, error = %e, "Link lookup failed");
                        InteractionResponse::ephemeral(NO_CONNECTION_MESSAGE)
                    }
                }
            }
            InteractionKind::Unknown => InteractionResponse::ephemeral(UNKNOWN_MESSAGE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{DiscordClient, DiscordEndpoints};
    use crate::repository::InMemoryLinkedIdentityRepository;
    use crate::sites::SiteRegistry;
    use serde_json::json;
    use std::sync::Arc;

    fn parse(value: Value) -> Interaction {
        serde_json::from_value(value).unwrap()
    }

    fn dispatcher() -> (
        InteractionDispatcher<InMemoryLinkedIdentityRepository>,
        InMemoryLinkedIdentityRepository,
    ) {
        let repo = InMemoryLinkedIdentityRepository::new();
        let discord = DiscordClient::new(reqwest::Client::new(), DiscordEndpoints::default());
        let sync = MetadataSyncService::new(repo.clone(), Arc::new(SiteRegistry::default()), discord);
        (InteractionDispatcher::new(sync), repo)
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&parse(json!({ "type": 1 }))), InteractionKind::Ping);
        assert_eq!(
            classify(&parse(json!({
                "type": 2,
                "data": { "type": 1, "name": "update" },
                "member": { "user": { "id": "G" } }
            }))),
            InteractionKind::Update { user: "G" }
        );
        assert_eq!(
            classify(&parse(json!({
                "type": 2,
                "data": { "type": 1, "name": "update" },
                "user": { "id": "U" }
            }))),
            InteractionKind::Update { user: "U" }
        );
        assert_eq!(
            classify(&parse(json!({ "type": 2, "data": { "type": 1, "name": "other" }, "user": { "id": "U" } }))),
            InteractionKind::Unknown
        );
        assert_eq!(
            classify(&parse(json!({ "type": 2, "data": { "type": 2, "name": "update" }, "user": { "id": "U" } }))),
            InteractionKind::Unknown
        );
        assert_eq!(
            classify(&parse(json!({ "type": 2, "data": { "type": 1, "name": "update" } }))),
            InteractionKind::Unknown
        );
        assert_eq!(classify(&parse(json!({ "type": 3 }))), InteractionKind::Unknown);
    }

    #[test]
    fn test_response_shapes() {
        assert_eq!(serde_json::to_value(InteractionResponse::pong()).unwrap(), json!({ "type": 1 }));
        assert_eq!(
            serde_json::to_value(InteractionResponse::ephemeral("hi")).unwrap(),
            json!({
                "type": 4,
                "data": { "content": "hi", "flags": 64, "allowed_mentions": { "parse": [] } }
            })
        );
    }

    #[tokio::test]
    async fn test_ping_has_no_side_effects() {
        let (dispatcher, repo) = dispatcher();
        let reply = dispatcher.dispatch(json!({ "type": 1 }), "en").await;

        assert_eq!(reply, InteractionResponse::pong());
        assert_eq!(repo.count().await, 0);
    }

    #[tokio::test]
    async fn test_update_without_link() {
        let (dispatcher, _) = dispatcher();
        let reply = dispatcher
            .dispatch(
                json!({ "type": 2, "data": { "type": 1, "name": "update" }, "user": { "id": "U" } }),
                "S",
            )
            .await;

        assert_eq!(reply, InteractionResponse::ephemeral(NO_CONNECTION_MESSAGE));
    }

    #[tokio::test]
    async fn test_malformed_shapes_get_unknown_reply() {
        let (dispatcher, _) = dispatcher();
        for payload in [json!([]), json!("text"), json!({ "type": "ping" }), json!({})] {
            assert_eq!(
                dispatcher.dispatch(payload, "en").await,
                InteractionResponse::ephemeral(UNKNOWN_MESSAGE)
            );
        }
    }
}
