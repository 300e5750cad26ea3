use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::PendingLink;

/// Correlates the wiki callback with the chat-side half of a link attempt.
#[async_trait]
pub trait PendingLinkStore: Send + Sync + Clone + 'static {
    /// Insert unless `state` is already taken. Returns `false` on collision.
    async fn put(&self, state: String, link: PendingLink) -> bool;

    /// Remove and return the entry. A second `take` of the same state yields `None`.
    async fn take(&self, state: &str) -> Option<PendingLink>;

    /// Look the entry up without consuming it.
    async fn get(&self, state: &str) -> Option<PendingLink>;
}

/// Process-local store. Entries live until consumed or until restart.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPendingLinkStore {
    links: Arc<RwLock<HashMap<String, PendingLink>>>,
}

impl InMemoryPendingLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.links.read().await.len()
    }
}

#[async_trait]
impl PendingLinkStore for InMemoryPendingLinkStore {
    async fn put(&self, state: String, link: PendingLink) -> bool {
        let mut links = self.links.write().await;
        if links.contains_key(&state) {
            return false;
        }
        links.insert(state, link);
        true
    }

    async fn take(&self, state: &str) -> Option<PendingLink> {
        self.links.write().await.remove(state)
    }

    async fn get(&self, state: &str) -> Option<PendingLink> {
        self.links.read().await.get(state).cloned()
    }
}

/// `{client_id}{unix millis as hex}{16 random bytes as hex}{user_id}`
pub fn generate_state(client_id: &str, discord_user: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let random_bytes: Vec<u8> = (0..16).map(|_| rand::random::<u8>()).collect();
    format!(
        "{}{:x}{}{}",
        client_id,
        millis,
        const_hex::encode(random_bytes),
        discord_user
    )
}

/// Park `link` under a fresh state token, regenerating on collision.
pub async fn park<P: PendingLinkStore>(store: &P, client_id: &str, link: PendingLink) -> String {
    loop {
        let state = generate_state(client_id, &link.discord_user);
        if store.put(state.clone(), link.clone()).await {
            return state;
        }
        tracing::debug!("State token collision, regenerating");
    }
}
