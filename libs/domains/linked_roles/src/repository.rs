use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::StoreResult;
use crate::models::{LinkedIdentity, TokenPair};

/// Durable store of completed links, one row per `(discord_user, site)`.
#[async_trait]
pub trait LinkedIdentityRepository: Send + Sync + Clone + 'static {
    /// Insert, or overwrite username and tokens of the existing row.
    async fn upsert(&self, identity: LinkedIdentity) -> StoreResult<()>;

    async fn find(&self, discord_user: &str, site: &str) -> StoreResult<Option<LinkedIdentity>>;

    /// Returns `false` when no row matched.
    async fn update_tokens(
        &self,
        discord_user: &str,
        site: &str,
        tokens: &TokenPair,
    ) -> StoreResult<bool>;

    async fn delete(&self, discord_user: &str, site: &str) -> StoreResult<bool>;
}

/// In-memory implementation of LinkedIdentityRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryLinkedIdentityRepository {
    links: Arc<RwLock<HashMap<(String, String), LinkedIdentity>>>,
}

impl InMemoryLinkedIdentityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.links.read().await.len()
    }
}

fn key(discord_user: &str, site: &str) -> (String, String) {
    (discord_user.to_string(), site.to_string())
}

#[async_trait]
impl LinkedIdentityRepository for InMemoryLinkedIdentityRepository {
    async fn upsert(&self, identity: LinkedIdentity) -> StoreResult<()> {
        let mut links = self.links.write().await;
        match links.get_mut(&key(&identity.discord_user, &identity.site)) {
            // wiki_userid keeps its first value, like the SQL upsert
            Some(existing) => {
                existing.wiki_username = identity.wiki_username;
                existing.access_token = identity.access_token;
                existing.refresh_token = identity.refresh_token;
            }
            None => {
                links.insert(key(&identity.discord_user, &identity.site), identity);
            }
        }
        Ok(())
    }

    async fn find(&self, discord_user: &str, site: &str) -> StoreResult<Option<LinkedIdentity>> {
        Ok(self.links.read().await.get(&key(discord_user, site)).cloned())
    }

    async fn update_tokens(
        &self,
        discord_user: &str,
        site: &str,
        tokens: &TokenPair,
    ) -> StoreResult<bool> {
        let mut links = self.links.write().await;
        Ok(match links.get_mut(&key(discord_user, site)) {
            Some(existing) => {
                existing.access_token = tokens.access_token.clone();
                existing.refresh_token = tokens.refresh_token.clone();
                true
            }
            None => false,
        })
    }

    async fn delete(&self, discord_user: &str, site: &str) -> StoreResult<bool> {
        Ok(self.links.write().await.remove(&key(discord_user, site)).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(username: &str, access: &str) -> LinkedIdentity {
        LinkedIdentity {
            discord_user: "42".into(),
            wiki_userid: "7".into(),
            wiki_username: username.into(),
            site: "en".into(),
            access_token: access.into(),
            refresh_token: format!("{access}-refresh"),
        }
    }

    #[tokio::test]
    async fn test_repeated_upserts_keep_one_latest_record() {
        let repo = InMemoryLinkedIdentityRepository::new();
        repo.upsert(identity("Old", "a1")).await.unwrap();
        repo.upsert(identity("New", "a2")).await.unwrap();
        repo.upsert(LinkedIdentity {
            wiki_userid: "999".into(),
            ..identity("Newest", "a3")
        })
        .await
        .unwrap();

        assert_eq!(repo.count().await, 1);
        let stored = repo.find("42", "en").await.unwrap().unwrap();
        assert_eq!(stored.wiki_username, "Newest");
        assert_eq!(stored.access_token, "a3");
        assert_eq!(stored.refresh_token, "a3-refresh");
        assert_eq!(stored.wiki_userid, "7");
    }

    #[tokio::test]
    async fn test_links_are_scoped_per_site() {
        let repo = InMemoryLinkedIdentityRepository::new();
        repo.upsert(identity("A", "a")).await.unwrap();
        repo.upsert(LinkedIdentity {
            site: "de".into(),
            ..identity("B", "b")
        })
        .await
        .unwrap();

        assert_eq!(repo.count().await, 2);
        assert!(repo.find("42", "fr").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_tokens_and_delete() {
        let repo = InMemoryLinkedIdentityRepository::new();
        let tokens = TokenPair {
            access_token: "fresh".into(),
            refresh_token: "fresh-refresh".into(),
        };

        assert!(!repo.update_tokens("42", "en", &tokens).await.unwrap());

        repo.upsert(identity("A", "a")).await.unwrap();
        assert!(repo.update_tokens("42", "en", &tokens).await.unwrap());
        assert_eq!(repo.find("42", "en").await.unwrap().unwrap().tokens(), tokens);

        assert!(repo.delete("42", "en").await.unwrap());
        assert!(!repo.delete("42", "en").await.unwrap());
        assert!(repo.find("42", "en").await.unwrap().is_none());
    }
}
