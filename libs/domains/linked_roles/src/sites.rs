use ed25519_dalek::VerifyingKey;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

use crate::error::SiteError;

/// Static settings for one community/wiki pair.
#[derive(Clone)]
pub struct SiteConfig {
    /// Short id used in URLs (`/linked_role/{site}`)
    pub site: String,
    pub client_id: String,
    pub client_secret: String,
    /// Display name pushed as `platform_name`
    pub name: String,
    /// Wiki script path, always ending in `/`
    pub wiki: String,
    pub wiki_client: String,
    pub wiki_secret: String,
    /// Webhooks are rejected when this is `None`
    pub verifying_key: Option<VerifyingKey>,
}

impl fmt::Debug for SiteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteConfig")
            .field("site", &self.site)
            .field("client_id", &self.client_id)
            .field("name", &self.name)
            .field("wiki", &self.wiki)
            .field("wiki_client", &self.wiki_client)
            .field("has_key", &self.verifying_key.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct SiteEntry {
    id: String,
    secret: String,
    name: String,
    wiki: String,
    wiki_client: String,
    wiki_secret: String,
    #[serde(default)]
    key: Option<String>,
}

impl SiteEntry {
    fn into_config(self, site: String) -> SiteConfig {
        let verifying_key = match self.key.as_deref() {
            Some(hex) => match decode_verifying_key(hex) {
                Ok(key) => Some(key),
                Err(reason) => {
                    warn!(site = %site, reason, "Ignoring unusable public key");
                    None
                }
            },
            None => {
                warn!(site = %site, "No public key configured, webhooks will be rejected");
                None
            }
        };

        SiteConfig {
            wiki: normalize_wiki(self.wiki),
            client_id: self.id,
            client_secret: self.secret,
            name: self.name,
            wiki_client: self.wiki_client,
            wiki_secret: self.wiki_secret,
            verifying_key,
            site,
        }
    }
}

fn normalize_wiki(mut wiki: String) -> String {
    if !wiki.ends_with('/') {
        wiki.push('/');
    }
    wiki
}

/// Hex-encoded 32-byte Ed25519 public key.
pub fn decode_verifying_key(hex: &str) -> Result<VerifyingKey, &'static str> {
    let bytes = const_hex::decode(hex.trim()).map_err(|_| "key is not valid hex")?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| "key must be 32 bytes")?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| "key is not a valid Ed25519 point")
}

/// Every configured site, keyed by site id. Built once at startup.
#[derive(Debug, Default, Clone)]
pub struct SiteRegistry {
    sites: HashMap<String, SiteConfig>,
}

impl SiteRegistry {
    pub fn new(sites: impl IntoIterator<Item = SiteConfig>) -> Self {
        Self {
            sites: sites
                .into_iter()
                .map(|config| (config.site.clone(), config))
                .collect(),
        }
    }

    /// Parse a JSON object of `{ "<site>": { id, secret, name, wiki, wiki_client, wiki_secret, key } }`.
    pub fn from_json(document: &str) -> Result<Self, SiteError> {
        let entries: HashMap<String, SiteEntry> =
            serde_json::from_str(document).map_err(|e| SiteError::Parse(e.to_string()))?;

        Ok(Self::new(
            entries
                .into_iter()
                .map(|(site, entry)| entry.into_config(site)),
        ))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SiteError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|e| SiteError::Read {
            path: path.display().to_string(),
            details: e.to_string(),
        })?;

        let registry = Self::from_json(&document)?;
        info!(path = %path.display(), sites = registry.len(), "Loaded site registry");
        Ok(registry)
    }

    pub fn get(&self, site: &str) -> Option<&SiteConfig> {
        self.sites.get(site)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
