//! Linked Roles Domain
//!
//! Attaches a MediaWiki account to a Discord account as "linked role"
//! metadata. Contains:
//! - the two-hop OAuth2 handshake (Discord, then the wiki)
//! - Ed25519 verification of interaction webhooks
//! - the interaction dispatcher (`/update`)
//! - metadata push with lazy token refresh
//! - in-memory and PostgreSQL link stores
//! - the axum router tying it together

pub mod error;
pub mod handlers;
pub mod interactions;
pub mod linking;
pub mod models;
pub mod pending;
pub mod postgres;
pub mod providers;
pub mod repository;
pub mod signature;
pub mod sites;
pub mod sync;

pub use error::{InteractionError, LinkError, LinkResult, SiteError, StoreError, StoreResult};
pub use handlers::{LinkedRolesState, router};
pub use interactions::{InteractionDispatcher, InteractionResponse};
pub use linking::LinkingService;
pub use models::{LinkedIdentity, PendingLink, RoleConnection, TokenPair};
pub use pending::{InMemoryPendingLinkStore, PendingLinkStore};
pub use postgres::PostgresLinkedIdentityRepository;
pub use providers::{DiscordClient, DiscordEndpoints, MediaWikiClient, ProviderError};
pub use repository::{InMemoryLinkedIdentityRepository, LinkedIdentityRepository};
pub use sites::{SiteConfig, SiteRegistry};
pub use sync::{MetadataSyncService, SyncError, SyncEvent, SyncOutcome};
