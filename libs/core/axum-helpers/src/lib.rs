//! # Axum Helpers
//!
//! Server plumbing shared by the HTTP apps in this workspace.
//!
//! - **[`server`]**: tracing layer, bind/serve, coordinated graceful shutdown
//! - **[`http`]**: response-header middleware for browser-facing pages
//!
//! ```ignore
//! use axum_helpers::server::{create_production_app, with_request_tracing};
//!
//! let app = with_request_tracing(routes);
//! create_production_app(app, &config.server, Duration::from_secs(30), async move {
//!     db.close().await.ok();
//! })
//! .await?;
//! ```

pub mod http;
pub mod server;

pub use http::page_headers;
pub use server::{ShutdownCoordinator, create_production_app, with_request_tracing};
