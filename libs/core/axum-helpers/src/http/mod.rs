//! Response-header middleware for browser-facing routes.
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/linked_role/{site}", get(handler))
//!     .layer(axum::middleware::from_fn(page_headers));
//! ```

pub mod headers;

pub use headers::page_headers;
