//! Server infrastructure: request tracing, serve loop and shutdown coordination.

pub mod app;
pub mod shutdown;

pub use app::{create_production_app, with_request_tracing};
pub use shutdown::ShutdownCoordinator;
