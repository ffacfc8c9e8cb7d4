//! HTTP surface: direct uploads, the messaging webhook and static pages.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod twiml;
pub mod types;

pub use router::app_router;
pub use server::{start_server, ApiServer, ServerError};
pub use types::ApiContext;
