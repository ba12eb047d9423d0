//! REST API over the task store and dependency graph.

mod extract;
mod handlers;
mod server;

pub use extract::ApiJson;
pub use server::{ApiServer, build_router, serve};
