//! HTTP server assembly: router, middleware stack, health and shutdown.

mod health;
mod server;

pub use health::*;
pub use server::*;
