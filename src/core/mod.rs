pub mod config;
pub mod error;
pub mod middleware;
pub mod repo;
pub mod shared;
pub mod urls;
