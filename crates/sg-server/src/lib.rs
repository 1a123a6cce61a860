//! sg-server: HTTP surface for the transfer, mapping and assistant pipelines.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use routes::router;
