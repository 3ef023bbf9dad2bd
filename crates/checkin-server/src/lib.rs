//! HTTP surface of the check-in service.

pub mod app;
pub mod error;
pub mod middleware;
pub mod routes;

pub use app::{router, AppState};
