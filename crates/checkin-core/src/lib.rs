//! Core library for the event check-in service.
//!
//! Provides the data models, the read-through cache, the hosted database
//! client, the data-access helpers built on them, and scan processing.
//! HTTP serving lives in the `checkin-server` crate.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod realtime;
pub mod repository;
pub mod scan;
pub mod store;

pub use api::{ApiError, DatabaseClient};
pub use auth::{Identity, SessionProvider};
pub use cache::MemoryCache;
pub use config::{Backend, Config};
pub use realtime::ChangeBus;
pub use repository::Repository;
pub use scan::{ScanError, ScanService, ScanSuccess};
pub use store::{EventStore, MemoryStore, StoreError};
