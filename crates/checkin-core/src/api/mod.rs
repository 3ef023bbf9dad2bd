//! REST client module for the hosted database service.
//!
//! This module provides the `DatabaseClient` for the PostgREST-style table
//! API (`/rest/v1`) and the session lookup endpoint of the auth API
//! (`/auth/v1/user`).
//!
//! Table requests authenticate with the service-role key; session lookups
//! forward the caller's bearer token alongside the anon key.

pub mod client;
pub mod error;

pub use client::DatabaseClient;
pub use error::ApiError;
