//! Authentication boundary.
//!
//! This module provides:
//! - `Identity`: the signed-in user behind a request
//! - `SessionProvider`: resolves a bearer token to an identity
//! - `StaticSessions`: fixed token table for local runs and tests
//! - `CachedSessions`: remembers resolved identities for a few minutes
//!
//! Sign-in itself happens at the hosted auth service; this crate only
//! checks tokens it is handed.

pub mod session;

pub use session::{CachedSessions, Identity, SessionProvider, StaticSessions};
