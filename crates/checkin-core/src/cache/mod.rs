//! In-process read-through cache.
//!
//! This module provides the `MemoryCache` used by the data-access helpers to
//! skip redundant round trips to the hosted database. Entries carry their own
//! time-to-live and are evicted lazily when read after expiry.
//!
//! Cached values include:
//! - Participant and volunteer listings
//! - Single participant lookups by QR token
//! - Volunteer lookups by email
//! - Aggregated scan statistics

pub mod keys;
pub mod memory;

pub use memory::{CacheEntry, MemoryCache, DEFAULT_TTL};
