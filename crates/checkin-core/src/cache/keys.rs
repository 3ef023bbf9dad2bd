//! Cache keys and per-query time-to-live values.

use std::time::Duration;

pub const PARTICIPANTS_ALL: &str = "participants_all";
pub const VOLUNTEERS_ALL: &str = "volunteers_all";
pub const SCAN_STATS: &str = "scan_stats";
pub const EVENTS_ALL: &str = "events_all";

/// Aggregated stats go stale fastest.
pub const STATS_TTL: Duration = Duration::from_secs(15);

/// Full table listings.
pub const LISTING_TTL: Duration = Duration::from_secs(30);

/// Single-entity lookups by a natural key (QR token).
pub const LOOKUP_TTL: Duration = Duration::from_secs(60);

/// Volunteer listing changes rarely during an event.
pub const VOLUNTEER_LISTING_TTL: Duration = Duration::from_secs(60);

/// Identity lookups by email.
pub const IDENTITY_TTL: Duration = Duration::from_secs(300);

pub fn participant_qr(qr_code: &str) -> String {
    format!("participant_qr_{}", qr_code)
}

pub fn volunteer_email(email: &str) -> String {
    format!("volunteer_email_{}", email)
}
