//! Data models for event check-in entities.
//!
//! This module contains the records stored by the hosted database:
//!
//! - `Participant`: registered attendee with a unique QR token
//! - `Volunteer`, `AssignedDuty`: event staff and their duty assignment
//! - `ScanLog`: append-only audit record of a scan attempt
//! - `VolunteerApplication`: request to take on a duty
//! - `Event`: the event itself
//!
//! Each record has a matching `New*` payload used for inserts.

pub mod application;
pub mod event;
pub mod participant;
pub mod scan;
pub mod volunteer;

pub use application::{ApplicationStatus, NewVolunteerApplication, VolunteerApplication};
pub use event::Event;
pub use participant::{NewParticipant, Participant, ParticipantStatus, StatusUpdate};
pub use scan::{NewScanLog, ScanLog, ScanOutcome, ScanRequest, ScanResult, ScanStats};
pub use volunteer::{AssignedDuty, NewVolunteer, Volunteer, VolunteerStatus};

use serde::{Deserialize, Deserializer, Serialize};

/// Decode `null` as the field's default. Nullable columns arrive as explicit
/// `null`, which `#[serde(default)]` alone rejects.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Tables exposed by the hosted database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Participants,
    Volunteers,
    ScanLogs,
    VolunteerApplications,
    Events,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Participants => "participants",
            Table::Volunteers => "volunteers",
            Table::ScanLogs => "scan_logs",
            Table::VolunteerApplications => "volunteer_applications",
            Table::Events => "events",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
