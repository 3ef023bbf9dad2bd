//! Storage boundary for event data.
//!
//! `EventStore` is the one seam between this crate and durable storage.
//! `DatabaseClient` implements it against the hosted database; `MemoryStore`
//! implements it in-process for tests and local runs.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::api::ApiError;
use crate::models::{
    Event, NewParticipant, NewScanLog, NewVolunteer, NewVolunteerApplication, Participant,
    ParticipantStatus, ScanLog, StatusUpdate, Table, Volunteer, VolunteerApplication,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Failed to decode {table} response: {source}")]
    Decode {
        table: Table,
        #[source]
        source: serde_json::Error,
    },

    #[error("No {table} record with id {id}")]
    NotFound { table: Table, id: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Query and mutation shapes used by the data-access helpers.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// All participants, newest first.
    async fn list_participants(&self) -> StoreResult<Vec<Participant>>;

    async fn find_participant_by_qr(&self, qr_code: &str) -> StoreResult<Option<Participant>>;

    async fn insert_participant(&self, participant: &NewParticipant) -> StoreResult<Participant>;

    async fn update_participant_status(
        &self,
        id: &str,
        status: ParticipantStatus,
    ) -> StoreResult<Participant>;

    /// Set status to scanned only where it is not scanned already.
    /// `None` means no row changed.
    async fn mark_participant_scanned(&self, id: &str) -> StoreResult<Option<Participant>>;

    async fn upsert_participant_statuses(
        &self,
        updates: &[StatusUpdate],
    ) -> StoreResult<Vec<Participant>>;

    /// Status column of every participant.
    async fn participant_statuses(&self) -> StoreResult<Vec<Option<ParticipantStatus>>>;

    /// All volunteers, newest first.
    async fn list_volunteers(&self) -> StoreResult<Vec<Volunteer>>;

    async fn find_volunteer_by_email(&self, email: &str) -> StoreResult<Option<Volunteer>>;

    async fn insert_volunteer(&self, volunteer: &NewVolunteer) -> StoreResult<Volunteer>;

    async fn insert_scan_log(&self, log: &NewScanLog) -> StoreResult<ScanLog>;

    async fn insert_volunteer_application(
        &self,
        application: &NewVolunteerApplication,
    ) -> StoreResult<VolunteerApplication>;

    /// All events, soonest first.
    async fn list_events(&self) -> StoreResult<Vec<Event>>;
}
