//! Check-in scan processing.
//!
//! A scan moves through: received → validated → looked-up →
//! {already-scanned | updated} → logged → responded.
//!
//! The status change is a conditional write (only rows not yet scanned), so
//! two devices scanning the same badge at once cannot both succeed: the
//! loser sees zero rows changed and gets the duplicate-scan answer. The audit
//! log entry is written by a detached task and never affects the reply.

use chrono::Utc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::auth::Identity;
use crate::models::scan::scan_timestamp;
use crate::models::{
    NewScanLog, Participant, ParticipantStatus, ScanOutcome, ScanRequest, ScanResult,
};
use crate::repository::Repository;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("QR code is required")]
    MissingQrCode,

    #[error("Participant not found")]
    ParticipantNotFound,

    #[error("Participant already scanned")]
    AlreadyScanned(Box<Participant>),

    #[error("Failed to look up participant")]
    Lookup(#[source] StoreError),

    #[error("Failed to update participant status")]
    Update(#[source] StoreError),
}

impl ScanError {
    pub fn status_code(&self) -> u16 {
        match self {
            ScanError::Unauthorized => 401,
            ScanError::MissingQrCode => 400,
            ScanError::ParticipantNotFound => 404,
            ScanError::AlreadyScanned(_) => 409,
            ScanError::Lookup(_) | ScanError::Update(_) => 500,
        }
    }

    /// The participant record to echo back, for duplicate scans.
    pub fn participant(&self) -> Option<&Participant> {
        match self {
            ScanError::AlreadyScanned(participant) => Some(participant.as_ref()),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ScanSuccess {
    pub result: ScanResult,
    pub participant: Participant,
    /// Audit log write. Dropping the handle leaves the task running.
    pub log_task: JoinHandle<()>,
}

#[derive(Clone)]
pub struct ScanService {
    repo: Repository,
}

impl ScanService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub async fn process(
        &self,
        identity: Option<&Identity>,
        request: &ScanRequest,
    ) -> Result<ScanSuccess, ScanError> {
        let identity = identity.ok_or(ScanError::Unauthorized)?;
        let qr_code = request.qr_token().ok_or(ScanError::MissingQrCode)?;

        let participant = self
            .repo
            .participant_by_qr(qr_code, true)
            .await
            .map_err(ScanError::Lookup)?
            .ok_or(ScanError::ParticipantNotFound)?;

        if participant.is_scanned() {
            return Err(ScanError::AlreadyScanned(Box::new(participant)));
        }

        let updated = match self.repo.mark_scanned(&participant.id).await {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                // Lost the race to a concurrent scan, or the cached lookup was stale
                self.repo.forget_participant_qr(qr_code);
                let mut current = participant;
                current.status = Some(ParticipantStatus::Scanned);
                return Err(ScanError::AlreadyScanned(Box::new(current)));
            }
            Err(e) => return Err(ScanError::Update(e)),
        };

        let scan_time = Utc::now();
        let message = format!("Successfully scanned {}", updated.name);
        info!(
            participant = %updated.id,
            volunteer = ?request.volunteer_id,
            user = %identity.id,
            "Participant scanned"
        );

        let log_task = self.spawn_scan_log(NewScanLog {
            participant_id: updated.id.clone(),
            volunteer_id: request.volunteer_id.clone(),
            scan_time,
            status: ScanOutcome::Success,
            message: Some(message.clone()),
        });

        let result = ScanResult {
            participant_id: updated.id.clone(),
            participant_name: updated.name.clone(),
            scan_time: scan_timestamp(scan_time),
            status: ScanOutcome::Success,
            message,
            volunteer_id: request.volunteer_id.clone(),
        };

        Ok(ScanSuccess {
            result,
            participant: updated,
            log_task,
        })
    }

    fn spawn_scan_log(&self, log: NewScanLog) -> JoinHandle<()> {
        let repo = self.repo.clone();
        tokio::spawn(async move {
            let participant_id = log.participant_id.clone();
            if let Err(e) = repo.create_scan_log(log).await {
                warn!(participant = %participant_id, error = %e, "Scan log write failed");
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
