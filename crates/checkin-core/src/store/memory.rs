//! In-process `EventStore` for tests and local runs without a hosted
//! database. Failure switches let callers exercise error paths.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{EventStore, StoreError, StoreResult};
use crate::models::{
    Event, NewParticipant, NewScanLog, NewVolunteer, NewVolunteerApplication, Participant,
    ParticipantStatus, ScanLog, StatusUpdate, Table, Volunteer, VolunteerApplication,
};
use crate::realtime::{ChangeBus, ChangeEvent, ChangeKind};

#[derive(Debug, Default)]
struct Tables {
    participants: Vec<Participant>,
    volunteers: Vec<Volunteer>,
    scan_logs: Vec<ScanLog>,
    applications: Vec<VolunteerApplication>,
    events: Vec<Event>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    bus: ChangeBus,
    id_seq: AtomicU64,
    reads: AtomicU64,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_scan_logs: AtomicBool,
}

impl MemoryStore {
    pub fn new(bus: ChangeBus) -> Self {
        Self {
            bus,
            ..Default::default()
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.id_seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", prefix, n)
    }

    fn read(&self, table: Table) -> StoreResult<()> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable(format!("reads from {} disabled", table)));
        }
        Ok(())
    }

    fn write(&self, table: Table) -> StoreResult<()> {
        let blocked = self.fail_writes.load(Ordering::Relaxed)
            || (table == Table::ScanLogs && self.fail_scan_logs.load(Ordering::Relaxed));
        if blocked {
            return Err(StoreError::Unavailable(format!("writes to {} disabled", table)));
        }
        Ok(())
    }

    fn changed(&self, table: Table, kind: ChangeKind, id: &str) {
        self.bus.publish(ChangeEvent::new(table, kind, id));
    }

    /// Number of read queries served so far.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_scan_logs(&self, fail: bool) {
        self.fail_scan_logs.store(fail, Ordering::Relaxed);
    }

    /// Snapshot of the audit log.
    pub async fn scan_logs(&self) -> Vec<ScanLog> {
        self.tables.lock().await.scan_logs.clone()
    }

    pub async fn participant(&self, id: &str) -> Option<Participant> {
        self.tables
            .lock()
            .await
            .participants
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub async fn add_event(&self, event: Event) {
        self.tables.lock().await.events.push(event);
    }
}

fn set_status(participant: &mut Participant, status: ParticipantStatus) {
    participant.status = Some(status);
    participant.updated_at = Some(Utc::now());
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn list_participants(&self) -> StoreResult<Vec<Participant>> {
        self.read(Table::Participants)?;
        let tables = self.tables.lock().await;
        let mut participants = tables.participants.clone();
        participants.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(participants)
    }

    async fn find_participant_by_qr(&self, qr_code: &str) -> StoreResult<Option<Participant>> {
        self.read(Table::Participants)?;
        let tables = self.tables.lock().await;
        Ok(tables
            .participants
            .iter()
            .find(|p| p.qr_code.as_deref() == Some(qr_code))
            .cloned())
    }

    async fn insert_participant(&self, new: &NewParticipant) -> StoreResult<Participant> {
        self.write(Table::Participants)?;
        let participant = Participant {
            id: self.next_id("participant"),
            name: new.name.clone(),
            email: new.email.clone(),
            phone: new.phone.clone(),
            age: new.age.clone(),
            address: new.address.clone(),
            emergency_contact: new.emergency_contact.clone(),
            dietary_restrictions: new.dietary_restrictions.clone(),
            special_needs: new.special_needs.clone(),
            registration_time: new.registration_time,
            status: new.status,
            qr_code: new.qr_code.clone(),
            created_at: Utc::now(),
            updated_at: None,
        };
        self.tables.lock().await.participants.push(participant.clone());
        self.changed(Table::Participants, ChangeKind::Insert, &participant.id);
        Ok(participant)
    }

    async fn update_participant_status(
        &self,
        id: &str,
        status: ParticipantStatus,
    ) -> StoreResult<Participant> {
        self.write(Table::Participants)?;
        let updated = {
            let mut tables = self.tables.lock().await;
            let participant = tables
                .participants
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| StoreError::NotFound {
                    table: Table::Participants,
                    id: id.to_string(),
                })?;
            set_status(participant, status);
            participant.clone()
        };
        self.changed(Table::Participants, ChangeKind::Update, id);
        Ok(updated)
    }

    async fn mark_participant_scanned(&self, id: &str) -> StoreResult<Option<Participant>> {
        self.write(Table::Participants)?;
        let updated = {
            let mut tables = self.tables.lock().await;
            tables
                .participants
                .iter_mut()
                .find(|p| p.id == id && !p.is_scanned())
                .map(|participant| {
                    set_status(participant, ParticipantStatus::Scanned);
                    participant.clone()
                })
        };
        if updated.is_some() {
            self.changed(Table::Participants, ChangeKind::Update, id);
        }
        Ok(updated)
    }

    async fn upsert_participant_statuses(
        &self,
        updates: &[StatusUpdate],
    ) -> StoreResult<Vec<Participant>> {
        self.write(Table::Participants)?;
        let updated = {
            let mut tables = self.tables.lock().await;
            // Validate the whole batch first so a bad id changes nothing
            if let Some(missing) = updates
                .iter()
                .find(|u| !tables.participants.iter().any(|p| p.id == u.id))
            {
                return Err(StoreError::NotFound {
                    table: Table::Participants,
                    id: missing.id.clone(),
                });
            }
            let mut updated = Vec::with_capacity(updates.len());
            for update in updates {
                if let Some(participant) = tables.participants.iter_mut().find(|p| p.id == update.id) {
                    set_status(participant, update.status);
                    updated.push(participant.clone());
                }
            }
            updated
        };
        for participant in &updated {
            self.changed(Table::Participants, ChangeKind::Update, &participant.id);
        }
        Ok(updated)
    }

    async fn participant_statuses(&self) -> StoreResult<Vec<Option<ParticipantStatus>>> {
        self.read(Table::Participants)?;
        let tables = self.tables.lock().await;
        Ok(tables.participants.iter().map(|p| p.status).collect())
    }

    async fn list_volunteers(&self) -> StoreResult<Vec<Volunteer>> {
        self.read(Table::Volunteers)?;
        let tables = self.tables.lock().await;
        let mut volunteers = tables.volunteers.clone();
        volunteers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(volunteers)
    }

    async fn find_volunteer_by_email(&self, email: &str) -> StoreResult<Option<Volunteer>> {
        self.read(Table::Volunteers)?;
        let tables = self.tables.lock().await;
        Ok(tables.volunteers.iter().find(|v| v.email == email).cloned())
    }

    async fn insert_volunteer(&self, new: &NewVolunteer) -> StoreResult<Volunteer> {
        self.write(Table::Volunteers)?;
        let volunteer = Volunteer {
            id: self.next_id("volunteer"),
            user_id: new.user_id.clone(),
            name: new.name.clone(),
            email: new.email.clone(),
            phone: new.phone.clone(),
            role: new.role.clone(),
            tasks: new.tasks.clone(),
            assigned_duty: new.assigned_duty.clone(),
            status: new.status,
            join_date: new.join_date,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.tables.lock().await.volunteers.push(volunteer.clone());
        self.changed(Table::Volunteers, ChangeKind::Insert, &volunteer.id);
        Ok(volunteer)
    }

    async fn insert_scan_log(&self, new: &NewScanLog) -> StoreResult<ScanLog> {
        self.write(Table::ScanLogs)?;
        let log = ScanLog {
            id: self.next_id("scan"),
            participant_id: new.participant_id.clone(),
            volunteer_id: new.volunteer_id.clone(),
            scan_time: new.scan_time,
            status: new.status,
            message: new.message.clone(),
            created_at: Utc::now(),
        };
        self.tables.lock().await.scan_logs.push(log.clone());
        self.changed(Table::ScanLogs, ChangeKind::Insert, &log.id);
        Ok(log)
    }

    async fn insert_volunteer_application(
        &self,
        new: &NewVolunteerApplication,
    ) -> StoreResult<VolunteerApplication> {
        self.write(Table::VolunteerApplications)?;
        let application = VolunteerApplication {
            id: self.next_id("application"),
            user_id: new.user_id.clone(),
            name: new.name.clone(),
            email: new.email.clone(),
            duty_id: new.duty_id.clone(),
            reason: new.reason.clone(),
            status: new.status,
            created_at: Utc::now(),
        };
        self.tables.lock().await.applications.push(application.clone());
        self.changed(Table::VolunteerApplications, ChangeKind::Insert, &application.id);
        Ok(application)
    }

    async fn list_events(&self) -> StoreResult<Vec<Event>> {
        self.read(Table::Events)?;
        let tables = self.tables.lock().await;
        let mut events = tables.events.clone();
        events.sort_by(|a, b| (&a.date, &a.time).cmp(&(&b.date, &b.time)));
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(name: &str, qr: &str) -> NewParticipant {
        NewParticipant {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            qr_code: Some(qr.to_string()),
            ..Default::default()
        }
        .with_defaults()
    }

    #[tokio::test]
    async fn test_mark_scanned_is_conditional() {
        let store = MemoryStore::default();
        let p = store.insert_participant(&registration("Asha", "QR-A")).await.unwrap();

        let first = store.mark_participant_scanned(&p.id).await.unwrap();
        assert_eq!(first.unwrap().status, Some(ParticipantStatus::Scanned));

        let second = store.mark_participant_scanned(&p.id).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_upsert_rejects_unknown_id_without_partial_writes() {
        let store = MemoryStore::default();
        let p = store.insert_participant(&registration("Asha", "QR-A")).await.unwrap();

        let result = store
            .upsert_participant_statuses(&[
                StatusUpdate { id: p.id.clone(), status: ParticipantStatus::CheckedIn },
                StatusUpdate { id: "missing".to_string(), status: ParticipantStatus::Scanned },
            ])
            .await;

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        let unchanged = store.participant(&p.id).await.unwrap();
        assert_eq!(unchanged.status, Some(ParticipantStatus::Registered));
    }

    #[tokio::test]
    async fn test_writes_publish_change_events() {
        let bus = ChangeBus::new();
        let mut feed = bus.subscribe(Table::Participants);
        let store = MemoryStore::new(bus);

        let p = store.insert_participant(&registration("Asha", "QR-A")).await.unwrap();

        use futures::StreamExt;
        let item = feed.next().await.unwrap();
        assert_eq!(
            item,
            crate::realtime::FeedItem::Change(ChangeEvent::new(Table::Participants, ChangeKind::Insert, p.id))
        );
    }

    #[tokio::test]
    async fn test_fail_reads_switch() {
        let store = MemoryStore::default();
        store.set_fail_reads(true);
        assert!(matches!(store.list_participants().await, Err(StoreError::Unavailable(_))));
        assert_eq!(store.read_count(), 1);
    }
}
