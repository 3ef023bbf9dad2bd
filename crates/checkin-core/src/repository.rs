//! Data-access helpers with read-through caching.
//!
//! Each helper wraps one query shape of the `EventStore`. Reads check the
//! cache first when `use_cache` is set and store successful results under a
//! deterministic key. Writes go straight to the store and then drop every
//! key whose value could now be stale. Errors are returned, never cached.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::{keys, MemoryCache};
use crate::models::{
    Event, NewParticipant, NewScanLog, NewVolunteer, NewVolunteerApplication, Participant,
    ParticipantStatus, ScanLog, ScanStats, StatusUpdate, Volunteer, VolunteerApplication,
};
use crate::store::{EventStore, StoreResult};

#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn EventStore>,
    cache: Arc<MemoryCache>,
}

impl Repository {
    pub fn new(store: Arc<dyn EventStore>, cache: Arc<MemoryCache>) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &Arc<MemoryCache> {
        &self.cache
    }

    /// Serve `key` from cache, or run `query` and cache what it returns.
    async fn cached<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        use_cache: bool,
        query: F,
    ) -> StoreResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        if use_cache {
            if let Some(hit) = self.cache.get_as::<T>(key) {
                debug!(key, "cache hit");
                return Ok(hit);
            }
        }
        let value = query().await?;
        self.cache.set_as(key, &value, ttl);
        Ok(value)
    }

    fn invalidate_participant(&self, participant: &Participant) {
        self.cache.delete(keys::PARTICIPANTS_ALL);
        self.cache.delete(keys::SCAN_STATS);
        if let Some(ref qr) = participant.qr_code {
            self.cache.delete(&keys::participant_qr(qr));
        }
    }

    // ===== Participants =====

    pub async fn participants(&self, use_cache: bool) -> StoreResult<Vec<Participant>> {
        self.cached(keys::PARTICIPANTS_ALL, keys::LISTING_TTL, use_cache, || {
            self.store.list_participants()
        })
        .await
    }

    /// Drop a cached QR lookup that turned out to be stale.
    pub fn forget_participant_qr(&self, qr_code: &str) {
        self.cache.delete(&keys::participant_qr(qr_code));
    }

    /// Lookup by QR token. Misses (no such participant) are not cached.
    pub async fn participant_by_qr(
        &self,
        qr_code: &str,
        use_cache: bool,
    ) -> StoreResult<Option<Participant>> {
        let key = keys::participant_qr(qr_code);
        if use_cache {
            if let Some(hit) = self.cache.get_as::<Participant>(&key) {
                return Ok(Some(hit));
            }
        }
        let found = self.store.find_participant_by_qr(qr_code).await?;
        if let Some(ref participant) = found {
            self.cache.set_as(key, participant, keys::LOOKUP_TTL);
        }
        Ok(found)
    }

    pub async fn create_participant(&self, participant: NewParticipant) -> StoreResult<Participant> {
        let created = self
            .store
            .insert_participant(&participant.with_defaults())
            .await?;
        self.cache.delete(keys::PARTICIPANTS_ALL);
        self.cache.delete(keys::SCAN_STATS);
        Ok(created)
    }

    pub async fn update_participant_status(
        &self,
        id: &str,
        status: ParticipantStatus,
    ) -> StoreResult<Participant> {
        let updated = self.store.update_participant_status(id, status).await?;
        self.invalidate_participant(&updated);
        Ok(updated)
    }

    /// Move a participant to scanned unless it already is. `None` means
    /// another scan got there first.
    pub async fn mark_scanned(&self, id: &str) -> StoreResult<Option<Participant>> {
        let updated = self.store.mark_participant_scanned(id).await?;
        if let Some(ref participant) = updated {
            self.invalidate_participant(participant);
        }
        Ok(updated)
    }

    pub async fn batch_update_participant_status(
        &self,
        updates: &[StatusUpdate],
    ) -> StoreResult<Vec<Participant>> {
        if updates.is_empty() {
            return Ok(Vec::new());
        }
        let updated = self.store.upsert_participant_statuses(updates).await?;
        self.cache.delete(keys::PARTICIPANTS_ALL);
        self.cache.delete(keys::SCAN_STATS);
        for participant in &updated {
            self.invalidate_participant(participant);
        }
        Ok(updated)
    }

    // ===== Volunteers =====

    pub async fn volunteers(&self, use_cache: bool) -> StoreResult<Vec<Volunteer>> {
        self.cached(keys::VOLUNTEERS_ALL, keys::VOLUNTEER_LISTING_TTL, use_cache, || {
            self.store.list_volunteers()
        })
        .await
    }

    pub async fn volunteer_by_email(
        &self,
        email: &str,
        use_cache: bool,
    ) -> StoreResult<Option<Volunteer>> {
        let key = keys::volunteer_email(email);
        if use_cache {
            if let Some(hit) = self.cache.get_as::<Volunteer>(&key) {
                return Ok(Some(hit));
            }
        }
        let found = self.store.find_volunteer_by_email(email).await?;
        if let Some(ref volunteer) = found {
            self.cache.set_as(key, volunteer, keys::IDENTITY_TTL);
        }
        Ok(found)
    }

    pub async fn create_volunteer(&self, volunteer: NewVolunteer) -> StoreResult<Volunteer> {
        let created = self.store.insert_volunteer(&volunteer).await?;
        self.cache.delete(keys::VOLUNTEERS_ALL);
        self.cache.delete(&keys::volunteer_email(&created.email));
        Ok(created)
    }

    // ===== Scan logs and stats =====

    pub async fn create_scan_log(&self, log: NewScanLog) -> StoreResult<ScanLog> {
        let created = self.store.insert_scan_log(&log).await?;
        self.cache.delete(keys::SCAN_STATS);
        Ok(created)
    }

    /// Status counts over all participants. Falls back to zeroed stats when
    /// the store fails; the fallback is not cached.
    pub async fn scan_stats(&self, use_cache: bool) -> ScanStats {
        if use_cache {
            if let Some(hit) = self.cache.get_as::<ScanStats>(keys::SCAN_STATS) {
                return hit;
            }
        }
        match self.store.participant_statuses().await {
            Ok(statuses) => {
                let stats = ScanStats::from_statuses(statuses);
                self.cache.set_as(keys::SCAN_STATS, &stats, keys::STATS_TTL);
                stats
            }
            Err(e) => {
                warn!(error = %e, "Failed to load participant statuses, returning empty stats");
                ScanStats::default()
            }
        }
    }

    // ===== Applications and events =====

    pub async fn create_volunteer_application(
        &self,
        application: NewVolunteerApplication,
    ) -> StoreResult<VolunteerApplication> {
        self.store.insert_volunteer_application(&application).await
    }

    pub async fn events(&self, use_cache: bool) -> StoreResult<Vec<Event>> {
        self.cached(keys::EVENTS_ALL, keys::LISTING_TTL, use_cache, || {
            self.store.list_events()
        })
        .await
    }
}

// ============================================================================
// Tests
// ============================================================================
