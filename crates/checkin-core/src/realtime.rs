//! Table change notifications and cache invalidation.
//!
//! Stores publish a `ChangeEvent` on the shared `ChangeBus` after every
//! successful write. Invalidator tasks subscribe per table and drop the
//! cache keys whose values the change could have made stale.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{keys, MemoryCache};
use crate::models::Table;

/// Pending events per subscriber before it starts lagging.
const BUS_CAPACITY: usize = 256;

/// Tables whose changes affect cached values.
pub const WATCHED_TABLES: [Table; 3] = [Table::Participants, Table::Volunteers, Table::ScanLogs];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

impl ChangeEvent {
    pub fn new(table: Table, kind: ChangeKind, record_id: impl Into<String>) -> Self {
        Self {
            table,
            kind,
            record_id: Some(record_id.into()),
        }
    }
}

/// Item yielded by a table subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedItem {
    Change(ChangeEvent),
    /// The subscriber fell behind and this many events were dropped.
    Lagged(u64),
}

/// Fan-out channel for change events. Clone is cheap.
#[derive(Debug, Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: ChangeEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    /// Stream of changes to one table. Ends when every bus handle is dropped.
    pub fn subscribe(&self, table: Table) -> BoxStream<'static, FeedItem> {
        let rx = self.tx.subscribe();
        stream::unfold(rx, move |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.table == table => return Some((FeedItem::Change(event), rx)),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(missed)) => return Some((FeedItem::Lagged(missed), rx)),
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

/// Drop the cache keys a change to `event.table` can make stale.
pub fn invalidate_for(cache: &MemoryCache, event: &ChangeEvent) {
    match event.table {
        Table::Participants => {
            cache.delete(keys::PARTICIPANTS_ALL);
            cache.delete(keys::SCAN_STATS);
        }
        Table::Volunteers => cache.delete(keys::VOLUNTEERS_ALL),
        Table::ScanLogs => cache.delete(keys::SCAN_STATS),
        Table::Events => cache.delete(keys::EVENTS_ALL),
        Table::VolunteerApplications => {}
    }
}

/// Subscribe to `table` and invalidate on every change, then hand the event
/// to `on_change`. A lagged subscriber cannot tell what it missed, so it
/// clears the whole cache.
pub fn subscribe_with<F>(
    cache: Arc<MemoryCache>,
    bus: &ChangeBus,
    table: Table,
    on_change: F,
) -> JoinHandle<()>
where
    F: Fn(&ChangeEvent) + Send + 'static,
{
    let mut feed = bus.subscribe(table);
    tokio::spawn(async move {
        while let Some(item) = feed.next().await {
            match item {
                FeedItem::Change(event) => {
                    invalidate_for(&cache, &event);
                    on_change(&event);
                }
                FeedItem::Lagged(missed) => {
                    warn!(table = %table, missed, "Change feed lagged, clearing cache");
                    cache.clear();
                }
            }
        }
        debug!(table = %table, "Change feed closed");
    })
}

pub fn spawn_invalidator(cache: Arc<MemoryCache>, bus: &ChangeBus, table: Table) -> JoinHandle<()> {
    subscribe_with(cache, bus, table, move |event| {
        debug!(table = %event.table, kind = ?event.kind, record = ?event.record_id, "Invalidated cache on change");
    })
}

/// One invalidator per watched table.
pub fn spawn_invalidators(cache: Arc<MemoryCache>, bus: &ChangeBus) -> Vec<JoinHandle<()>> {
    WATCHED_TABLES
        .iter()
        .map(|table| spawn_invalidator(cache.clone(), bus, *table))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
