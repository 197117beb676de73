//! # Inbound Ports
//!
//! API exposed by an `EventService` to its callers (tree service, tools).

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{Event, EventKind, EventQuery, EventSet};

use crate::domain::EventSyncError;

/// Event synchronization API for one instance.
///
/// Calls for the same kind must be serialized by the caller: overlapping
/// `update_events` runs could interleave their saves.
#[async_trait]
pub trait EventSyncApi: Send + Sync {
    /// Best locally available set: persisted store first, then the bundled
    /// snapshot for has-cache instances. `None` means nothing cached yet.
    async fn get_events(&self, kind: EventKind) -> Result<Option<EventSet>, EventSyncError>;

    /// Fetch everything after the known boundary, merge, persist and return.
    ///
    /// `known` overrides the locally cached set as the merge base.
    async fn update_events(
        &self,
        kind: EventKind,
        known: Option<EventSet>,
    ) -> Result<EventSet, EventSyncError>;

    /// Point lookup: store index, then cached set, then a forced update.
    async fn find_event(
        &self,
        kind: EventKind,
        query: &EventQuery,
    ) -> Result<Option<Event>, EventSyncError>;
}

/// Mock event service for consumers of `EventSyncApi`.
///
/// `update_events` returns the configured set unchanged; `find_event`
/// scans it.
#[derive(Default)]
pub struct MockEventSync {
    /// Current set per kind.
    pub sets: Mutex<HashMap<EventKind, EventSet>>,
    /// Number of `update_events` calls.
    pub updates: Mutex<usize>,
}

impl MockEventSync {
    /// Service whose deposit history is `deposits`.
    pub fn with_deposits(deposits: EventSet) -> Self {
        let mock = Self::default();
        mock.set_events(EventKind::Deposit, deposits);
        mock
    }

    /// Replace the deposit history.
    pub fn set_deposits(&self, deposits: EventSet) {
        self.set_events(EventKind::Deposit, deposits);
    }

    /// Replace the set of `kind`.
    pub fn set_events(&self, kind: EventKind, set: EventSet) {
        self.sets.lock().insert(kind, set);
    }
}

#[async_trait]
impl EventSyncApi for MockEventSync {
    async fn get_events(&self, kind: EventKind) -> Result<Option<EventSet>, EventSyncError> {
        Ok(self.sets.lock().get(&kind).cloned())
    }

    async fn update_events(
        &self,
        kind: EventKind,
        _known: Option<EventSet>,
    ) -> Result<EventSet, EventSyncError> {
        *self.updates.lock() += 1;
        Ok(self.sets.lock().get(&kind).cloned().unwrap_or_default())
    }

    async fn find_event(
        &self,
        kind: EventKind,
        query: &EventQuery,
    ) -> Result<Option<Event>, EventSyncError> {
        Ok(self
            .sets
            .lock()
            .get(&kind)
            .and_then(|set| set.find(query).cloned()))
    }
}
