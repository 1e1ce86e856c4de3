use std::collections::{BTreeSet, HashSet};
use std::io;
use std::path::Path;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

use super::{PopupRepository, ScrapRepository, SlotRepository, StoreError};

/// WAL-backed store for stores, slots and scraps.
///
/// Reads go to the in-memory index. Writes take the WAL mutex, validate, append
/// (fsync) and only then apply, so the index never holds an undurable row and
/// uniqueness checks are serialized with the writes they guard.
pub struct DurableStore {
    stores: DashMap<Ulid, PopupStore>,
    /// Per store, sorted by `(date, time)`.
    slots: DashMap<Ulid, Vec<Slot>>,
    scraps: DashMap<Ulid, Scrap>,
    /// `(user_id, store_id)` → scrap id.
    scrap_index: DashMap<(Ulid, Ulid), Ulid>,
    wal: Mutex<Wal>,
}

impl DurableStore {
    /// Open (or create) the log at `path` and rebuild the index from it.
    pub fn open(path: &Path) -> io::Result<Self> {
        let events = Wal::replay(path)?;
        let wal = Wal::open(path)?;
        let store = Self {
            stores: DashMap::new(),
            slots: DashMap::new(),
            scraps: DashMap::new(),
            scrap_index: DashMap::new(),
            wal: Mutex::new(wal),
        };
        for event in &events {
            store.apply(event);
        }
        tracing::info!("durable store opened: {} events replayed", events.len());
        Ok(store)
    }

    fn apply(&self, event: &Event) {
        match event {
            Event::StoreRegistered { store } => {
                self.stores.insert(store.id, store.clone());
            }
            Event::SlotsInserted { store_id, slots } => {
                let mut rows = self.slots.entry(*store_id).or_default();
                for slot in slots {
                    let key = (slot.date, slot.time);
                    let pos = rows.partition_point(|s| (s.date, s.time) <= key);
                    rows.insert(pos, slot.clone());
                }
            }
            Event::ScrapCountUpdated { store_id, count } => {
                if let Some(mut store) = self.stores.get_mut(store_id) {
                    store.scrap_count = *count;
                }
            }
            Event::ScrapCreated { scrap } => {
                self.scrap_index.insert((scrap.user_id, scrap.store_id), scrap.id);
                self.scraps.insert(scrap.id, scrap.clone());
            }
            Event::ScrapDeleted { id } => {
                if let Some((_, scrap)) = self.scraps.remove(id) {
                    self.scrap_index.remove(&(scrap.user_id, scrap.store_id));
                }
            }
        }
    }

    /// Append under an already-held WAL guard, then apply.
    fn commit(&self, wal: &mut Wal, event: Event) -> Result<(), StoreError> {
        let started = std::time::Instant::now();
        wal.append(&event)?;
        metrics::histogram!(crate::observability::WAL_APPEND_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        self.apply(&event);
        Ok(())
    }

    pub async fn appends_since_compact(&self) -> u64 {
        self.wal.lock().await.appends_since_compact()
    }

    /// Rewrite the log as one snapshot: every store (with its current count),
    /// one slot batch per store, every live scrap.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let mut wal = self.wal.lock().await;
        let mut events = Vec::with_capacity(self.stores.len() * 2 + self.scraps.len());

        for store in self.stores.iter() {
            events.push(Event::StoreRegistered { store: store.value().clone() });
        }
        for rows in self.slots.iter() {
            if !rows.is_empty() {
                events.push(Event::SlotsInserted {
                    store_id: *rows.key(),
                    slots: rows.value().clone(),
                });
            }
        }
        for scrap in self.scraps.iter() {
            events.push(Event::ScrapCreated { scrap: scrap.value().clone() });
        }

        wal.compact(&events)?;
        metrics::counter!(crate::observability::WAL_COMPACTIONS_TOTAL).increment(1);
        tracing::info!("WAL compacted to {} events", events.len());
        Ok(())
    }
}

#[async_trait::async_trait]
impl PopupRepository for DurableStore {
    async fn insert_store(&self, store: PopupStore) -> Result<(), StoreError> {
        let mut wal = self.wal.lock().await;
        if self.stores.contains_key(&store.id) {
            return Err(StoreError::Duplicate(store.id));
        }
        self.commit(&mut wal, Event::StoreRegistered { store })
    }

    async fn load_store(&self, id: Ulid) -> Result<Option<PopupStore>, StoreError> {
        Ok(self.stores.get(&id).map(|s| s.value().clone()))
    }

    async fn update_scrap_count(&self, id: Ulid, count: i64) -> Result<(), StoreError> {
        let mut wal = self.wal.lock().await;
        if !self.stores.contains_key(&id) {
            return Err(StoreError::MissingParent(id));
        }
        self.commit(&mut wal, Event::ScrapCountUpdated { store_id: id, count })
    }
}

#[async_trait::async_trait]
impl SlotRepository for DurableStore {
    async fn find_slots(
        &self,
        store_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Slot>, StoreError> {
        let Some(rows) = self.slots.get(&store_id) else {
            return Ok(Vec::new());
        };
        let lo = rows.partition_point(|s| s.date < from);
        let hi = rows.partition_point(|s| s.date <= to);
        if lo >= hi {
            return Ok(Vec::new());
        }
        Ok(rows.value()[lo..hi].to_vec())
    }

    async fn count_bookable_slots(&self, store_id: Ulid) -> Result<usize, StoreError> {
        Ok(self
            .slots
            .get(&store_id)
            .map(|rows| rows.iter().filter(|s| !s.is_holiday()).count())
            .unwrap_or(0))
    }

    async fn find_holidays(&self, store_id: Ulid) -> Result<BTreeSet<NaiveDate>, StoreError> {
        Ok(self
            .slots
            .get(&store_id)
            .map(|rows| rows.iter().filter(|s| s.is_holiday()).map(|s| s.date).collect())
            .unwrap_or_default())
    }

    async fn bulk_insert(&self, store_id: Ulid, slots: Vec<Slot>) -> Result<(), StoreError> {
        if slots.is_empty() {
            return Ok(());
        }
        let mut wal = self.wal.lock().await;
        if !self.stores.contains_key(&store_id) {
            return Err(StoreError::MissingParent(store_id));
        }

        let mut seen = HashSet::with_capacity(slots.len());
        if let Some(rows) = self.slots.get(&store_id) {
            seen.extend(rows.iter().map(|s| s.id));
        }
        for slot in &slots {
            if slot.store_id != store_id {
                return Err(StoreError::MissingParent(slot.store_id));
            }
            if slot.available_slot > slot.total_slot {
                return Err(StoreError::InvalidSlot(slot.id));
            }
            if !seen.insert(slot.id) {
                return Err(StoreError::Duplicate(slot.id));
            }
        }

        self.commit(&mut wal, Event::SlotsInserted { store_id, slots })
    }
}

#[async_trait::async_trait]
impl ScrapRepository for DurableStore {
    async fn find_scrap(&self, user_id: Ulid, store_id: Ulid) -> Result<Option<Scrap>, StoreError> {
        Ok(self
            .scrap_index
            .get(&(user_id, store_id))
            .and_then(|id| self.scraps.get(id.value()).map(|s| s.value().clone())))
    }

    async fn find_scrap_by_id(&self, id: Ulid) -> Result<Option<Scrap>, StoreError> {
        Ok(self.scraps.get(&id).map(|s| s.value().clone()))
    }

    async fn insert_scrap(&self, scrap: Scrap) -> Result<(), StoreError> {
        let mut wal = self.wal.lock().await;
        if !self.stores.contains_key(&scrap.store_id) {
            return Err(StoreError::MissingParent(scrap.store_id));
        }
        if let Some(existing) = self.scrap_index.get(&(scrap.user_id, scrap.store_id)) {
            return Err(StoreError::Duplicate(*existing.value()));
        }
        if self.scraps.contains_key(&scrap.id) {
            return Err(StoreError::Duplicate(scrap.id));
        }
        self.commit(&mut wal, Event::ScrapCreated { scrap })
    }

    async fn delete_scrap(&self, id: Ulid) -> Result<bool, StoreError> {
        let mut wal = self.wal.lock().await;
        if !self.scraps.contains_key(&id) {
            return Ok(false);
        }
        self.commit(&mut wal, Event::ScrapDeleted { id })?;
        Ok(true)
    }

    async fn list_scraps_by_user(&self, user_id: Ulid) -> Result<Vec<Scrap>, StoreError> {
        Ok(self
            .scraps
            .iter()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.value().clone())
            .collect())
    }
}
