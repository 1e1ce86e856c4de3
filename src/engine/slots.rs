use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::allocation::allocate;
use super::calendar::{calendar, effective_start};
use super::{Engine, EngineError};

fn validate_store(store: &PopupStore) -> Result<(), EngineError> {
    if store.name.is_empty() {
        return Err(EngineError::InvalidStore("name is empty"));
    }
    if store.name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("store name too long"));
    }
    if store.start_date > store.end_date {
        return Err(EngineError::InvalidStore("start date is after end date"));
    }
    if store.opening_time >= store.closing_time {
        return Err(EngineError::InvalidStore("opening time is not before closing time"));
    }
    if store.window_days() > MAX_WINDOW_DAYS {
        return Err(EngineError::LimitExceeded("operating window too long"));
    }
    if store.scrap_count < 0 {
        return Err(EngineError::InvalidStore("scrap count is negative"));
    }
    Ok(())
}

impl Engine {
    pub async fn register_store(&self, store: PopupStore) -> Result<Ulid, EngineError> {
        validate_store(&store)?;
        let id = store.id;
        if self.stores.load_store(id).await?.is_some() {
            return Err(EngineError::AlreadyExists(id));
        }
        self.stores.insert_store(store).await?;
        info!("registered store {id}");
        Ok(id)
    }

    /// Mark dates as holidays. Dates already marked are skipped; returns how many were added.
    pub async fn register_holidays(
        &self,
        store_id: Ulid,
        dates: &[NaiveDate],
    ) -> Result<usize, EngineError> {
        if dates.len() > MAX_HOLIDAYS_PER_CALL {
            return Err(EngineError::LimitExceeded("too many holidays"));
        }
        let store = self.load_store(store_id).await?;
        if dates.iter().any(|d| !store.contains_date(*d)) {
            return Err(EngineError::InvalidStore("holiday outside operating window"));
        }

        let existing = self.slots.find_holidays(store_id).await?;
        let fresh: BTreeSet<NaiveDate> = dates
            .iter()
            .copied()
            .filter(|d| !existing.contains(d))
            .collect();
        let (Some(first), Some(last)) = (fresh.first(), fresh.last()) else {
            return Ok(0);
        };

        // A holiday date carries no bookable hours.
        let allocated = self.slots.find_slots(store_id, *first, *last).await?;
        if allocated.iter().any(|s| !s.is_holiday() && fresh.contains(&s.date)) {
            return Err(EngineError::InvalidStore("holiday date already has allocated slots"));
        }

        let markers: Vec<Slot> = fresh
            .iter()
            .map(|d| Slot::holiday(store_id, *d, store.opening_time))
            .collect();
        let added = markers.len();
        self.slots.bulk_insert(store_id, markers).await?;
        info!("store {store_id}: {added} holidays registered");
        Ok(added)
    }

    /// Generate the store's slots. Runs once per store: if any bookable slot
    /// already exists the call fails with `AlreadyInitialized` and writes nothing.
    ///
    /// Returns the number of slots written, which may be zero.
    pub async fn initialize_slots(&self, store_id: Ulid) -> Result<usize, EngineError> {
        let store = self.load_store(store_id).await?;
        if self.slots.count_bookable_slots(store_id).await? > 0 {
            return Err(EngineError::AlreadyInitialized(store_id));
        }
        let holidays = self.slots.find_holidays(store_id).await?;

        let slots = allocate(&store, &holidays, self.clock.now());
        if slots.is_empty() {
            info!("store {store_id}: no bookable hours left in window, nothing allocated");
            return Ok(0);
        }

        let written = slots.len();
        self.slots.bulk_insert(store_id, slots).await?;
        metrics::counter!(crate::observability::SLOTS_ALLOCATED_TOTAL).increment(written as u64);
        info!(
            "store {store_id}: allocated {} places over {written} slots",
            store.total_capacity
        );
        Ok(written)
    }

    pub async fn calendar(&self, store_id: Ulid) -> Result<StoreCalendar, EngineError> {
        let store = self.load_store(store_id).await?;
        let now = self.clock.now();
        let start = effective_start(&store, now);

        let slots = if start <= store.end_date {
            self.slots.find_slots(store_id, start, store.end_date).await?
        } else {
            Vec::new()
        };
        let statuses = calendar(&store, &slots, now);
        debug!("store {store_id}: calendar over {} days", statuses.len());

        Ok(StoreCalendar {
            store_id,
            name: store.name,
            start_date: start,
            end_date: store.end_date,
            statuses,
        })
    }

    /// Hours on `date` that have not started yet, ordered by time. A holiday
    /// comes back as its single marker row, never available.
    pub async fn available_slots(
        &self,
        store_id: Ulid,
        date: NaiveDate,
    ) -> Result<Vec<SlotAvailability>, EngineError> {
        self.load_store(store_id).await?;
        let slots = self.slots.find_slots_on(store_id, date).await?;
        if slots.is_empty() {
            return Err(EngineError::SlotNotFound { store_id, date });
        }

        let now = self.clock.now();
        Ok(slots
            .iter()
            .filter(|s| s.is_holiday() || s.starts_at() >= now)
            .map(|s| SlotAvailability {
                time: s.time,
                status: s.status,
                available_slot: s.available_slot,
                is_available: s.is_bookable(),
            })
            .collect())
    }
}
