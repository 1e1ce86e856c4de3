use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A popup store: its operating window, capacity, and the durable scrap count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopupStore {
    pub id: Ulid,
    pub name: String,
    /// First operating day (inclusive).
    pub start_date: NaiveDate,
    /// Last operating day (inclusive).
    pub end_date: NaiveDate,
    /// Daily opening time; slots start here.
    pub opening_time: NaiveTime,
    /// Daily closing time (exclusive); no slot starts at or after it.
    pub closing_time: NaiveTime,
    /// Reservable places across the whole run.
    pub total_capacity: u32,
    /// Durable mirror of the cached scrap counter.
    pub scrap_count: i64,
}

impl PopupStore {
    pub fn new(
        name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        opening_time: NaiveTime,
        closing_time: NaiveTime,
        total_capacity: u32,
    ) -> Self {
        Self {
            id: Ulid::new(),
            name: name.into(),
            start_date,
            end_date,
            opening_time,
            closing_time,
            total_capacity,
            scrap_count: 0,
        }
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Number of calendar days in `[start_date, end_date]`.
    pub fn window_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStatus {
    Available,
    Full,
    Holiday,
}

/// One bookable hour on a given date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: Ulid,
    pub store_id: Ulid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    /// Capacity assigned at creation. Never changes.
    pub total_slot: u32,
    /// Remaining capacity, `0 <= available_slot <= total_slot`.
    pub available_slot: u32,
    pub status: SlotStatus,
}

impl Slot {
    pub fn new(store_id: Ulid, starts_at: NaiveDateTime, capacity: u32) -> Self {
        Self {
            id: Ulid::new(),
            store_id,
            date: starts_at.date(),
            time: starts_at.time(),
            total_slot: capacity,
            available_slot: capacity,
            status: SlotStatus::Available,
        }
    }

    /// Zero-capacity marker row that records a holiday in the slot set.
    pub fn holiday(store_id: Ulid, date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            id: Ulid::new(),
            store_id,
            date,
            time,
            total_slot: 0,
            available_slot: 0,
            status: SlotStatus::Holiday,
        }
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    pub fn is_holiday(&self) -> bool {
        self.status == SlotStatus::Holiday
    }

    pub fn has_capacity(&self) -> bool {
        self.available_slot > 0
    }

    pub fn is_bookable(&self) -> bool {
        self.status == SlotStatus::Available && self.has_capacity()
    }
}

/// Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayStatus {
    Past,
    Holiday,
    Full,
    Available,
}

/// A user's "favorite" mark on a store. `(user_id, store_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scrap {
    pub id: Ulid,
    pub user_id: Ulid,
    pub store_id: Ulid,
    pub created_at: NaiveDateTime,
}

/// Durable state changes, one per WAL record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    StoreRegistered {
        store: PopupStore,
    },
    /// One record per bulk insert so a batch is committed or lost as a whole.
    SlotsInserted {
        store_id: Ulid,
        slots: Vec<Slot>,
    },
    ScrapCountUpdated {
        store_id: Ulid,
        count: i64,
    },
    ScrapCreated {
        scrap: Scrap,
    },
    ScrapDeleted {
        id: Ulid,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapStatus {
    pub scrapped: bool,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScrapSort {
    /// Most recently scrapped first.
    Recent,
    /// Earliest opening date first.
    OpenDate,
    /// Earliest closing date first.
    EndDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserScrap {
    pub scrap_id: Ulid,
    pub store_id: Ulid,
    pub store_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub scrapped_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotAvailability {
    pub time: NaiveTime,
    pub status: SlotStatus,
    pub available_slot: u32,
    pub is_available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreCalendar {
    pub store_id: Ulid,
    pub name: String,
    /// First date covered: the later of today and the store's start date.
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub statuses: BTreeMap<NaiveDate, DayStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn window_days_is_inclusive() {
        let store = PopupStore::new("Pop", date(2026, 3, 1), date(2026, 3, 3), time(10), time(18), 10);
        assert_eq!(store.window_days(), 3);
        assert!(store.contains_date(date(2026, 3, 3)));
        assert!(!store.contains_date(date(2026, 3, 4)));
    }

    #[test]
    fn holiday_marker_has_no_capacity() {
        let slot = Slot::holiday(Ulid::new(), date(2026, 3, 1), time(10));
        assert!(slot.is_holiday());
        assert!(!slot.is_bookable());
        assert_eq!(slot.total_slot, 0);
    }

    #[test]
    fn fully_booked_slot_is_not_bookable() {
        let mut slot = Slot::new(Ulid::new(), date(2026, 3, 1).and_time(time(10)), 2);
        assert!(slot.is_bookable());
        slot.available_slot = 0;
        assert!(!slot.has_capacity());
        assert!(!slot.is_bookable());
    }

    #[test]
    fn day_status_serializes_as_upper_case() {
        assert_eq!(serde_json::to_string(&DayStatus::Past).unwrap(), "\"PAST\"");
        assert_eq!(serde_json::to_string(&SlotStatus::Holiday).unwrap(), "\"HOLIDAY\"");
    }
}
