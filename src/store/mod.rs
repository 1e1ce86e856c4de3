//! Collaborator ports the engine talks to, plus the implementations shipped with the crate.
//!
//! Every port is `Send + Sync` and async so that a network-backed cache, lock
//! service or database can stand in for the in-process versions.

mod durable;
mod memory;

pub use durable::DurableStore;
pub use memory::{MemoryCache, MemoryLockService};

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{PopupStore, Scrap, Slot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A row with this id (or unique key) already exists.
    Duplicate(Ulid),
    /// A row referenced by the write does not exist.
    MissingParent(Ulid),
    /// A slot violates `0 <= available <= total`.
    InvalidSlot(Ulid),
    Wal(String),
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Duplicate(id) => write!(f, "duplicate row: {id}"),
            StoreError::MissingParent(id) => write!(f, "referenced row does not exist: {id}"),
            StoreError::InvalidSlot(id) => write!(f, "slot {id} has available > total"),
            StoreError::Wal(e) => write!(f, "WAL error: {e}"),
            StoreError::Unavailable(e) => write!(f, "backend unavailable: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Wal(e.to_string())
    }
}

/// Durable store rows.
#[async_trait::async_trait]
pub trait PopupRepository: Send + Sync {
    async fn insert_store(&self, store: PopupStore) -> Result<(), StoreError>;

    async fn load_store(&self, id: Ulid) -> Result<Option<PopupStore>, StoreError>;

    async fn update_scrap_count(&self, id: Ulid, count: i64) -> Result<(), StoreError>;
}

/// Slot rows and the holiday markers stored alongside them.
#[async_trait::async_trait]
pub trait SlotRepository: Send + Sync {
    /// Slots with `from <= date <= to`, ordered by `(date, time)`.
    async fn find_slots(
        &self,
        store_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Slot>, StoreError>;

    async fn find_slots_on(&self, store_id: Ulid, date: NaiveDate) -> Result<Vec<Slot>, StoreError> {
        self.find_slots(store_id, date, date).await
    }

    /// Number of non-holiday slots the store has.
    async fn count_bookable_slots(&self, store_id: Ulid) -> Result<usize, StoreError>;

    async fn find_holidays(&self, store_id: Ulid) -> Result<BTreeSet<NaiveDate>, StoreError>;

    /// All-or-nothing: either every slot is stored or none is.
    async fn bulk_insert(&self, store_id: Ulid, slots: Vec<Slot>) -> Result<(), StoreError>;
}

/// `(user, store)` scrap relations.
#[async_trait::async_trait]
pub trait ScrapRepository: Send + Sync {
    async fn find_scrap(&self, user_id: Ulid, store_id: Ulid) -> Result<Option<Scrap>, StoreError>;

    async fn find_scrap_by_id(&self, id: Ulid) -> Result<Option<Scrap>, StoreError>;

    async fn insert_scrap(&self, scrap: Scrap) -> Result<(), StoreError>;

    /// Returns false if the scrap was already gone.
    async fn delete_scrap(&self, id: Ulid) -> Result<bool, StoreError>;

    async fn list_scraps_by_user(&self, user_id: Ulid) -> Result<Vec<Scrap>, StoreError>;
}

/// Integer key/value cache. `incr`/`decr` must be atomic in the cache itself.
#[async_trait::async_trait]
pub trait CounterCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;

    async fn set(&self, key: &str, value: i64) -> Result<(), StoreError>;

    /// Atomically store `value` only if the key is missing. Returns whether it was written.
    async fn set_if_absent(&self, key: &str, value: i64) -> Result<bool, StoreError>;

    /// Atomically add one and return the new value. A missing key counts as 0.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// Atomically subtract one and return the new value. A missing key counts as 0.
    async fn decr(&self, key: &str) -> Result<i64, StoreError>;
}

/// Proof of lock ownership handed out by [`LockService::try_lock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockToken(Ulid);

impl LockToken {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for LockToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The wait was cut short before the lock could be granted or refused.
    Interrupted,
    Backend(StoreError),
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockError::Interrupted => write!(f, "lock wait interrupted"),
            LockError::Backend(e) => write!(f, "lock backend: {e}"),
        }
    }
}

impl std::error::Error for LockError {}

/// Named mutual exclusion shared by every replica.
#[async_trait::async_trait]
pub trait LockService: Send + Sync {
    /// Wait up to `wait` for `key`. On success the lock is held until `unlock`
    /// or until `lease` elapses, whichever comes first. `Ok(None)` means the wait ran out.
    async fn try_lock(
        &self,
        key: &str,
        wait: Duration,
        lease: Duration,
    ) -> Result<Option<LockToken>, LockError>;

    /// True while `token` still owns `key` and its lease has not expired.
    async fn is_held(&self, key: &str, token: &LockToken) -> Result<bool, StoreError>;

    async fn unlock(&self, key: &str, token: &LockToken) -> Result<(), StoreError>;
}
