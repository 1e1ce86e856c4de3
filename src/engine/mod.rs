mod allocation;
mod calendar;
mod error;
mod lock;
mod scrap;
mod slots;

pub use allocation::{allocate, distribute, slot_starts};
pub use calendar::{calendar, day_status, effective_start};
pub use error::{EngineError, ErrorKind};

use std::sync::Arc;
use std::time::Duration;

use ulid::Ulid;

use crate::clock::Clock;
use crate::config::Settings;
use crate::limits::{LOCK_LEASE, LOCK_WAIT};
use crate::model::PopupStore;
use crate::store::{CounterCache, DurableStore, LockService, PopupRepository, ScrapRepository, SlotRepository};

/// The collaborators an [`Engine`] runs against.
#[derive(Clone)]
pub struct Backends {
    pub stores: Arc<dyn PopupRepository>,
    pub slots: Arc<dyn SlotRepository>,
    pub scraps: Arc<dyn ScrapRepository>,
    pub cache: Arc<dyn CounterCache>,
    pub locks: Arc<dyn LockService>,
}

impl Backends {
    /// All three repositories served by one durable store.
    pub fn durable(
        db: Arc<DurableStore>,
        cache: Arc<dyn CounterCache>,
        locks: Arc<dyn LockService>,
    ) -> Self {
        Self {
            stores: db.clone(),
            slots: db.clone(),
            scraps: db,
            cache,
            locks,
        }
    }
}

/// Slot scheduler and scrap counter guard over shared collaborators.
///
/// An `Engine` holds no mutable state of its own: any number of engines (one
/// per replica) may run against the same backends.
pub struct Engine {
    pub(super) stores: Arc<dyn PopupRepository>,
    pub(super) slots: Arc<dyn SlotRepository>,
    pub(super) scraps: Arc<dyn ScrapRepository>,
    pub(super) cache: Arc<dyn CounterCache>,
    pub(super) locks: Arc<dyn LockService>,
    pub(super) clock: Arc<dyn Clock>,
    count_key_prefix: String,
    lock_key_prefix: String,
    pub(super) lock_wait: Duration,
    pub(super) lock_lease: Duration,
}

impl Engine {
    pub fn new(backends: Backends, clock: Arc<dyn Clock>, settings: &Settings) -> Self {
        Self {
            stores: backends.stores,
            slots: backends.slots,
            scraps: backends.scraps,
            cache: backends.cache,
            locks: backends.locks,
            clock,
            count_key_prefix: settings.count_key_prefix.clone(),
            lock_key_prefix: settings.lock_key_prefix.clone(),
            lock_wait: LOCK_WAIT,
            lock_lease: LOCK_LEASE,
        }
    }

    pub(super) fn count_key(&self, store_id: Ulid) -> String {
        format!("{}{store_id}", self.count_key_prefix)
    }

    pub(super) fn lock_key(&self, store_id: Ulid) -> String {
        format!("{}{store_id}", self.lock_key_prefix)
    }

    pub(super) async fn load_store(&self, id: Ulid) -> Result<PopupStore, EngineError> {
        self.stores
            .load_store(id)
            .await?
            .ok_or(EngineError::StoreNotFound(id))
    }
}
