use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delta {
    Up,
    Down,
}

impl Engine {
    /// Flip the user's scrap on a store and return the new state with the
    /// store's scrap count.
    ///
    /// Runs under the per-store lock, so at most one toggle per store is in
    /// flight across every replica sharing the lock service.
    pub async fn toggle_scrap(&self, store_id: Ulid, user_id: Ulid) -> Result<ScrapStatus, EngineError> {
        self.with_store_lock(store_id, || self.toggle_locked(store_id, user_id))
            .await
    }

    async fn toggle_locked(&self, store_id: Ulid, user_id: Ulid) -> Result<ScrapStatus, EngineError> {
        let store = self.load_store(store_id).await?;

        let (scrapped, delta) = match self.scraps.find_scrap(user_id, store_id).await? {
            Some(existing) => {
                self.scraps.delete_scrap(existing.id).await?;
                (false, Delta::Down)
            }
            None => {
                let scrap = Scrap {
                    id: Ulid::new(),
                    user_id,
                    store_id,
                    created_at: self.clock.now(),
                };
                self.scraps.insert_scrap(scrap).await?;
                (true, Delta::Up)
            }
        };

        let count = self.adjust_count(&store, delta).await?;

        let action = if scrapped { "added" } else { "removed" };
        metrics::counter!(crate::observability::SCRAP_TOGGLES_TOTAL, "action" => action).increment(1);
        info!("user {user_id} {action} scrap on store {store_id}, count {count}");
        Ok(ScrapStatus { scrapped, count })
    }

    /// Lock-free read of the user's scrap state and the store's count. May lag
    /// an in-flight toggle by one critical section. Never writes the cache: a
    /// cold key falls back to the durable count.
    pub async fn scrap_status(&self, store_id: Ulid, user_id: Ulid) -> Result<ScrapStatus, EngineError> {
        let store = self.load_store(store_id).await?;
        let count = self
            .cache
            .get(&self.count_key(store_id))
            .await?
            .unwrap_or(store.scrap_count);
        let scrapped = self.scraps.find_scrap(user_id, store_id).await?.is_some();
        Ok(ScrapStatus { scrapped, count })
    }

    /// Remove a scrap by id on behalf of its owner.
    pub async fn delete_scrap(&self, scrap_id: Ulid, user_id: Ulid) -> Result<ScrapStatus, EngineError> {
        let scrap = self
            .scraps
            .find_scrap_by_id(scrap_id)
            .await?
            .ok_or(EngineError::ScrapNotFound(scrap_id))?;
        if scrap.user_id != user_id {
            return Err(EngineError::Forbidden { scrap_id, user_id });
        }

        self.with_store_lock(scrap.store_id, || self.delete_locked(&scrap))
            .await
    }

    async fn delete_locked(&self, scrap: &Scrap) -> Result<ScrapStatus, EngineError> {
        // A concurrent toggle may have removed it while we waited.
        if !self.scraps.delete_scrap(scrap.id).await? {
            return Err(EngineError::ScrapNotFound(scrap.id));
        }
        let store = self.load_store(scrap.store_id).await?;
        let count = self.adjust_count(&store, Delta::Down).await?;
        metrics::counter!(crate::observability::SCRAP_TOGGLES_TOTAL, "action" => "removed").increment(1);
        info!(
            "user {} deleted scrap {} on store {}, count {count}",
            scrap.user_id, scrap.id, scrap.store_id
        );
        Ok(ScrapStatus { scrapped: false, count })
    }

    /// The user's scraps joined with their stores.
    pub async fn user_scraps(&self, user_id: Ulid, sort: ScrapSort) -> Result<Vec<UserScrap>, EngineError> {
        let scraps = self.scraps.list_scraps_by_user(user_id).await?;
        let mut out = Vec::with_capacity(scraps.len());
        for scrap in scraps {
            let Some(store) = self.stores.load_store(scrap.store_id).await? else {
                warn!("scrap {} points at missing store {}", scrap.id, scrap.store_id);
                continue;
            };
            out.push(UserScrap {
                scrap_id: scrap.id,
                store_id: store.id,
                store_name: store.name,
                start_date: store.start_date,
                end_date: store.end_date,
                scrapped_at: scrap.created_at,
            });
        }

        match sort {
            ScrapSort::Recent => out.sort_by(|a, b| {
                b.scrapped_at
                    .cmp(&a.scrapped_at)
                    .then(b.scrap_id.cmp(&a.scrap_id))
            }),
            ScrapSort::OpenDate => {
                out.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.store_name.cmp(&b.store_name)))
            }
            ScrapSort::EndDate => {
                out.sort_by(|a, b| a.end_date.cmp(&b.end_date).then(a.store_name.cmp(&b.store_name)))
            }
        }
        Ok(out)
    }

    // ── Counter (cache-aside) ────────────────────────────────

    /// Apply one step to the cached count and mirror the result durably.
    /// Caller holds the store lock, so `store.scrap_count` is the current mirror.
    async fn adjust_count(&self, store: &PopupStore, delta: Delta) -> Result<i64, EngineError> {
        let key = self.count_key(store.id);
        if self.cache.set_if_absent(&key, store.scrap_count).await? {
            metrics::counter!(crate::observability::COUNTER_SEEDS_TOTAL).increment(1);
            debug!("seeded {key} from durable count {}", store.scrap_count);
        }

        let mut count = match delta {
            Delta::Up => self.cache.incr(&key).await?,
            Delta::Down => self.cache.decr(&key).await?,
        };
        if count < 0 {
            warn!("{key} went negative ({count}), clamping to 0");
            self.cache.set(&key, 0).await?;
            count = 0;
        }

        self.stores.update_scrap_count(store.id, count).await?;
        Ok(count)
    }
}
