use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::{CounterCache, LockError, LockService, LockToken, StoreError};

/// In-process counter cache. Each key is updated under its shard lock, so
/// `incr`/`decr` are atomic across tasks.
#[derive(Default)]
pub struct MemoryCache {
    values: DashMap<String, i64>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a key, as an eviction would.
    pub fn evict(&self, key: &str) {
        self.values.remove(key);
    }

    fn add(&self, key: &str, delta: i64) -> i64 {
        let mut entry = self.values.entry(key.to_string()).or_insert(0);
        *entry += delta;
        *entry
    }
}

#[async_trait::async_trait]
impl CounterCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.values.get(key).map(|v| *v.value()))
    }

    async fn set(&self, key: &str, value: i64) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: i64) -> Result<bool, StoreError> {
        match self.values.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(true)
            }
            Entry::Occupied(_) => Ok(false),
        }
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        Ok(self.add(key, 1))
    }

    async fn decr(&self, key: &str) -> Result<i64, StoreError> {
        Ok(self.add(key, -1))
    }
}

struct Lease {
    token: LockToken,
    expires_at: Instant,
}

/// In-process lease lock. Waiters sleep until a release, the current holder's
/// lease expiry, or their own deadline, whichever comes first.
#[derive(Default)]
pub struct MemoryLockService {
    leases: DashMap<String, Lease>,
    released: Notify,
}

impl MemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_claim(&self, key: &str, lease: Duration) -> Option<LockToken> {
        let now = Instant::now();
        let token = LockToken::new();
        let fresh = Lease { token, expires_at: now + lease };
        match self.leases.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(fresh);
                Some(token)
            }
            Entry::Occupied(mut held) if held.get().expires_at <= now => {
                tracing::debug!("lock {key}: previous lease expired, taking over");
                held.insert(fresh);
                Some(token)
            }
            Entry::Occupied(_) => None,
        }
    }
}

#[async_trait::async_trait]
impl LockService for MemoryLockService {
    async fn try_lock(
        &self,
        key: &str,
        wait: Duration,
        lease: Duration,
    ) -> Result<Option<LockToken>, LockError> {
        let deadline = Instant::now() + wait;
        loop {
            // Register before checking so a release in between is not missed.
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(token) = self.try_claim(key, lease) {
                return Ok(Some(token));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }

            let holder_expiry = self
                .leases
                .get(key)
                .map(|l| l.expires_at)
                .unwrap_or(deadline);
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(holder_expiry.min(deadline)) => {}
            }
        }
    }

    async fn is_held(&self, key: &str, token: &LockToken) -> Result<bool, StoreError> {
        Ok(self
            .leases
            .get(key)
            .is_some_and(|l| l.token == *token && l.expires_at > Instant::now()))
    }

    async fn unlock(&self, key: &str, token: &LockToken) -> Result<(), StoreError> {
        if self.leases.remove_if(key, |_, l| l.token == *token).is_some() {
            self.released.notify_waiters();
        }
        Ok(())
    }
}
