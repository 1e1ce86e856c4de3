use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::store::{LockError, LockToken};

use super::{Engine, EngineError};

impl Engine {
    /// Run `critical` while holding the store's scrap lock.
    ///
    /// Not acquiring the lock within the wait window, or having the wait
    /// interrupted, is a `Conflict` and `critical` never runs. Once acquired,
    /// the lock is released on every exit: `Ok`, `Err`, or a panic, which is
    /// resumed after the release.
    pub(super) async fn with_store_lock<T, F, Fut>(
        &self,
        store_id: Ulid,
        critical: F,
    ) -> Result<T, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let key = self.lock_key(store_id);
        let token = match self.locks.try_lock(&key, self.lock_wait, self.lock_lease).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                warn!("lock {key} not acquired within {:?}", self.lock_wait);
                metrics::counter!(crate::observability::LOCK_CONFLICTS_TOTAL).increment(1);
                return Err(EngineError::Conflict(store_id));
            }
            Err(LockError::Interrupted) => {
                warn!("lock {key} wait interrupted");
                metrics::counter!(crate::observability::LOCK_CONFLICTS_TOTAL).increment(1);
                return Err(EngineError::Conflict(store_id));
            }
            Err(LockError::Backend(e)) => return Err(e.into()),
        };

        let held_since = std::time::Instant::now();
        let outcome = AssertUnwindSafe(critical()).catch_unwind().await;
        metrics::histogram!(crate::observability::LOCK_HOLD_SECONDS)
            .record(held_since.elapsed().as_secs_f64());
        self.release(&key, &token).await;

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Release only while we still own the lease; once it has expired another
    /// holder may own the key.
    async fn release(&self, key: &str, token: &LockToken) {
        match self.locks.is_held(key, token).await {
            Ok(true) => {
                if let Err(e) = self.locks.unlock(key, token).await {
                    warn!("failed to release lock {key}: {e}");
                } else {
                    debug!("released lock {key}");
                }
            }
            Ok(false) => warn!("lock {key} lease expired before release"),
            Err(e) => warn!("could not check lock {key} before release: {e}"),
        }
    }
}
