use std::sync::{LockResult, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

fn recover<G>(result: LockResult<G>, region: &str, op: &'static str, lock_kind: &'static str) -> G {
    match result {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                target = "amora::cache",
                op,
                region,
                lock_kind,
                result = "poisoned_recovered",
                hint = "state may be stale after panic in another thread",
                "Recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        }
    }
}

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    region: &str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    recover(lock.read(), region, op, "rwlock.read")
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    region: &str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    recover(lock.write(), region, op, "rwlock.write")
}

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    region: &str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    recover(lock.lock(), region, op, "mutex.lock")
}
