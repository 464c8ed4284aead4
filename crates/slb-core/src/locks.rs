use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex, MutexGuard},
};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::UserId;

type LockMap = HashMap<UserId, Arc<Mutex<()>>>;

/// One async mutex per user, created on first use and dropped again once no
/// guard or waiter refers to it.
///
/// Holding the guard for a whole command keeps same-user deliveries from
/// interleaving (e.g. two "select list" commands racing on the active flag).
#[derive(Default)]
pub struct UserLocks {
    inner: Arc<StdMutex<LockMap>>,
}

/// Held for the duration of one user's command.
pub struct UserLockGuard {
    map: Arc<StdMutex<LockMap>>,
    user: UserId,
    guard: Option<OwnedMutexGuard<()>>,
}

fn lock_map(map: &StdMutex<LockMap>) -> MutexGuard<'_, LockMap> {
    // The map is never left half-updated, so a poisoned lock is still usable.
    map.lock().unwrap_or_else(|e| e.into_inner())
}

impl UserLocks {
    pub async fn lock_user(&self, user: &UserId) -> UserLockGuard {
        let lock = {
            let mut map = lock_map(&self.inner);
            map.entry(user.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let guard = lock.lock_owned().await;
        UserLockGuard {
            map: self.inner.clone(),
            user: user.clone(),
            guard: Some(guard),
        }
    }

    /// Users that currently have a lock entry.
    pub fn tracked_users(&self) -> usize {
        lock_map(&self.inner).len()
    }
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        // Clones are only taken under the map lock, so a count of one means
        // nobody holds or waits on this user's mutex.
        let mut map = lock_map(&self.map);
        if map
            .get(&self.user)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.user);
        }
    }
}
