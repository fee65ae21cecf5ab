use std::{collections::HashMap, sync::Arc};

use parking_lot::{Mutex, ReentrantMutex};
use tracing::trace;

use crate::repository::entities::Uid;

/// Per-entity save locks.
///
/// Saves of the same entity are serialized, saves of different entities are not. A lock is
/// reentrant so a hook may save the entity it was called for.
#[derive(Debug, Default)]
pub(crate) struct SaveLocks {
    locks: Mutex<HashMap<Uid, Arc<ReentrantMutex<()>>>>,
}

impl SaveLocks {
    /// The save lock of the entity `uid`, created on first use.
    pub fn get(&self, uid: Uid) -> Arc<ReentrantMutex<()>> {
        self.locks.lock().entry(uid).or_default().clone()
    }

    /// Forget the lock of a removed entity.
    pub fn release(&self, uid: Uid) {
        if self.locks.lock().remove(&uid).is_some() {
            trace!("Released save lock of {}", uid.0);
        }
    }
}

#[cfg(test)]
mod test {
    use std::{sync::mpsc, thread, time::Duration};

    use super::*;

    #[test]
    fn test_same_entity_shares_lock() {
        let locks = SaveLocks::default();

        assert!(Arc::ptr_eq(&locks.get(Uid(1)), &locks.get(Uid(1))));
        assert!(!Arc::ptr_eq(&locks.get(Uid(1)), &locks.get(Uid(2))));
    }

    #[test]
    fn test_reentrant() {
        let locks = SaveLocks::default();
        let lock = locks.get(Uid(1));

        let _outer = lock.lock();
        let inner = lock.try_lock();

        assert!(inner.is_some());
    }

    #[test]
    fn test_serializes_other_threads() {
        let locks = Arc::new(SaveLocks::default());
        let lock = locks.get(Uid(1));
        let guard = lock.lock();

        let (tx, rx) = mpsc::channel();
        let handle = {
            let locks = locks.clone();
            thread::spawn(move || {
                let lock = locks.get(Uid(1));
                let _guard = lock.lock();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        drop(guard);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_release() {
        let locks = SaveLocks::default();
        let first = locks.get(Uid(1));

        locks.release(Uid(1));

        assert!(!Arc::ptr_eq(&first, &locks.get(Uid(1))));
    }
}
