// Scheduling pool: FIFO index of transaction identities awaiting submission.
//
// The pool is a cache over the store. It is rebuilt from `AATxState::get_all_pending`
// at startup and never persisted on its own.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy_primitives::B256;

#[derive(Default)]
struct PoolInner {
    /// Identities ready to be popped, oldest first
    ready: VecDeque<B256>,
    /// Every identity the pool currently tracks, popped or not
    members: HashSet<B256>,
}

/// Ingress pushes, the relayer loop pops. A popped identity stays a member until
/// `remove` is called, so a resubmission of an in-flight transaction is not queued twice.
#[derive(Default)]
pub struct AAPool {
    inner: Mutex<PoolInner>,
}

impl AAPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the store's pending set, keeping the order given
    pub fn init<I>(&self, pending: I)
    where
        I: IntoIterator<Item = B256>,
    {
        let mut inner = self.lock();
        for id in pending {
            if inner.members.insert(id) {
                inner.ready.push_back(id);
            }
        }
    }

    /// Append a newly admitted identity; returns false if it was already tracked
    pub fn push(&self, id: B256) -> bool {
        let mut inner = self.lock();
        if !inner.members.insert(id) {
            return false;
        }
        inner.ready.push_back(id);
        true
    }

    /// Next identity in FIFO order, `None` when nothing is ready
    pub fn pop(&self) -> Option<B256> {
        self.lock().ready.pop_front()
    }

    /// Forget an identity whose record left Pending/Queued
    pub fn remove(&self, id: &B256) -> bool {
        let mut inner = self.lock();
        if !inner.members.remove(id) {
            return false;
        }
        inner.ready.retain(|queued| queued != id);
        true
    }

    pub fn contains(&self, id: &B256) -> bool {
        self.lock().members.contains(id)
    }

    /// Tracked identities, including one popped but not yet removed
    pub fn len(&self) -> usize {
        self.lock().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().members.is_empty()
    }

    /// Identities waiting to be popped
    pub fn ready_len(&self) -> usize {
        self.lock().ready.len()
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        // the inner sets stay consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn id(byte: u8) -> B256 {
        B256::repeat_byte(byte)
    }

    #[test]
    fn test_fifo_order() {
        let pool = AAPool::new();
        pool.push(id(1));
        pool.push(id(2));
        pool.push(id(3));

        assert_eq!(pool.pop(), Some(id(1)));
        assert_eq!(pool.pop(), Some(id(2)));
        assert_eq!(pool.pop(), Some(id(3)));
        assert_eq!(pool.pop(), None);
    }

    #[test]
    fn test_push_is_duplicate_guarded() {
        let pool = AAPool::new();
        assert!(pool.push(id(1)));
        assert!(!pool.push(id(1)));
        assert_eq!(pool.ready_len(), 1);

        // still in flight after pop
        assert_eq!(pool.pop(), Some(id(1)));
        assert!(!pool.push(id(1)));
        assert_eq!(pool.pop(), None);

        assert!(pool.remove(&id(1)));
        assert!(pool.push(id(1)));
    }

    #[test]
    fn test_init_keeps_order_and_dedups() {
        let pool = AAPool::new();
        pool.init(vec![id(3), id(1), id(3), id(2)]);

        assert_eq!(pool.len(), 3);
        assert_eq!(pool.pop(), Some(id(3)));
        assert_eq!(pool.pop(), Some(id(1)));
        assert_eq!(pool.pop(), Some(id(2)));
    }

    #[test]
    fn test_remove_unpopped_entry() {
        let pool = AAPool::new();
        pool.push(id(1));
        pool.push(id(2));

        assert!(pool.remove(&id(1)));
        assert!(!pool.remove(&id(1)));
        assert!(!pool.contains(&id(1)));
        assert_eq!(pool.pop(), Some(id(2)));
        assert_eq!(pool.pop(), None);
    }

    #[test]
    fn test_concurrent_pushes_not_lost_or_duplicated() {
        let pool = Arc::new(AAPool::new());

        let handles: Vec<_> = (0..4u8)
            .map(|worker| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for n in 0..50u8 {
                        // every worker pushes the shared ids and its own ones
                        pool.push(id(n));
                        let mut own = [worker + 100; 32];
                        own[31] = n;
                        pool.push(B256::from(own));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let mut seen = HashSet::new();
        while let Some(next) = pool.pop() {
            assert!(seen.insert(next), "popped {} twice", next);
        }
        assert_eq!(seen.len(), 50 + 4 * 50);
    }
}
