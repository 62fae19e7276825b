/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! A keyed mutex registry, giving the service per-experiment-id (and
//! per-(app,label)) serialization without serializing unrelated keys
//! (spec §5). Built on `parking_lot::Mutex`, the same primitive the
//! teacher's login store uses for its single coarse-grained lock,
//! generalized here to one lock per key.

use parking_lot::{ArcMutexGuard, Mutex as PlMutex, RawMutex};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

pub struct KeyedLocks<K> {
    registry: PlMutex<HashMap<K, Arc<PlMutex<()>>>>,
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            registry: PlMutex::new(HashMap::new()),
        }
    }
}

pub type KeyedLockGuard = ArcMutexGuard<RawMutex, ()>;

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, blocking until it's available. The
    /// guard is never persisted past the call that acquired it (spec
    /// §5 — "locks are held only for the duration of the orchestration
    /// of one call").
    pub fn lock(&self, key: K) -> KeyedLockGuard {
        let entry = self
            .registry
            .lock()
            .entry(key)
            .or_insert_with(|| Arc::new(PlMutex::new(())))
            .clone();
        entry.lock_arc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn same_key_serializes() {
        let locks: Arc<KeyedLocks<&'static str>> = Arc::new(KeyedLocks::new());
        let order = Arc::new(PlMutex::new(Vec::new()));

        let l1 = locks.clone();
        let o1 = order.clone();
        let h1 = thread::spawn(move || {
            let _g = l1.lock("a");
            thread::sleep(Duration::from_millis(20));
            o1.lock().push(1);
        });
        thread::sleep(Duration::from_millis(5));
        let _g2 = locks.lock("a");
        order.lock().push(2);
        h1.join().unwrap();
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[test]
    fn different_keys_proceed_in_parallel() {
        let locks: Arc<KeyedLocks<&'static str>> = Arc::new(KeyedLocks::new());
        let _a = locks.lock("a");
        // Must not deadlock: "b" is a distinct key.
        let _b = locks.lock("b");
    }
}
