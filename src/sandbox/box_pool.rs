use std::collections::HashSet;

use parking_lot::{Condvar, Mutex};

/// Allocates box ids `0..capacity` by the minimum-excludant (mex) of the ids
/// currently held, so ids get reused as soon as they're freed instead of
/// counting up forever. Guarded by a single `parking_lot::Mutex`; a
/// `Condvar` blocks `acquire` when the pool is at capacity instead of handing
/// out an id past it, so `box_pool_size` is an actual ceiling on concurrent
/// isolate boxes, not just a hint to size the grading worker pool by.
pub struct BoxIdPool {
    capacity: u32,
    used: Mutex<HashSet<u32>>,
    freed: Condvar,
}

impl BoxIdPool {
    pub fn new(capacity: u32) -> Self {
        BoxIdPool {
            capacity,
            used: Mutex::new(HashSet::new()),
            freed: Condvar::new(),
        }
    }

    /// Returns the smallest id not currently held, and marks it held. Blocks
    /// if `capacity` ids are already out, until one is released.
    pub fn acquire(&self) -> u32 {
        let mut used = self.used.lock();
        while used.len() as u32 >= self.capacity {
            self.freed.wait(&mut used);
        }
        let mut id = 0;
        while used.contains(&id) {
            id += 1;
        }
        used.insert(id);
        id
    }

    /// Releases a previously-acquired id. Releasing an id that isn't held is a
    /// caller bug, not a runtime condition — caught in debug builds.
    pub fn release(&self, id: u32) {
        let existed = self.used.lock().remove(&id);
        debug_assert!(existed, "released box id {id} that was not held");
        if !existed {
            log::warn!("released box id {id} that was not held");
        }
        self.freed.notify_one();
    }

    /// Acquires an id behind a RAII guard that releases it on drop, mirroring
    /// the sandbox driver's own init/cleanup pairing.
    pub fn acquire_guard(&self) -> BoxIdGuard<'_> {
        BoxIdGuard {
            pool: self,
            id: self.acquire(),
        }
    }
}

pub struct BoxIdGuard<'a> {
    pool: &'a BoxIdPool,
    id: u32,
}

impl BoxIdGuard<'_> {
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl Drop for BoxIdGuard<'_> {
    fn drop(&mut self) {
        self.pool.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquires_the_mex_of_held_ids() {
        let pool = BoxIdPool::new(4);
        let a = pool.acquire();
        let b = pool.acquire();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        pool.release(a);
        let c = pool.acquire();
        assert_eq!(c, 0, "freed id should be reused before counting up");
        pool.release(b);
        pool.release(c);
    }

    #[test]
    fn guard_releases_on_drop() {
        let pool = BoxIdPool::new(4);
        {
            let guard = pool.acquire_guard();
            assert_eq!(guard.id(), 0);
        }
        assert_eq!(pool.acquire(), 0);
    }

    #[test]
    fn never_double_allocates_concurrently_held_ids() {
        let pool = BoxIdPool::new(4);
        let ids: Vec<u32> = (0..4).map(|_| pool.acquire()).collect();
        let unique: HashSet<u32> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn acquire_blocks_at_capacity_until_a_release() {
        use std::sync::Arc;
        use std::time::Duration;

        let pool = Arc::new(BoxIdPool::new(1));
        let first = pool.acquire();
        assert_eq!(first, 0);

        let waiter = {
            let pool = pool.clone();
            std::thread::spawn(move || pool.acquire())
        };

        std::thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished(), "acquire should block while at capacity");

        pool.release(first);
        let second = waiter.join().unwrap();
        assert_eq!(second, 0, "freed id should be handed to the blocked waiter");
    }
}
