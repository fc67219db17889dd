use super::CoroutineId;
use std::collections::VecDeque;

/// Counting semaphore. Blocked requests are served strictly in arrival
/// order: a large request at the head holds back smaller ones behind it.
#[derive(Debug, Default)]
pub struct Semaphore {
    keys: u64,
    waiters: VecDeque<(CoroutineId, u64)>,
}

impl Semaphore {
    pub fn new(keys: u64) -> Self {
        Self {
            keys,
            waiters: VecDeque::new(),
        }
    }

    pub fn keys(&self) -> u64 {
        self.keys
    }

    /// Take `n` keys for `co`. Returns false and queues the request if they
    /// are not available.
    pub fn get(&mut self, co: CoroutineId, n: u64) -> bool {
        if self.try_get(n) {
            return true;
        }
        self.waiters.push_back((co, n));
        false
    }

    /// Take `n` keys if they are available and nobody is queued.
    pub fn try_get(&mut self, n: u64) -> bool {
        if self.waiters.is_empty() && self.keys >= n {
            self.keys -= n;
            true
        } else {
            false
        }
    }

    /// Return `n` keys. Returns the queued coroutines whose requests can now
    /// be served.
    pub fn put(&mut self, n: u64) -> Vec<CoroutineId> {
        self.keys = self.keys.saturating_add(n);
        let mut granted = vec![];
        while let Some(&(co, want)) = self.waiters.front() {
            if want > self.keys {
                break;
            }
            self.keys -= want;
            self.waiters.pop_front();
            granted.push(co);
        }
        granted
    }

    /// Drop the queued request of `co`.
    pub fn cancel(&mut self, co: CoroutineId) {
        self.waiters.retain(|(c, _)| *c != co);
    }
}
