use super::CoroutineId;
use ahash::{HashMap, HashMapExt};

/// Values of `process::status()`.
pub mod status {
    pub const FINISHED: u64 = 0;
    pub const RUNNING: u64 = 1;
    pub const WAITING: u64 = 2;
    pub const SUSPENDED: u64 = 3;
    pub const KILLED: u64 = 4;
}

/// Status of every coroutine ever spawned, and who awaits whom.
#[derive(Debug)]
pub struct ProcessTable {
    status: Vec<u64>,
    awaiters: HashMap<CoroutineId, Vec<CoroutineId>>,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self {
            status: vec![],
            awaiters: HashMap::new(),
        }
    }
}

impl ProcessTable {
    /// Allocate the id of a new coroutine.
    pub fn spawn(&mut self) -> CoroutineId {
        self.status.push(status::RUNNING);
        self.status.len() - 1
    }

    pub fn status(&self, co: CoroutineId) -> Option<u64> {
        self.status.get(co).copied()
    }

    pub fn set_status(&mut self, co: CoroutineId, st: u64) {
        if let Some(s) = self.status.get_mut(co) {
            *s = st;
        }
    }

    /// The coroutine will never run again.
    pub fn is_done(&self, co: CoroutineId) -> bool {
        matches!(self.status(co), Some(status::FINISHED | status::KILLED))
    }

    /// Mark `co` finished. Returns the coroutines that awaited it.
    pub fn finish(&mut self, co: CoroutineId) -> Vec<CoroutineId> {
        self.retire(co, status::FINISHED)
    }

    /// Mark `co` killed. Returns the coroutines that awaited it.
    pub fn kill(&mut self, co: CoroutineId) -> Vec<CoroutineId> {
        self.retire(co, status::KILLED)
    }

    fn retire(&mut self, co: CoroutineId, st: u64) -> Vec<CoroutineId> {
        if self.is_done(co) {
            return vec![];
        }
        self.set_status(co, st);
        self.awaiters.remove(&co).unwrap_or_default()
    }

    /// Register `waiter` to resume once `target` is done. Returns true if
    /// `target` already is.
    pub fn await_finish(&mut self, target: CoroutineId, waiter: CoroutineId) -> bool {
        if self.is_done(target) || self.status(target).is_none() {
            return true;
        }
        self.awaiters.entry(target).or_default().push(waiter);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn awaiters_are_released_once() {
        let mut t = ProcessTable::default();
        let a = t.spawn();
        let b = t.spawn();
        assert!(!t.await_finish(a, b));
        assert_eq!(t.kill(a), vec![b]);
        assert_eq!(t.status(a), Some(status::KILLED));
        assert_eq!(t.finish(a), Vec::<CoroutineId>::new());
        assert_eq!(t.status(a), Some(status::KILLED));
        assert!(t.await_finish(a, b));
    }
}
