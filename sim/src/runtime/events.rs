use super::CoroutineId;
use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use std::collections::VecDeque;
use std::hash::Hash;

/// Tracks which coroutines wait on which events.
///
/// Firing an event commits its current waiters to resume; coroutines that
/// start waiting afterwards only see the next firing. An event also stays
/// triggered until simulation time advances, which is what `ev.triggered`
/// style reads observe.
#[derive(Debug)]
pub struct EventDispatcher<K> {
    waiting: HashMap<K, VecDeque<CoroutineId>>,
    triggered: HashSet<K>,
    /// Coroutines released by fired events, in firing order.
    fired: Vec<CoroutineId>,
}

impl<K> Default for EventDispatcher<K> {
    fn default() -> Self {
        Self {
            waiting: HashMap::new(),
            triggered: HashSet::new(),
            fired: vec![],
        }
    }
}

impl<K: Hash + Eq + Copy> EventDispatcher<K> {
    /// Suspend `co` until `ev` fires.
    pub fn wait(&mut self, ev: K, co: CoroutineId) {
        let queue = self.waiting.entry(ev).or_default();
        if !queue.contains(&co) {
            queue.push_back(co);
        }
    }

    pub fn fire(&mut self, ev: K) {
        self.triggered.insert(ev);
        let Some(queue) = self.waiting.remove(&ev) else {
            return;
        };
        for co in queue {
            if !self.fired.contains(&co) {
                self.fired.push(co);
            }
        }
        // A coroutine resumes once even if it waited on several events.
        for co in self.fired.clone() {
            self.cancel(co);
        }
    }

    pub fn is_triggered(&self, ev: &K) -> bool {
        self.triggered.contains(ev)
    }

    /// Some coroutine is ready because of a fired event.
    pub fn has_pending(&self) -> bool {
        !self.fired.is_empty()
    }

    /// Take the coroutines released since the last call, oldest first.
    pub fn resume_triggered(&mut self) -> Vec<CoroutineId> {
        std::mem::take(&mut self.fired)
    }

    /// Forget which events fired during the current time step.
    pub fn reset_triggered(&mut self) {
        self.triggered.clear();
    }

    /// Drop every wait registration of `co`.
    pub fn cancel(&mut self, co: CoroutineId) {
        self.waiting.retain(|_, queue| {
            queue.retain(|c| *c != co);
            !queue.is_empty()
        });
    }

    /// Drop `co` entirely, including a pending resumption.
    pub fn forget(&mut self, co: CoroutineId) {
        self.cancel(co);
        self.fired.retain(|c| *c != co);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waiters_resume_once_in_order() {
        let mut d: EventDispatcher<u32> = EventDispatcher::default();
        d.wait(1, 10);
        d.wait(2, 11);
        d.wait(2, 10);
        d.wait(1, 12);
        d.fire(2);
        d.fire(1);
        assert!(d.has_pending());
        assert_eq!(d.resume_triggered(), vec![11, 10, 12]);
        assert!(!d.has_pending());
        assert!(d.is_triggered(&1));
        d.reset_triggered();
        assert!(!d.is_triggered(&1));
    }

    #[test]
    fn late_waiters_miss_the_firing() {
        let mut d: EventDispatcher<u32> = EventDispatcher::default();
        d.fire(7);
        d.wait(7, 1);
        assert!(!d.has_pending());
        d.fire(7);
        assert_eq!(d.resume_triggered(), vec![1]);
    }

    #[test]
    fn forgotten_coroutines_do_not_resume() {
        let mut d: EventDispatcher<u32> = EventDispatcher::default();
        d.wait(1, 3);
        d.wait(1, 4);
        d.fire(1);
        d.forget(3);
        assert_eq!(d.resume_triggered(), vec![4]);
    }
}
