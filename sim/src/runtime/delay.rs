use super::CoroutineId;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Coroutines waiting for simulation time to advance. Entries due at the
/// same time come out in the order they were pushed.
#[derive(Debug, Default)]
pub struct DelayedQueue {
    heap: BinaryHeap<Reverse<(u64, u64, CoroutineId)>>,
    seq: u64,
}

impl DelayedQueue {
    pub fn push(&mut self, time: u64, co: CoroutineId) {
        self.heap.push(Reverse((time, self.seq, co)));
        self.seq += 1;
    }

    /// Earliest time some coroutine wakes up.
    pub fn next_time(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse((t, _, _))| *t)
    }

    /// Remove every entry due at or before `time`.
    pub fn pop_due(&mut self, time: u64) -> Vec<CoroutineId> {
        let mut out = vec![];
        while let Some(Reverse((t, _, co))) = self.heap.peek() {
            if *t > time {
                break;
            }
            out.push(*co);
            self.heap.pop();
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_entries_keep_push_order() {
        let mut q = DelayedQueue::default();
        q.push(10, 1);
        q.push(5, 2);
        q.push(10, 3);
        q.push(5, 4);
        assert_eq!(q.next_time(), Some(5));
        assert_eq!(q.pop_due(5), vec![2, 4]);
        assert_eq!(q.pop_due(9), Vec::<CoroutineId>::new());
        assert_eq!(q.pop_due(10), vec![1, 3]);
        assert!(q.is_empty());
    }
}
