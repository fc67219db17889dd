use smallvec::SmallVec;

/// Fixed size bit vector with one bit per trigger of a region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerVec {
    words: SmallVec<[u64; 2]>,
    len: usize,
}

impl TriggerVec {
    pub fn new(len: usize) -> Self {
        Self {
            words: SmallVec::from_elem(0, len.div_ceil(64)),
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn set(&mut self, idx: usize, value: bool) {
        if idx >= self.len {
            return;
        }
        let bit = 1u64 << (idx % 64);
        if value {
            self.words[idx / 64] |= bit;
        } else {
            self.words[idx / 64] &= !bit;
        }
    }

    pub fn get(&self, idx: usize) -> bool {
        idx < self.len && self.words[idx / 64] & (1u64 << (idx % 64)) != 0
    }

    /// Some bit is set.
    pub fn any(&self) -> bool {
        self.words.iter().any(|w| *w != 0)
    }

    /// Some bit of `gate` is set.
    pub fn any_of(&self, gate: &[usize]) -> bool {
        gate.iter().any(|idx| self.get(*idx))
    }

    /// `self |= other`
    pub fn or_assign(&mut self, other: &TriggerVec) {
        for (w, o) in self.words.iter_mut().zip(other.words.iter()) {
            *w |= *o;
        }
    }

    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// Indices of the set bits in increasing order.
    pub fn set_bits(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|idx| self.get(*idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_past_one_word() {
        let mut v = TriggerVec::new(70);
        assert!(!v.any());
        v.set(3, true);
        v.set(67, true);
        v.set(80, true);
        assert!(v.get(67));
        assert!(!v.get(80));
        assert!(v.any_of(&[1, 67]));
        assert!(!v.any_of(&[1, 2]));
        assert_eq!(v.set_bits().collect::<Vec<_>>(), vec![3, 67]);

        let mut acc = TriggerVec::new(70);
        acc.set(1, true);
        acc.or_assign(&v);
        assert_eq!(acc.set_bits().collect::<Vec<_>>(), vec![1, 3, 67]);
        acc.clear();
        assert!(!acc.any());
    }
}
