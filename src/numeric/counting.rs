//! Counter helpers on `Int64s`

use super::Int64s;

impl Int64s {
    /// Zero and truncate, keeping the allocation
    pub fn reset(&mut self) {
        self.0.clear();
    }

    /// Mutable slot at `idx`, growing with zeros if needed
    pub fn at(&mut self, idx: usize) -> &mut i64 {
        self.ensure(idx + 1);
        &mut self.0[idx]
    }

    /// Element-wise accumulate `other`, growing to its length
    pub fn add(&mut self, other: &Int64s) {
        self.ensure(other.len());
        for (slot, value) in self.0.iter_mut().zip(other.iter()) {
            *slot += value;
        }
    }

    /// Largest element, or -1 when there is none larger
    pub fn max(&self) -> i64 {
        self.0.iter().copied().fold(-1, i64::max)
    }

    fn ensure(&mut self, len: usize) {
        if self.0.len() < len {
            self.0.resize(len, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_grows() {
        let mut counts = Int64s::default();
        *counts.at(3) += 2;
        assert_eq!(counts.0, vec![0, 0, 0, 2]);
        *counts.at(0) += 1;
        assert_eq!(counts.0, vec![1, 0, 0, 2]);
    }

    #[test]
    fn test_add_accumulates() {
        let mut counts = Int64s(vec![1, 1]);
        counts.add(&Int64s(vec![2, 3, 4]));
        assert_eq!(counts.0, vec![3, 4, 4]);

        counts.add(&Int64s(vec![10]));
        assert_eq!(counts.0, vec![13, 4, 4]);
    }

    #[test]
    fn test_max_and_reset() {
        let mut counts = Int64s(vec![5, 9, 2]);
        assert_eq!(counts.max(), 9);
        counts.reset();
        assert!(counts.is_empty());
        assert_eq!(counts.max(), -1);
    }
}
