use crate::TermId;
use serde::{Deserialize, Serialize};

/// Non-zero term weights of one document, sorted by term index.
///
/// At most one entry exists per term and no entry has a weight of exactly zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SparseVector {
    entries: Vec<(TermId, f32)>,
}

impl SparseVector {
    pub fn new() -> Self { Self::default() }

    /// Build from arbitrary pairs. Repeated terms are summed, zeros dropped.
    pub fn from_entries<I: IntoIterator<Item = (TermId, f32)>>(entries: I) -> Self {
        let mut raw: Vec<(TermId, f32)> = entries.into_iter().collect();
        raw.sort_by_key(|&(t, _)| t);
        let mut merged: Vec<(TermId, f32)> = Vec::with_capacity(raw.len());
        for (term, weight) in raw {
            match merged.last_mut() {
                Some((last, w)) if *last == term => *w += weight,
                _ => merged.push((term, weight)),
            }
        }
        merged.retain(|&(_, w)| w != 0.0);
        Self { entries: merged }
    }

    pub fn get(&self, term: TermId) -> Option<f32> {
        self.entries
            .binary_search_by_key(&term, |&(t, _)| t)
            .ok()
            .map(|i| self.entries[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TermId, f32)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Euclidean norm.
    pub fn norm(&self) -> f32 {
        self.entries.iter().map(|&(_, w)| w * w).sum::<f32>().sqrt()
    }

    /// Scale to unit length. Empty vectors stay empty.
    pub fn l2_normalize(&mut self) {
        let norm = self.norm();
        if norm == 0.0 { return; }
        for (_, w) in self.entries.iter_mut() {
            *w /= norm;
        }
    }

    /// Merge-join dot product over the two sorted entry lists.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0f32;
        while i < self.entries.len() && j < other.entries.len() {
            let (ta, wa) = self.entries[i];
            let (tb, wb) = other.entries[j];
            if ta == tb {
                sum += wa * wb;
                i += 1;
                j += 1;
            } else if ta < tb {
                i += 1;
            } else {
                j += 1;
            }
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_duplicates_and_drops_zeros() {
        let v = SparseVector::from_entries(vec![(3, 0.5), (1, 0.0), (3, 0.25), (2, 1.0)]);
        assert_eq!(v.iter().collect::<Vec<_>>(), vec![(2, 1.0), (3, 0.75)]);
        assert_eq!(v.get(1), None);
        assert_eq!(v.get(3), Some(0.75));
    }

    #[test]
    fn normalizes_to_unit_length() {
        let mut v = SparseVector::from_entries(vec![(0, 3.0), (7, 4.0)]);
        assert!((v.norm() - 5.0).abs() < 1e-6);
        v.l2_normalize();
        assert!((v.norm() - 1.0).abs() < 1e-6);
        assert!((v.get(0).unwrap() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn dot_only_counts_shared_terms() {
        let a = SparseVector::from_entries(vec![(0, 1.0), (2, 2.0), (5, 1.0)]);
        let b = SparseVector::from_entries(vec![(2, 3.0), (4, 9.0), (5, 0.5)]);
        assert!((a.dot(&b) - 6.5).abs() < 1e-6);
        assert_eq!(a.dot(&SparseVector::new()), 0.0);
    }
}
