//! VP-tree (vantage-point tree) index module.
//!
//! The tree is rebuilt from a fresh candidate snapshot for every query and
//! answers exactly: for the same metric and candidates it returns the same
//! neighbors as [`FlatIndex`](crate::flat_index::FlatIndex).

pub mod neighbor_queue;
pub mod tree;

pub use tree::VpTree;

use crate::distance::Metric;
use crate::error::Result;
use crate::index::{Candidate, Hit, Index, Neighbor};
use crate::vector::Vector;

impl<P> Index<P> for VpTree<P> {
    fn search(&self, query: &Vector, k: usize) -> Result<Vec<Neighbor>> {
        VpTree::search(self, query, k)
    }

    fn candidates(&self) -> &[Candidate<P>] {
        VpTree::candidates(self)
    }

    fn into_candidates(self) -> Vec<Candidate<P>> {
        VpTree::into_candidates(self)
    }

    fn metric(&self) -> Metric {
        VpTree::metric(self)
    }

    fn dimension(&self) -> Option<usize> {
        VpTree::dimension(self)
    }
}

/// Build a tree over `candidates` and return the best `min(k, n)` hits.
/// With a seed the vantage points, and so the traversal, are reproducible.
pub fn vptree_knn<P>(
    query: &Vector,
    candidates: Vec<Candidate<P>>,
    k: usize,
    metric: Metric,
    seed: Option<u64>,
) -> Result<Vec<Hit<P>>> {
    let tree = match seed {
        Some(seed) => VpTree::build_seeded(candidates, metric, seed)?,
        None => VpTree::build(candidates, metric)?,
    };
    tree.knn(query, k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use uuid::Uuid;

    #[test]
    fn test_vptree_via_trait() {
        let candidates: Vec<Candidate<&str>> = [
            ("x", vec![1.0, 0.0, 0.0]),
            ("y", vec![0.0, 1.0, 0.0]),
            ("xy", vec![1.0, 1.0, 0.0]),
        ]
        .into_iter()
        .map(|(name, v)| Candidate::new(Uuid::new_v4(), Vector::new(v), name))
        .collect();

        let hits = vptree_knn(&Vector::new(vec![1.0, 0.0, 0.0]), candidates, 2, Metric::L2, Some(3))
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].payload, "x"); // exact match
        assert!(hits[0].score < 1e-6);
        assert_eq!(hits[1].payload, "xy");
        assert_relative_eq!(hits[1].score, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_huge_k_returns_every_candidate() {
        let candidates: Vec<Candidate<usize>> = (0..3)
            .map(|i| Candidate::new(Uuid::new_v4(), Vector::new(vec![i as f32, 0.0]), i))
            .collect();

        let hits = vptree_knn(&Vector::new(vec![0.0, 0.0]), candidates, usize::MAX, Metric::L2, Some(1))
            .unwrap();

        let order: Vec<usize> = hits.iter().map(|h| h.payload).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_vptree_len_and_dimension() {
        let candidates: Vec<Candidate<()>> = (0..4)
            .map(|i| Candidate::new(Uuid::new_v4(), Vector::new(vec![i as f32, 1.0]), ()))
            .collect();
        let tree = VpTree::build(candidates, Metric::Cosine).unwrap();

        assert_eq!(Index::len(&tree), 4);
        assert_eq!(Index::dimension(&tree), Some(2));
        assert!(!Index::is_empty(&tree));
    }
}
