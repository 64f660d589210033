//! Brute-force flat index: O(n) k-NN search

use rayon::prelude::*;

use crate::distance::Metric;
use crate::error::Result;
use crate::index::{check_query, common_dimension, sort_neighbors, Candidate, Hit, Index, Neighbor};
use crate::vector::Vector;

/// A flat (brute-force) index that scores every candidate.
#[derive(Debug)]
pub struct FlatIndex<P> {
    candidates: Vec<Candidate<P>>,
    metric: Metric,
}

impl<P> FlatIndex<P> {
    /// Wrap a candidate snapshot. All embeddings must share one length.
    pub fn new(candidates: Vec<Candidate<P>>, metric: Metric) -> Result<Self> {
        common_dimension(&candidates)?;
        Ok(Self { candidates, metric })
    }
}

impl<P: Sync> Index<P> for FlatIndex<P> {
    fn search(&self, query: &Vector, k: usize) -> Result<Vec<Neighbor>> {
        check_query(query, self.dimension())?;

        // Scores come back in candidate order, which the stable ordering relies on.
        let scores: Vec<f32> = self
            .candidates
            .par_iter()
            .map(|c| self.metric.score(query, &c.embedding))
            .collect::<Result<Vec<_>>>()?;

        let mut results: Vec<Neighbor> = scores
            .into_iter()
            .enumerate()
            .map(|(position, score)| Neighbor { position, score })
            .collect();

        sort_neighbors(&mut results, self.metric);
        results.truncate(k);
        Ok(results)
    }

    fn candidates(&self) -> &[Candidate<P>] {
        &self.candidates
    }

    fn into_candidates(self) -> Vec<Candidate<P>> {
        self.candidates
    }

    fn metric(&self) -> Metric {
        self.metric
    }
}

/// Score every candidate and return the best `min(k, n)` hits.
pub fn brute_force_knn<P: Sync>(
    query: &Vector,
    candidates: Vec<Candidate<P>>,
    k: usize,
    metric: Metric,
) -> Result<Vec<Hit<P>>> {
    FlatIndex::new(candidates, metric)?.knn(query, k)
}
