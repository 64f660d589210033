//! Index trait for pluggable k-NN engines

use uuid::Uuid;

use crate::distance::Metric;
use crate::error::{Result, VectorDbError};
use crate::vector::Vector;

/// One searchable item: an id, its embedding and whatever the caller wants
/// back with a hit.
#[derive(Debug, Clone)]
pub struct Candidate<P> {
    pub id: Uuid,
    pub embedding: Vector,
    pub payload: P,
}

impl<P> Candidate<P> {
    pub fn new(id: Uuid, embedding: Vector, payload: P) -> Self {
        Self {
            id,
            embedding,
            payload,
        }
    }
}

/// A ranked result: the candidate's id, its score and its payload.
#[derive(Debug, Clone)]
pub struct Hit<P> {
    pub id: Uuid,
    pub score: f32,
    pub payload: P,
}

/// Position of a candidate in the index plus the score it got.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub score: f32,
}

/// A k-NN engine built over an owned snapshot of candidates.
///
/// Implementations rank by the index metric, best first. Equal scores are
/// ordered by candidate position, so results are deterministic and agree
/// across engines.
pub trait Index<P>: Sized {
    /// The `k` best neighbors of `query`, best first.
    fn search(&self, query: &Vector, k: usize) -> Result<Vec<Neighbor>>;

    fn candidates(&self) -> &[Candidate<P>];

    fn into_candidates(self) -> Vec<Candidate<P>>;

    /// The metric used by this index.
    fn metric(&self) -> Metric;

    /// Embedding length shared by every candidate, `None` when empty.
    fn dimension(&self) -> Option<usize> {
        self.candidates().first().map(|c| c.embedding.dimension())
    }

    /// The number of candidates in this index.
    fn len(&self) -> usize {
        self.candidates().len()
    }

    /// Whether the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Search and hand back the payloads of the winners.
    fn knn(self, query: &Vector, k: usize) -> Result<Vec<Hit<P>>> {
        let neighbors = self.search(query, k)?;
        let mut slots: Vec<Option<Candidate<P>>> =
            self.into_candidates().into_iter().map(Some).collect();

        Ok(neighbors
            .into_iter()
            .filter_map(|n| {
                slots
                    .get_mut(n.position)
                    .and_then(Option::take)
                    .map(|c| Hit {
                        id: c.id,
                        score: n.score,
                        payload: c.payload,
                    })
            })
            .collect())
    }
}

/// Check that all candidates share one embedding length.
pub(crate) fn common_dimension<P>(candidates: &[Candidate<P>]) -> Result<Option<usize>> {
    let Some(first) = candidates.first() else {
        return Ok(None);
    };
    let expected = first.embedding.dimension();
    if expected == 0 {
        return Err(VectorDbError::invalid("embedding must not be empty"));
    }
    if let Some(bad) = candidates
        .iter()
        .find(|c| c.embedding.dimension() != expected)
    {
        return Err(VectorDbError::DimensionMismatch {
            expected,
            actual: bad.embedding.dimension(),
        });
    }
    Ok(Some(expected))
}

/// Reject a query whose length differs from the indexed embeddings.
pub(crate) fn check_query(query: &Vector, dimension: Option<usize>) -> Result<()> {
    if query.is_empty() {
        return Err(VectorDbError::invalid("query embedding must not be empty"));
    }
    if !query.is_finite() {
        return Err(VectorDbError::invalid("query embedding must only hold finite values"));
    }
    match dimension {
        Some(expected) if expected != query.dimension() => Err(VectorDbError::DimensionMismatch {
            expected,
            actual: query.dimension(),
        }),
        _ => Ok(()),
    }
}

/// Best first by `metric`, ties by position.
pub(crate) fn sort_neighbors(neighbors: &mut [Neighbor], metric: Metric) {
    neighbors.sort_by(|a, b| {
        metric
            .compare(a.score, b.score)
            .then_with(|| a.position.cmp(&b.position))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(values: &[f32]) -> Candidate<()> {
        Candidate::new(Uuid::new_v4(), Vector::new(values.to_vec()), ())
    }

    #[test]
    fn test_common_dimension() {
        assert_eq!(common_dimension::<()>(&[]).unwrap(), None);
        let same = vec![candidate(&[1.0, 2.0]), candidate(&[3.0, 4.0])];
        assert_eq!(common_dimension(&same).unwrap(), Some(2));

        let mixed = vec![candidate(&[1.0, 2.0]), candidate(&[3.0])];
        assert!(matches!(
            common_dimension(&mixed),
            Err(VectorDbError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_check_query() {
        assert!(check_query(&Vector::new(vec![1.0]), None).is_ok());
        assert!(check_query(&Vector::new(vec![]), None)
            .unwrap_err()
            .is_invalid_argument());
        assert!(check_query(&Vector::new(vec![1.0]), Some(2))
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn test_sort_neighbors_ties_by_position() {
        let mut neighbors = vec![
            Neighbor { position: 2, score: 0.5 },
            Neighbor { position: 0, score: 0.5 },
            Neighbor { position: 1, score: 0.9 },
        ];
        sort_neighbors(&mut neighbors, Metric::Cosine);
        let order: Vec<usize> = neighbors.iter().map(|n| n.position).collect();
        assert_eq!(order, vec![1, 0, 2]);

        sort_neighbors(&mut neighbors, Metric::L2);
        let order: Vec<usize> = neighbors.iter().map(|n| n.position).collect();
        assert_eq!(order, vec![0, 2, 1]);
    }
}
