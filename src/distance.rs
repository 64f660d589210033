//! Distance and similarity metrics for vector search

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, VectorDbError};
use crate::vector::Vector;
use serde::{Deserialize, Serialize};

/// Slack on f32 scores when they are compared against f64 geometry.
const SCORE_SLACK: f64 = 1e-5;

/// Metrics a search can rank by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Cosine similarity. Higher is better.
    Cosine,
    /// Euclidean distance. Lower is better.
    L2,
}

impl Metric {
    /// Score `candidate` against `query` with this metric.
    ///
    /// Fails with [`VectorDbError::DimensionMismatch`] instead of comparing a
    /// prefix of the longer vector.
    pub fn score(&self, query: &Vector, candidate: &Vector) -> Result<f32> {
        if !query.has_same_dimension(candidate) {
            return Err(VectorDbError::DimensionMismatch {
                expected: query.dimension(),
                actual: candidate.dimension(),
            });
        }

        match self {
            Metric::Cosine => Ok(cosine_similarity(query, candidate)),
            Metric::L2 => Ok(l2_distance(query, candidate)),
        }
    }

    /// Whether a higher score means a closer match.
    pub fn is_similarity(&self) -> bool {
        matches!(self, Metric::Cosine)
    }

    /// Map a score onto a key where smaller always ranks first.
    /// Negating an f32 is exact, so this never merges distinct scores.
    pub fn rank_key(&self, score: f32) -> f32 {
        if self.is_similarity() {
            -score
        } else {
            score
        }
    }

    /// Order two scores best-first.
    pub fn compare(&self, a: f32, b: f32) -> Ordering {
        self.rank_key(a).total_cmp(&self.rank_key(b))
    }

    /// A true metric (triangle inequality holds) that orders candidates the
    /// same way as [`Metric::score`]. Used for VP-tree partitioning and
    /// pruning, never reported to callers.
    ///
    /// For cosine this is the angle between the vectors. Zero vectors sit at
    /// a right angle to everything, matching the `0.0` similarity they score.
    pub fn pruning_distance(&self, a: &[f32], b: &[f32]) -> f64 {
        match self {
            Metric::L2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| {
                    let d = f64::from(*x) - f64::from(*y);
                    d * d
                })
                .sum::<f64>()
                .sqrt(),
            Metric::Cosine => {
                let (mut dot, mut sum_sq_a, mut sum_sq_b) = (0.0f64, 0.0f64, 0.0f64);
                for (x, y) in a.iter().zip(b) {
                    let (x, y) = (f64::from(*x), f64::from(*y));
                    dot += x * y;
                    sum_sq_a += x * x;
                    sum_sq_b += y * y;
                }
                if sum_sq_a == 0.0 || sum_sq_b == 0.0 {
                    return std::f64::consts::FRAC_PI_2;
                }
                let cos = dot / (sum_sq_a.sqrt() * sum_sq_b.sqrt());
                cos.clamp(-1.0, 1.0).acos()
            }
        }
    }

    /// Upper bound on the pruning distance of any candidate that scores at
    /// least as well as `score`.
    ///
    /// Scores are f32 while [`Metric::pruning_distance`] is f64, and near a
    /// cosine of 1 a tiny score difference is a large angle. The slack is
    /// applied in score space so it covers f32 rounding at every angle.
    pub fn pruning_threshold(&self, score: f32) -> f64 {
        let score = f64::from(score);
        match self {
            Metric::L2 => score * (1.0 + SCORE_SLACK) + SCORE_SLACK,
            Metric::Cosine => (score - SCORE_SLACK).clamp(-1.0, 1.0).acos(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::L2 => "l2",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = VectorDbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cosine" => Ok(Metric::Cosine),
            "l2" => Ok(Metric::L2),
            other => Err(VectorDbError::invalid(format!("unknown metric: {other}"))),
        }
    }
}

/// Cosine similarity `dot(a, b) / (|a| * |b|)`.
///
/// Returns `0.0` when either vector has zero norm, even though the inputs
/// are not orthogonal in any meaningful sense.
pub fn cosine_similarity(v1: &Vector, v2: &Vector) -> f32 {
    let (mut dot, mut sum_sq_a, mut sum_sq_b) = (0.0f32, 0.0f32, 0.0f32);
    for (a, b) in v1.as_slice().iter().zip(v2.as_slice()) {
        dot += a * b;
        sum_sq_a += a * a;
        sum_sq_b += b * b;
    }

    if sum_sq_a == 0.0 || sum_sq_b == 0.0 {
        return 0.0;
    }

    dot / (sum_sq_a.sqrt() * sum_sq_b.sqrt())
}

/// Compute Euclidean (L2) distance between two vectors
pub fn l2_distance(v1: &Vector, v2: &Vector) -> f32 {
    v1.as_slice()
        .iter()
        .zip(v2.as_slice().iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_l2_distance() {
        let v1 = Vector::new(vec![1.0, 2.0, 3.0]);
        let v2 = Vector::new(vec![4.0, 5.0, 6.0]);
        assert_relative_eq!(l2_distance(&v1, &v2), 5.196152, epsilon = 1e-5);
    }

    #[test]
    fn test_l2_same_vector() {
        let v = Vector::new(vec![1.0, 2.0, 3.0]);
        assert_relative_eq!(l2_distance(&v, &v), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_cosine_identical() {
        let v1 = Vector::new(vec![1.0, 0.0, 0.0]);
        let v2 = Vector::new(vec![2.0, 0.0, 0.0]);
        assert_relative_eq!(cosine_similarity(&v1, &v2), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let v1 = Vector::new(vec![1.0, 0.0, 0.0]);
        let v2 = Vector::new(vec![0.0, 1.0, 0.0]);
        assert_relative_eq!(cosine_similarity(&v1, &v2), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let v1 = Vector::new(vec![1.0, 0.0, 0.0]);
        let v2 = Vector::new(vec![-1.0, 0.0, 0.0]);
        assert_relative_eq!(cosine_similarity(&v1, &v2), -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector_is_zero() {
        let zero = Vector::new(vec![0.0, 0.0, 0.0]);
        let v = Vector::new(vec![0.3, -2.0, 7.5]);
        assert_eq!(cosine_similarity(&zero, &v), 0.0);
        assert_eq!(cosine_similarity(&v, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let v1 = Vector::new(vec![1.0, 2.0]);
        let v2 = Vector::new(vec![1.0, 2.0, 3.0]);
        for metric in [Metric::Cosine, Metric::L2] {
            assert!(matches!(
                metric.score(&v1, &v2),
                Err(VectorDbError::DimensionMismatch {
                    expected: 2,
                    actual: 3
                })
            ));
        }
    }

    #[test]
    fn test_compare_direction() {
        assert_eq!(Metric::Cosine.compare(0.9, 0.1), Ordering::Less);
        assert_eq!(Metric::L2.compare(0.9, 0.1), Ordering::Greater);
        assert_eq!(Metric::L2.compare(0.5, 0.5), Ordering::Equal);
    }

    #[test]
    fn test_parse_metric() {
        assert_eq!("cosine".parse::<Metric>().unwrap(), Metric::Cosine);
        assert_eq!("l2".parse::<Metric>().unwrap(), Metric::L2);
        let err = "dot".parse::<Metric>().unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_angular_pruning_distance() {
        let a = [1.0, 0.0];
        let b = [0.0, 3.0];
        let d = Metric::Cosine.pruning_distance(&a, &b);
        assert_relative_eq!(d, std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(Metric::Cosine.pruning_distance(&a, &a), 0.0, epsilon = 1e-12);
        assert_relative_eq!(
            Metric::Cosine.pruning_distance(&a, &[0.0, 0.0]),
            std::f64::consts::FRAC_PI_2,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_pruning_threshold_covers_score() {
        let a = [1.0, 0.0];
        let b = [0.6, 0.8];
        let score = Metric::Cosine.score(&Vector::new(a.to_vec()), &Vector::new(b.to_vec())).unwrap();
        assert!(Metric::Cosine.pruning_threshold(score) > Metric::Cosine.pruning_distance(&a, &b));
        // A zero vector scores 0.0 and sits at a right angle.
        assert!(Metric::Cosine.pruning_threshold(0.0) > std::f64::consts::FRAC_PI_2);
        assert!(Metric::L2.pruning_threshold(2.0) > 2.0);
    }
}
