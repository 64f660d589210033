//! VP-tree: arena layout, randomized construction and branch-and-bound search.
//!
//! Each node holds a vantage point and the median distance (`radius`) from
//! it to the rest of its subset. Points no farther than `radius` go to the
//! inner child, the others to the outer child. Queries prune a child when
//! the triangle inequality proves nothing in it can beat the worst result
//! kept so far, which makes the search exact.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::distance::Metric;
use crate::error::Result;
use crate::index::{check_query, common_dimension, Candidate, Neighbor};
use crate::vector::Vector;

use super::neighbor_queue::{NeighborQueue, Ranked};

#[derive(Debug, Clone)]
struct Node {
    /// Position of the vantage point in the candidate list.
    vantage: usize,
    /// Median distance to the rest of the subset. `None` for leaves.
    radius: Option<f64>,
    inner: Option<usize>,
    outer: Option<usize>,
}

/// A vantage-point tree over an owned candidate snapshot.
#[derive(Debug)]
pub struct VpTree<P> {
    candidates: Vec<Candidate<P>>,
    nodes: Vec<Node>,
    root: Option<usize>,
    metric: Metric,
    dimension: Option<usize>,
}

impl<P> VpTree<P> {
    /// Build with vantage points drawn from entropy.
    pub fn build(candidates: Vec<Candidate<P>>, metric: Metric) -> Result<Self> {
        Self::build_with_rng(candidates, metric, &mut StdRng::from_entropy())
    }

    /// Build with a fixed seed. The same seed and input give the same tree.
    pub fn build_seeded(candidates: Vec<Candidate<P>>, metric: Metric, seed: u64) -> Result<Self> {
        Self::build_with_rng(candidates, metric, &mut StdRng::seed_from_u64(seed))
    }

    /// Build with a caller-supplied random source for vantage selection.
    pub fn build_with_rng<R: Rng>(
        candidates: Vec<Candidate<P>>,
        metric: Metric,
        rng: &mut R,
    ) -> Result<Self> {
        let dimension = common_dimension(&candidates)?;
        let mut nodes = Vec::with_capacity(candidates.len());
        let mut items: Vec<usize> = (0..candidates.len()).collect();
        let root = build_node(&mut nodes, &candidates, metric, &mut items, rng);

        Ok(Self {
            candidates,
            nodes,
            root,
            metric,
            dimension,
        })
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn candidates(&self) -> &[Candidate<P>] {
        &self.candidates
    }

    pub fn into_candidates(self) -> Vec<Candidate<P>> {
        self.candidates
    }

    /// Number of levels from the root to the deepest leaf.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack: Vec<(usize, usize)> = self.root.map(|r| (r, 1)).into_iter().collect();
        while let Some((index, level)) = stack.pop() {
            deepest = deepest.max(level);
            let node = &self.nodes[index];
            stack.extend(node.inner.map(|c| (c, level + 1)));
            stack.extend(node.outer.map(|c| (c, level + 1)));
        }
        deepest
    }

    /// The `k` best neighbors of `query`, best first.
    pub fn search(&self, query: &Vector, k: usize) -> Result<Vec<Neighbor>> {
        self.search_counting(query, k).map(|(neighbors, _)| neighbors)
    }

    /// Like [`VpTree::search`], also returning how many nodes were scored.
    pub fn search_counting(&self, query: &Vector, k: usize) -> Result<(Vec<Neighbor>, usize)> {
        check_query(query, self.dimension)?;

        // Never more hits than candidates, however large `k` is.
        let mut queue = NeighborQueue::new(k.min(self.candidates.len()));
        let mut visited = 0;
        let Some(root) = self.root.filter(|_| k > 0) else {
            return Ok((Vec::new(), visited));
        };

        // Each entry carries a lower bound on the distance from the query to
        // anything in that subtree. The bound is checked when the entry is
        // popped, against whatever the queue holds by then.
        let mut stack: Vec<(usize, f64)> = vec![(root, 0.0)];
        while let Some((index, bound)) = stack.pop() {
            if queue.is_full() {
                if let Some(tau) = queue.worst_threshold() {
                    if bound > tau {
                        continue;
                    }
                }
            }

            let node = &self.nodes[index];
            let vantage = &self.candidates[node.vantage];
            let score = self.metric.score(query, &vantage.embedding)?;
            let distance = self
                .metric
                .pruning_distance(query.as_slice(), vantage.embedding.as_slice());
            visited += 1;
            queue.offer(Ranked {
                position: node.vantage,
                score,
                key: self.metric.rank_key(score),
                threshold: self.metric.pruning_threshold(score),
            });

            let Some(radius) = node.radius else {
                continue;
            };

            // Inner points sit within `radius` of the vantage point, outer
            // points at least `radius` away.
            let inner = node.inner.map(|c| (c, bound.max(distance - radius)));
            let outer = node.outer.map(|c| (c, bound.max(radius - distance)));
            let (near, far) = if distance < radius {
                (inner, outer)
            } else {
                (outer, inner)
            };

            // Far side goes on first so the near side is explored first.
            stack.extend(far);
            stack.extend(near);
        }

        Ok((queue.into_sorted_vec(), visited))
    }
}

fn build_node<P, R: Rng>(
    nodes: &mut Vec<Node>,
    candidates: &[Candidate<P>],
    metric: Metric,
    items: &mut [usize],
    rng: &mut R,
) -> Option<usize> {
    if items.is_empty() {
        return None;
    }

    let pick = rng.gen_range(0..items.len());
    items.swap(0, pick);
    let vantage = items[0];
    let rest = &mut items[1..];

    let index = nodes.len();
    nodes.push(Node {
        vantage,
        radius: None,
        inner: None,
        outer: None,
    });
    if rest.is_empty() {
        return Some(index);
    }

    let origin = candidates[vantage].embedding.as_slice();
    let mut by_distance: Vec<(f64, usize)> = rest
        .iter()
        .map(|&p| (metric.pruning_distance(origin, candidates[p].embedding.as_slice()), p))
        .collect();
    by_distance.sort_by(|a, b| a.0.total_cmp(&b.0));

    let median = by_distance.len() / 2;
    let radius = by_distance[median].0;
    for (slot, (_, p)) in rest.iter_mut().zip(&by_distance) {
        *slot = *p;
    }

    let (inner_items, outer_items) = rest.split_at_mut(median);
    let inner = build_node(nodes, candidates, metric, inner_items, rng);
    let outer = build_node(nodes, candidates, metric, outer_items, rng);

    let node = &mut nodes[index];
    node.radius = Some(radius);
    node.inner = inner;
    node.outer = outer;
    Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flat_index::FlatIndex;
    use crate::index::Index;
    use approx::assert_relative_eq;
    use uuid::Uuid;

    fn grid(n: usize) -> Vec<Candidate<usize>> {
        (0..n)
            .map(|i| {
                let v = vec![(i % 10) as f32, (i / 10) as f32];
                Candidate::new(Uuid::new_v4(), Vector::new(v), i)
            })
            .collect()
    }

    fn random_candidates(n: usize, dim: usize, seed: u64) -> Vec<Candidate<usize>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|i| {
                let v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
                Candidate::new(Uuid::new_v4(), Vector::new(v), i)
            })
            .collect()
    }

    #[test]
    fn test_empty_tree() {
        let tree = VpTree::<()>::build(Vec::new(), Metric::L2).unwrap();
        assert_eq!(tree.depth(), 0);
        assert!(tree.search(&Vector::new(vec![1.0]), 3).unwrap().is_empty());
    }

    #[test]
    fn test_single_point_is_leaf() {
        let tree = VpTree::build(grid(1), Metric::L2).unwrap();
        assert_eq!(tree.depth(), 1);
        let results = tree.search(&Vector::new(vec![5.0, 5.0]), 3).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].position, 0);
    }

    #[test]
    fn test_every_point_is_a_node() {
        let tree = VpTree::build_seeded(grid(100), Metric::L2, 7).unwrap();
        assert_eq!(tree.nodes.len(), 100);
        let mut vantages: Vec<usize> = tree.nodes.iter().map(|n| n.vantage).collect();
        vantages.sort_unstable();
        assert_eq!(vantages, (0..100).collect::<Vec<_>>());
        // Median splits keep the tree roughly balanced.
        assert!(tree.depth() <= 10, "depth {}", tree.depth());
    }

    #[test]
    fn test_seeded_build_is_deterministic() {
        let a = VpTree::build_seeded(grid(50), Metric::L2, 42).unwrap();
        let b = VpTree::build_seeded(grid(50), Metric::L2, 42).unwrap();
        let va: Vec<usize> = a.nodes.iter().map(|n| n.vantage).collect();
        let vb: Vec<usize> = b.nodes.iter().map(|n| n.vantage).collect();
        assert_eq!(va, vb);
    }

    #[test]
    fn test_nearest_on_grid() {
        let tree = VpTree::build_seeded(grid(100), Metric::L2, 1).unwrap();
        let results = tree.search(&Vector::new(vec![3.1, 4.2]), 1).unwrap();
        assert_eq!(results[0].position, 43);
        assert_relative_eq!(
            results[0].score,
            (0.1f32 * 0.1 + 0.2 * 0.2).sqrt(),
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_matches_flat_index() {
        for metric in [Metric::L2, Metric::Cosine] {
            for seed in 0..5 {
                let candidates = random_candidates(300, 8, seed);
                let queries = random_candidates(20, 8, seed + 100);
                let flat = FlatIndex::new(candidates.clone(), metric).unwrap();
                let tree = VpTree::build_seeded(candidates, metric, seed).unwrap();

                for query in &queries {
                    let expected = flat.search(&query.embedding, 10).unwrap();
                    let actual = tree.search(&query.embedding, 10).unwrap();
                    assert_eq!(actual, expected, "metric {metric}, seed {seed}");
                }
            }
        }
    }

    #[test]
    fn test_pruning_skips_nodes() {
        let candidates = random_candidates(2000, 2, 9);
        let tree = VpTree::build_seeded(candidates, Metric::L2, 3).unwrap();
        let (results, visited) = tree
            .search_counting(&Vector::new(vec![0.25, -0.5]), 1)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(visited < 1000, "visited {visited} of 2000 nodes");
    }

    #[test]
    fn test_duplicates_and_zero_vectors() {
        let rows: Vec<Vec<f32>> = vec![
            vec![0.0, 0.0],
            vec![1.0, 1.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
            vec![-1.0, 2.0],
            vec![1.0, 1.0],
        ];
        let candidates: Vec<Candidate<usize>> = rows
            .into_iter()
            .enumerate()
            .map(|(i, v)| Candidate::new(Uuid::new_v4(), Vector::new(v), i))
            .collect();
        let query = Vector::new(vec![1.0, 1.0]);

        for metric in [Metric::L2, Metric::Cosine] {
            let flat = FlatIndex::new(candidates.clone(), metric).unwrap();
            for seed in 0..10 {
                let tree = VpTree::build_seeded(candidates.clone(), metric, seed).unwrap();
                for k in 1..=6 {
                    assert_eq!(
                        tree.search(&query, k).unwrap(),
                        flat.search(&query, k).unwrap(),
                        "metric {metric}, seed {seed}, k {k}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let tree = VpTree::build(grid(5), Metric::L2).unwrap();
        assert!(tree
            .search(&Vector::new(vec![1.0]), 1)
            .unwrap_err()
            .is_invalid_argument());
    }
}
