//! Search orchestration: resolve a scope to candidate chunks, run the chosen
//! engine, and pair each hit with its chunk.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::distance::Metric;
use crate::error::{EntityKind, Result, VectorDbError};
use crate::flat_index::brute_force_knn;
use crate::index::Candidate;
use crate::models::{Chunk, Metadata};
use crate::store::Store;
use crate::vector::Vector;
use crate::vptree::vptree_knn;

/// Which engine answers a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Score every candidate.
    #[default]
    Brute,
    /// Build a VP-tree over the candidates and search it with pruning.
    VpTree,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Brute => "brute",
            Algorithm::VpTree => "vptree",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = VectorDbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "brute" => Ok(Algorithm::Brute),
            "vptree" => Ok(Algorithm::VpTree),
            other => Err(VectorDbError::invalid(format!("unknown algorithm: {other}"))),
        }
    }
}

/// The set of chunks a query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Every chunk in the library, attached to a document or not.
    Library(Uuid),
    /// The chunks of one document.
    Document { library_id: Uuid, document_id: Uuid },
}

/// A k-NN query.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query_embedding: Vector,
    pub k: usize,
    pub metric: Metric,
    pub algorithm: Algorithm,
    pub scope: SearchScope,
    /// Only chunks whose metadata contains every entry here are scored.
    pub filter: Option<Metadata>,
}

impl SearchRequest {
    /// A cosine, brute-force query with no filter.
    pub fn new(scope: SearchScope, query_embedding: Vector, k: usize) -> Self {
        Self {
            query_embedding,
            k,
            metric: Metric::Cosine,
            algorithm: Algorithm::Brute,
            scope,
            filter: None,
        }
    }

    pub fn metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn filter(mut self, filter: Metadata) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// One hit: the matched chunk and its score. Higher is closer for cosine,
/// lower is closer for L2.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub score: f32,
}

/// Runs searches against a shared [`Store`].
#[derive(Debug, Clone)]
pub struct SearchEngine {
    store: Arc<Store>,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_config(store, SearchConfig::default())
    }

    pub fn with_config(store: Arc<Store>, config: SearchConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Run `request` and return hits best first.
    ///
    /// Candidates are copied out of the store first; scoring runs without
    /// holding the store lock, so concurrent writes only affect later calls.
    pub fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        if request.k == 0 {
            return Err(VectorDbError::invalid("k must be greater than zero"));
        }
        let query = &request.query_embedding;
        if query.is_empty() {
            return Err(VectorDbError::invalid("query embedding must not be empty"));
        }
        if !query.is_finite() {
            return Err(VectorDbError::invalid("query embedding must only hold finite values"));
        }

        let mut chunks = self.candidates(request.scope)?;
        if let Some(filter) = &request.filter {
            chunks.retain(|chunk| chunk.metadata.matches(filter));
        }
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(bad) = chunks
            .iter()
            .find(|chunk| !chunk.embedding.has_same_dimension(query))
        {
            return Err(VectorDbError::DimensionMismatch {
                expected: query.dimension(),
                actual: bad.embedding.dimension(),
            });
        }

        let candidate_count = chunks.len();
        let candidates: Vec<Candidate<Chunk>> = chunks
            .into_iter()
            .map(|chunk| Candidate::new(chunk.id, chunk.embedding.clone(), chunk))
            .collect();

        let start = Instant::now();
        let hits = match request.algorithm {
            Algorithm::Brute => brute_force_knn(query, candidates, request.k, request.metric)?,
            Algorithm::VpTree => vptree_knn(
                query,
                candidates,
                request.k,
                request.metric,
                self.config.vptree_seed,
            )?,
        };
        debug!(
            algorithm = %request.algorithm,
            metric = %request.metric,
            candidates = candidate_count,
            hits = hits.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "search complete"
        );

        Ok(hits
            .into_iter()
            .map(|hit| SearchResult {
                chunk: hit.payload,
                score: hit.score,
            })
            .collect())
    }

    fn candidates(&self, scope: SearchScope) -> Result<Vec<Chunk>> {
        match scope {
            SearchScope::Library(library_id) => {
                self.store.get_library(library_id)?;
                Ok(self.store.list_all_chunks_in_library(library_id))
            }
            SearchScope::Document {
                library_id,
                document_id,
            } => {
                self.store.get_library(library_id)?;
                if self.store.get_document(document_id)?.library_id != library_id {
                    return Err(VectorDbError::not_found(EntityKind::Document, document_id));
                }
                Ok(self.store.list_chunks(library_id, document_id))
            }
        }
    }
}
