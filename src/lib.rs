//! # libvecdb
//!
//! An in-memory vector store organised as libraries, documents and chunks,
//! with exact k-nearest-neighbor search.
//!
//! This library provides:
//! - A hierarchical store with cascade deletes and bidirectional
//!   document/chunk links
//! - Cosine similarity and Euclidean (L2) distance
//! - Brute-force and VP-tree search that return identical results
//! - An HTTP adapter over the store and search engine
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use libvecdb::{Metadata, SearchEngine, SearchRequest, SearchScope, Store, Vector};
//!
//! let store = Arc::new(Store::new());
//! let library = store.create_library("papers", Metadata::new());
//! let document = store.create_document(library.id, Metadata::new()).unwrap();
//! store
//!     .create_chunk(library.id, Some(document.id), "hello", Vector::new(vec![1.0, 0.0]), Metadata::new())
//!     .unwrap();
//!
//! let engine = SearchEngine::new(store);
//! let request = SearchRequest::new(SearchScope::Library(library.id), Vector::new(vec![1.0, 0.1]), 5);
//! let results = engine.search(&request).unwrap();
//! assert_eq!(results.len(), 1);
//! ```

pub mod config;
pub mod distance;
pub mod error;
pub mod flat_index;
pub mod index;
pub mod metrics;
pub mod models;
pub mod search;
pub mod server;
pub mod store;
pub mod vector;
pub mod vptree;

pub use config::{Config, SearchConfig};
pub use distance::Metric;
pub use error::{EntityKind, Result, VectorDbError};
pub use flat_index::FlatIndex;
pub use index::{Candidate, Hit, Index};
pub use models::{Chunk, ChunkUpdate, Document, DocumentUpdate, Library, LibraryUpdate, Metadata};
pub use search::{Algorithm, SearchEngine, SearchRequest, SearchResult, SearchScope};
pub use store::{Store, StoreStats};
pub use vector::Vector;
pub use vptree::VpTree;
