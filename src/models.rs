//! Library, document and chunk entities plus their partial updates.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::vector::Vector;

/// Open key/value metadata attached to every entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Metadata {
    fields: HashMap<String, Value>,
}

impl Metadata {
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// True when every entry of `filter` is present here with an equal value.
    /// An empty filter matches everything.
    pub fn matches(&self, filter: &Metadata) -> bool {
        filter
            .iter()
            .all(|(key, value)| self.fields.get(key) == Some(value))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut metadata = Metadata::new();
        for (key, value) in iter {
            metadata.insert(key, value);
        }
        metadata
    }
}

/// Top-level collection scoping documents and chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub id: Uuid,
    pub name: String,
    pub metadata: Metadata,
}

/// An ordered grouping of chunks within a library.
///
/// `chunk_ids` is kept in attachment order and always equals the set of
/// chunks whose `document_id` points here. Only the store mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub library_id: Uuid,
    pub metadata: Metadata,
    pub chunk_ids: Vec<Uuid>,
}

/// Text plus embedding, optionally attached to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub library_id: Uuid,
    /// `None` means detached: still library-scoped, in no document.
    pub document_id: Option<Uuid>,
    pub text: String,
    pub embedding: Vector,
    pub metadata: Metadata,
}

/// Partial update for a library. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryUpdate {
    pub name: Option<String>,
    pub metadata: Option<Metadata>,
}

impl LibraryUpdate {
    pub fn apply(self, library: &mut Library) {
        if let Some(name) = self.name {
            library.name = name;
        }
        if let Some(metadata) = self.metadata {
            library.metadata = metadata;
        }
    }
}

/// Partial update for a document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentUpdate {
    pub metadata: Option<Metadata>,
    /// Replaces the whole chunk list. The store applies this through
    /// attach/detach so both sides of the relation move together.
    pub chunk_ids: Option<Vec<Uuid>>,
}

impl DocumentUpdate {
    /// Merge the plain fields. `chunk_ids` is not touched here.
    pub fn apply(&self, document: &mut Document) {
        if let Some(metadata) = &self.metadata {
            document.metadata = metadata.clone();
        }
    }
}

/// Partial update for a chunk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkUpdate {
    pub text: Option<String>,
    pub embedding: Option<Vector>,
    pub metadata: Option<Metadata>,
    /// `Some(Some(id))` moves the chunk into document `id`,
    /// `Some(None)` detaches it, `None` leaves the parent alone.
    #[serde(default, deserialize_with = "present_or_null")]
    pub document_id: Option<Option<Uuid>>,
}

impl ChunkUpdate {
    /// Merge the plain fields. `document_id` is not touched here.
    pub fn apply(&self, chunk: &mut Chunk) {
        if let Some(text) = &self.text {
            chunk.text = text.clone();
        }
        if let Some(embedding) = &self.embedding {
            chunk.embedding = embedding.clone();
        }
        if let Some(metadata) = &self.metadata {
            chunk.metadata = metadata.clone();
        }
    }
}

// A field that is present deserializes to `Some`, even when it is `null`.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
