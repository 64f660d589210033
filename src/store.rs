//! In-memory hierarchical storage: libraries own documents, documents own chunks.
//!
//! All state sits behind a single lock. Every public method takes it once
//! for its whole duration, so each call is atomic with respect to every
//! other call. Sequences of calls are not; see [`Store::attach_chunks`].

use std::collections::HashSet;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{EntityKind, Result, VectorDbError};
use crate::models::{
    Chunk, ChunkUpdate, Document, DocumentUpdate, Library, LibraryUpdate, Metadata,
};
use crate::vector::Vector;

/// Entity counts, used by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub libraries: usize,
    pub documents: usize,
    pub chunks: usize,
}

#[derive(Debug, Default)]
struct StoreState {
    libraries: IndexMap<Uuid, Library>,
    documents: IndexMap<Uuid, Document>,
    chunks: IndexMap<Uuid, Chunk>,
}

impl StoreState {
    fn library(&self, id: Uuid) -> Result<&Library> {
        self.libraries
            .get(&id)
            .ok_or_else(|| VectorDbError::not_found(EntityKind::Library, id))
    }

    fn document(&self, id: Uuid) -> Result<&Document> {
        self.documents
            .get(&id)
            .ok_or_else(|| VectorDbError::not_found(EntityKind::Document, id))
    }

    fn document_mut(&mut self, id: Uuid) -> Result<&mut Document> {
        self.documents
            .get_mut(&id)
            .ok_or_else(|| VectorDbError::not_found(EntityKind::Document, id))
    }

    fn chunk(&self, id: Uuid) -> Result<&Chunk> {
        self.chunks
            .get(&id)
            .ok_or_else(|| VectorDbError::not_found(EntityKind::Chunk, id))
    }

    fn chunk_mut(&mut self, id: Uuid) -> Result<&mut Chunk> {
        self.chunks
            .get_mut(&id)
            .ok_or_else(|| VectorDbError::not_found(EntityKind::Chunk, id))
    }

    /// Link a chunk into a document, moving it out of any other document.
    /// Both sides are validated before either is touched.
    fn attach(&mut self, chunk_id: Uuid, document_id: Uuid) -> Result<()> {
        let library_id = self.document(document_id)?.library_id;
        let chunk = self.chunk(chunk_id)?;
        if chunk.library_id != library_id {
            return Err(VectorDbError::not_found(EntityKind::Chunk, chunk_id));
        }

        match chunk.document_id {
            Some(current) if current == document_id => return Ok(()),
            Some(current) => self.detach(chunk_id, current)?,
            None => {}
        }

        self.document_mut(document_id)?.chunk_ids.push(chunk_id);
        self.chunk_mut(chunk_id)?.document_id = Some(document_id);
        Ok(())
    }

    /// Unlink a chunk from the document it is attached to. The chunk stays
    /// in its library.
    fn detach(&mut self, chunk_id: Uuid, document_id: Uuid) -> Result<()> {
        if self.chunk(chunk_id)?.document_id != Some(document_id) {
            return Err(VectorDbError::not_found(EntityKind::Chunk, chunk_id));
        }

        self.document_mut(document_id)?
            .chunk_ids
            .retain(|id| *id != chunk_id);
        self.chunk_mut(chunk_id)?.document_id = None;
        Ok(())
    }

    fn remove_chunk(&mut self, chunk_id: Uuid) -> Result<Chunk> {
        if let Some(document_id) = self.chunk(chunk_id)?.document_id {
            self.detach(chunk_id, document_id)?;
        }
        self.chunks
            .shift_remove(&chunk_id)
            .ok_or_else(|| VectorDbError::not_found(EntityKind::Chunk, chunk_id))
    }
}

fn ensure_embedding(embedding: &Vector) -> Result<()> {
    if embedding.is_empty() {
        return Err(VectorDbError::invalid("embedding must not be empty"));
    }
    if !embedding.is_finite() {
        return Err(VectorDbError::invalid("embedding must only hold finite values"));
    }
    Ok(())
}

/// The single owner of all library, document and chunk state.
///
/// Share it between threads with an `Arc`; every method takes `&self`.
#[derive(Debug, Default)]
pub struct Store {
    state: RwLock<StoreState>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Libraries ---

    pub fn create_library(&self, name: impl Into<String>, metadata: Metadata) -> Library {
        let library = Library {
            id: Uuid::new_v4(),
            name: name.into(),
            metadata,
        };

        let mut state = self.state.write();
        state.libraries.insert(library.id, library.clone());
        debug!(library_id = %library.id, "created library");
        library
    }

    pub fn get_library(&self, id: Uuid) -> Result<Library> {
        self.state.read().library(id).cloned()
    }

    /// All libraries in creation order.
    pub fn list_libraries(&self) -> Vec<Library> {
        self.state.read().libraries.values().cloned().collect()
    }

    pub fn update_library(&self, id: Uuid, update: LibraryUpdate) -> Result<Library> {
        let mut state = self.state.write();
        let library = state
            .libraries
            .get_mut(&id)
            .ok_or_else(|| VectorDbError::not_found(EntityKind::Library, id))?;
        update.apply(library);
        Ok(library.clone())
    }

    /// Delete a library together with all of its documents and chunks.
    pub fn delete_library(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write();
        state
            .libraries
            .shift_remove(&id)
            .ok_or_else(|| VectorDbError::not_found(EntityKind::Library, id))?;

        let documents_before = state.documents.len();
        state.documents.retain(|_, document| document.library_id != id);
        let chunks_before = state.chunks.len();
        state.chunks.retain(|_, chunk| chunk.library_id != id);

        info!(
            library_id = %id,
            documents = documents_before - state.documents.len(),
            chunks = chunks_before - state.chunks.len(),
            "deleted library"
        );
        Ok(())
    }

    // --- Documents ---

    pub fn create_document(&self, library_id: Uuid, metadata: Metadata) -> Result<Document> {
        let mut state = self.state.write();
        state.library(library_id)?;

        let document = Document {
            id: Uuid::new_v4(),
            library_id,
            metadata,
            chunk_ids: Vec::new(),
        };
        state.documents.insert(document.id, document.clone());
        debug!(%library_id, document_id = %document.id, "created document");
        Ok(document)
    }

    pub fn get_document(&self, id: Uuid) -> Result<Document> {
        self.state.read().document(id).cloned()
    }

    pub fn list_documents(&self, library_id: Uuid) -> Result<Vec<Document>> {
        let state = self.state.read();
        state.library(library_id)?;
        Ok(state
            .documents
            .values()
            .filter(|document| document.library_id == library_id)
            .cloned()
            .collect())
    }

    /// Update document metadata and/or replace its chunk list.
    ///
    /// A replacement list is validated in full before anything changes:
    /// every id must name a chunk of the same library and appear once.
    /// Chunks left out of the list are detached, not deleted.
    pub fn update_document(&self, id: Uuid, update: DocumentUpdate) -> Result<Document> {
        let mut state = self.state.write();
        let library_id = state.document(id)?.library_id;

        if let Some(new_ids) = &update.chunk_ids {
            let mut wanted = HashSet::with_capacity(new_ids.len());
            for chunk_id in new_ids {
                if !wanted.insert(*chunk_id) {
                    return Err(VectorDbError::invalid(format!(
                        "chunk {chunk_id} listed more than once"
                    )));
                }
                if state.chunk(*chunk_id)?.library_id != library_id {
                    return Err(VectorDbError::not_found(EntityKind::Chunk, *chunk_id));
                }
            }

            let current = state.document(id)?.chunk_ids.clone();
            for chunk_id in current.into_iter().filter(|c| !wanted.contains(c)) {
                state.detach(chunk_id, id)?;
            }
            for chunk_id in new_ids {
                state.attach(*chunk_id, id)?;
            }
            // Same set as before, now in the caller's order.
            state.document_mut(id)?.chunk_ids = new_ids.clone();
        }

        let document = state.document_mut(id)?;
        update.apply(document);
        debug!(document_id = %id, "updated document");
        Ok(document.clone())
    }

    /// Delete a document and every chunk attached to it.
    pub fn delete_document(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write();
        let document = state
            .documents
            .shift_remove(&id)
            .ok_or_else(|| VectorDbError::not_found(EntityKind::Document, id))?;

        state.chunks.retain(|_, chunk| chunk.document_id != Some(id));
        info!(
            document_id = %id,
            chunks = document.chunk_ids.len(),
            "deleted document"
        );
        Ok(())
    }

    // --- Chunks ---

    /// Create a chunk in a library, attached to `document_id` when given.
    pub fn create_chunk(
        &self,
        library_id: Uuid,
        document_id: Option<Uuid>,
        text: impl Into<String>,
        embedding: Vector,
        metadata: Metadata,
    ) -> Result<Chunk> {
        ensure_embedding(&embedding)?;

        let mut state = self.state.write();
        state.library(library_id)?;
        if let Some(document_id) = document_id {
            if state.document(document_id)?.library_id != library_id {
                return Err(VectorDbError::not_found(EntityKind::Document, document_id));
            }
        }

        let chunk = Chunk {
            id: Uuid::new_v4(),
            library_id,
            document_id: None,
            text: text.into(),
            embedding,
            metadata,
        };
        let chunk_id = chunk.id;
        state.chunks.insert(chunk_id, chunk);
        if let Some(document_id) = document_id {
            state.attach(chunk_id, document_id)?;
        }

        debug!(%library_id, ?document_id, %chunk_id, "created chunk");
        state.chunk(chunk_id).cloned()
    }

    pub fn get_chunk(&self, id: Uuid) -> Result<Chunk> {
        self.state.read().chunk(id).cloned()
    }

    /// Apply a partial update. A `document_id` change is routed through
    /// attach/detach before the other fields are merged.
    pub fn update_chunk(&self, id: Uuid, update: ChunkUpdate) -> Result<Chunk> {
        if let Some(embedding) = &update.embedding {
            ensure_embedding(embedding)?;
        }

        let mut state = self.state.write();
        let current_document = state.chunk(id)?.document_id;
        match update.document_id {
            Some(Some(document_id)) => state.attach(id, document_id)?,
            Some(None) => {
                if let Some(document_id) = current_document {
                    state.detach(id, document_id)?;
                }
            }
            None => {}
        }

        let chunk = state.chunk_mut(id)?;
        update.apply(chunk);
        debug!(chunk_id = %id, "updated chunk");
        Ok(chunk.clone())
    }

    /// Delete a chunk, detaching it from its document first.
    pub fn delete_chunk(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write();
        state.remove_chunk(id)?;
        debug!(chunk_id = %id, "deleted chunk");
        Ok(())
    }

    pub fn attach_chunk_to_document(&self, chunk_id: Uuid, document_id: Uuid) -> Result<()> {
        let mut state = self.state.write();
        state.attach(chunk_id, document_id)?;
        debug!(%chunk_id, %document_id, "attached chunk");
        Ok(())
    }

    pub fn detach_chunk_from_document(&self, chunk_id: Uuid, document_id: Uuid) -> Result<()> {
        let mut state = self.state.write();
        state.detach(chunk_id, document_id)?;
        debug!(%chunk_id, %document_id, "detached chunk");
        Ok(())
    }

    /// Attach several chunks, one atomic call each.
    ///
    /// The sequence as a whole is not atomic: a concurrent delete can make a
    /// later step fail. Such a failure is reported as
    /// [`VectorDbError::PartialFailure`] with the number of chunks that were
    /// attached before it.
    pub fn attach_chunks(&self, document_id: Uuid, chunk_ids: &[Uuid]) -> Result<Document> {
        for (completed, chunk_id) in chunk_ids.iter().enumerate() {
            self.attach_chunk_to_document(*chunk_id, document_id)
                .map_err(|source| VectorDbError::PartialFailure {
                    completed,
                    total: chunk_ids.len(),
                    source: Box::new(source),
                })?;
        }
        self.get_document(document_id)
    }

    /// Chunks of one document, in attachment order. Empty when the document
    /// does not exist or lives in another library.
    pub fn list_chunks(&self, library_id: Uuid, document_id: Uuid) -> Vec<Chunk> {
        let state = self.state.read();
        match state.documents.get(&document_id) {
            Some(document) if document.library_id == library_id => document
                .chunk_ids
                .iter()
                .filter_map(|chunk_id| state.chunks.get(chunk_id).cloned())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Every chunk in a library, attached or not.
    pub fn list_all_chunks_in_library(&self, library_id: Uuid) -> Vec<Chunk> {
        self.state
            .read()
            .chunks
            .values()
            .filter(|chunk| chunk.library_id == library_id)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.state.read();
        StoreStats {
            libraries: state.libraries.len(),
            documents: state.documents.len(),
            chunks: state.chunks.len(),
        }
    }
}
