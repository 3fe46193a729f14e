//! Document and note storage
//!
//! Key-value collaborators with read-your-writes semantics. The in-memory
//! implementations back the server; a durable store only has to implement
//! the traits.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use crate::error::Result;
use crate::model::{Document, DocumentInfo, Note};

/// Storage for extracted document text
pub trait DocumentStore: Send + Sync {
    /// Insert or replace a document
    fn put(&self, document: Document) -> Result<DocumentInfo>;

    fn get(&self, id: &str) -> Result<Option<Document>>;

    /// All documents, ordered by id
    fn list(&self) -> Result<Vec<DocumentInfo>>;

    /// Remove a document; returns whether it existed
    fn delete(&self, id: &str) -> Result<bool>;
}

/// Storage for research notes
pub trait NoteStore: Send + Sync {
    fn save(&self, note: Note) -> Result<Note>;

    /// Notes in creation order, optionally filtered by tag
    fn list(&self, tag: Option<&str>) -> Result<Vec<Note>>;
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<BTreeMap<String, Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn put(&self, document: Document) -> Result<DocumentInfo> {
        let info = document.info();
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(document.id.clone(), document);
        Ok(info)
    }

    fn get(&self, id: &str) -> Result<Option<Document>> {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        Ok(documents.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<DocumentInfo>> {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        Ok(documents.values().map(Document::info).collect())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let removed = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        Ok(removed.is_some())
    }
}

#[derive(Default)]
pub struct MemoryNoteStore {
    notes: RwLock<Vec<Note>>,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NoteStore for MemoryNoteStore {
    fn save(&self, note: Note) -> Result<Note> {
        self.notes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(note.clone());
        Ok(note)
    }

    fn list(&self, tag: Option<&str>) -> Result<Vec<Note>> {
        let notes = self.notes.read().unwrap_or_else(PoisonError::into_inner);
        Ok(notes
            .iter()
            .filter(|n| tag.is_none_or(|t| n.has_tag(t)))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documents_replace_by_id() {
        let store = MemoryDocumentStore::new();
        store.put(Document::new("d1", "a.txt", "first")).unwrap();
        store.put(Document::new("d1", "a.txt", "second version")).unwrap();

        assert_eq!(store.get("d1").unwrap().unwrap().text, "second version");
        assert_eq!(store.list().unwrap().len(), 1);
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_delete_document() {
        let store = MemoryDocumentStore::new();
        store.put(Document::new("d1", "a.txt", "text")).unwrap();

        assert!(store.delete("d1").unwrap());
        assert!(!store.delete("d1").unwrap());
        assert!(store.get("d1").unwrap().is_none());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_notes_filter_by_tag() {
        let store = MemoryNoteStore::new();
        store.save(Note::new("a", "x", vec!["Biology".into()])).unwrap();
        store.save(Note::new("b", "y", vec![])).unwrap();

        assert_eq!(store.list(None).unwrap().len(), 2);
        let tagged = store.list(Some("biology")).unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].title, "a");
    }
}
