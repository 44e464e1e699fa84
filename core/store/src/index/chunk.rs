//! Chunk residency and chunk documents.
//!
//! A chunk document holds the item count followed by one `item` compound
//! per item, in sorted order.

use coffer_common::{Error, Key, Result};
use coffer_document::{Document, Serializable, Writer};

/// Residency of one arena slot.
pub(crate) enum Slot<T> {
    /// Not used by any chunk; its id is on the free list.
    Free,
    /// Persisted and not loaded.
    Unloaded,
    /// Loaded and identical to the persisted chunk.
    Clean(Vec<T>),
    /// Loaded and modified since the last flush.
    Dirty(Vec<T>),
}

impl<T> Slot<T> {
    pub(crate) fn is_resident(&self) -> bool {
        matches!(self, Slot::Clean(_) | Slot::Dirty(_))
    }
}

/// Directory key of the chunk with arena id `id`.
pub(crate) fn chunk_key(id: usize) -> Key {
    Key::reference(id as u64)
}

/// Loaded items of slot `id`.
pub(crate) fn resident<T>(slots: &[Slot<T>], id: usize) -> Result<&Vec<T>> {
    match slots.get(id) {
        Some(Slot::Clean(items)) | Some(Slot::Dirty(items)) => Ok(items),
        _ => Err(Error::Storage(format!("Chunk {} is not loaded", id))),
    }
}

/// Loaded items of slot `id`, marking the chunk dirty.
pub(crate) fn resident_mut<T>(slots: &mut [Slot<T>], id: usize) -> Result<&mut Vec<T>> {
    let slot = slots
        .get_mut(id)
        .ok_or_else(|| Error::Storage(format!("Chunk {} does not exist", id)))?;
    if let Slot::Clean(items) = slot {
        *slot = Slot::Dirty(std::mem::take(items));
    }
    match slot {
        Slot::Dirty(items) => Ok(items),
        _ => Err(Error::Storage(format!("Chunk {} is not loaded", id))),
    }
}

pub(crate) fn encode<T: Serializable>(items: &[T]) -> Result<Document> {
    let mut writer = Document::writer();
    writer.write_integer("count", items.len() as i64)?;
    for item in items {
        writer.write_value("item", item)?;
    }
    writer.write_end()
}

pub(crate) fn decode<T: Serializable>(document: &Document) -> Result<Vec<T>> {
    let mut reader = document.reader();
    let count = usize::try_from(reader.read_integer("count")?)
        .map_err(|_| Error::Syntax("Negative chunk item count".to_string()))?;

    let mut items = Vec::with_capacity(count.min(document.fields().len()));
    for _ in 0..count {
        items.push(reader.read_value("item")?);
    }
    reader.read_end()?;
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_document_roundtrip() {
        let items: Vec<i64> = vec![-5, 0, 0, 9];
        let document = encode(&items).unwrap();
        let decoded = Document::decode(&document.encode().unwrap()).unwrap();
        assert_eq!(decode::<i64>(&decoded).unwrap(), items);
    }

    #[test]
    fn test_count_mismatch_is_syntax_error() {
        let mut writer = Document::writer();
        writer.write_integer("count", 2).unwrap();
        writer.write_value("item", &1i64).unwrap();
        let document = writer.write_end().unwrap();
        assert!(matches!(decode::<i64>(&document), Err(Error::Syntax(_))));

        let mut writer = Document::writer();
        writer.write_integer("count", -1).unwrap();
        let document = writer.write_end().unwrap();
        assert!(matches!(decode::<i64>(&document), Err(Error::Syntax(_))));
    }

    #[test]
    fn test_resident_mut_marks_dirty() {
        let mut slots = vec![Slot::Unloaded, Slot::Clean(vec![1i64])];
        assert!(resident(&slots, 0).is_err());
        resident_mut(&mut slots, 1).unwrap().push(2);
        assert!(matches!(&slots[1], Slot::Dirty(items) if items == &vec![1, 2]));
        assert!(resident_mut(&mut slots, 5).is_err());
    }
}
