//! Chunk manifest.
//!
//! The manifest lists every chunk in boundary order. It is persisted as one
//! document: the chunk count followed by one `chunk` compound per chunk
//! holding its id, its item count and its boundary item.

use coffer_common::{Error, Key, Result};
use coffer_document::{Document, Reader, Serializable, Writer};

/// Directory key of the manifest document.
pub(crate) fn manifest_key() -> Key {
    Key::Name("manifest".to_string())
}

/// Descriptor of one chunk.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ChunkEntry<T> {
    /// Arena slot and directory key of the chunk.
    pub id: usize,
    /// Smallest item of the chunk.
    pub boundary: T,
    /// Number of items in the chunk.
    pub len: usize,
}

impl<T: Serializable> Serializable for ChunkEntry<T> {
    fn serialize<W: Writer>(&self, writer: &mut W) -> Result<()> {
        writer.write_integer("id", to_integer(self.id)?)?;
        writer.write_integer("len", to_integer(self.len)?)?;
        writer.write_value("boundary", &self.boundary)
    }

    fn deserialize(reader: &mut Reader<'_>) -> Result<Self> {
        let id = from_integer(reader.read_integer("id")?, "id")?;
        let len = from_integer(reader.read_integer("len")?, "len")?;
        let boundary = reader.read_value("boundary")?;
        Ok(Self { id, boundary, len })
    }
}

fn to_integer(value: usize) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::InvalidInput(format!("{} is out of range", value)))
}

fn from_integer(value: i64, field: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| Error::Syntax(format!("Manifest field '{}' is negative", field)))
}

pub(crate) fn encode<T: Serializable>(entries: &[ChunkEntry<T>]) -> Result<Document> {
    let mut writer = Document::writer();
    writer.write_integer("count", to_integer(entries.len())?)?;
    for entry in entries {
        writer.write_value("chunk", entry)?;
    }
    writer.write_end()
}

pub(crate) fn decode<T: Serializable>(document: &Document) -> Result<Vec<ChunkEntry<T>>> {
    let mut reader = document.reader();
    let count = from_integer(reader.read_integer("count")?, "count")?;

    let mut entries = Vec::with_capacity(count.min(document.fields().len()));
    for _ in 0..count {
        entries.push(reader.read_value("chunk")?);
    }
    reader.read_end()?;
    Ok(entries)
}
