//! Capability trait for values persisted through the document codec.

use coffer_common::{Reference, Result};

use crate::reader::Reader;
use crate::writer::Writer;

/// A value that can be written to and read back from a document.
///
/// `deserialize` must read exactly the fields `serialize` wrote, in the
/// same order. Callers assert the end of the compound.
pub trait Serializable: Sized {
    fn serialize<W: Writer>(&self, writer: &mut W) -> Result<()>;

    fn deserialize(reader: &mut Reader<'_>) -> Result<Self>;
}

impl Serializable for i64 {
    fn serialize<W: Writer>(&self, writer: &mut W) -> Result<()> {
        writer.write_integer("value", *self)
    }

    fn deserialize(reader: &mut Reader<'_>) -> Result<Self> {
        reader.read_integer("value")
    }
}

impl Serializable for f64 {
    fn serialize<W: Writer>(&self, writer: &mut W) -> Result<()> {
        writer.write_float("value", *self)
    }

    fn deserialize(reader: &mut Reader<'_>) -> Result<Self> {
        reader.read_float("value")
    }
}

impl Serializable for String {
    fn serialize<W: Writer>(&self, writer: &mut W) -> Result<()> {
        writer.write_string("value", self)
    }

    fn deserialize(reader: &mut Reader<'_>) -> Result<Self> {
        reader.read_string("value")
    }
}

impl Serializable for Reference {
    fn serialize<W: Writer>(&self, writer: &mut W) -> Result<()> {
        writer.write_reference("value", Some(*self))
    }

    fn deserialize(reader: &mut Reader<'_>) -> Result<Self> {
        reader.read_reference("value")?.ok_or_else(|| {
            coffer_common::Error::Syntax("Reference field 'value' is null".to_string())
        })
    }
}
