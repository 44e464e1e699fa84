//! Document tree and its binary encoding.
//!
//! # Encoding
//! ```text
//! document := version (1) | bincode(fields)
//! ```
//! The field list is written by bincode with fixed-width little-endian
//! integers. Floats keep their exact bit pattern, including NaN payloads.

use bincode::Options;
use serde::{Deserialize, Serialize};

use coffer_common::{Error, Reference, Result};

use crate::reader::Reader;
use crate::serializable::Serializable;
use crate::writer::DocumentWriter;

/// Encoding version byte.
pub const DOCUMENT_VERSION: u8 = 2;

/// Deepest compound nesting accepted when encoding or decoding.
pub const MAX_DEPTH: usize = 64;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

/// A single typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
    Reference(Option<Reference>),
    Compound(Vec<Field>),
}

impl Value {
    /// Human-readable kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Reference(_) => "reference",
            Value::Compound(_) => "compound",
        }
    }
}

/// A named value inside a compound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: Value,
}

/// A complete document: the root compound.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Vec<Field>,
}

/// Nesting depth of the deepest compound below `fields`.
fn depth(fields: &[Field]) -> usize {
    fields
        .iter()
        .map(|field| match &field.value {
            Value::Compound(children) => 1 + depth(children),
            _ => 0,
        })
        .max()
        .unwrap_or(0)
}

impl Document {
    pub(crate) fn from_fields(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Start writing a new document.
    pub fn writer() -> DocumentWriter {
        DocumentWriter::new()
    }

    /// Start reading this document from its first field.
    pub fn reader(&self) -> Reader<'_> {
        Reader::new(&self.fields, "")
    }

    /// Top-level fields in written order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Whether the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Serialize a value into a new document.
    pub fn from_value<T: Serializable>(value: &T) -> Result<Self> {
        let mut writer = DocumentWriter::new();
        value.serialize(&mut writer)?;
        writer.write_end()
    }

    /// Deserialize the whole document into a value.
    ///
    /// # Errors
    /// - Syntax error if the value does not consume every field
    pub fn to_value<T: Serializable>(&self) -> Result<T> {
        let mut reader = self.reader();
        let value = T::deserialize(&mut reader)?;
        reader.read_end()?;
        Ok(value)
    }

    /// Encode to bytes.
    ///
    /// # Errors
    /// - Syntax error if compounds nest deeper than [`MAX_DEPTH`]
    pub fn encode(&self) -> Result<Vec<u8>> {
        if depth(&self.fields) > MAX_DEPTH {
            return Err(Error::Syntax("Document nesting is too deep".to_string()));
        }
        let mut out = vec![DOCUMENT_VERSION];
        options()
            .serialize_into(&mut out, &self.fields)
            .map_err(|e| Error::Serialization(format!("Cannot encode document: {}", e)))?;
        Ok(out)
    }

    /// Decode bytes produced by [`encode`](Self::encode).
    ///
    /// # Errors
    /// - Truncated, malformed, over-nested or trailing bytes are reported
    ///   as corrupted data
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (version, body) = bytes
            .split_first()
            .ok_or_else(|| Error::corrupted("Document is empty"))?;
        if *version != DOCUMENT_VERSION {
            return Err(Error::corrupted(format!(
                "Unsupported document version: {}",
                version
            )));
        }

        let fields: Vec<Field> = options()
            .with_limit(body.len() as u64)
            .deserialize(body)
            .map_err(|e| Error::corrupted(format!("Malformed document: {}", e)))?;
        if depth(&fields) > MAX_DEPTH {
            return Err(Error::corrupted("Document nesting is too deep"));
        }
        Ok(Self { fields })
    }
}
