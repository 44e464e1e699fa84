//! Strict, order-verified document codec.
//!
//! Every persisted value is written through a [`Writer`] and read back
//! through a [`Reader`] in exactly the same field order. Reads that skip,
//! repeat or reorder fields fail with [`coffer_common::Error::Syntax`].
//!
//! The in-memory form is a [`Document`]; its byte encoding lives in
//! [`value`] and is independent of the writer/reader protocol.

pub mod reader;
pub mod serializable;
pub mod value;
pub mod writer;

pub use reader::Reader;
pub use serializable::Serializable;
pub use value::{Document, Field, Value};
pub use writer::{CompoundWriter, DocumentWriter, Writer};
