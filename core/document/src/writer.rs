//! Ordered document writers.
//!
//! A [`DocumentWriter`] owns a stack of open compounds. Opening a compound
//! hands out a [`CompoundWriter`] that mutably borrows its parent, so the
//! parent cannot be written to or ended while the child is alive. A child
//! dropped without [`CompoundWriter::write_end`] poisons the whole document:
//! every later write, and the final `write_end`, fails with a syntax error.

use coffer_common::{Error, Reference, Result};

use crate::serializable::Serializable;
use crate::value::{Document, Field, Value};

struct Frame {
    name: String,
    fields: Vec<Field>,
}

/// Shared state behind a document and all of its open compounds.
pub struct WriterState {
    stack: Vec<Frame>,
    poisoned: Option<String>,
}

impl WriterState {
    fn new() -> Self {
        Self {
            stack: vec![Frame {
                name: String::new(),
                fields: Vec::new(),
            }],
            poisoned: None,
        }
    }

    fn check(&self, name: &str) -> Result<()> {
        if let Some(reason) = &self.poisoned {
            return Err(Error::Syntax(reason.clone()));
        }
        if name.is_empty() {
            return Err(Error::Syntax("Field name cannot be empty".to_string()));
        }
        Ok(())
    }

    fn push(&mut self, name: &str, value: Value) -> Result<()> {
        self.check(name)?;
        let frame = self
            .stack
            .last_mut()
            .ok_or_else(|| Error::Syntax("Document already ended".to_string()))?;
        frame.fields.push(Field {
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    fn open(&mut self, name: &str) -> Result<usize> {
        self.check(name)?;
        self.stack.push(Frame {
            name: name.to_string(),
            fields: Vec::new(),
        });
        Ok(self.stack.len())
    }

    fn close(&mut self, depth: usize) -> Result<()> {
        if let Some(reason) = &self.poisoned {
            return Err(Error::Syntax(reason.clone()));
        }
        if self.stack.len() != depth || depth < 2 {
            return Err(Error::Syntax(format!(
                "Compound ended at depth {} while {} are open",
                depth,
                self.stack.len()
            )));
        }
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| Error::Syntax("No open compound".to_string()))?;
        self.push(&frame.name, Value::Compound(frame.fields))
    }

    fn abandon(&mut self, depth: usize) {
        if self.poisoned.is_none() {
            let name = self
                .stack
                .get(depth - 1)
                .map(|frame| frame.name.clone())
                .unwrap_or_default();
            self.poisoned = Some(format!("Compound '{}' was not ended", name));
        }
        self.stack.truncate(depth - 1);
    }
}

/// Writes fields in the order they will later be read.
pub trait Writer {
    #[doc(hidden)]
    fn state(&mut self) -> &mut WriterState;

    fn write_integer(&mut self, name: &str, value: i64) -> Result<()> {
        self.state().push(name, Value::Integer(value))
    }

    fn write_float(&mut self, name: &str, value: f64) -> Result<()> {
        self.state().push(name, Value::Float(value))
    }

    fn write_string(&mut self, name: &str, value: &str) -> Result<()> {
        self.state().push(name, Value::String(value.to_string()))
    }

    fn write_reference(&mut self, name: &str, value: Option<Reference>) -> Result<()> {
        self.state().push(name, Value::Reference(value))
    }

    /// Open a nested compound. It must be closed with
    /// [`CompoundWriter::write_end`] before this writer is used again.
    fn write_compound(&mut self, name: &str) -> Result<CompoundWriter<'_>> {
        let depth = self.state().open(name)?;
        Ok(CompoundWriter {
            state: self.state(),
            depth,
            ended: false,
        })
    }

    /// Write a serializable value as a nested compound.
    fn write_value<T: Serializable>(&mut self, name: &str, value: &T) -> Result<()>
    where
        Self: Sized,
    {
        let mut compound = self.write_compound(name)?;
        value.serialize(&mut compound)?;
        compound.write_end()
    }
}

/// Root writer of a document.
pub struct DocumentWriter {
    state: WriterState,
}

impl DocumentWriter {
    /// Create an empty document writer.
    pub fn new() -> Self {
        Self {
            state: WriterState::new(),
        }
    }

    /// Finish the document.
    ///
    /// # Errors
    /// - Syntax error if any nested compound was dropped without being ended
    pub fn write_end(mut self) -> Result<Document> {
        if let Some(reason) = self.state.poisoned.take() {
            return Err(Error::Syntax(reason));
        }
        match self.state.stack.pop() {
            Some(root) if self.state.stack.is_empty() => Ok(Document::from_fields(root.fields)),
            _ => Err(Error::Syntax("Document ended with open compounds".to_string())),
        }
    }
}

impl Default for DocumentWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer for DocumentWriter {
    fn state(&mut self) -> &mut WriterState {
        &mut self.state
    }
}

/// Writer for a nested compound; borrows its parent until ended.
pub struct CompoundWriter<'a> {
    state: &'a mut WriterState,
    depth: usize,
    ended: bool,
}

impl CompoundWriter<'_> {
    /// Close this compound and return control to the parent.
    pub fn write_end(mut self) -> Result<()> {
        self.ended = true;
        self.state.close(self.depth)
    }
}

impl Writer for CompoundWriter<'_> {
    fn state(&mut self) -> &mut WriterState {
        &mut *self.state
    }
}

impl Drop for CompoundWriter<'_> {
    fn drop(&mut self) {
        if !self.ended {
            self.state.abandon(self.depth);
        }
    }
}
