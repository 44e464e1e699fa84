//! Ordered document reader.

use coffer_common::{Error, Reference, Result};

use crate::serializable::Serializable;
use crate::value::{Field, Value};

/// Reads the fields of one compound strictly in written order.
///
/// Each `read_*` call must name the next unread field. Skipping a field,
/// reading one twice, reading past the end, or reading a field as the
/// wrong kind fails with [`Error::Syntax`] and leaves the position unchanged.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    fields: &'a [Field],
    position: usize,
    path: String,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(fields: &'a [Field], path: &str) -> Self {
        Self {
            fields,
            position: 0,
            path: path.to_string(),
        }
    }

    fn location(&self, name: &str) -> String {
        format!("{}/{}", self.path, name)
    }

    fn peek(&self, name: &str) -> Result<&'a Value> {
        match self.fields.get(self.position) {
            None => Err(Error::Syntax(format!(
                "Expected field '{}' but {} has no more fields",
                self.location(name),
                if self.path.is_empty() { "/" } else { self.path.as_str() }
            ))),
            Some(field) if field.name != name => Err(Error::Syntax(format!(
                "Expected field '{}' but found '{}'",
                self.location(name),
                self.location(&field.name)
            ))),
            Some(field) => Ok(&field.value),
        }
    }

    fn mismatch(&self, name: &str, expected: &str, found: &Value) -> Error {
        Error::Syntax(format!(
            "Field '{}' is {}, not {}",
            self.location(name),
            found.kind(),
            expected
        ))
    }

    pub fn read_integer(&mut self, name: &str) -> Result<i64> {
        match self.peek(name)? {
            Value::Integer(v) => {
                self.position += 1;
                Ok(*v)
            }
            other => Err(self.mismatch(name, "integer", other)),
        }
    }

    pub fn read_float(&mut self, name: &str) -> Result<f64> {
        match self.peek(name)? {
            Value::Float(v) => {
                self.position += 1;
                Ok(*v)
            }
            other => Err(self.mismatch(name, "float", other)),
        }
    }

    pub fn read_string(&mut self, name: &str) -> Result<String> {
        match self.peek(name)? {
            Value::String(v) => {
                self.position += 1;
                Ok(v.clone())
            }
            other => Err(self.mismatch(name, "string", other)),
        }
    }

    pub fn read_reference(&mut self, name: &str) -> Result<Option<Reference>> {
        match self.peek(name)? {
            Value::Reference(v) => {
                self.position += 1;
                Ok(*v)
            }
            other => Err(self.mismatch(name, "reference", other)),
        }
    }

    /// Open the next field as a nested compound.
    ///
    /// The returned reader should be finished with [`read_end`](Self::read_end).
    pub fn read_compound(&mut self, name: &str) -> Result<Reader<'a>> {
        match self.peek(name)? {
            Value::Compound(fields) => {
                self.position += 1;
                Ok(Reader::new(fields, &self.location(name)))
            }
            other => Err(self.mismatch(name, "compound", other)),
        }
    }

    /// Read a nested compound as a serializable value.
    pub fn read_value<T: Serializable>(&mut self, name: &str) -> Result<T> {
        let mut compound = self.read_compound(name)?;
        let value = T::deserialize(&mut compound)?;
        compound.read_end()?;
        Ok(value)
    }

    /// Whether every field has been consumed.
    pub fn is_end(&self) -> bool {
        self.position >= self.fields.len()
    }

    /// Assert that every field has been consumed.
    pub fn read_end(&self) -> Result<()> {
        match self.fields.get(self.position) {
            None => Ok(()),
            Some(field) => Err(Error::Syntax(format!(
                "Unread field '{}' at end of compound",
                self.location(&field.name)
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Document;
    use crate::writer::Writer;

    fn transaction() -> Document {
        let mut writer = Document::writer();
        writer.write_reference("id", Some(Reference::new(17))).unwrap();
        writer.write_integer("amount", -1250).unwrap();
        writer.write_string("payee", "Grocer").unwrap();
        {
            let mut meta = writer.write_compound("meta").unwrap();
            meta.write_float("confidence", 0.75).unwrap();
            meta.write_end().unwrap();
        }
        writer.write_end().unwrap()
    }

    #[test]
    fn test_reads_in_order() {
        let document = transaction();
        let mut reader = document.reader();

        assert_eq!(reader.read_reference("id").unwrap(), Some(Reference::new(17)));
        assert_eq!(reader.read_integer("amount").unwrap(), -1250);
        assert_eq!(reader.read_string("payee").unwrap(), "Grocer");
        let mut meta = reader.read_compound("meta").unwrap();
        assert_eq!(meta.read_float("confidence").unwrap(), 0.75);
        assert!(meta.is_end());
        meta.read_end().unwrap();
        assert!(reader.is_end());
        reader.read_end().unwrap();
    }

    #[test]
    fn test_out_of_order_read_fails() {
        let document = transaction();
        let mut reader = document.reader();

        let err = reader.read_integer("amount").unwrap_err();
        assert!(matches!(err, Error::Syntax(ref m) if m.contains("/amount") && m.contains("/id")));
        // position unchanged after the failure
        assert!(reader.read_reference("id").is_ok());
    }

    #[test]
    fn test_duplicate_read_fails() {
        let document = transaction();
        let mut reader = document.reader();

        reader.read_reference("id").unwrap();
        assert!(matches!(reader.read_reference("id"), Err(Error::Syntax(_))));
    }

    #[test]
    fn test_missing_field_fails() {
        let document = transaction();
        let mut reader = document.reader();
        reader.read_reference("id").unwrap();
        reader.read_integer("amount").unwrap();
        reader.read_string("payee").unwrap();
        reader.read_compound("meta").unwrap();

        assert!(matches!(reader.read_string("note"), Err(Error::Syntax(_))));
    }

    #[test]
    fn test_wrong_kind_fails() {
        let document = transaction();
        let mut reader = document.reader();

        let err = reader.read_integer("id").unwrap_err();
        assert!(matches!(err, Error::Syntax(ref m) if m.contains("reference")));
        assert!(matches!(reader.read_compound("id"), Err(Error::Syntax(_))));
    }

    #[test]
    fn test_read_end_with_unread_fields_fails() {
        let document = transaction();
        let mut reader = document.reader();
        reader.read_reference("id").unwrap();

        assert!(!reader.is_end());
        assert!(matches!(reader.read_end(), Err(Error::Syntax(_))));
    }

    #[test]
    fn test_nested_read_end_fails_on_leftovers() {
        let document = transaction();
        let mut reader = document.reader();
        reader.read_reference("id").unwrap();
        reader.read_integer("amount").unwrap();
        reader.read_string("payee").unwrap();
        let meta = reader.read_compound("meta").unwrap();

        let err = meta.read_end().unwrap_err();
        assert!(matches!(err, Error::Syntax(ref m) if m.contains("/meta/confidence")));
    }
}
