//! Public entry point binding one root type to XML.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use veles_model::{ObjectRef, SerializerOptions, Severity, TypeRegistry, Value};
use veles_xml::XmlDocument;

use crate::context::Context;
use crate::error::{Error, ParsingErrors, Result};
use crate::{de, ser};

/// Serializer for values of one root type.
///
/// The registry is shared; descriptors derived for one serializer are reused
/// by every other serializer built on the same registry with the same
/// options. Problems found during the last operation are available from
/// [`XmlSerializer::parsing_errors`].
pub struct XmlSerializer {
    type_name: String,
    registry: Arc<TypeRegistry>,
    options: SerializerOptions,
    errors: ParsingErrors,
}

impl XmlSerializer {
    /// Create a serializer for `type_name` with default options.
    pub fn new(type_name: impl Into<String>, registry: Arc<TypeRegistry>) -> Self {
        Self {
            type_name: type_name.into(),
            registry,
            options: SerializerOptions::default(),
            errors: ParsingErrors::new(),
        }
    }

    /// Replace the options.
    pub fn with_options(mut self, options: SerializerOptions) -> Self {
        self.options = options;
        self
    }

    /// Name of the root type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Current options.
    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    /// Registry the serializer resolves types from.
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Problems recorded by the last operation.
    pub fn parsing_errors(&self) -> &ParsingErrors {
        &self.errors
    }

    /// Run one operation with a fresh error list.
    ///
    /// Errors that escape without having been recorded, such as unknown
    /// types, are recorded before they are returned.
    fn run<T>(&mut self, op: impl FnOnce(&mut Context<'_>) -> Result<T>) -> Result<T> {
        self.errors.clear();
        let mut ctx = Context::new(&self.registry, &self.options, &mut self.errors);
        let result = op(&mut ctx);
        drop(ctx);

        if let Err(error) = &result {
            let recorded = self.errors.iter().last().is_some_and(|last| last.error == *error);
            if !recorded {
                self.errors.push(error.clone(), Severity::Error);
            }
        }
        result
    }

    /// Serialize a value into a document.
    pub fn serialize(&mut self, value: &Value) -> Result<XmlDocument> {
        let type_name = self.type_name.clone();
        tracing::debug!(type_name = %type_name, "serializing");
        self.run(|ctx| ser::serialize_document(ctx, value, &type_name))
    }

    /// Serialize a value to XML text, indented if the options ask for it.
    pub fn serialize_to_string(&mut self, value: &Value) -> Result<String> {
        let doc = self.serialize(value)?;
        let text = if self.options.pretty_print {
            doc.to_xml_string()?
        } else {
            doc.to_xml_string_compact()?
        };
        Ok(text)
    }

    /// Serialize a value to a writer.
    pub fn serialize_to_writer<W: Write>(&mut self, value: &Value, writer: W) -> Result<()> {
        let doc = self.serialize(value)?;
        doc.write_xml(writer, self.options.pretty_print)?;
        Ok(())
    }

    /// Serialize a value to a file, replacing its contents.
    pub fn serialize_to_file(&mut self, value: &Value, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        self.serialize_to_writer(value, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a value from a document.
    pub fn deserialize(&mut self, doc: &XmlDocument) -> Result<Value> {
        let type_name = self.type_name.clone();
        tracing::debug!(type_name = %type_name, "deserializing");
        self.run(|ctx| de::deserialize_document(ctx, doc, &type_name, None))
    }

    /// Read a document into an existing object, keeping members the document
    /// does not mention.
    pub fn deserialize_into(&mut self, doc: &XmlDocument, target: &ObjectRef) -> Result<Value> {
        let type_name = self.type_name.clone();
        tracing::debug!(type_name = %type_name, "deserializing into existing object");
        self.run(|ctx| de::deserialize_document(ctx, doc, &type_name, Some(target.clone())))
    }

    /// Read a value from XML text.
    ///
    /// Text that is not well-formed is reported as
    /// [`Error::BadlyFormedXml`]; when the policy does not throw, the result
    /// is null.
    pub fn deserialize_from_str(&mut self, xml: &str) -> Result<Value> {
        match XmlDocument::parse(xml) {
            Ok(doc) => self.deserialize(&doc),
            Err(e) => self.badly_formed(e),
        }
    }

    /// Read a value from a reader.
    pub fn deserialize_from_reader<R: Read>(&mut self, reader: R) -> Result<Value> {
        match XmlDocument::read_from(reader) {
            Ok(doc) => self.deserialize(&doc),
            Err(veles_xml::Error::Io(e)) => Err(Error::Io(e.to_string())),
            Err(e) => self.badly_formed(e),
        }
    }

    /// Read a value from a file.
    pub fn deserialize_from_file(&mut self, path: impl AsRef<Path>) -> Result<Value> {
        let file = File::open(path.as_ref())?;
        self.deserialize_from_reader(BufReader::new(file))
    }

    fn badly_formed(&mut self, e: veles_xml::Error) -> Result<Value> {
        tracing::debug!(error = %e, "input is not well-formed");
        self.run(|ctx| {
            ctx.report(Error::BadlyFormedXml(e.to_string()), Severity::Error)?;
            Ok(Value::Null)
        })
    }
}

impl std::fmt::Debug for XmlSerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlSerializer")
            .field("type_name", &self.type_name)
            .field("options", &self.options)
            .field("errors", &self.errors.len())
            .finish()
    }
}
