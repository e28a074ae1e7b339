//! State shared by one serialization or deserialization run.

use std::sync::Arc;

use veles_model::{
    canonical_name, CollectionAttr, DictionaryAttr, MemberDescriptor, NamespaceDecl, Placement,
    SerializationContext, SerializerOptions, Severity, TextEmbedding, TypeDescriptor, TypeRegistry,
};
use veles_xml::{NodeId, XName, XmlDocument};

use crate::error::{Error, ParsingErrors, Result};

/// Namespace of the metadata attributes written by the serializer.
pub const META_NAMESPACE: &str = "urn:veles:meta";

/// Preferred prefix for [`META_NAMESPACE`].
pub const META_PREFIX: &str = "veles";

/// Local name of the attribute recording a value's runtime type.
pub const REAL_TYPE_ATTRIBUTE: &str = "realtype";

/// Local name of the attribute recording a multi-dimensional array's dimensions.
pub const DIMENSIONS_ATTRIBUTE: &str = "dims";

/// Qualified name of the runtime type attribute.
pub fn real_type_attribute() -> XName {
    XName::qualified(META_NAMESPACE, REAL_TYPE_ATTRIBUTE)
}

/// Qualified name of the array dimensions attribute.
pub fn dimensions_attribute() -> XName {
    XName::qualified(META_NAMESPACE, DIMENSIONS_ATTRIBUTE)
}

/// How a value is laid out where it is written or read.
///
/// Members carry layout overrides (format, collection and dictionary shape,
/// text embedding); collection items and dictionary slots inherit only the
/// format.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Layout<'m> {
    pub member: Option<&'m MemberDescriptor>,
    pub format: Option<&'m str>,
    pub collection: Option<&'m CollectionAttr>,
    pub dictionary: Option<&'m DictionaryAttr>,
    pub embedding: TextEmbedding,
    pub not_collection: bool,
    /// Remove the element again if all of its members were left out.
    pub prunable: bool,
    /// Value to fall back to when text cannot be parsed.
    pub default: Option<&'m veles_model::Value>,
}

impl<'m> Layout<'m> {
    pub fn of(member: &'m MemberDescriptor) -> Self {
        Self {
            member: Some(member),
            format: member.format.as_deref(),
            collection: member.collection.as_ref(),
            dictionary: member.dictionary.as_ref(),
            embedding: member.text_embedding,
            not_collection: member.not_collection,
            prunable: true,
            default: None,
        }
    }

    /// Layout of a collection item or dictionary slot.
    pub fn item(format: Option<&'m str>) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    /// Name used in diagnostics: the member name, or the type name.
    pub fn subject(&self, desc: &TypeDescriptor) -> String {
        match self.member {
            Some(m) => m.name.clone(),
            None => desc.name.clone(),
        }
    }
}

/// Key or value node of a dictionary pair.
pub(crate) struct Slot<'m> {
    pub name: XName,
    pub placement: Placement,
    pub format: Option<&'m str>,
}

impl<'m> Slot<'m> {
    pub fn key(attr: &'m DictionaryAttr) -> Self {
        Self {
            name: attr.key_name(),
            placement: attr.key_placement,
            format: attr.key_format.as_deref(),
        }
    }

    pub fn value(attr: &'m DictionaryAttr) -> Self {
        Self {
            name: attr.value_name(),
            placement: attr.value_placement,
            format: attr.value_format.as_deref(),
        }
    }
}

pub(crate) struct Context<'a> {
    pub registry: &'a TypeRegistry,
    pub options: &'a SerializerOptions,
    errors: &'a mut ParsingErrors,
    /// Reference objects currently being written, by identity.
    in_progress: Vec<usize>,
    depth: usize,
    /// `(uri, prefix)` in order of first use.
    namespaces: Vec<(String, Option<String>)>,
}

impl<'a> Context<'a> {
    pub fn new(registry: &'a TypeRegistry, options: &'a SerializerOptions, errors: &'a mut ParsingErrors) -> Self {
        Self {
            registry,
            options,
            errors,
            in_progress: Vec::new(),
            depth: 0,
            namespaces: Vec::new(),
        }
    }

    pub fn descriptor(&self, name: &str) -> Result<Arc<TypeDescriptor>> {
        Ok(self.registry.descriptor(name, self.options)?)
    }

    pub fn is_assignable(&self, runtime: &str, declared: &str) -> bool {
        self.registry.is_assignable(runtime, declared)
    }

    pub fn serialization_context<'d>(
        &'d self,
        desc: &'d TypeDescriptor,
        member: Option<&'d MemberDescriptor>,
    ) -> SerializationContext<'d> {
        SerializationContext {
            type_descriptor: desc,
            member,
            options: self.options,
        }
    }

    /// Record a problem and decide whether it aborts the operation.
    ///
    /// Problems of [`Severity::Ignore`] are dropped. Everything else is
    /// recorded, and returned as `Err` if the exception policy throws at
    /// this severity.
    pub fn report(&mut self, error: Error, severity: Severity) -> Result<()> {
        if severity == Severity::Ignore {
            tracing::trace!(%error, "ignored problem");
            return Ok(());
        }

        tracing::warn!(?severity, %error, "recorded problem");
        self.errors.push(error.clone(), severity);
        if self.options.exception_policy.should_throw(severity) {
            Err(error)
        } else {
            Ok(())
        }
    }

    /// Record a problem at the options' default severity.
    pub fn report_default(&mut self, error: Error) -> Result<()> {
        let severity = self.options.default_severity;
        self.report(error, severity)
    }

    /// Record a problem that always aborts, whatever the policy.
    pub fn fail(&mut self, error: Error) -> Error {
        tracing::warn!(%error, "operation aborted");
        self.errors.push(error.clone(), Severity::Error);
        error
    }

    /// Go one level deeper. Returns `false` once the recursion limit is passed;
    /// [`Context::leave`] must be called either way.
    pub fn enter(&mut self) -> bool {
        self.depth += 1;
        !self.options.depth_exceeded(self.depth)
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn is_in_progress(&self, id: usize) -> bool {
        self.in_progress.contains(&id)
    }

    pub fn push_object(&mut self, id: usize) {
        self.in_progress.push(id);
    }

    pub fn pop_object(&mut self) {
        self.in_progress.pop();
    }

    /// Whether metadata attributes may be written for values of `desc`.
    pub fn metadata_allowed(&self, desc: &TypeDescriptor) -> bool {
        !self.options.suppress_metadata && !desc.suppress_metadata
    }

    /// Remember a namespace so it is declared on the root element.
    pub fn declare_namespace(&mut self, decl: &NamespaceDecl) {
        if self.namespaces.iter().any(|(uri, _)| *uri == decl.uri) {
            return;
        }

        let prefix = decl.prefix.as_ref().map(|preferred| {
            let taken = |p: &str| {
                self.namespaces
                    .iter()
                    .any(|(_, existing)| existing.as_deref() == Some(p))
            };
            let mut prefix = preferred.clone();
            let mut n = 1;
            while taken(&prefix) {
                prefix = format!("{}{}", preferred, n);
                n += 1;
            }
            prefix
        });
        self.namespaces.push((decl.uri.clone(), prefix));
    }

    pub fn declare_meta_namespace(&mut self) {
        self.declare_namespace(&NamespaceDecl {
            prefix: Some(META_PREFIX.to_string()),
            uri: META_NAMESPACE.to_string(),
        });
    }

    /// Write the collected namespace declarations onto the root element.
    ///
    /// A namespace without a prefix becomes the default namespace only when
    /// the root element itself lives in it; other unprefixed namespaces are
    /// bound by the writer where they are used.
    pub fn stamp_namespaces(&self, doc: &mut XmlDocument, root: NodeId) {
        let root_namespace = doc.name(root).and_then(|n| n.namespace.clone());
        for (uri, prefix) in &self.namespaces {
            match prefix {
                Some(prefix) => doc.set_attribute(root, XName::xmlns(prefix), uri.clone()),
                None if root_namespace.as_deref() == Some(uri.as_str()) => {
                    doc.set_attribute(root, XName::new("xmlns"), uri.clone())
                }
                None => {}
            }
        }
    }
}

/// Runtime type name of a value in canonical spelling.
pub(crate) fn runtime_type(value: &veles_model::Value) -> Option<String> {
    value.type_name().map(|t| canonical_name(&t))
}
