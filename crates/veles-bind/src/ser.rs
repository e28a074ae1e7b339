//! Writing object graphs as XML.
//!
//! Every value is written into an element that its caller has already
//! created and named. Dispatch goes by the declared type: null values leave
//! the element empty, values of a different runtime type are written as
//! their runtime type and stamped with a `realtype` attribute, and the rest
//! go to the custom serializer, known-type codec, dictionary, collection,
//! scalar or composite writer.

use std::sync::Arc;

use veles_model::scalar::format_scalar;
use veles_model::{
    names, CollectionAttr, CollectionInfo, CollectionStyle, Container, CyclePolicy, DictionaryAttr,
    DictionaryInfo, MemberDescriptor, Object, ObjectRef, Placement, SerializationTarget, TextEmbedding,
    TypeDescriptor, TypeKind, Value,
};
use veles_xml::{NodeId, XName, XmlDocument};

use crate::context::{dimensions_attribute, real_type_attribute, runtime_type, Context, Layout, Slot};
use crate::error::{Error, Result};
use crate::text::{encode_attribute, write_text};

/// Serialize `value` into a new document whose root is named after `type_name`.
pub(crate) fn serialize_document(ctx: &mut Context<'_>, value: &Value, type_name: &str) -> Result<XmlDocument> {
    let desc = ctx.descriptor(type_name)?;

    let mut doc = XmlDocument::new();
    let root = doc.create_element(desc.alias.clone());
    doc.set_root(root);

    for comment in &desc.comments {
        doc.add_prolog_comment(format!(" {} ", comment));
    }
    if let Some(namespace) = &desc.namespace {
        ctx.declare_namespace(namespace);
    }
    if desc.preserve_whitespace {
        doc.set_attribute(root, XName::xml_space(), "preserve");
    }

    serialize_value(ctx, &mut doc, root, value, &desc, Layout::default())?;
    ctx.stamp_namespaces(&mut doc, root);
    Ok(doc)
}

/// Fill `elem` with `value`, declared as `declared`.
pub(crate) fn serialize_value(
    ctx: &mut Context<'_>,
    doc: &mut XmlDocument,
    elem: NodeId,
    value: &Value,
    declared: &Arc<TypeDescriptor>,
    layout: Layout<'_>,
) -> Result<()> {
    let Some(runtime) = runtime_type(value) else {
        return Ok(());
    };

    if runtime != declared.name {
        if !ctx.is_assignable(&runtime, &declared.name) {
            return Err(ctx.fail(Error::ObjectTypeMismatch {
                expected: declared.name.clone(),
                actual: runtime,
            }));
        }
        if declared.custom_serializer.is_none() {
            let actual = ctx.descriptor(&runtime)?;
            serialize_value(ctx, doc, elem, value, &actual, layout)?;
            stamp_real_type(ctx, doc, elem, &actual);
            return Ok(());
        }
    }

    if let Some(custom) = &declared.custom_serializer {
        let sc = ctx.serialization_context(declared, layout.member);
        custom.serialize_to_element(value, doc, elem, &sc)?;
        return Ok(());
    }

    if let Some(known) = &declared.known {
        known.write_element(value, doc, elem, layout.format)?;
        return Ok(());
    }

    match &declared.kind {
        TypeKind::Dictionary(info) if !layout.not_collection => {
            serialize_dictionary(ctx, doc, elem, value, declared, info, layout)
        }
        TypeKind::Collection(info) if !layout.not_collection => {
            serialize_collection(ctx, doc, elem, value, declared, info, layout)
        }
        TypeKind::Basic(_) | TypeKind::Enum(_) => {
            let text = scalar_text(ctx, value, declared, layout.format)?;
            write_text(doc, elem, &text, layout.embedding);
            Ok(())
        }
        _ => serialize_composite(ctx, doc, elem, value, declared, layout),
    }
}

fn stamp_real_type(ctx: &mut Context<'_>, doc: &mut XmlDocument, elem: NodeId, actual: &TypeDescriptor) {
    if !ctx.metadata_allowed(actual) {
        return;
    }
    doc.set_attribute(elem, real_type_attribute(), actual.name.clone());
    ctx.declare_meta_namespace();
}

fn mismatch(ctx: &mut Context<'_>, expected: &TypeDescriptor, value: &Value) -> Error {
    ctx.fail(Error::ObjectTypeMismatch {
        expected: expected.name.clone(),
        actual: value.type_name().unwrap_or_else(|| "null".to_string()),
    })
}

/// Text of a scalar, enum or known-type value.
pub(crate) fn scalar_text(
    ctx: &mut Context<'_>,
    value: &Value,
    desc: &TypeDescriptor,
    format: Option<&str>,
) -> Result<String> {
    if let Some(known) = &desc.known {
        return Ok(known.to_text(value, format)?);
    }
    match (&desc.kind, value) {
        (TypeKind::Enum(_), Value::Enum(e)) => Ok(desc.enum_to_text(e)?),
        (TypeKind::Basic(_), _) => match format_scalar(value, format) {
            Some(text) => Ok(text),
            None => Err(mismatch(ctx, desc, value)),
        },
        _ => Err(mismatch(ctx, desc, value)),
    }
}

/// Mark an object as being written, guarding against cycles and runaway depth.
///
/// Returns a snapshot of the object, or `None` if its element must stay empty.
/// [`leave_object`] must follow whenever `Some` is returned.
fn enter_object(ctx: &mut Context<'_>, object: &ObjectRef, desc: &TypeDescriptor) -> Result<Option<Object>> {
    if !desc.is_value_type && ctx.is_in_progress(object.id()) {
        match desc.cycle_policy {
            CyclePolicy::Throw => {
                return Err(ctx.fail(Error::CannotSerializeSelfReferentialTypes {
                    type_name: desc.name.clone(),
                }))
            }
            CyclePolicy::Skip => {
                tracing::debug!(type_name = %desc.name, "skipping self-reference");
                return Ok(None);
            }
        }
    }

    if !ctx.enter() {
        ctx.leave();
        tracing::debug!(type_name = %desc.name, "recursion limit reached, leaving element empty");
        return Ok(None);
    }
    ctx.push_object(object.id());
    Ok(Some(object.read().clone()))
}

fn leave_object(ctx: &mut Context<'_>) {
    ctx.pop_object();
    ctx.leave();
}

fn serialize_composite(
    ctx: &mut Context<'_>,
    doc: &mut XmlDocument,
    elem: NodeId,
    value: &Value,
    desc: &Arc<TypeDescriptor>,
    layout: Layout<'_>,
) -> Result<()> {
    let Value::Object(object) = value else {
        return Err(mismatch(ctx, desc, value));
    };
    let Some(snapshot) = enter_object(ctx, object, desc)? else {
        return Ok(());
    };
    let result = serialize_members(ctx, doc, elem, &snapshot, desc, layout.prunable);
    leave_object(ctx);
    result
}

/// Write the members of `object` into `elem`.
///
/// With `prunable`, an element left without any content although at least
/// one member was written, all of them moved elsewhere by their locations,
/// is removed again.
fn serialize_members(
    ctx: &mut Context<'_>,
    doc: &mut XmlDocument,
    elem: NodeId,
    object: &Object,
    desc: &TypeDescriptor,
    prunable: bool,
) -> Result<()> {
    let mut considered = false;
    let mut placed_here = false;

    for member in &desc.members {
        if !member.can_read || member.dont_serialize {
            continue;
        }
        if ctx.options.skip_members_without_setter && !member.can_write {
            continue;
        }

        let value = object.get(&member.name).cloned().unwrap_or(Value::Null);
        if value.is_null() && (member.dont_serialize_if_null || !desc.serialize_null_objects) {
            continue;
        }

        considered = true;
        tracing::trace!(member = %member.name, target = ?member.target(), "serializing member");
        placed_here |= serialize_member(ctx, doc, elem, &value, member)?;
    }

    let relocated = considered && !placed_here;
    if prunable && relocated && doc.parent(elem).is_some() && doc.is_empty_element(elem) {
        tracing::trace!(element = %doc.path_of(elem), "pruning empty element");
        doc.detach(elem);
    }
    Ok(())
}

/// Write one member. Returns whether it was placed in `elem` itself.
fn serialize_member(
    ctx: &mut Context<'_>,
    doc: &mut XmlDocument,
    elem: NodeId,
    value: &Value,
    member: &MemberDescriptor,
) -> Result<bool> {
    let Some(target) = doc.create_location(elem, &member.location) else {
        ctx.report_default(Error::BadLocation {
            path: doc.path_of(elem),
            location: member.location.clone(),
        })?;
        return Ok(false);
    };
    if let Some(namespace) = &member.namespace {
        ctx.declare_namespace(namespace);
    }

    match member.target() {
        SerializationTarget::Attribute => {
            if doc.has_attribute(target, &member.alias) {
                ctx.report_default(Error::AttributeAlreadyExists {
                    path: doc.path_of(target),
                    attribute: member.alias.to_string(),
                })?;
                return Ok(false);
            }
            let text = member_text(ctx, value, member, true)?;
            doc.set_attribute(target, member.alias.clone(), encode_attribute(text, member.text_embedding));
        }
        SerializationTarget::Value => {
            // Null leaves the node without text.
            if !value.is_null() {
                let text = member_text(ctx, value, member, false)?;
                write_text(doc, target, &text, member.text_embedding);
            }
            if member.preserve_whitespace {
                doc.set_attribute(target, XName::xml_space(), "preserve");
            }
        }
        SerializationTarget::Element => serialize_member_element(ctx, doc, target, value, member)?,
    }
    Ok(target == elem)
}

/// Text of a member placed in an attribute or element value. Null is empty text.
fn member_text(ctx: &mut Context<'_>, value: &Value, member: &MemberDescriptor, attribute: bool) -> Result<String> {
    if value.is_null() {
        return Ok(String::new());
    }

    let declared = ctx.descriptor(&member.type_name)?;
    if let Some(custom) = &member.custom_serializer {
        let sc = ctx.serialization_context(&declared, Some(member));
        let text = if attribute {
            custom.serialize_to_attribute(value, &sc)?
        } else {
            custom.serialize_to_value(value, &sc)?
        };
        return Ok(text);
    }

    let format = member.format.as_deref();
    match (&declared.kind, value) {
        (TypeKind::Collection(info), Value::Object(object)) if member.is_collection() => {
            let separator = member
                .collection
                .as_ref()
                .map(|c| c.separator.as_str())
                .unwrap_or(" ");
            let item_desc = ctx.descriptor(&info.item_type)?;
            let items = object.read().container.as_ref().map(Container::items).unwrap_or_default();
            serial_text(ctx, &items, &item_desc, separator, format)
        }
        _ => scalar_text(ctx, value, &declared, format),
    }
}

/// Join the texts of non-null items with `separator`.
fn serial_text(
    ctx: &mut Context<'_>,
    items: &[Value],
    item_desc: &TypeDescriptor,
    separator: &str,
    format: Option<&str>,
) -> Result<String> {
    let mut parts = Vec::with_capacity(items.len());
    for item in items.iter().filter(|i| !i.is_null()) {
        parts.push(scalar_text(ctx, item, item_desc, format)?);
    }
    Ok(parts.join(separator))
}

fn serialize_member_element(
    ctx: &mut Context<'_>,
    doc: &mut XmlDocument,
    parent: NodeId,
    value: &Value,
    member: &MemberDescriptor,
) -> Result<()> {
    for comment in &member.comments {
        doc.add_comment(parent, format!(" {} ", comment));
    }

    let declared = ctx.descriptor(&member.type_name)?;
    let renamed = runtime_type(value)
        .filter(|runtime| *runtime != declared.name)
        .and_then(|runtime| {
            let alias = member.real_type_alias(&runtime)?.clone();
            Some((runtime, alias))
        });

    let name = match &renamed {
        Some((_, alias)) => alias.clone(),
        None => member.alias.clone(),
    };
    let child = doc.add_element(parent, name);
    if member.preserve_whitespace {
        doc.set_attribute(child, XName::xml_space(), "preserve");
    }

    let layout = Layout::of(member);
    if let Some(custom) = &member.custom_serializer {
        if !value.is_null() {
            let sc = ctx.serialization_context(&declared, Some(member));
            custom.serialize_to_element(value, doc, child, &sc)?;
        }
    } else if let Some((runtime, _)) = &renamed {
        // The element name identifies the runtime type, no realtype stamp needed.
        if !ctx.is_assignable(runtime, &declared.name) {
            return Err(mismatch(ctx, &declared, value));
        }
        let actual = ctx.descriptor(runtime)?;
        serialize_value(ctx, doc, child, value, &actual, layout)?;
    } else {
        serialize_value(ctx, doc, child, value, &declared, layout)?;
    }

    if member.is_collection() && member.collection_style() == CollectionStyle::RecursiveWithNoContainingElement {
        doc.splice_into_parent(child);
    }
    Ok(())
}

fn serialize_collection(
    ctx: &mut Context<'_>,
    doc: &mut XmlDocument,
    elem: NodeId,
    value: &Value,
    desc: &Arc<TypeDescriptor>,
    info: &CollectionInfo,
    layout: Layout<'_>,
) -> Result<()> {
    let Value::Object(object) = value else {
        return Err(mismatch(ctx, desc, value));
    };
    let Some(snapshot) = enter_object(ctx, object, desc)? else {
        return Ok(());
    };
    let result = write_collection(ctx, doc, elem, &snapshot, desc, info, layout);
    leave_object(ctx);
    result
}

fn write_collection(
    ctx: &mut Context<'_>,
    doc: &mut XmlDocument,
    elem: NodeId,
    object: &Object,
    desc: &TypeDescriptor,
    info: &CollectionInfo,
    layout: Layout<'_>,
) -> Result<()> {
    // Fields of a collection subclass come before the items.
    if !desc.members.is_empty() {
        serialize_members(ctx, doc, elem, object, desc, false)?;
    }

    let default_attr = CollectionAttr::default();
    let attr = layout
        .collection
        .or(desc.collection.as_ref())
        .unwrap_or(&default_attr);
    let item_desc = ctx.descriptor(&info.item_type)?;
    let items = object.container.as_ref().map(Container::items).unwrap_or_default();

    let array_items = match &object.container {
        Some(Container::Array(array)) => {
            if array.rank() > 1 && ctx.metadata_allowed(desc) {
                let dims: Vec<String> = array.dims().iter().map(usize::to_string).collect();
                doc.set_attribute(elem, dimensions_attribute(), dims.join(","));
                ctx.declare_meta_namespace();
            }
            true
        }
        _ => false,
    };

    if attr.style == CollectionStyle::Serially && item_desc.shape().is_textual() {
        let text = serial_text(ctx, &items, &item_desc, &attr.separator, layout.format)?;
        write_text(doc, elem, &text, layout.embedding);
        return Ok(());
    }

    let item_name = attr
        .each_element_name
        .clone()
        .unwrap_or_else(|| item_desc.alias.clone());
    if let Some(namespace) = &item_desc.namespace {
        ctx.declare_namespace(namespace);
    }

    for item in &items {
        // Arrays keep null items as empty elements so positions survive.
        if item.is_null() && !array_items {
            continue;
        }
        let child = doc.add_element(elem, item_name.clone());
        serialize_value(ctx, doc, child, item, &item_desc, Layout::item(layout.format))?;
    }
    Ok(())
}

fn serialize_dictionary(
    ctx: &mut Context<'_>,
    doc: &mut XmlDocument,
    elem: NodeId,
    value: &Value,
    desc: &Arc<TypeDescriptor>,
    info: &DictionaryInfo,
    layout: Layout<'_>,
) -> Result<()> {
    let Value::Object(object) = value else {
        return Err(mismatch(ctx, desc, value));
    };
    let Some(snapshot) = enter_object(ctx, object, desc)? else {
        return Ok(());
    };
    let result = write_dictionary(ctx, doc, elem, &snapshot, desc, info, layout);
    leave_object(ctx);
    result
}

fn write_dictionary(
    ctx: &mut Context<'_>,
    doc: &mut XmlDocument,
    elem: NodeId,
    object: &Object,
    desc: &TypeDescriptor,
    info: &DictionaryInfo,
    layout: Layout<'_>,
) -> Result<()> {
    if !desc.members.is_empty() {
        serialize_members(ctx, doc, elem, object, desc, false)?;
    }

    let default_attr = DictionaryAttr::default();
    let attr = layout.dictionary.unwrap_or(&default_attr);
    let key_desc = ctx.descriptor(&info.key_type)?;
    let value_desc = ctx.descriptor(&info.value_type)?;
    let pair_name = attr.each_pair_name.clone().unwrap_or_else(|| {
        ctx.registry
            .alias_of(&names::key_value_pair(&info.key_type, &info.value_type))
    });

    let key_slot = Slot::key(attr);
    let value_slot = Slot::value(attr);
    let entries = object.container.as_ref().map(Container::entries).unwrap_or_default();

    for (key, value) in entries {
        let pair = doc.add_element(elem, pair_name.clone());
        write_slot(ctx, doc, pair, key, &key_desc, &key_slot)?;
        write_slot(ctx, doc, pair, value, &value_desc, &value_slot)?;
    }
    Ok(())
}

/// Write a key or value into its pair element.
///
/// Attribute and content placement apply only to values that fit into text;
/// anything else is written as a child element.
fn write_slot(
    ctx: &mut Context<'_>,
    doc: &mut XmlDocument,
    pair: NodeId,
    value: &Value,
    desc: &Arc<TypeDescriptor>,
    slot: &Slot<'_>,
) -> Result<()> {
    let textual = desc.shape().is_textual()
        && desc.custom_serializer.is_none()
        && runtime_type(value).map_or(true, |runtime| runtime == desc.name);

    match slot.placement {
        Placement::Attribute if textual => {
            // Null is written as an empty attribute so the pair stays readable.
            let text = if value.is_null() {
                String::new()
            } else {
                scalar_text(ctx, value, desc, slot.format)?
            };
            doc.set_attribute(pair, slot.name.clone(), text);
        }
        Placement::Content if textual => {
            if !value.is_null() {
                let text = scalar_text(ctx, value, desc, slot.format)?;
                write_text(doc, pair, &text, TextEmbedding::None);
            }
        }
        _ => {
            let child = doc.add_element(pair, slot.name.clone());
            serialize_value(ctx, doc, child, value, desc, Layout::item(slot.format))?;
        }
    }
    Ok(())
}
