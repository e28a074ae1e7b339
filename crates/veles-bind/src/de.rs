//! Reading object graphs from XML.
//!
//! Members are read in two phases. The locate phase finds the attribute,
//! text or element holding the member; when it is missing, a member whose
//! own members were placed elsewhere by their locations is recovered through
//! a temporary helper element. The materialize phase converts what was found
//! into a value, falling back to the member's default, and assigns it.

use std::sync::Arc;

use veles_model::scalar::{coerce_scalar, parse_scalar};
use veles_model::{
    canonical_name, names, ArrayValue, BasicType, CollectionAttr, CollectionInfo, CollectionStyle, Container,
    ContainerKind, DictionaryAttr, DictionaryInfo, MemberDescriptor, ModelError, Object, ObjectRef, OBJECT_TYPE,
    Placement, SerializationTarget, Severity, TypeDescriptor, TypeKind, TypeShape, Value,
};
use veles_xml::{parse_path, NodeId, PathStep, XName, XmlDocument};

use crate::context::{dimensions_attribute, real_type_attribute, runtime_type, Context, Layout, Slot};
use crate::error::{Error, Result};
use crate::text::decode_text;

/// Limit on nested types searched when probing for relocated members.
const MAX_PROBE_DEPTH: usize = 16;

/// Read a value of `type_name` from a document.
///
/// The document is copied first: helper elements and consumed nodes are
/// added to and removed from the copy only.
pub(crate) fn deserialize_document(
    ctx: &mut Context<'_>,
    doc: &XmlDocument,
    type_name: &str,
    existing: Option<ObjectRef>,
) -> Result<Value> {
    let desc = ctx.descriptor(type_name)?;
    let mut doc = doc.clone();
    let Some(root) = doc.root() else {
        return Ok(Value::Null);
    };
    deserialize_value(ctx, &mut doc, root, &desc, Layout::default(), existing)
}

/// Read the value held by `elem`, declared as `declared`.
///
/// `existing` is an object to fill in place instead of creating a new one.
pub(crate) fn deserialize_value(
    ctx: &mut Context<'_>,
    doc: &mut XmlDocument,
    elem: NodeId,
    declared: &Arc<TypeDescriptor>,
    layout: Layout<'_>,
    existing: Option<ObjectRef>,
) -> Result<Value> {
    let desc = resolve_real_type(ctx, doc, elem, declared)?.unwrap_or_else(|| Arc::clone(declared));

    if let Some(custom) = &desc.custom_serializer {
        let sc = ctx.serialization_context(&desc, layout.member);
        return Ok(custom.deserialize_from_element(doc, elem, &sc)?);
    }

    if desc.is_key_value_pair() {
        return deserialize_key_value_pair(ctx, doc, elem, &desc);
    }

    if let Some(known) = &desc.known {
        if doc.is_blank(elem) {
            return Ok(Value::Null);
        }
        return match known.read_element(doc, elem, layout.format) {
            Ok(value) => Ok(value),
            Err(_) => {
                let text = doc.text(elem);
                bad_input(ctx, &desc, layout, &text)?;
                Ok(fallback(layout))
            }
        };
    }

    match &desc.kind {
        TypeKind::Dictionary(info) if !layout.not_collection => {
            deserialize_dictionary(ctx, doc, elem, &desc, info, layout, existing)
        }
        TypeKind::Collection(info) if !layout.not_collection => {
            deserialize_collection(ctx, doc, elem, &desc, info, layout, existing, false)
        }
        TypeKind::Basic(_) | TypeKind::Enum(_) => {
            // `<a/>` is null; `<a></a>` carries an empty text node.
            if !doc.has_text(elem) {
                return Ok(Value::Null);
            }
            let raw = doc.text(elem);
            let Some(text) = decode_text(raw.clone(), layout.embedding) else {
                bad_input(ctx, &desc, layout, &raw)?;
                return Ok(fallback(layout));
            };
            Ok(parse_text(ctx, &text, &desc, layout)?.unwrap_or_else(|| fallback(layout)))
        }
        _ => deserialize_composite(ctx, doc, elem, &desc, existing),
    }
}

/// The type named by a `realtype` attribute, if present and usable.
fn resolve_real_type(
    ctx: &mut Context<'_>,
    doc: &XmlDocument,
    elem: NodeId,
    declared: &TypeDescriptor,
) -> Result<Option<Arc<TypeDescriptor>>> {
    let Some(name) = doc.attribute(elem, &real_type_attribute()) else {
        return Ok(None);
    };
    let name = name.to_string();

    match ctx.descriptor(&name) {
        Ok(actual) if ctx.is_assignable(&actual.name, &declared.name) => Ok(Some(actual)),
        Ok(actual) => {
            ctx.report_default(Error::ObjectTypeMismatch {
                expected: declared.name.clone(),
                actual: actual.name.clone(),
            })?;
            Ok(None)
        }
        Err(_) => {
            ctx.report_default(Error::BadlyFormedInput {
                member: doc.path_of(elem),
                expected: "type name".to_string(),
                value: name,
            })?;
            Ok(None)
        }
    }
}

fn input_severity(ctx: &Context<'_>, layout: Layout<'_>) -> Severity {
    layout
        .member
        .and_then(|m| m.treatment)
        .unwrap_or(ctx.options.default_severity)
}

fn bad_input(ctx: &mut Context<'_>, desc: &TypeDescriptor, layout: Layout<'_>, text: &str) -> Result<()> {
    let severity = input_severity(ctx, layout);
    ctx.report(
        Error::BadlyFormedInput {
            member: layout.subject(desc),
            expected: desc.name.clone(),
            value: text.to_string(),
        },
        severity,
    )
}

fn fallback(layout: Layout<'_>) -> Value {
    layout.default.cloned().unwrap_or(Value::Null)
}

/// Convert text to a value of a textual type.
///
/// Empty text is null for every type but `string`. Returns `None` after
/// reporting when the text does not parse.
fn parse_text(ctx: &mut Context<'_>, text: &str, desc: &TypeDescriptor, layout: Layout<'_>) -> Result<Option<Value>> {
    if desc.basic() == Some(BasicType::String) && desc.known.is_none() {
        return Ok(Some(Value::String(text.to_string())));
    }
    if text.trim().is_empty() {
        return Ok(Some(Value::Null));
    }

    let parsed = match (&desc.known, &desc.kind) {
        (Some(known), _) => known.from_text(text.trim(), layout.format),
        (None, TypeKind::Basic(basic)) => parse_scalar(text, *basic, layout.format),
        (None, TypeKind::Enum(_)) => desc.enum_from_text(text),
        _ => Err(ModelError::UnexpectedValue {
            expected: "text value".to_string(),
            actual: desc.name.clone(),
        }),
    };

    match parsed {
        Ok(value) => Ok(Some(value)),
        Err(_) => {
            bad_input(ctx, desc, layout, text)?;
            Ok(None)
        }
    }
}

fn new_object(desc: &TypeDescriptor) -> ObjectRef {
    let mut object = Object::new(desc.name.clone());
    object.container = desc.container_kind().map(|kind| kind.empty());
    object.into_ref()
}

/// Reuse `existing` when it has the type being read.
fn reuse(existing: Option<ObjectRef>, desc: &TypeDescriptor) -> ObjectRef {
    match existing {
        Some(object) if canonical_name(&object.type_name()) == desc.name => object,
        _ => new_object(desc),
    }
}

fn deserialize_composite(
    ctx: &mut Context<'_>,
    doc: &mut XmlDocument,
    elem: NodeId,
    desc: &Arc<TypeDescriptor>,
    existing: Option<ObjectRef>,
) -> Result<Value> {
    if desc.is_abstract {
        let found = doc.name(elem).map(|n| n.local.clone()).unwrap_or_default();
        ctx.report_default(Error::BadlyFormedInput {
            member: doc.path_of(elem),
            expected: format!("concrete type for abstract {}", desc.name),
            value: found,
        })?;
        return Ok(Value::Null);
    }

    if !ctx.enter() {
        ctx.leave();
        tracing::debug!(type_name = %desc.name, "recursion limit reached, reading null");
        return Ok(Value::Null);
    }
    let object = reuse(existing, desc);
    let result = deserialize_members(ctx, doc, elem, &object, desc, false);
    ctx.leave();
    result?;
    Ok(Value::Object(object))
}

/// Read the members of `desc` from `elem` into `object`.
///
/// With `strip`, consumed attributes and elements are removed so that the
/// items of a collection subclass are not confused with its fields.
fn deserialize_members(
    ctx: &mut Context<'_>,
    doc: &mut XmlDocument,
    elem: NodeId,
    object: &ObjectRef,
    desc: &TypeDescriptor,
    strip: bool,
) -> Result<()> {
    for member in &desc.members {
        if !member.can_write || member.dont_serialize {
            continue;
        }
        deserialize_member(ctx, doc, elem, object, desc, member, strip)?;
    }
    Ok(())
}

/// Where a member was found.
enum Source {
    Attribute { node: NodeId, text: String },
    Text { text: String },
    /// The node of a string value exists but holds no text at all.
    Blank,
    Element(NodeId),
    /// A helper element standing in for a pruned member element.
    Relocated(NodeId),
    /// Items of a collection written without its containing element.
    Items(NodeId),
}

/// A scratch element standing in for a member element that was pruned.
struct Helper {
    node: NodeId,
    /// Node count before the helper was created; newer nodes are scratch too.
    mark: usize,
}

fn deserialize_member(
    ctx: &mut Context<'_>,
    doc: &mut XmlDocument,
    elem: NodeId,
    object: &ObjectRef,
    owner: &TypeDescriptor,
    member: &MemberDescriptor,
    strip: bool,
) -> Result<()> {
    tracing::trace!(member = %member.name, target = ?member.target(), "deserializing member");
    let declared = ctx.descriptor(&member.type_name)?;

    let mut helper = None;
    let source = match locate(ctx, doc, elem, member, &declared) {
        Some(source) => Some(source),
        None => match create_helper(ctx, doc, elem, member, &declared) {
            Some(created) => {
                let node = created.node;
                helper = Some(created);
                Some(Source::Relocated(node))
            }
            // Absent because it was null and nulls were not written.
            None if !owner.serialize_null_objects && member.default_value.is_none() => return Ok(()),
            None => {
                let severity = if owner.serialize_null_objects {
                    member.treatment.unwrap_or(ctx.options.default_severity)
                } else {
                    Severity::Ignore
                };
                ctx.report(missing_error(doc, elem, member), severity)?;
                None
            }
        },
    };

    let value = match source {
        Some(source) => {
            let default = coerce_default(ctx, member, &declared);
            let layout = Layout {
                default: default.as_ref(),
                ..Layout::of(member)
            };
            let existing = object.get(&member.name).and_then(|v| v.as_object().cloned());
            let value = materialize(ctx, doc, &source, member, &declared, layout, existing)?;
            if strip {
                consume(doc, &source, member);
            }
            value
        }
        None => match &member.default_value {
            Some(default) => match coerce_default(ctx, member, &declared) {
                Some(value) => value,
                None => {
                    return ctx.report_default(Error::DefaultValueCannotBeAssigned {
                        member: member.name.clone(),
                        value: format!("{:?}", default),
                    })
                }
            },
            None => return Ok(()),
        },
    };

    if let Some(helper) = helper {
        remove_helper(doc, helper);
    }
    assign(ctx, object, member, value)
}

fn assign(ctx: &mut Context<'_>, object: &ObjectRef, member: &MemberDescriptor, value: Value) -> Result<()> {
    if let Some(runtime) = runtime_type(&value) {
        if !ctx.is_assignable(&runtime, &member.type_name) {
            return ctx.report_default(Error::PropertyCannotBeAssignedTo {
                member: member.name.clone(),
                expected: member.type_name.clone(),
                actual: runtime,
            });
        }
    }
    object.set(member.name.clone(), value);
    Ok(())
}

/// The member's default converted to its declared type.
fn coerce_default(ctx: &Context<'_>, member: &MemberDescriptor, declared: &TypeDescriptor) -> Option<Value> {
    let default = member.default_value.as_ref()?;
    if default.is_null() {
        return Some(Value::Null);
    }
    if runtime_type(default).is_some_and(|runtime| ctx.is_assignable(&runtime, &declared.name)) {
        return Some(default.clone());
    }

    let text = default.as_str();
    match (&declared.known, &declared.kind) {
        (Some(known), _) => known.from_text(text?, member.format.as_deref()).ok(),
        (None, TypeKind::Basic(basic)) => coerce_scalar(default, *basic),
        (None, TypeKind::Enum(_)) => declared.enum_from_text(text?).ok(),
        _ => None,
    }
}

fn missing_error(doc: &XmlDocument, elem: NodeId, member: &MemberDescriptor) -> Error {
    let path = match doc.find_location(elem, &member.location) {
        Some(node) => doc.path_of(node),
        None => format!("{}/{}", doc.path_of(elem), member.location),
    };
    match member.target() {
        SerializationTarget::Attribute => Error::AttributeMissing {
            path,
            attribute: member.alias.to_string(),
        },
        SerializationTarget::Value => Error::ElementValueMissing {
            path,
            member: member.name.clone(),
        },
        SerializationTarget::Element => Error::ElementMissing {
            path,
            element: member.alias.to_string(),
        },
    }
}

fn is_preserved(doc: &XmlDocument, node: NodeId) -> bool {
    doc.attribute(node, &XName::xml_space()) == Some("preserve")
}

/// Find the node holding a member.
fn locate(
    ctx: &Context<'_>,
    doc: &XmlDocument,
    elem: NodeId,
    member: &MemberDescriptor,
    declared: &TypeDescriptor,
) -> Option<Source> {
    let node = doc.find_location(elem, &member.location)?;

    match member.target() {
        SerializationTarget::Attribute => {
            let text = doc.attribute(node, &member.alias)?.to_string();
            Some(Source::Attribute { node, text })
        }
        SerializationTarget::Value => {
            if !doc.has_text(node) {
                return (member.shape == TypeShape::Basic(BasicType::String)).then_some(Source::Blank);
            }
            let mut text = doc.text(node);
            // Indentation around child elements is not part of the value.
            if doc.child_elements(node).next().is_some() && !is_preserved(doc, node) {
                text = text.trim().to_string();
            }
            Some(Source::Text { text })
        }
        SerializationTarget::Element => {
            if let Some(child) = doc.first_child(node, &member.alias) {
                return Some(Source::Element(child));
            }
            for (_, alias) in &member.real_types {
                if let Some(child) = doc.first_child(node, alias) {
                    return Some(Source::Element(child));
                }
            }
            if member.is_collection() && member.collection_style() == CollectionStyle::RecursiveWithNoContainingElement {
                // Without items the collection reads as empty, unless the
                // member says what to do when it is missing.
                let configured = member.default_value.is_some() || member.treatment.is_some();
                if !configured || has_items(ctx, doc, node, member, declared) {
                    return Some(Source::Items(node));
                }
            }
            None
        }
    }
}

/// Check whether `node` has at least one item element of an unwrapped collection.
fn has_items(
    ctx: &Context<'_>,
    doc: &XmlDocument,
    node: NodeId,
    member: &MemberDescriptor,
    declared: &TypeDescriptor,
) -> bool {
    let TypeKind::Collection(info) = &declared.kind else {
        return false;
    };
    let each = member
        .collection
        .as_ref()
        .or(declared.collection.as_ref())
        .and_then(|attr| attr.each_element_name.clone());
    let name = match each {
        Some(name) => name,
        None => match ctx.descriptor(&info.item_type) {
            Ok(item) => item.alias.clone(),
            Err(_) => return false,
        },
    };
    doc.first_child(node, &name).is_some()
}

/// A position in the document that may lie below elements that do not exist.
#[derive(Clone)]
struct Probe {
    anchor: NodeId,
    /// Missing elements below `anchor`, outermost first.
    pending: Vec<XName>,
}

impl Probe {
    fn at(node: NodeId) -> Self {
        Self {
            anchor: node,
            pending: Vec::new(),
        }
    }

    fn child(mut self, name: XName) -> Self {
        self.pending.push(name);
        self
    }

    /// Follow a location path. Returns `None` if it climbs above the top element.
    fn locate(&self, doc: &XmlDocument, path: &str) -> Option<Probe> {
        let mut probe = self.clone();
        for step in parse_path(path) {
            match step {
                PathStep::Current => {}
                PathStep::Parent => {
                    if probe.pending.pop().is_none() {
                        probe.anchor = doc.parent(probe.anchor)?;
                    }
                }
                PathStep::Child(name) => {
                    let existing = if probe.pending.is_empty() {
                        doc.first_child(probe.anchor, &name)
                    } else {
                        None
                    };
                    match existing {
                        Some(child) => probe.anchor = child,
                        None => probe.pending.push(name),
                    }
                }
            }
        }
        Some(probe)
    }

    fn resolve(&self) -> Option<NodeId> {
        self.pending.is_empty().then_some(self.anchor)
    }
}

/// Check whether any member of `desc`, read from `probe`, can be found.
///
/// Nested composite members are searched too, so a member found only at the
/// second level of relocation still counts.
fn probe_members(ctx: &Context<'_>, doc: &XmlDocument, probe: &Probe, desc: &TypeDescriptor, depth: usize) -> bool {
    if depth > MAX_PROBE_DEPTH {
        return false;
    }

    desc.members
        .iter()
        .filter(|m| m.can_write && !m.dont_serialize)
        .any(|member| {
            let Some(position) = probe.locate(doc, &member.location) else {
                return false;
            };
            let found = position.resolve();
            match member.target() {
                SerializationTarget::Attribute => found.is_some_and(|n| doc.has_attribute(n, &member.alias)),
                SerializationTarget::Value => found.is_some_and(|n| doc.has_text(n)),
                SerializationTarget::Element => {
                    if found.is_some_and(|n| doc.first_child(n, &member.alias).is_some()) {
                        return true;
                    }
                    if member.shape != TypeShape::Composite || member.custom_serializer.is_some() {
                        return false;
                    }
                    ctx.descriptor(&member.type_name).is_ok_and(|nested| {
                        let below = position.child(member.alias.clone());
                        probe_members(ctx, doc, &below, &nested, depth + 1)
                    })
                }
            }
        })
}

/// Create a helper element for a missing composite member if any of its own
/// members can be found relative to where the element would have been.
fn create_helper(
    ctx: &Context<'_>,
    doc: &mut XmlDocument,
    elem: NodeId,
    member: &MemberDescriptor,
    declared: &TypeDescriptor,
) -> Option<Helper> {
    if !member.is_element()
        || member.custom_serializer.is_some()
        || !declared.is_composite()
        || declared.known.is_some()
        || declared.members.is_empty()
    {
        return None;
    }

    let probe = Probe::at(elem)
        .locate(doc, &member.location)?
        .child(member.alias.clone());
    if !probe_members(ctx, doc, &probe, declared, 0) {
        return None;
    }

    let mark = doc.node_count();
    let parent = doc.create_location(elem, &member.location)?;
    let node = doc.add_element(parent, member.alias.clone());
    tracing::trace!(member = %member.name, "reading relocated members through a helper element");
    Some(Helper { node, mark })
}

/// Detach the helper together with any location elements created for it.
fn remove_helper(doc: &mut XmlDocument, helper: Helper) {
    let mut top = helper.node;
    while let Some(parent) = doc.parent(top) {
        if parent.index() < helper.mark {
            break;
        }
        top = parent;
    }
    doc.detach(top);
}

fn consume(doc: &mut XmlDocument, source: &Source, member: &MemberDescriptor) {
    match source {
        Source::Attribute { node, .. } => {
            doc.remove_attribute(*node, &member.alias);
        }
        Source::Element(node) => doc.detach(*node),
        Source::Text { .. } | Source::Blank | Source::Relocated(_) | Source::Items(_) => {}
    }
}

/// Whether an empty element stands for null rather than an empty value.
///
/// Composites without members and not abstract read as a fresh object.
fn null_when_empty(desc: &TypeDescriptor) -> bool {
    if desc.known.is_some() {
        return true;
    }
    desc.is_composite()
        && desc.custom_serializer.is_none()
        && (desc.is_abstract || desc.name == OBJECT_TYPE || !desc.members.is_empty())
}

fn materialize(
    ctx: &mut Context<'_>,
    doc: &mut XmlDocument,
    source: &Source,
    member: &MemberDescriptor,
    declared: &Arc<TypeDescriptor>,
    layout: Layout<'_>,
    existing: Option<ObjectRef>,
) -> Result<Value> {
    match source {
        Source::Attribute { text: raw, .. } | Source::Text { text: raw } => {
            let attribute = matches!(source, Source::Attribute { .. });
            let Some(text) = decode_text(raw.clone(), member.text_embedding) else {
                bad_input(ctx, declared, layout, raw)?;
                return Ok(fallback(layout));
            };

            if let Some(custom) = &member.custom_serializer {
                let sc = ctx.serialization_context(declared, Some(member));
                let value = if attribute {
                    custom.deserialize_from_attribute(&text, &sc)?
                } else {
                    custom.deserialize_from_value(&text, &sc)?
                };
                return Ok(value);
            }

            match &declared.kind {
                TypeKind::Collection(info) if member.is_collection() => {
                    let object = reuse(existing, declared);
                    let item_desc = ctx.descriptor(&info.item_type)?;
                    let default_attr = CollectionAttr::serially(" ");
                    let attr = layout
                        .collection
                        .or(declared.collection.as_ref())
                        .unwrap_or(&default_attr);
                    let items = split_items(ctx, &text, attr, &item_desc, layout)?;
                    fill_container(ctx, &object, declared, info, items, None)?;
                    Ok(Value::Object(object))
                }
                _ => Ok(parse_text(ctx, &text, declared, layout)?.unwrap_or_else(|| fallback(layout))),
            }
        }
        Source::Element(node) => {
            let node = *node;
            if let Some(custom) = &member.custom_serializer {
                let sc = ctx.serialization_context(declared, Some(member));
                return Ok(custom.deserialize_from_element(doc, node, &sc)?);
            }

            let renamed = doc
                .name(node)
                .and_then(|name| member.real_type_for(name))
                .map(str::to_string);
            let desc = match renamed {
                Some(runtime) => ctx.descriptor(&runtime)?,
                None => Arc::clone(declared),
            };
            if doc.is_empty_element(node) && null_when_empty(&desc) {
                return Ok(Value::Null);
            }
            deserialize_value(ctx, doc, node, &desc, layout, existing)
        }
        Source::Blank => Ok(Value::Null),
        Source::Relocated(node) => deserialize_value(ctx, doc, *node, declared, layout, existing),
        Source::Items(parent) => match &declared.kind {
            TypeKind::Collection(info) => {
                deserialize_collection(ctx, doc, *parent, declared, info, layout, existing, true)
            }
            _ => Ok(Value::Null),
        },
    }
}

/// Split serially written items and parse each one.
fn split_items(
    ctx: &mut Context<'_>,
    text: &str,
    attr: &CollectionAttr,
    item_desc: &TypeDescriptor,
    layout: Layout<'_>,
) -> Result<Vec<Value>> {
    let pieces: Vec<&str> = if attr.whitespace_is_separator {
        text.split(|c: char| c.is_whitespace() || attr.separator.contains(c))
            .filter(|piece| !piece.is_empty())
            .collect()
    } else if text.is_empty() {
        Vec::new()
    } else if attr.separator.is_empty() {
        vec![text]
    } else {
        text.split(attr.separator.as_str()).collect()
    };

    let item_layout = Layout {
        member: layout.member,
        ..Layout::item(layout.format)
    };
    let mut items = Vec::with_capacity(pieces.len());
    for piece in pieces {
        if let Some(value) = parse_text(ctx, piece, item_desc, item_layout)? {
            items.push(value);
        }
    }
    Ok(items)
}

#[allow(clippy::too_many_arguments)]
fn deserialize_collection(
    ctx: &mut Context<'_>,
    doc: &mut XmlDocument,
    elem: NodeId,
    desc: &Arc<TypeDescriptor>,
    info: &CollectionInfo,
    layout: Layout<'_>,
    existing: Option<ObjectRef>,
    unwrapped: bool,
) -> Result<Value> {
    let object = reuse(existing, desc);
    if !desc.members.is_empty() {
        deserialize_members(ctx, doc, elem, &object, desc, true)?;
    }

    let default_attr = CollectionAttr::default();
    let attr = layout
        .collection
        .or(desc.collection.as_ref())
        .unwrap_or(&default_attr);
    let item_desc = ctx.descriptor(&info.item_type)?;

    let items = if attr.style == CollectionStyle::Serially && item_desc.shape().is_textual() {
        let raw = doc.text(elem);
        match decode_text(raw.clone(), layout.embedding) {
            Some(text) => split_items(ctx, &text, attr, &item_desc, layout)?,
            None => {
                bad_input(ctx, desc, layout, &raw)?;
                Vec::new()
            }
        }
    } else {
        let is_array = matches!(info.kind, ContainerKind::Array { .. });
        read_item_elements(ctx, doc, elem, attr, &item_desc, layout, unwrapped, is_array)?
    };

    let dims = match info.kind {
        ContainerKind::Array { rank } => read_dims(ctx, doc, elem, desc, layout, rank, items.len())?,
        _ => None,
    };
    fill_container(ctx, &object, desc, info, items, dims)?;
    Ok(Value::Object(object))
}

/// The shape recorded for an array, if it fits the items that were read.
fn read_dims(
    ctx: &mut Context<'_>,
    doc: &XmlDocument,
    elem: NodeId,
    desc: &TypeDescriptor,
    layout: Layout<'_>,
    rank: usize,
    count: usize,
) -> Result<Option<Vec<usize>>> {
    let Some(text) = doc.attribute(elem, &dimensions_attribute()).map(str::to_string) else {
        return Ok(None);
    };
    let dims = parse_dims(&text).filter(|d| d.len() == rank && ArrayValue::element_count(d) == Some(count));
    if dims.is_none() {
        let severity = input_severity(ctx, layout);
        ctx.report(
            Error::BadlyFormedInput {
                member: layout.subject(desc),
                expected: "array dimensions".to_string(),
                value: text,
            },
            severity,
        )?;
    }
    Ok(dims)
}

fn parse_dims(text: &str) -> Option<Vec<usize>> {
    text.split(',').map(|d| d.trim().parse().ok()).collect()
}

/// Read the items of a recursively written collection.
///
/// Children are matched by the configured item name. Without one, children
/// named after the item type are taken, as are children carrying a runtime
/// type or named after a type assignable to the item type. Unwrapped
/// collections share their element with other members, so only exact name
/// matches count there.
#[allow(clippy::too_many_arguments)]
fn read_item_elements(
    ctx: &mut Context<'_>,
    doc: &mut XmlDocument,
    elem: NodeId,
    attr: &CollectionAttr,
    item_desc: &Arc<TypeDescriptor>,
    layout: Layout<'_>,
    unwrapped: bool,
    is_array: bool,
) -> Result<Vec<Value>> {
    let item_layout = Layout {
        member: layout.member,
        ..Layout::item(layout.format)
    };
    let children: Vec<NodeId> = doc.child_elements(elem).collect();
    let mut items = Vec::with_capacity(children.len());

    for child in children {
        let Some(name) = doc.name(child).cloned() else {
            continue;
        };

        let desc = match &attr.each_element_name {
            Some(each) if name == *each => Arc::clone(item_desc),
            Some(_) => continue,
            None if name == item_desc.alias => Arc::clone(item_desc),
            None if unwrapped => continue,
            None if doc.has_attribute(child, &real_type_attribute()) => Arc::clone(item_desc),
            None => match ctx.registry.type_for_alias(&name) {
                Some(found) if ctx.is_assignable(&found, &item_desc.name) => ctx.descriptor(&found)?,
                _ => {
                    tracing::trace!(element = %name, "skipping element that is not a collection item");
                    continue;
                }
            },
        };

        let value = if is_array && doc.is_empty_element(child) && null_when_empty(&desc) {
            Value::Null
        } else {
            deserialize_value(ctx, doc, child, &desc, item_layout, None)?
        };
        items.push(value);
    }
    Ok(items)
}

/// Put items into the object's container using the container's insertion rule.
fn fill_container(
    ctx: &mut Context<'_>,
    object: &ObjectRef,
    desc: &TypeDescriptor,
    info: &CollectionInfo,
    items: Vec<Value>,
    dims: Option<Vec<usize>>,
) -> Result<()> {
    let container = match info.kind {
        ContainerKind::Array { rank } => {
            let count = items.len();
            let dims = dims.unwrap_or_else(|| {
                let mut d = vec![1; rank.max(1)];
                d[0] = count;
                d
            });
            let array = match ArrayValue::from_parts(dims, items) {
                Ok(array) => array,
                Err(items) => ArrayValue::from_items(items),
            };
            Container::Array(array)
        }
        kind => {
            let mut container = kind.empty();
            // Stacks are written top first.
            let ordered: Vec<Value> = if matches!(kind, ContainerKind::Stack) {
                items.into_iter().rev().collect()
            } else {
                items
            };
            for item in ordered {
                if let Err(rejected) = container.push(item) {
                    ctx.report_default(Error::CannotAddObjectToCollection {
                        collection: desc.name.clone(),
                        item: rejected.type_name().unwrap_or_else(|| "null".to_string()),
                    })?;
                }
            }
            container
        }
    };

    object.write().container = Some(container);
    Ok(())
}

fn deserialize_dictionary(
    ctx: &mut Context<'_>,
    doc: &mut XmlDocument,
    elem: NodeId,
    desc: &Arc<TypeDescriptor>,
    info: &DictionaryInfo,
    layout: Layout<'_>,
    existing: Option<ObjectRef>,
) -> Result<Value> {
    let object = reuse(existing, desc);
    if !desc.members.is_empty() {
        deserialize_members(ctx, doc, elem, &object, desc, true)?;
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

    let mut container = ContainerKind::Dictionary.empty();
    let pairs: Vec<NodeId> = doc.child_elements_named(elem, &pair_name).collect();
    for pair in pairs {
        let Some(key) = read_slot(ctx, doc, pair, &key_desc, &key_slot, layout)? else {
            continue;
        };
        let value = read_slot(ctx, doc, pair, &value_desc, &value_slot, layout)?.unwrap_or(Value::Null);

        if let Err((key, _)) = container.insert_entry(key, value) {
            ctx.report_default(Error::CannotAddObjectToCollection {
                collection: desc.name.clone(),
                item: format!("duplicate key {:?}", key),
            })?;
        }
    }

    object.write().container = Some(container);
    Ok(Value::Object(object))
}

/// Read a key or value from its pair element. `None` when it is missing.
fn read_slot(
    ctx: &mut Context<'_>,
    doc: &mut XmlDocument,
    pair: NodeId,
    desc: &Arc<TypeDescriptor>,
    slot: &Slot<'_>,
    layout: Layout<'_>,
) -> Result<Option<Value>> {
    let textual = desc.shape().is_textual() && desc.custom_serializer.is_none();
    let slot_layout = Layout {
        member: layout.member,
        ..Layout::item(slot.format)
    };

    match slot.placement {
        Placement::Attribute if textual => match doc.attribute(pair, &slot.name).map(str::to_string) {
            Some(text) => Ok(Some(parse_text(ctx, &text, desc, slot_layout)?.unwrap_or(Value::Null))),
            None => {
                ctx.report_default(Error::AttributeMissing {
                    path: doc.path_of(pair),
                    attribute: slot.name.to_string(),
                })?;
                Ok(None)
            }
        },
        Placement::Content if textual => {
            if !doc.has_text(pair) {
                return Ok(Some(Value::Null));
            }
            let text = doc.text(pair);
            Ok(Some(parse_text(ctx, &text, desc, slot_layout)?.unwrap_or(Value::Null)))
        }
        _ => match doc.first_child(pair, &slot.name) {
            Some(child) => Ok(Some(deserialize_value(ctx, doc, child, desc, slot_layout, None)?)),
            None => {
                ctx.report_default(Error::ElementMissing {
                    path: doc.path_of(pair),
                    element: slot.name.to_string(),
                })?;
                Ok(None)
            }
        },
    }
}

/// Read a `KeyValuePair<K, V>` from `Key` and `Value` child elements or attributes.
fn deserialize_key_value_pair(
    ctx: &mut Context<'_>,
    doc: &mut XmlDocument,
    elem: NodeId,
    desc: &TypeDescriptor,
) -> Result<Value> {
    let mut object = Object::new(desc.name.clone());

    for member in &desc.members {
        let member_desc = ctx.descriptor(&member.type_name)?;
        let layout = Layout::of(member);

        let value = if let Some(child) = doc.first_child(elem, &member.alias) {
            deserialize_value(ctx, doc, child, &member_desc, layout, None)?
        } else if let Some(text) = doc.attribute(elem, &member.alias).map(str::to_string) {
            parse_text(ctx, &text, &member_desc, layout)?.unwrap_or(Value::Null)
        } else {
            ctx.report_default(Error::ElementMissing {
                path: doc.path_of(elem),
                element: member.alias.to_string(),
            })?;
            Value::Null
        };
        object.set(member.name.clone(), value);
    }

    Ok(Value::Object(object.into_ref()))
}
