//! Arena-backed XML element tree.
//!
//! Nodes are stored in a flat vector and reference each other by index,
//! with parent links so relative location paths (`..`) can be resolved from
//! any element. Detached nodes stay in the arena until the document is dropped.

use crate::name::XName;

/// Index of a node within an [`XmlDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Position in the arena. Nodes created later have larger indices.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An attribute on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XAttribute {
    /// Qualified attribute name.
    pub name: XName,
    /// Unescaped attribute value.
    pub value: String,
}

/// Element payload of a node.
#[derive(Debug, Clone)]
pub struct ElementData {
    /// Qualified element name.
    pub name: XName,
    /// Attributes in document order.
    pub attributes: Vec<XAttribute>,
    /// Child nodes in document order.
    pub children: Vec<NodeId>,
}

/// The kind of a node in the tree.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// An element with attributes and children.
    Element(ElementData),
    /// Character data.
    Text(String),
    /// A CDATA section.
    CData(String),
    /// A comment.
    Comment(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    parent: Option<NodeId>,
    kind: NodeKind,
}

/// A mutable XML document.
#[derive(Debug, Clone, Default)]
pub struct XmlDocument {
    nodes: Vec<NodeData>,
    root: Option<NodeId>,
    prolog: Vec<String>,
}

/// One step of a relative location path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    /// `.`: stay on the current element.
    Current,
    /// `..`: move to the parent element.
    Parent,
    /// Move to (or create) the first child element with this name.
    Child(XName),
}

/// Split a location path like `Info/../Data` into steps.
///
/// Empty segments are ignored, so `""`, `"."` and `"/"` all denote the
/// current element.
pub fn parse_path(path: &str) -> Vec<PathStep> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| match segment {
            "." => PathStep::Current,
            ".." => PathStep::Parent,
            name => PathStep::Child(XName::parse(name)),
        })
        .collect()
}

impl XmlDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document whose root element has the given name.
    pub fn with_root(name: impl Into<XName>) -> Self {
        let mut doc = Self::new();
        let root = doc.create_element(name);
        doc.root = Some(root);
        doc
    }

    /// Number of nodes in the arena, detached ones included.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get the root element.
    #[inline]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Replace the root element. The node is detached from any parent first.
    pub fn set_root(&mut self, node: NodeId) {
        self.detach(node);
        self.root = Some(node);
    }

    /// Comments written before the root element.
    pub fn prolog_comments(&self) -> &[String] {
        &self.prolog
    }

    /// Add a comment before the root element.
    pub fn add_prolog_comment(&mut self, text: impl Into<String>) {
        self.prolog.push(text.into());
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData { parent: None, kind });
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, name: impl Into<XName>) -> NodeId {
        self.push(NodeKind::Element(ElementData {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }))
    }

    /// Create an element and append it to `parent`.
    pub fn add_element(&mut self, parent: NodeId, name: impl Into<XName>) -> NodeId {
        let child = self.create_element(name);
        self.append_child(parent, child);
        child
    }

    /// Append a text node to `parent`.
    pub fn add_text(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        let node = self.push(NodeKind::Text(text.into()));
        self.append_child(parent, node);
        node
    }

    /// Append a CDATA section to `parent`.
    pub fn add_cdata(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        let node = self.push(NodeKind::CData(text.into()));
        self.append_child(parent, node);
        node
    }

    /// Append a comment to `parent`.
    pub fn add_comment(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        let node = self.push(NodeKind::Comment(text.into()));
        self.append_child(parent, node);
        node
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        if let Some(data) = self.element_mut(parent) {
            data.children.push(child);
            self.nodes[child.index()].parent = Some(parent);
        }
    }

    /// Insert `child` at `index` among the children of `parent`.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        if let Some(data) = self.element_mut(parent) {
            let index = index.min(data.children.len());
            data.children.insert(index, child);
            self.nodes[child.index()].parent = Some(parent);
        }
    }

    /// Remove a node from its parent. The node and its subtree stay valid.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.index()].parent.take() {
            if let Some(data) = self.element_mut(parent) {
                data.children.retain(|&c| c != node);
            }
        }
        if self.root == Some(node) {
            self.root = None;
        }
    }

    /// Get the parent of a node.
    #[inline]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].parent
    }

    /// Get the kind of a node.
    #[inline]
    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.index()].kind
    }

    /// Get the element payload of a node, if it is an element.
    pub fn element(&self, node: NodeId) -> Option<&ElementData> {
        match &self.nodes[node.index()].kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[node.index()].kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    /// Get the name of an element.
    pub fn name(&self, node: NodeId) -> Option<&XName> {
        self.element(node).map(|e| &e.name)
    }

    /// Rename an element.
    pub fn set_name(&mut self, node: NodeId, name: impl Into<XName>) {
        if let Some(data) = self.element_mut(node) {
            data.name = name.into();
        }
    }

    /// Get the child nodes of an element.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.element(node).map(|e| e.children.as_slice()).unwrap_or(&[])
    }

    /// Iterate over the child elements of an element.
    pub fn child_elements(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(node)
            .iter()
            .copied()
            .filter(move |&c| self.element(c).is_some())
    }

    /// Iterate over the child elements with a given name.
    pub fn child_elements_named<'a>(
        &'a self,
        node: NodeId,
        name: &'a XName,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.child_elements(node)
            .filter(move |&c| self.name(c) == Some(name))
    }

    /// Find the first child element with a given name.
    pub fn first_child(&self, node: NodeId, name: &XName) -> Option<NodeId> {
        self.child_elements_named(node, name).next()
    }

    /// Get the attributes of an element.
    pub fn attributes(&self, node: NodeId) -> &[XAttribute] {
        self.element(node).map(|e| e.attributes.as_slice()).unwrap_or(&[])
    }

    /// Get an attribute value.
    pub fn attribute(&self, node: NodeId, name: &XName) -> Option<&str> {
        self.attributes(node)
            .iter()
            .find(|a| &a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Check whether an element has an attribute.
    #[inline]
    pub fn has_attribute(&self, node: NodeId, name: &XName) -> bool {
        self.attribute(node, name).is_some()
    }

    /// Set an attribute, replacing any existing value.
    pub fn set_attribute(&mut self, node: NodeId, name: impl Into<XName>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(data) = self.element_mut(node) {
            match data.attributes.iter_mut().find(|a| a.name == name) {
                Some(existing) => existing.value = value,
                None => data.attributes.push(XAttribute { name, value }),
            }
        }
    }

    /// Remove an attribute, returning its value.
    pub fn remove_attribute(&mut self, node: NodeId, name: &XName) -> Option<String> {
        let data = self.element_mut(node)?;
        let pos = data.attributes.iter().position(|a| &a.name == name)?;
        Some(data.attributes.remove(pos).value)
    }

    /// Concatenated text and CDATA content directly under an element.
    pub fn text(&self, node: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(node) {
            match self.kind(child) {
                NodeKind::Text(t) | NodeKind::CData(t) => out.push_str(t),
                _ => {}
            }
        }
        out
    }

    /// Check whether an element has any direct text or CDATA child.
    pub fn has_text(&self, node: NodeId) -> bool {
        self.children(node)
            .iter()
            .any(|&c| matches!(self.kind(c), NodeKind::Text(_) | NodeKind::CData(_)))
    }

    /// Check whether an element has a CDATA child.
    pub fn has_cdata(&self, node: NodeId) -> bool {
        self.children(node)
            .iter()
            .any(|&c| matches!(self.kind(c), NodeKind::CData(_)))
    }

    /// Check whether an element has no attributes, no text and no child elements.
    ///
    /// Comments do not count as content. An empty text node does, so
    /// `<a></a>` is not empty while `<a/>` is; see [`is_blank`](Self::is_blank).
    pub fn is_empty_element(&self, node: NodeId) -> bool {
        match self.element(node) {
            Some(data) => {
                data.attributes.is_empty()
                    && data
                        .children
                        .iter()
                        .all(|&c| matches!(self.kind(c), NodeKind::Comment(_)))
            }
            None => false,
        }
    }

    /// Like [`is_empty_element`](Self::is_empty_element), but empty text
    /// nodes do not count as content either.
    pub fn is_blank(&self, node: NodeId) -> bool {
        match self.element(node) {
            Some(data) => {
                data.attributes.is_empty()
                    && data.children.iter().all(|&c| match self.kind(c) {
                        NodeKind::Comment(_) => true,
                        NodeKind::Text(t) => t.is_empty(),
                        _ => false,
                    })
            }
            None => false,
        }
    }

    /// Move the children of `node` into its parent at its position and detach it.
    ///
    /// Returns `false` if the node has no parent.
    pub fn splice_into_parent(&mut self, node: NodeId) -> bool {
        let Some(parent) = self.parent(node) else {
            return false;
        };
        let position = self
            .children(parent)
            .iter()
            .position(|&c| c == node)
            .unwrap_or(self.children(parent).len());
        let moved: Vec<NodeId> = self.children(node).to_vec();
        self.detach(node);
        for (offset, child) in moved.into_iter().enumerate() {
            self.insert_child(parent, position + offset, child);
        }
        true
    }

    /// Resolve a relative location path without modifying the tree.
    pub fn find_location(&self, base: NodeId, path: &str) -> Option<NodeId> {
        let mut current = base;
        for step in parse_path(path) {
            current = match step {
                PathStep::Current => current,
                PathStep::Parent => self.parent(current)?,
                PathStep::Child(name) => self.first_child(current, &name)?,
            };
        }
        Some(current)
    }

    /// Resolve a relative location path, creating missing child elements.
    ///
    /// Returns `None` when the path climbs above the topmost element.
    pub fn create_location(&mut self, base: NodeId, path: &str) -> Option<NodeId> {
        let mut current = base;
        for step in parse_path(path) {
            current = match step {
                PathStep::Current => current,
                PathStep::Parent => self.parent(current)?,
                PathStep::Child(name) => match self.first_child(current, &name) {
                    Some(existing) => existing,
                    None => self.add_element(current, name),
                },
            };
        }
        Some(current)
    }

    /// Slash-separated path of local names from the topmost ancestor, for diagnostics.
    pub fn path_of(&self, node: NodeId) -> String {
        let mut names = Vec::new();
        let mut current = Some(node);
        while let Some(n) = current {
            if let Some(name) = self.name(n) {
                names.push(name.local.clone());
            }
            current = self.parent(n);
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    /// Deep-copy a subtree from another document as a detached node.
    pub fn import(&mut self, source: &XmlDocument, node: NodeId) -> NodeId {
        let copy = match source.kind(node) {
            NodeKind::Element(data) => {
                let id = self.create_element(data.name.clone());
                if let Some(target) = self.element_mut(id) {
                    target.attributes = data.attributes.clone();
                }
                id
            }
            other => self.push(other.clone()),
        };
        for &child in source.children(node) {
            let imported = self.import(source, child);
            self.append_child(copy, imported);
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_navigate() {
        let mut doc = XmlDocument::with_root("Root");
        let root = doc.root().unwrap();
        let child = doc.add_element(root, "Child");
        doc.set_attribute(child, "id", "1");
        doc.add_text(child, "hello");

        assert_eq!(doc.parent(child), Some(root));
        assert_eq!(doc.first_child(root, &XName::new("Child")), Some(child));
        assert_eq!(doc.attribute(child, &XName::new("id")), Some("1"));
        assert_eq!(doc.text(child), "hello");
        assert_eq!(doc.path_of(child), "/Root/Child");
    }

    #[test]
    fn test_set_attribute_replaces() {
        let mut doc = XmlDocument::with_root("Root");
        let root = doc.root().unwrap();
        doc.set_attribute(root, "a", "1");
        doc.set_attribute(root, "a", "2");
        assert_eq!(doc.attributes(root).len(), 1);
        assert_eq!(doc.remove_attribute(root, &XName::new("a")).as_deref(), Some("2"));
        assert!(doc.attributes(root).is_empty());
    }

    #[test]
    fn test_create_and_find_location() {
        let mut doc = XmlDocument::with_root("Root");
        let root = doc.root().unwrap();

        let info = doc.create_location(root, "Info/Detail").unwrap();
        assert_eq!(doc.path_of(info), "/Root/Info/Detail");
        assert_eq!(doc.find_location(root, "Info/Detail"), Some(info));
        assert_eq!(doc.find_location(info, "../.."), Some(root));
        assert_eq!(doc.find_location(root, "."), Some(root));
        assert_eq!(doc.find_location(root, "Missing"), None);

        // Climbing above the root cannot be created.
        assert_eq!(doc.create_location(root, ".."), None);
    }

    #[test]
    fn test_detach_and_empty() {
        let mut doc = XmlDocument::with_root("Root");
        let root = doc.root().unwrap();
        let child = doc.add_element(root, "Child");
        assert!(!doc.is_empty_element(root));
        doc.detach(child);
        assert!(doc.is_empty_element(root));
        assert_eq!(doc.parent(child), None);

        doc.add_comment(root, "note");
        assert!(doc.is_empty_element(root));

        doc.add_text(root, "");
        assert!(!doc.is_empty_element(root));
        assert!(doc.is_blank(root));
        doc.add_text(root, "x");
        assert!(!doc.is_blank(root));
    }

    #[test]
    fn test_splice_into_parent() {
        let mut doc = XmlDocument::with_root("Root");
        let root = doc.root().unwrap();
        doc.add_element(root, "Before");
        let wrapper = doc.add_element(root, "Wrapper");
        doc.add_element(wrapper, "A");
        doc.add_element(wrapper, "B");
        doc.add_element(root, "After");

        assert!(doc.splice_into_parent(wrapper));
        let names: Vec<_> = doc
            .child_elements(root)
            .map(|c| doc.name(c).unwrap().local.clone())
            .collect();
        assert_eq!(names, ["Before", "A", "B", "After"]);
    }

    #[test]
    fn test_text_concatenation() {
        let mut doc = XmlDocument::with_root("Root");
        let root = doc.root().unwrap();
        doc.add_text(root, "a");
        doc.add_cdata(root, "<b>");
        assert_eq!(doc.text(root), "a<b>");
        assert!(doc.has_cdata(root));
    }

    #[test]
    fn test_import_subtree() {
        let mut source = XmlDocument::with_root("Root");
        let root = source.root().unwrap();
        let child = source.add_element(root, "Child");
        source.set_attribute(child, "k", "v");
        source.add_text(child, "text");

        let mut target = XmlDocument::new();
        let copy = target.import(&source, root);
        target.set_root(copy);
        let copied_child = target.first_child(copy, &XName::new("Child")).unwrap();
        assert_eq!(target.attribute(copied_child, &XName::new("k")), Some("v"));
        assert_eq!(target.text(copied_child), "text");
    }
}
