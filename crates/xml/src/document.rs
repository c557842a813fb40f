//! The arena document model.
//!
//! Node 0 is always the document node. Fragments are parentless subtrees in
//! the same arena, used as scratch space for result-tree construction.
//! Document order for nodes of one parse equals arena-index order because
//! indices are handed out while reading the document front to back.

use std::collections::HashMap;

/// The XSLT namespace, reserved for the `xsl` prefix.
pub const XSLT_NS: &str = "http://www.w3.org/1999/XSL/Transform";
/// The implicit namespace of the `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Qualified source name (`prefix:local` or plain `local`).
    pub name: String,
    /// Resolved namespace URI for prefixed attribute names.
    pub namespace: Option<String>,
    /// Attribute value with entity references already decoded.
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementData {
    /// Qualified source name.
    pub name: String,
    /// Resolved namespace URI of the element itself.
    pub namespace: Option<String>,
    pub attributes: Vec<Attribute>,
    /// Namespace declarations on this element: prefix (empty = default) to URI.
    pub namespace_decls: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Fragment,
    Element(ElementData),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
}

/// Splits a qualified name into `(prefix, local)`.
pub fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Document {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn node_ref(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { doc: self, id }
    }

    pub fn root_ref(&self) -> NodeRef<'_> {
        self.node_ref(0)
    }

    /// The document element, when one exists.
    pub fn document_element(&self) -> Option<NodeId> {
        self.nodes[0]
            .children
            .iter()
            .copied()
            .find(|&c| matches!(self.nodes[c].kind, NodeKind::Element(_)))
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id].kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[id].kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    // --- Constructors ---

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push_node(NodeKind::Element(ElementData {
            name: name.to_string(),
            ..ElementData::default()
        }))
    }

    pub fn create_element_ns(&mut self, namespace: Option<&str>, name: &str) -> NodeId {
        self.push_node(NodeKind::Element(ElementData {
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            ..ElementData::default()
        }))
    }

    /// Creates a text node, collapsing runs of ASCII spaces to a single
    /// space. Further whitespace policy is applied by higher layers.
    pub fn create_text_node(&mut self, text: &str) -> NodeId {
        let mut collapsed = String::with_capacity(text.len());
        let mut last_was_space = false;
        for ch in text.chars() {
            if ch == ' ' {
                if !last_was_space {
                    collapsed.push(' ');
                }
                last_was_space = true;
            } else {
                collapsed.push(ch);
                last_was_space = false;
            }
        }
        self.push_node(NodeKind::Text(collapsed))
    }

    /// Creates a text node with the given content untouched.
    pub fn create_raw_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(text.to_string()))
    }

    pub fn create_cdata(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::CData(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Comment(text.to_string()))
    }

    pub fn create_processing_instruction(&mut self, target: &str, data: &str) -> NodeId {
        self.push_node(NodeKind::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        })
    }

    /// A parentless container used to collect intermediate output.
    pub fn create_fragment(&mut self) -> NodeId {
        self.push_node(NodeKind::Fragment)
    }

    // --- Tree mutation ---

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    /// Inserts `new` into `parent`'s child list immediately before `before`.
    /// Appends when `before` is not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, new: NodeId, before: NodeId) {
        self.detach(new);
        self.nodes[new].parent = Some(parent);
        match self.nodes[parent].children.iter().position(|&c| c == before) {
            Some(idx) => self.nodes[parent].children.insert(idx, new),
            None => self.nodes[parent].children.push(new),
        }
    }

    /// Unlinks a node from its parent. The node stays in the arena and can be
    /// re-attached.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&c| c != id);
        }
    }

    pub fn set_attribute(&mut self, el: NodeId, name: &str, value: &str) {
        self.set_attribute_ns(el, None, name, value);
    }

    pub fn set_attribute_ns(
        &mut self,
        el: NodeId,
        namespace: Option<&str>,
        name: &str,
        value: &str,
    ) {
        if let Some(data) = self.element_mut(el) {
            if let Some(attr) = data.attributes.iter_mut().find(|a| a.name == name) {
                attr.value = value.to_string();
                attr.namespace = namespace.map(str::to_string);
            } else {
                data.attributes.push(Attribute {
                    name: name.to_string(),
                    namespace: namespace.map(str::to_string),
                    value: value.to_string(),
                });
            }
        }
    }

    pub fn remove_attribute(&mut self, el: NodeId, name: &str) {
        if let Some(data) = self.element_mut(el) {
            data.attributes.retain(|a| a.name != name);
        }
    }

    pub fn add_namespace_decl(&mut self, el: NodeId, prefix: &str, uri: &str) {
        if let Some(data) = self.element_mut(el) {
            data.namespace_decls
                .push((prefix.to_string(), uri.to_string()));
        }
    }

    // --- Queries ---

    /// Resolves a namespace prefix by walking from `start` to the root.
    /// An empty prefix resolves the default namespace. The `xml` prefix is
    /// implicitly bound.
    pub fn lookup_namespace(&self, start: NodeId, prefix: &str) -> Option<String> {
        if prefix == "xml" {
            return Some(XML_NS.to_string());
        }
        let mut current = Some(start);
        while let Some(id) = current {
            if let NodeKind::Element(data) = &self.nodes[id].kind {
                if let Some((_, uri)) = data.namespace_decls.iter().find(|(p, _)| p == prefix) {
                    return Some(uri.clone());
                }
            }
            current = self.nodes[id].parent;
        }
        None
    }

    /// Concatenated text of the node's subtree, as XPath's `string()` sees it.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id].kind {
            NodeKind::Text(t) | NodeKind::CData(t) => out.push_str(t),
            NodeKind::Comment(_) | NodeKind::ProcessingInstruction { .. } => {}
            _ => {
                for &child in &self.nodes[id].children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    // --- Cross-document copies ---

    /// Shallow-copies `src` (a node of `src_doc`) into this document as the
    /// last child of `dst_parent`. Elements carry their name, namespace and
    /// attributes (minus `xmlns*`); text, CDATA, comments and processing
    /// instructions are reconstructed as-is. Document and fragment sources
    /// produce nothing. Returns the created node.
    pub fn copy_shallow(
        &mut self,
        dst_parent: NodeId,
        src_doc: &Document,
        src: NodeId,
    ) -> Option<NodeId> {
        let created = match src_doc.kind(src) {
            NodeKind::Element(data) => {
                let el = self.create_element_ns(data.namespace.as_deref(), &data.name);
                for attr in &data.attributes {
                    if !is_xmlns_attr(&attr.name) {
                        self.set_attribute_ns(el, attr.namespace.as_deref(), &attr.name, &attr.value);
                    }
                }
                Some(el)
            }
            NodeKind::Text(t) => Some(self.create_raw_text(t)),
            NodeKind::CData(t) => Some(self.create_cdata(t)),
            NodeKind::Comment(t) => Some(self.create_comment(t)),
            NodeKind::ProcessingInstruction { target, data } => {
                Some(self.create_processing_instruction(target, data))
            }
            NodeKind::Document | NodeKind::Fragment => None,
        };
        if let Some(id) = created {
            self.append_child(dst_parent, id);
        }
        created
    }

    /// Recursively copies `src` into `dst_parent`: the node itself, then its
    /// children. For a document or fragment source the element children are
    /// copied instead, and the last top-level copy is returned.
    pub fn copy_deep(
        &mut self,
        dst_parent: NodeId,
        src_doc: &Document,
        src: NodeId,
    ) -> Option<NodeId> {
        match src_doc.kind(src) {
            NodeKind::Document | NodeKind::Fragment => {
                let mut last = None;
                for &child in src_doc.children(src) {
                    if src_doc.element(child).is_some() {
                        last = self.copy_deep(dst_parent, src_doc, child);
                    }
                }
                last
            }
            _ => {
                let copied = self.copy_shallow(dst_parent, src_doc, src)?;
                for &child in src_doc.children(src) {
                    self.copy_deep(copied, src_doc, child);
                }
                Some(copied)
            }
        }
    }
}

fn is_xmlns_attr(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

/// A read-only cursor over one node of a document.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'d> {
    pub doc: &'d Document,
    pub id: NodeId,
}

impl<'d> PartialEq for NodeRef<'d> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }
}

impl<'d> Eq for NodeRef<'d> {}

impl<'d> NodeRef<'d> {
    pub fn kind(&self) -> &'d NodeKind {
        self.doc.kind(self.id)
    }

    pub fn is_element(&self) -> bool {
        matches!(self.kind(), NodeKind::Element(_))
    }

    pub fn element(&self) -> Option<&'d ElementData> {
        self.doc.element(self.id)
    }

    /// Qualified name for elements, target for processing instructions.
    pub fn name(&self) -> Option<&'d str> {
        match self.kind() {
            NodeKind::Element(data) => Some(&data.name),
            NodeKind::ProcessingInstruction { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn local_name(&self) -> Option<&'d str> {
        self.name().map(|n| split_qname(n).1)
    }

    pub fn prefix(&self) -> Option<&'d str> {
        self.name().and_then(|n| split_qname(n).0)
    }

    pub fn namespace(&self) -> Option<&'d str> {
        self.element().and_then(|e| e.namespace.as_deref())
    }

    pub fn parent(&self) -> Option<NodeRef<'d>> {
        self.doc.parent(self.id).map(|id| self.doc.node_ref(id))
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'d>> + 'd {
        let doc = self.doc;
        self.doc.children(self.id).iter().map(move |&id| doc.node_ref(id))
    }

    pub fn attributes(&self) -> &'d [Attribute] {
        self.element().map(|e| e.attributes.as_slice()).unwrap_or(&[])
    }

    /// Attribute value by qualified name, entity references already decoded.
    pub fn attribute(&self, name: &str) -> Option<&'d str> {
        self.attributes()
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn text_content(&self) -> String {
        self.doc.text_content(self.id)
    }

    pub fn lookup_namespace(&self, prefix: &str) -> Option<String> {
        self.doc.lookup_namespace(self.id, prefix)
    }

    pub fn next_element_sibling(&self) -> Option<NodeRef<'d>> {
        let parent = self.doc.parent(self.id)?;
        let siblings = self.doc.children(parent);
        let pos = siblings.iter().position(|&c| c == self.id)?;
        siblings[pos + 1..]
            .iter()
            .find(|&&c| self.doc.element(c).is_some())
            .map(|&c| self.doc.node_ref(c))
    }

    pub fn previous_element_sibling(&self) -> Option<NodeRef<'d>> {
        let parent = self.doc.parent(self.id)?;
        let siblings = self.doc.children(parent);
        let pos = siblings.iter().position(|&c| c == self.id)?;
        siblings[..pos]
            .iter()
            .rev()
            .find(|&&c| self.doc.element(c).is_some())
            .map(|&c| self.doc.node_ref(c))
    }

    /// Element-only qualified-name test.
    ///
    /// `pattern` has the form `[^]prefix:local` or `[^]local`; a leading `^`
    /// inverts the result. The prefix resolves through `namespaces`, then
    /// through declarations in scope at this node; `xsl` always means the
    /// XSLT namespace. A pattern without a prefix matches on local name only.
    pub fn is_named(&self, pattern: &str, namespaces: &HashMap<String, String>) -> bool {
        let (negate, pattern) = match pattern.strip_prefix('^') {
            Some(rest) => (true, rest),
            None => (false, pattern),
        };
        let matched = self.is_named_positive(pattern, namespaces);
        matched != negate
    }

    fn is_named_positive(&self, pattern: &str, namespaces: &HashMap<String, String>) -> bool {
        let data = match self.element() {
            Some(data) => data,
            None => return false,
        };
        let (prefix, local) = split_qname(pattern);
        if split_qname(&data.name).1 != local {
            return false;
        }
        match prefix {
            None => true,
            Some("xsl") => data.namespace.as_deref() == Some(XSLT_NS),
            Some(p) => {
                let want = namespaces
                    .get(p)
                    .cloned()
                    .or_else(|| self.lookup_namespace(p));
                match want {
                    Some(uri) => data.namespace.as_deref() == Some(uri.as_str()),
                    None => false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let mut doc = Document::new();
        let root = doc.create_element("root");
        doc.append_child(0, root);
        let a = doc.create_element("a");
        doc.append_child(root, a);
        doc.set_attribute(a, "id", "first");
        let t = doc.create_raw_text("hello ");
        doc.append_child(a, t);
        let b = doc.create_element("b");
        doc.append_child(root, b);
        let t2 = doc.create_raw_text("world");
        doc.append_child(b, t2);
        doc
    }

    #[test]
    fn text_content_concatenates_subtree() {
        let doc = sample();
        assert_eq!(doc.text_content(doc.root()), "hello world");
    }

    #[test]
    fn create_text_node_collapses_space_runs() {
        let mut doc = Document::new();
        let t = doc.create_text_node("a    b  c");
        assert_eq!(doc.kind(t), &NodeKind::Text("a b c".to_string()));
        // Tabs and newlines pass through untouched.
        let t2 = doc.create_text_node("a\t\tb\n\nc");
        assert_eq!(doc.kind(t2), &NodeKind::Text("a\t\tb\n\nc".to_string()));
    }

    #[test]
    fn insert_before_and_detach() {
        let mut doc = Document::new();
        let root = doc.create_element("r");
        doc.append_child(0, root);
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        doc.append_child(root, b);
        doc.insert_before(root, a, b);
        let names: Vec<_> = doc
            .node_ref(root)
            .children()
            .filter_map(|c| c.name())
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        doc.detach(a);
        assert_eq!(doc.children(root), &[b]);
        assert_eq!(doc.parent(a), None);
    }

    #[test]
    fn shallow_copy_skips_xmlns_attributes() {
        let mut src = Document::new();
        let el = src.create_element("e");
        src.append_child(0, el);
        src.set_attribute(el, "xmlns:x", "urn:x");
        src.set_attribute(el, "kept", "yes");

        let mut dst = Document::new();
        let copied = dst.copy_shallow(dst.root(), &src, el).unwrap();
        let data = dst.element(copied).unwrap();
        assert_eq!(data.attributes.len(), 1);
        assert_eq!(data.attributes[0].name, "kept");
    }

    #[test]
    fn deep_copy_of_fragment_copies_element_children() {
        let mut src = Document::new();
        let frag = src.create_fragment();
        let x = src.create_element("x");
        src.append_child(frag, x);
        let y = src.create_element("y");
        src.append_child(frag, y);
        let inner = src.create_raw_text("deep");
        src.append_child(y, inner);

        let mut dst = Document::new();
        let last = dst.copy_deep(dst.root(), &src, frag).unwrap();
        assert_eq!(dst.node_ref(last).name(), Some("y"));
        assert_eq!(dst.text_content(dst.root()), "deep");
    }

    #[test]
    fn element_sibling_walk_skips_text() {
        let doc = sample();
        let root = doc.document_element().unwrap();
        let a = doc.children(root)[0];
        let next = doc.node_ref(a).next_element_sibling().unwrap();
        assert_eq!(next.name(), Some("b"));
        assert_eq!(
            next.previous_element_sibling().map(|n| n.id),
            Some(a)
        );
    }

    #[test]
    fn is_named_with_negation_and_xsl_prefix() {
        let mut doc = Document::new();
        let el = doc.create_element_ns(Some(XSLT_NS), "t:template");
        doc.append_child(0, el);
        let ns = HashMap::new();
        let node = doc.node_ref(el);
        assert!(node.is_named("xsl:template", &ns));
        assert!(node.is_named("template", &ns));
        assert!(!node.is_named("^xsl:template", &ns));
        assert!(!node.is_named("xsl:value-of", &ns));
    }

    #[test]
    fn lookup_namespace_walks_ancestors() {
        let mut doc = Document::new();
        let outer = doc.create_element("outer");
        doc.append_child(0, outer);
        doc.add_namespace_decl(outer, "p", "urn:outer");
        let inner = doc.create_element("inner");
        doc.append_child(outer, inner);

        assert_eq!(
            doc.lookup_namespace(inner, "p").as_deref(),
            Some("urn:outer")
        );
        assert_eq!(doc.lookup_namespace(inner, "xml").as_deref(), Some(XML_NS));
        assert_eq!(doc.lookup_namespace(inner, "missing"), None);
    }
}
