//! Adapts the arena DOM to the XPath engine's [`DataSourceNode`] contract.
//!
//! Attributes are not arena nodes, so the adapter addresses them as
//! `(owning element, index)` pairs. Ordering follows document position:
//! arena indices are allocated in parse order, and an element's attributes
//! sort directly after the element itself.

use larch_xml::{Document, NodeKind, NodeRef};
use larch_xpath::{DataSourceNode, NodeType, QName};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy)]
pub enum DomNode<'a> {
    Node(NodeRef<'a>),
    Attr { parent: NodeRef<'a>, index: usize },
}

impl<'a> DomNode<'a> {
    pub fn document_root(doc: &'a Document) -> Self {
        DomNode::Node(doc.root_ref())
    }

    pub fn node_ref(&self) -> Option<NodeRef<'a>> {
        match self {
            DomNode::Node(node) => Some(*node),
            DomNode::Attr { .. } => None,
        }
    }

    /// `(document pointer, node id, attribute slot)` — a total order that is
    /// document order within any one document, and a stable per-node tag
    /// for the lifetime of a run.
    pub(crate) fn sort_key(&self) -> (usize, usize, usize) {
        match self {
            DomNode::Node(n) => (n.doc as *const Document as usize, n.id, 0),
            DomNode::Attr { parent, index } => {
                (parent.doc as *const Document as usize, parent.id, index + 1)
            }
        }
    }
}

impl<'a> PartialEq for DomNode<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}
impl<'a> Eq for DomNode<'a> {}

impl<'a> PartialOrd for DomNode<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<'a> Ord for DomNode<'a> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl<'a> Hash for DomNode<'a> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sort_key().hash(state);
    }
}

impl<'a> DataSourceNode<'a> for DomNode<'a> {
    fn node_type(&self) -> NodeType {
        match self {
            DomNode::Node(node) => match node.kind() {
                NodeKind::Document | NodeKind::Fragment => NodeType::Root,
                NodeKind::Element(_) => NodeType::Element,
                NodeKind::Text(_) | NodeKind::CData(_) => NodeType::Text,
                NodeKind::Comment(_) => NodeType::Comment,
                NodeKind::ProcessingInstruction { .. } => NodeType::ProcessingInstruction,
            },
            DomNode::Attr { .. } => NodeType::Attribute,
        }
    }

    fn name(&self) -> Option<QName<'a>> {
        match self {
            DomNode::Node(node) => node.name().map(|n| {
                let (prefix, local) = larch_xml::document::split_qname(n);
                QName { prefix, local }
            }),
            DomNode::Attr { parent, index } => parent.attributes().get(*index).map(|attr| {
                let (prefix, local) = larch_xml::document::split_qname(&attr.name);
                QName { prefix, local }
            }),
        }
    }

    fn string_value(&self) -> String {
        match self {
            DomNode::Node(node) => match node.kind() {
                NodeKind::Text(t) | NodeKind::CData(t) | NodeKind::Comment(t) => t.clone(),
                NodeKind::ProcessingInstruction { data, .. } => data.clone(),
                _ => node.text_content(),
            },
            DomNode::Attr { parent, index } => parent
                .attributes()
                .get(*index)
                .map(|a| a.value.clone())
                .unwrap_or_default(),
        }
    }

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        match self {
            DomNode::Node(node) if node.is_element() => {
                let parent = *node;
                let count = node.attributes().len();
                Box::new((0..count).map(move |index| DomNode::Attr { parent, index }))
            }
            _ => Box::new(std::iter::empty()),
        }
    }

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        match self {
            DomNode::Node(node) => Box::new(node.children().map(DomNode::Node)),
            DomNode::Attr { .. } => Box::new(std::iter::empty()),
        }
    }

    fn parent(&self) -> Option<Self> {
        match self {
            DomNode::Node(node) => node.parent().map(DomNode::Node),
            DomNode::Attr { parent, .. } => Some(DomNode::Node(*parent)),
        }
    }
}
