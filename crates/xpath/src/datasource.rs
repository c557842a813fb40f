//! The contract between the expression engine and a host tree.
//!
//! The engine never touches a concrete document type; it navigates whatever
//! implements [`DataSourceNode`]. Nodes are small copyable handles; `Ord`
//! must order them by document position so node-sets can be normalized.

use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QName<'a> {
    pub prefix: Option<&'a str>,
    pub local: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Root,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

pub trait DataSourceNode<'a>:
    std::fmt::Debug + Clone + Copy + PartialEq + Eq + Hash + PartialOrd + Ord
{
    fn node_type(&self) -> NodeType;

    /// Qualified name for elements and attributes, target for processing
    /// instructions, `None` for everything else.
    fn name(&self) -> Option<QName<'a>>;

    /// The XPath `string()` value: text content for text nodes and elements,
    /// the value for attributes, the content for comments and PIs.
    fn string_value(&self) -> String;

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    fn parent(&self) -> Option<Self>;
}

/// An in-memory tree used by this crate's own tests and reusable from
/// dependent crates' tests.
pub mod mock {
    use super::*;
    use std::cmp::Ordering;
    use std::hash::Hasher;

    #[derive(Debug)]
    pub struct MockNodeData {
        pub node_type: NodeType,
        pub name: Option<(&'static str, Option<&'static str>)>,
        pub value: &'static str,
        pub children: Vec<usize>,
        pub attributes: Vec<usize>,
        pub parent: Option<usize>,
    }

    #[derive(Debug, Default)]
    pub struct MockTree {
        pub nodes: Vec<MockNodeData>,
    }

    #[derive(Debug, Clone, Copy)]
    pub struct MockNode<'a> {
        pub id: usize,
        pub tree: &'a MockTree,
    }

    impl<'a> PartialEq for MockNode<'a> {
        fn eq(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }
    impl<'a> Eq for MockNode<'a> {}
    impl<'a> PartialOrd for MockNode<'a> {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }
    impl<'a> Ord for MockNode<'a> {
        fn cmp(&self, other: &Self) -> Ordering {
            self.id.cmp(&other.id)
        }
    }
    impl<'a> Hash for MockNode<'a> {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.id.hash(state);
        }
    }

    impl<'a> DataSourceNode<'a> for MockNode<'a> {
        fn node_type(&self) -> NodeType {
            self.tree.nodes[self.id].node_type
        }

        fn name(&self) -> Option<QName<'a>> {
            self.tree.nodes[self.id]
                .name
                .map(|(local, prefix)| QName { prefix, local })
        }

        fn string_value(&self) -> String {
            let data = &self.tree.nodes[self.id];
            match data.node_type {
                NodeType::Root | NodeType::Element => {
                    let mut out = String::new();
                    for &c in &data.children {
                        let child = MockNode { id: c, tree: self.tree };
                        match child.node_type() {
                            NodeType::Comment | NodeType::ProcessingInstruction => {}
                            _ => out.push_str(&child.string_value()),
                        }
                    }
                    if data.children.is_empty() {
                        out.push_str(data.value);
                    }
                    out
                }
                _ => data.value.to_string(),
            }
        }

        fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
            let tree = self.tree;
            let ids = tree.nodes[self.id].attributes.clone();
            Box::new(ids.into_iter().map(move |id| MockNode { id, tree }))
        }

        fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
            let tree = self.tree;
            let ids = tree.nodes[self.id].children.clone();
            Box::new(ids.into_iter().map(move |id| MockNode { id, tree }))
        }

        fn parent(&self) -> Option<Self> {
            self.tree.nodes[self.id]
                .parent
                .map(|id| MockNode { id, tree: self.tree })
        }
    }

    /// ```text
    /// root                      (0)
    ///   <chapter id="c1">       (1, attr 2)
    ///     "Intro"               (3)
    ///   <!-- remark -->         (4)
    ///   <chapter lang="en">     (5, attr 6)
    ///     <title>               (7)
    ///       "Body"              (8)
    ///   <?render fast?>         (9)
    /// ```
    pub fn sample_tree() -> MockTree {
        let mut tree = MockTree::default();
        tree.nodes = vec![
            MockNodeData {
                node_type: NodeType::Root,
                name: None,
                value: "",
                children: vec![1, 4, 5, 9],
                attributes: vec![],
                parent: None,
            },
            MockNodeData {
                node_type: NodeType::Element,
                name: Some(("chapter", None)),
                value: "",
                children: vec![3],
                attributes: vec![2],
                parent: Some(0),
            },
            MockNodeData {
                node_type: NodeType::Attribute,
                name: Some(("id", None)),
                value: "c1",
                children: vec![],
                attributes: vec![],
                parent: Some(1),
            },
            MockNodeData {
                node_type: NodeType::Text,
                name: None,
                value: "Intro",
                children: vec![],
                attributes: vec![],
                parent: Some(1),
            },
            MockNodeData {
                node_type: NodeType::Comment,
                name: None,
                value: " remark ",
                children: vec![],
                attributes: vec![],
                parent: Some(0),
            },
            MockNodeData {
                node_type: NodeType::Element,
                name: Some(("chapter", None)),
                value: "",
                children: vec![7],
                attributes: vec![6],
                parent: Some(0),
            },
            MockNodeData {
                node_type: NodeType::Attribute,
                name: Some(("lang", Some("xml"))),
                value: "en",
                children: vec![],
                attributes: vec![],
                parent: Some(5),
            },
            MockNodeData {
                node_type: NodeType::Element,
                name: Some(("title", None)),
                value: "",
                children: vec![8],
                attributes: vec![],
                parent: Some(5),
            },
            MockNodeData {
                node_type: NodeType::Text,
                name: None,
                value: "Body",
                children: vec![],
                attributes: vec![],
                parent: Some(7),
            },
            MockNodeData {
                node_type: NodeType::ProcessingInstruction,
                name: Some(("render", None)),
                value: "fast",
                children: vec![],
                attributes: vec![],
                parent: Some(0),
            },
        ];
        tree
    }
}
