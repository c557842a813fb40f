//! Node collection along each XPath axis.
//!
//! Collection accumulates into [`AxisAccumulator`], which keeps first-seen
//! order while rejecting duplicates. Forward axes yield document order;
//! reverse axes (ancestor, preceding, preceding-sibling) yield reverse
//! document order, which callers normalize when they need document order.

use crate::ast::Axis;
use crate::datasource::DataSourceNode;
use std::collections::HashSet;

#[derive(Debug)]
pub struct AxisAccumulator<N> {
    seen: HashSet<N>,
    nodes: Vec<N>,
}

impl<'a, N: DataSourceNode<'a>> Default for AxisAccumulator<N> {
    fn default() -> Self {
        AxisAccumulator {
            seen: HashSet::new(),
            nodes: Vec::new(),
        }
    }
}

impl<'a, N: DataSourceNode<'a>> AxisAccumulator<N> {
    pub fn push(&mut self, node: N) {
        if self.seen.insert(node) {
            self.nodes.push(node);
        }
    }

    pub fn into_nodes(self) -> Vec<N> {
        self.nodes
    }
}

/// Adds every node reachable from `node` along `axis`.
pub fn collect<'a, N: DataSourceNode<'a>>(axis: Axis, node: N, acc: &mut AxisAccumulator<N>) {
    match axis {
        Axis::SelfAxis => acc.push(node),
        Axis::Child => {
            for child in node.children() {
                acc.push(child);
            }
        }
        Axis::Attribute => {
            for attr in node.attributes() {
                acc.push(attr);
            }
        }
        Axis::Descendant => descend(node, acc),
        Axis::DescendantOrSelf => {
            acc.push(node);
            descend(node, acc);
        }
        Axis::Parent => {
            if let Some(parent) = node.parent() {
                acc.push(parent);
            }
        }
        Axis::Ancestor => ascend(node, acc),
        Axis::AncestorOrSelf => {
            acc.push(node);
            ascend(node, acc);
        }
        Axis::FollowingSibling => {
            for sibling in siblings_after(node) {
                acc.push(sibling);
            }
        }
        Axis::PrecedingSibling => {
            for sibling in siblings_before(node).into_iter().rev() {
                acc.push(sibling);
            }
        }
        Axis::Following => {
            let mut current = Some(node);
            while let Some(c) = current {
                for sibling in siblings_after(c) {
                    acc.push(sibling);
                    descend(sibling, acc);
                }
                current = c.parent();
            }
        }
        Axis::Preceding => {
            let mut current = Some(node);
            while let Some(c) = current {
                for sibling in siblings_before(c).into_iter().rev() {
                    acc.push(sibling);
                    descend(sibling, acc);
                }
                current = c.parent();
            }
        }
    }
}

/// Pre-order descent, so descendants arrive in document order.
fn descend<'a, N: DataSourceNode<'a>>(node: N, acc: &mut AxisAccumulator<N>) {
    for child in node.children() {
        acc.push(child);
        descend(child, acc);
    }
}

fn ascend<'a, N: DataSourceNode<'a>>(node: N, acc: &mut AxisAccumulator<N>) {
    let mut current = node.parent();
    while let Some(p) = current {
        acc.push(p);
        current = p.parent();
    }
}

fn siblings_after<'a, N: DataSourceNode<'a>>(node: N) -> Vec<N> {
    let mut out = Vec::new();
    if let Some(parent) = node.parent() {
        let mut past_self = false;
        for sibling in parent.children() {
            if past_self {
                out.push(sibling);
            }
            if sibling == node {
                past_self = true;
            }
        }
    }
    out
}

fn siblings_before<'a, N: DataSourceNode<'a>>(node: N) -> Vec<N> {
    let mut out = Vec::new();
    if let Some(parent) = node.parent() {
        for sibling in parent.children() {
            if sibling == node {
                break;
            }
            out.push(sibling);
        }
    }
    out
}
