//! Evaluation of parsed expressions against a data source.

use crate::ast::{Axis, BinaryOp, Expression, KindTest, NodeTest, Path, Step};
use crate::axes::{self, AxisAccumulator};
use crate::datasource::{DataSourceNode, NodeType};
use crate::error::XPathError;
use crate::functions::{self, FunctionResolver};
use crate::operators;
use crate::value::XPathValue;
use std::collections::HashMap;
use std::marker::PhantomData;

/// Everything an evaluation needs: the focus (node, position, size), the
/// document root, variable bindings, key indexes, and the host's function
/// resolver chain.
pub struct Context<'a, 'd, N: DataSourceNode<'a>> {
    pub node: N,
    pub root: N,
    /// 1-based position of `node` within the current node list.
    pub position: usize,
    pub size: usize,
    pub variables: &'d HashMap<String, XPathValue<N>>,
    pub key_indexes: &'d HashMap<String, HashMap<String, Vec<N>>>,
    pub resolver: Option<&'d dyn FunctionResolver<'a, N>>,
    _marker: PhantomData<&'a ()>,
}

impl<'a, 'd, N: DataSourceNode<'a>> Context<'a, 'd, N> {
    pub fn new(
        node: N,
        root: N,
        position: usize,
        size: usize,
        variables: &'d HashMap<String, XPathValue<N>>,
        key_indexes: &'d HashMap<String, HashMap<String, Vec<N>>>,
        resolver: Option<&'d dyn FunctionResolver<'a, N>>,
    ) -> Self {
        Context {
            node,
            root,
            position,
            size,
            variables,
            key_indexes,
            resolver,
            _marker: PhantomData,
        }
    }

    /// A copy of this context refocused on another node, as used for
    /// predicate evaluation.
    pub fn with_focus(&self, node: N, position: usize, size: usize) -> Context<'a, 'd, N> {
        Context {
            node,
            root: self.root,
            position,
            size,
            variables: self.variables,
            key_indexes: self.key_indexes,
            resolver: self.resolver,
            _marker: PhantomData,
        }
    }
}

pub fn evaluate<'a, N>(
    expr: &Expression,
    ctx: &Context<'a, '_, N>,
) -> Result<XPathValue<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    match expr {
        Expression::Literal(s) => Ok(XPathValue::String(s.clone())),
        Expression::Number(n) => Ok(XPathValue::Number(*n)),
        Expression::Variable(name) => Ok(ctx
            .variables
            .get(name)
            .cloned()
            .unwrap_or_else(|| XPathValue::String(String::new()))),
        Expression::Path(path) => Ok(XPathValue::NodeSet(evaluate_path(path, ctx)?)),
        Expression::Call { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(evaluate(arg, ctx)?);
            }
            if let Some(resolver) = ctx.resolver {
                if let Some(result) = resolver.call(name, &values, ctx) {
                    return result;
                }
            }
            functions::evaluate_function(name, values, ctx)
        }
        Expression::Binary { op, lhs, rhs } => {
            // Short-circuit the logical operators.
            match op {
                BinaryOp::Or => {
                    if evaluate(lhs, ctx)?.to_bool() {
                        return Ok(XPathValue::Boolean(true));
                    }
                    Ok(XPathValue::Boolean(evaluate(rhs, ctx)?.to_bool()))
                }
                BinaryOp::And => {
                    if !evaluate(lhs, ctx)?.to_bool() {
                        return Ok(XPathValue::Boolean(false));
                    }
                    Ok(XPathValue::Boolean(evaluate(rhs, ctx)?.to_bool()))
                }
                _ => operators::apply(*op, evaluate(lhs, ctx)?, evaluate(rhs, ctx)?),
            }
        }
        Expression::Negate(inner) => {
            Ok(XPathValue::Number(-evaluate(inner, ctx)?.to_number()))
        }
    }
}

fn evaluate_path<'a, N>(path: &Path, ctx: &Context<'a, '_, N>) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    if path.steps.is_empty() && path.start.is_none() {
        return Ok(vec![if path.absolute { ctx.root } else { ctx.node }]);
    }

    let mut current: Vec<N> = if let Some(start) = &path.start {
        match evaluate(start, ctx)? {
            XPathValue::NodeSet(nodes) => nodes,
            _ => return Ok(Vec::new()),
        }
    } else if path.absolute {
        vec![ctx.root]
    } else {
        vec![ctx.node]
    };

    for step in &path.steps {
        current = evaluate_step(step, &current, ctx)?;
    }
    Ok(current)
}

fn evaluate_step<'a, N>(
    step: &Step,
    context_nodes: &[N],
    ctx: &Context<'a, '_, N>,
) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let mut acc = AxisAccumulator::default();
    for &node in context_nodes {
        axes::collect(step.axis, node, &mut acc);
    }
    let tested: Vec<N> = acc
        .into_nodes()
        .into_iter()
        .filter(|node| node_test_matches(&step.test, step.axis, *node))
        .collect();
    apply_predicates(tested, &step.predicates, ctx)
}

fn node_test_matches<'a, N: DataSourceNode<'a>>(test: &NodeTest, axis: Axis, node: N) -> bool {
    match test {
        NodeTest::Wildcard => match axis {
            Axis::Attribute => node.node_type() == NodeType::Attribute,
            _ => node.node_type() == NodeType::Element,
        },
        NodeTest::Name(name) => {
            // A prefixed test matches on the local part; prefix binding is
            // the stylesheet layer's concern.
            let local = name.rsplit(':').next().unwrap_or(name);
            node.name().is_some_and(|q| q.local == local)
        }
        NodeTest::Kind(kind) => match kind {
            KindTest::Text => node.node_type() == NodeType::Text,
            KindTest::Comment => node.node_type() == NodeType::Comment,
            KindTest::ProcessingInstruction => {
                node.node_type() == NodeType::ProcessingInstruction
            }
            KindTest::Node => true,
        },
    }
}

fn apply_predicates<'a, N>(
    nodes: Vec<N>,
    predicates: &[Expression],
    ctx: &Context<'a, '_, N>,
) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let mut remaining = nodes;
    for predicate in predicates {
        let size = remaining.len();
        let mut kept = Vec::new();
        for (i, node) in remaining.iter().enumerate() {
            let inner = ctx.with_focus(*node, i + 1, size);
            let outcome = evaluate(predicate, &inner)?;
            let keep = match outcome {
                // A bare number predicate is positional: item[2].
                XPathValue::Number(n) => n as usize == i + 1,
                other => other.to_bool(),
            };
            if keep {
                kept.push(*node);
            }
        }
        remaining = kept;
    }
    Ok(remaining)
}
