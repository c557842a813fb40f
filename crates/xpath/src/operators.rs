//! Binary operator semantics.

use crate::ast::BinaryOp;
use crate::datasource::DataSourceNode;
use crate::error::XPathError;
use crate::value::XPathValue;

pub fn apply<'a, N: DataSourceNode<'a> + 'a>(
    op: BinaryOp,
    lhs: XPathValue<N>,
    rhs: XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    use BinaryOp::*;
    match op {
        Or => Ok(XPathValue::Boolean(lhs.to_bool() || rhs.to_bool())),
        And => Ok(XPathValue::Boolean(lhs.to_bool() && rhs.to_bool())),
        Eq => Ok(XPathValue::Boolean(equals(&lhs, &rhs))),
        NotEq => Ok(XPathValue::Boolean(!equals(&lhs, &rhs))),
        Lt => Ok(XPathValue::Boolean(lhs.to_number() < rhs.to_number())),
        LtEq => Ok(XPathValue::Boolean(lhs.to_number() <= rhs.to_number())),
        Gt => Ok(XPathValue::Boolean(lhs.to_number() > rhs.to_number())),
        GtEq => Ok(XPathValue::Boolean(lhs.to_number() >= rhs.to_number())),
        Add => Ok(XPathValue::Number(lhs.to_number() + rhs.to_number())),
        Sub => Ok(XPathValue::Number(lhs.to_number() - rhs.to_number())),
        Mul => Ok(XPathValue::Number(lhs.to_number() * rhs.to_number())),
        Div => Ok(XPathValue::Number(lhs.to_number() / rhs.to_number())),
        Mod => Ok(XPathValue::Number(lhs.to_number() % rhs.to_number())),
        Union => union(lhs, rhs),
    }
}

/// XPath equality. Comparisons against a node-set are existential: the
/// node-set matches when any of its nodes' string values does.
fn equals<'a, N: DataSourceNode<'a>>(lhs: &XPathValue<N>, rhs: &XPathValue<N>) -> bool {
    match (lhs, rhs) {
        (XPathValue::NodeSet(l), XPathValue::NodeSet(r)) => {
            let right_values: Vec<String> = r.iter().map(|n| n.string_value()).collect();
            l.iter()
                .any(|n| right_values.iter().any(|rv| *rv == n.string_value()))
        }
        (XPathValue::NodeSet(nodes), other) | (other, XPathValue::NodeSet(nodes)) => {
            match other {
                XPathValue::Number(num) => nodes
                    .iter()
                    .any(|n| n.string_value().trim().parse::<f64>() == Ok(*num)),
                XPathValue::Boolean(b) => !nodes.is_empty() == *b,
                _ => {
                    let s = other.string_value();
                    nodes.iter().any(|n| n.string_value() == s)
                }
            }
        }
        (XPathValue::Number(l), XPathValue::Number(r)) => l == r,
        (XPathValue::Boolean(l), XPathValue::Boolean(r)) => l == r,
        (XPathValue::Boolean(b), other) | (other, XPathValue::Boolean(b)) => *b == other.to_bool(),
        (XPathValue::Number(n), other) | (other, XPathValue::Number(n)) => {
            *n == other.to_number()
        }
        _ => lhs.string_value() == rhs.string_value(),
    }
}

fn union<'a, N: DataSourceNode<'a> + 'a>(
    lhs: XPathValue<N>,
    rhs: XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    let (XPathValue::NodeSet(mut left), XPathValue::NodeSet(right)) = (lhs, rhs) else {
        return Err(XPathError::Type(
            "operands of '|' must be node-sets".to_string(),
        ));
    };
    left.extend(right);
    left.sort();
    left.dedup();
    Ok(XPathValue::NodeSet(left))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::mock::{sample_tree, MockNode};

    #[test]
    fn arithmetic() {
        let v = apply::<MockNode>(
            BinaryOp::Add,
            XPathValue::Number(2.0),
            XPathValue::Number(40.0),
        )
        .unwrap();
        assert_eq!(v.to_number(), 42.0);
        let m = apply::<MockNode>(
            BinaryOp::Mod,
            XPathValue::Number(10.0),
            XPathValue::Number(3.0),
        )
        .unwrap();
        assert_eq!(m.to_number(), 1.0);
    }

    #[test]
    fn node_set_equality_is_existential() {
        let tree = sample_tree();
        let chapters = vec![
            MockNode { id: 1, tree: &tree },
            MockNode { id: 5, tree: &tree },
        ];
        let eq = apply(
            BinaryOp::Eq,
            XPathValue::NodeSet(chapters.clone()),
            XPathValue::String("Intro".to_string()),
        )
        .unwrap();
        assert!(eq.to_bool());

        let ne = apply(
            BinaryOp::Eq,
            XPathValue::NodeSet(chapters),
            XPathValue::String("absent".to_string()),
        )
        .unwrap();
        assert!(!ne.to_bool());
    }

    #[test]
    fn union_sorts_and_dedups() {
        let tree = sample_tree();
        let a = MockNode { id: 5, tree: &tree };
        let b = MockNode { id: 1, tree: &tree };
        let out = apply(
            BinaryOp::Union,
            XPathValue::NodeSet(vec![a, b]),
            XPathValue::NodeSet(vec![a]),
        )
        .unwrap();
        match out {
            XPathValue::NodeSet(nodes) => {
                assert_eq!(nodes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 5]);
            }
            _ => panic!("expected node-set"),
        }
    }

    #[test]
    fn union_rejects_scalars() {
        assert!(apply::<MockNode>(
            BinaryOp::Union,
            XPathValue::Number(1.0),
            XPathValue::NodeSet(vec![]),
        )
        .is_err());
    }
}
