//! The parsed form of an XPath 1.0 expression.

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(String),
    Number(f64),
    Variable(String),
    Path(Path),
    Call {
        name: String,
        args: Vec<Expression>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Negate(Box<Expression>),
}

impl Expression {
    /// When the expression is nothing but a single child-axis name step with
    /// no predicates, returns that name. Lets callers take a direct
    /// filter-the-children shortcut instead of running the full engine.
    pub fn as_child_name(&self) -> Option<&str> {
        match self {
            Expression::Path(path)
                if path.start.is_none() && !path.absolute && path.steps.len() == 1 =>
            {
                let step = &path.steps[0];
                match (&step.axis, &step.test, step.predicates.is_empty()) {
                    (Axis::Child, NodeTest::Name(name), true) => Some(name),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

/// A location path: optional origin expression, absolute flag, steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    /// Present for paths that start from another expression, e.g. `$v/x`.
    pub start: Option<Box<Expression>>,
    /// `/x` style paths start from the document root. Ignored when `start`
    /// is present.
    pub absolute: bool,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expression>,
}

impl Step {
    pub fn self_node() -> Self {
        Step {
            axis: Axis::SelfAxis,
            test: NodeTest::Kind(KindTest::Node),
            predicates: Vec::new(),
        }
    }

    pub fn descendant_or_self_node() -> Self {
        Step {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Kind(KindTest::Node),
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Attribute,
    Parent,
    Ancestor,
    AncestorOrSelf,
    SelfAxis,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// Name test; matches on local name (an optional prefix in the source
    /// text is retained in front of the colon).
    Name(String),
    Wildcard,
    Kind(KindTest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindTest {
    Text,
    Node,
    Comment,
    ProcessingInstruction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Union,
}
