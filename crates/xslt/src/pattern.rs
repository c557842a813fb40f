//! Compilation and evaluation of `match` patterns.
//!
//! A pattern is a union of location paths restricted to the child and
//! attribute axes. Matching walks the steps right to left, climbing the
//! candidate's ancestor chain; an absolute pattern must additionally bottom
//! out at the document root.

use crate::error::TransformError;
use larch_xpath::ast::{KindTest, NodeTest};
use larch_xpath::parser as xpath_parser;
use larch_xpath::{DataSourceNode, NodeType};
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::combinator::map;
use nom::multi::{separated_list0, separated_list1};
use nom::sequence::preceded;
use nom::{IResult, Parser};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    alternatives: Vec<PathPattern>,
    source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PathPattern {
    absolute: bool,
    steps: Vec<PatternStep>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PatternStep {
    attribute: bool,
    test: NodeTest,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl Pattern {
    pub fn parse(text: &str) -> Result<Pattern, TransformError> {
        match pattern(text.trim()) {
            Ok(("", alternatives)) => Ok(Pattern {
                alternatives,
                source: text.to_string(),
            }),
            Ok((rest, _)) => Err(TransformError::Compile(format!(
                "match pattern '{}' has trailing input '{}'",
                text, rest
            ))),
            Err(e) => Err(TransformError::Compile(format!(
                "cannot parse match pattern '{}': {}",
                text, e
            ))),
        }
    }

    pub fn matches<'a, N: DataSourceNode<'a>>(&self, node: N, root: N) -> bool {
        self.alternatives.iter().any(|alt| alt.matches(node, root))
    }

    /// Default priority by specificity, for rules without an explicit
    /// `priority` attribute.
    pub fn default_priority(&self) -> f64 {
        self.alternatives
            .iter()
            .map(PathPattern::default_priority)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

impl PathPattern {
    fn matches<'a, N: DataSourceNode<'a>>(&self, node: N, root: N) -> bool {
        if self.absolute && self.steps.is_empty() {
            return node == root;
        }

        let mut current = Some(node);
        for step in self.steps.iter().rev() {
            match current {
                Some(n) if step.matches(n) => current = n.parent(),
                _ => return false,
            }
        }

        if self.absolute {
            current == Some(root)
        } else {
            true
        }
    }

    fn default_priority(&self) -> f64 {
        if self.absolute || self.steps.len() > 1 {
            return 0.5;
        }
        match self.steps.first().map(|s| &s.test) {
            Some(NodeTest::Wildcard) => -0.5,
            Some(NodeTest::Kind(_)) => -0.25,
            _ => 0.0,
        }
    }
}

impl PatternStep {
    fn matches<'a, N: DataSourceNode<'a>>(&self, node: N) -> bool {
        let node_type = node.node_type();
        if self.attribute {
            if node_type != NodeType::Attribute {
                return false;
            }
        } else if !matches!(
            node_type,
            NodeType::Element | NodeType::Text | NodeType::Root
        ) && !matches!(self.test, NodeTest::Kind(_))
        {
            return false;
        }

        match &self.test {
            NodeTest::Wildcard => {
                if self.attribute {
                    true
                } else {
                    node_type == NodeType::Element
                }
            }
            NodeTest::Name(name) => {
                let local = name.rsplit(':').next().unwrap_or(name);
                node.name().is_some_and(|q| q.local == local)
            }
            NodeTest::Kind(kind) => match kind {
                KindTest::Text => node_type == NodeType::Text,
                KindTest::Comment => node_type == NodeType::Comment,
                KindTest::ProcessingInstruction => {
                    node_type == NodeType::ProcessingInstruction
                }
                KindTest::Node => node_type != NodeType::Attribute || self.attribute,
            },
        }
    }
}

// --- Parsing ---

fn pattern_step(input: &str) -> IResult<&str, PatternStep> {
    alt((
        map(preceded(tag("@"), xpath_parser::node_test), |test| {
            PatternStep {
                attribute: true,
                test,
            }
        }),
        map(xpath_parser::node_test, |test| PatternStep {
            attribute: false,
            test,
        }),
    ))
    .parse(input)
}

fn path_pattern(input: &str) -> IResult<&str, PathPattern> {
    let leading_slash: IResult<&str, &str> = tag("/").parse(input);
    let (rest, absolute) = match leading_slash {
        Ok((rest, _)) => (rest, true),
        Err(_) => (input, false),
    };
    let (rest, steps) = if absolute {
        separated_list0(tag("/"), pattern_step).parse(rest)?
    } else {
        separated_list1(tag("/"), pattern_step).parse(rest)?
    };
    Ok((rest, PathPattern { absolute, steps }))
}

fn pattern(input: &str) -> IResult<&str, Vec<PathPattern>> {
    separated_list1(tag("|"), path_pattern).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use larch_xpath::datasource::mock::{sample_tree, MockNode, MockTree};

    fn node<'a>(tree: &'a MockTree, id: usize) -> MockNode<'a> {
        MockNode { id, tree }
    }

    #[test]
    fn accepts_the_pattern_grammar() {
        for p in [
            "chapter",
            "chapter/title",
            "/",
            "/*",
            "/book/chapter",
            "a|b",
            "text()",
            "@id",
            "*",
            "chapter/*/@id",
            "@*|node()",
        ] {
            assert!(Pattern::parse(p).is_ok(), "pattern {} should parse", p);
        }
        assert!(Pattern::parse("chapter/").is_err());
    }

    #[test]
    fn name_patterns_match_elements() {
        let tree = sample_tree();
        let p = Pattern::parse("chapter").unwrap();
        assert!(p.matches(node(&tree, 1), node(&tree, 0)));
        assert!(!p.matches(node(&tree, 0), node(&tree, 0)));
        assert!(!p.matches(node(&tree, 7), node(&tree, 0)));
    }

    #[test]
    fn multi_step_patterns_walk_ancestors() {
        let tree = sample_tree();
        let p = Pattern::parse("chapter/title").unwrap();
        assert!(p.matches(node(&tree, 7), node(&tree, 0)));
        assert!(!p.matches(node(&tree, 1), node(&tree, 0)));
    }

    #[test]
    fn root_and_absolute_patterns() {
        let tree = sample_tree();
        let root_pattern = Pattern::parse("/").unwrap();
        assert!(root_pattern.matches(node(&tree, 0), node(&tree, 0)));
        assert!(!root_pattern.matches(node(&tree, 1), node(&tree, 0)));

        let doc_el = Pattern::parse("/*").unwrap();
        assert!(doc_el.matches(node(&tree, 1), node(&tree, 0)));
        assert!(!doc_el.matches(node(&tree, 7), node(&tree, 0)));
    }

    #[test]
    fn union_patterns_try_each_alternative() {
        let tree = sample_tree();
        let p = Pattern::parse("missing|chapter").unwrap();
        assert!(p.matches(node(&tree, 1), node(&tree, 0)));
    }

    #[test]
    fn attribute_patterns() {
        let tree = sample_tree();
        let p = Pattern::parse("@id").unwrap();
        assert!(p.matches(node(&tree, 2), node(&tree, 0)));
        assert!(!p.matches(node(&tree, 1), node(&tree, 0)));

        let any_attr = Pattern::parse("@*").unwrap();
        assert!(any_attr.matches(node(&tree, 2), node(&tree, 0)));
    }

    #[test]
    fn text_pattern_matches_text_nodes() {
        let tree = sample_tree();
        let p = Pattern::parse("text()").unwrap();
        assert!(p.matches(node(&tree, 3), node(&tree, 0)));
        assert!(!p.matches(node(&tree, 1), node(&tree, 0)));
    }

    #[test]
    fn default_priorities_follow_specificity() {
        assert_eq!(Pattern::parse("*").unwrap().default_priority(), -0.5);
        assert_eq!(Pattern::parse("text()").unwrap().default_priority(), -0.25);
        assert_eq!(Pattern::parse("chapter").unwrap().default_priority(), 0.0);
        assert_eq!(
            Pattern::parse("chapter/title").unwrap().default_priority(),
            0.5
        );
        assert_eq!(Pattern::parse("/").unwrap().default_priority(), 0.5);
    }
}
