//! The built-in XPath 1.0 function library, plus the resolver hook that lets
//! a host contribute additional functions.

use crate::datasource::{DataSourceNode, NodeType};
use crate::engine::Context;
use crate::error::XPathError;
use crate::value::XPathValue;
use std::collections::HashSet;

/// A host-provided function source consulted before the built-ins.
///
/// Implementations return `None` for names they do not recognize, which
/// sends the call on to the built-in library. Resolvers receive already
/// evaluated argument values.
pub trait FunctionResolver<'a, N: DataSourceNode<'a>> {
    fn call(
        &self,
        name: &str,
        args: &[XPathValue<N>],
        ctx: &Context<'a, '_, N>,
    ) -> Option<Result<XPathValue<N>, XPathError>>;

    /// Whether this resolver can handle `name`. Backs `function-available`.
    fn provides(&self, name: &str) -> bool;
}

const BUILTINS: &[&str] = &[
    "boolean",
    "ceiling",
    "concat",
    "contains",
    "count",
    "false",
    "floor",
    "id",
    "key",
    "lang",
    "last",
    "local-name",
    "name",
    "normalize-space",
    "not",
    "number",
    "position",
    "round",
    "starts-with",
    "string",
    "string-length",
    "substring",
    "substring-after",
    "substring-before",
    "sum",
    "translate",
    "true",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

pub fn evaluate_function<'a, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
    ctx: &Context<'a, '_, N>,
) -> Result<XPathValue<N>, XPathError> {
    match name {
        "string" => func_string(args, ctx),
        "boolean" => func_boolean(args),
        "number" => func_number(args, ctx),
        "count" => func_count(args),
        "id" => func_id(args, ctx),
        "key" => func_key(args, ctx),
        "position" => zero_arg(name, &args).map(|_| XPathValue::Number(ctx.position as f64)),
        "last" => zero_arg(name, &args).map(|_| XPathValue::Number(ctx.size as f64)),
        "local-name" => func_local_name(args, ctx),
        "name" => func_name(args, ctx),

        "concat" => func_concat(args),
        "starts-with" => two_strings(name, args).map(|(a, b)| {
            XPathValue::Boolean(a.starts_with(&b))
        }),
        "contains" => two_strings(name, args).map(|(a, b)| {
            XPathValue::Boolean(a.contains(&b))
        }),
        "substring-before" => two_strings(name, args).map(|(a, b)| {
            XPathValue::String(a.split_once(&b).map(|(pre, _)| pre.to_string()).unwrap_or_default())
        }),
        "substring-after" => two_strings(name, args).map(|(a, b)| {
            XPathValue::String(a.split_once(&b).map(|(_, post)| post.to_string()).unwrap_or_default())
        }),
        "substring" => func_substring(args),
        "string-length" => func_string_length(args, ctx),
        "normalize-space" => func_normalize_space(args, ctx),
        "translate" => func_translate(args),

        "not" => one_arg(name, args).map(|v| XPathValue::Boolean(!v.to_bool())),
        "true" => zero_arg(name, &args).map(|_| XPathValue::Boolean(true)),
        "false" => zero_arg(name, &args).map(|_| XPathValue::Boolean(false)),
        "lang" => func_lang(args, ctx),

        "sum" => func_sum(args),
        "floor" => one_arg(name, args).map(|v| XPathValue::Number(v.to_number().floor())),
        "ceiling" => one_arg(name, args).map(|v| XPathValue::Number(v.to_number().ceil())),
        "round" => one_arg(name, args).map(|v| {
            // XPath rounds half up, including negative halves: -1.5 -> -1.
            XPathValue::Number((v.to_number() + 0.5).floor())
        }),

        "node" | "comment" | "processing-instruction" | "text" => Err(XPathError::function(
            name,
            "node tests cannot be called as functions",
        )),
        _ => Err(XPathError::function(name, "unknown function")),
    }
}

// --- Argument plumbing ---

fn zero_arg<'a, N: DataSourceNode<'a>>(
    name: &str,
    args: &[XPathValue<N>],
) -> Result<(), XPathError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(XPathError::function(name, "expected no arguments"))
    }
}

fn one_arg<'a, N: DataSourceNode<'a>>(
    name: &str,
    mut args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    if args.len() == 1 {
        Ok(args.remove(0))
    } else {
        Err(XPathError::function(name, "expected one argument"))
    }
}

fn two_strings<'a, N: DataSourceNode<'a>>(
    name: &str,
    mut args: Vec<XPathValue<N>>,
) -> Result<(String, String), XPathError> {
    if args.len() != 2 {
        return Err(XPathError::function(name, "expected two arguments"));
    }
    let second = args.remove(1).string_value();
    let first = args.remove(0).string_value();
    Ok((first, second))
}

// --- Core and node-set functions ---

fn func_string<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
    ctx: &Context<'a, '_, N>,
) -> Result<XPathValue<N>, XPathError> {
    let s = match args.len() {
        0 => ctx.node.string_value(),
        1 => args.remove(0).string_value(),
        _ => return Err(XPathError::function("string", "expected at most one argument")),
    };
    Ok(XPathValue::String(s))
}

fn func_boolean<'a, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    one_arg("boolean", args).map(|v| XPathValue::Boolean(v.to_bool()))
}

fn func_number<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
    ctx: &Context<'a, '_, N>,
) -> Result<XPathValue<N>, XPathError> {
    let n = match args.len() {
        0 => ctx.node.string_value().trim().parse().unwrap_or(f64::NAN),
        1 => args.remove(0).to_number(),
        _ => return Err(XPathError::function("number", "expected at most one argument")),
    };
    Ok(XPathValue::Number(n))
}

fn func_count<'a, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    match one_arg("count", args)? {
        XPathValue::NodeSet(nodes) => Ok(XPathValue::Number(nodes.len() as f64)),
        _ => Err(XPathError::Type(
            "count() requires a node-set argument".to_string(),
        )),
    }
}

fn func_id<'a, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
    ctx: &Context<'a, '_, N>,
) -> Result<XPathValue<N>, XPathError> {
    let wanted: HashSet<String> = one_arg("id", args)?
        .string_value()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if wanted.is_empty() {
        return Ok(XPathValue::NodeSet(Vec::new()));
    }

    let mut results = Vec::new();
    let mut stack: Vec<N> = ctx.root.children().collect();
    while let Some(node) = stack.pop() {
        if node.node_type() == NodeType::Element {
            for attr in node.attributes() {
                let is_id = attr
                    .name()
                    .is_some_and(|q| q.local == "id" && (q.prefix.is_none() || q.prefix == Some("xml")));
                if is_id && wanted.contains(&attr.string_value()) {
                    results.push(node);
                }
            }
        }
        stack.extend(node.children());
    }
    results.sort();
    results.dedup();
    Ok(XPathValue::NodeSet(results))
}

fn func_key<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
    ctx: &Context<'a, '_, N>,
) -> Result<XPathValue<N>, XPathError> {
    if args.len() != 2 {
        return Err(XPathError::function("key", "expected two arguments"));
    }
    let value_arg = args.remove(1);
    let key_name = args.remove(0).string_value();

    let Some(index) = ctx.key_indexes.get(&key_name) else {
        return Ok(XPathValue::NodeSet(Vec::new()));
    };

    let lookup_values = match value_arg {
        XPathValue::NodeSet(nodes) => nodes.iter().map(|n| n.string_value()).collect::<Vec<_>>(),
        other => vec![other.string_value()],
    };

    let mut results = Vec::new();
    for value in lookup_values {
        if let Some(nodes) = index.get(&value) {
            results.extend(nodes.iter().copied());
        }
    }
    results.sort();
    results.dedup();
    Ok(XPathValue::NodeSet(results))
}

fn first_node_or_context<'a, N: DataSourceNode<'a>>(
    name: &str,
    mut args: Vec<XPathValue<N>>,
    ctx: &Context<'a, '_, N>,
) -> Result<Option<N>, XPathError> {
    match args.len() {
        0 => Ok(Some(ctx.node)),
        1 => match args.remove(0) {
            XPathValue::NodeSet(nodes) => Ok(nodes.first().copied()),
            _ => Err(XPathError::Type(format!(
                "{}() requires a node-set argument",
                name
            ))),
        },
        _ => Err(XPathError::function(name, "expected at most one argument")),
    }
}

fn func_local_name<'a, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
    ctx: &Context<'a, '_, N>,
) -> Result<XPathValue<N>, XPathError> {
    let node = first_node_or_context("local-name", args, ctx)?;
    Ok(XPathValue::String(
        node.and_then(|n| n.name().map(|q| q.local.to_string()))
            .unwrap_or_default(),
    ))
}

fn func_name<'a, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
    ctx: &Context<'a, '_, N>,
) -> Result<XPathValue<N>, XPathError> {
    let node = first_node_or_context("name", args, ctx)?;
    let name = node
        .and_then(|n| n.name())
        .map(|q| match q.prefix {
            Some(p) => format!("{}:{}", p, q.local),
            None => q.local.to_string(),
        })
        .unwrap_or_default();
    Ok(XPathValue::String(name))
}

// --- String functions ---

fn func_concat<'a, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    if args.len() < 2 {
        return Err(XPathError::function("concat", "expected two or more arguments"));
    }
    Ok(XPathValue::String(
        args.iter().map(|v| v.string_value()).collect(),
    ))
}

fn func_substring<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    if args.len() != 2 && args.len() != 3 {
        return Err(XPathError::function("substring", "expected two or three arguments"));
    }
    let length = if args.len() == 3 {
        Some(args.remove(2).to_number())
    } else {
        None
    };
    let start = args.remove(1).to_number();
    let text = args.remove(0).string_value();
    let chars: Vec<char> = text.chars().collect();

    // XPath positions are 1-based and rounded; NaN bounds select nothing.
    let begin = (start + 0.5).floor();
    if begin.is_nan() {
        return Ok(XPathValue::String(String::new()));
    }
    let end = match length {
        Some(len) => {
            let rounded = (len + 0.5).floor();
            if rounded.is_nan() {
                return Ok(XPathValue::String(String::new()));
            }
            begin + rounded
        }
        None => f64::INFINITY,
    };

    let out: String = chars
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            let pos = (*i as f64) + 1.0;
            pos >= begin && pos < end
        })
        .map(|(_, c)| *c)
        .collect();
    Ok(XPathValue::String(out))
}

fn func_string_length<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
    ctx: &Context<'a, '_, N>,
) -> Result<XPathValue<N>, XPathError> {
    let s = match args.len() {
        0 => ctx.node.string_value(),
        1 => args.remove(0).string_value(),
        _ => {
            return Err(XPathError::function(
                "string-length",
                "expected at most one argument",
            ))
        }
    };
    Ok(XPathValue::Number(s.chars().count() as f64))
}

fn func_normalize_space<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
    ctx: &Context<'a, '_, N>,
) -> Result<XPathValue<N>, XPathError> {
    let s = match args.len() {
        0 => ctx.node.string_value(),
        1 => args.remove(0).string_value(),
        _ => {
            return Err(XPathError::function(
                "normalize-space",
                "expected at most one argument",
            ))
        }
    };
    Ok(XPathValue::String(
        s.split_whitespace().collect::<Vec<_>>().join(" "),
    ))
}

fn func_translate<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    if args.len() != 3 {
        return Err(XPathError::function("translate", "expected three arguments"));
    }
    let to: Vec<char> = args.remove(2).string_value().chars().collect();
    let from: Vec<char> = args.remove(1).string_value().chars().collect();
    let text = args.remove(0).string_value();

    let out: String = text
        .chars()
        .filter_map(|c| match from.iter().position(|&f| f == c) {
            Some(i) => to.get(i).copied(),
            None => Some(c),
        })
        .collect();
    Ok(XPathValue::String(out))
}

// --- Boolean functions ---

fn func_lang<'a, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
    ctx: &Context<'a, '_, N>,
) -> Result<XPathValue<N>, XPathError> {
    let wanted = one_arg("lang", args)?.string_value().to_ascii_lowercase();
    let mut current = Some(ctx.node);
    while let Some(node) = current {
        for attr in node.attributes() {
            let is_xml_lang = attr
                .name()
                .is_some_and(|q| q.prefix == Some("xml") && q.local == "lang");
            if is_xml_lang {
                let value = attr.string_value().to_ascii_lowercase();
                let matches = value == wanted
                    || value
                        .strip_prefix(&wanted)
                        .is_some_and(|rest| rest.starts_with('-'));
                return Ok(XPathValue::Boolean(matches));
            }
        }
        current = node.parent();
    }
    Ok(XPathValue::Boolean(false))
}

// --- Number functions ---

fn func_sum<'a, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    match one_arg("sum", args)? {
        XPathValue::NodeSet(nodes) => {
            let total = nodes
                .iter()
                .map(|n| n.string_value().trim().parse::<f64>().unwrap_or(f64::NAN))
                .sum();
            Ok(XPathValue::Number(total))
        }
        _ => Err(XPathError::Type("sum() requires a node-set argument".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::mock::{sample_tree, MockNode};
    use crate::engine::Context;
    use crate::parser::parse_expression;
    use std::collections::HashMap;

    fn eval<'a>(
        tree: &'a crate::datasource::mock::MockTree,
        expr: &str,
    ) -> XPathValue<MockNode<'a>> {
        let vars = HashMap::new();
        let keys = HashMap::new();
        let root = MockNode { id: 0, tree };
        let ctx = Context::new(root, root, 1, 1, &vars, &keys, None);
        let parsed = parse_expression(expr).unwrap();
        crate::engine::evaluate(&parsed, &ctx).unwrap()
    }

    #[test]
    fn string_functions() {
        let tree = sample_tree();
        assert_eq!(eval(&tree, "concat('a', 'b', 'c')").string_value(), "abc");
        assert!(eval(&tree, "starts-with('hello', 'he')").to_bool());
        assert!(eval(&tree, "contains('hello', 'ell')").to_bool());
        assert_eq!(
            eval(&tree, "substring-before('key=value', '=')").string_value(),
            "key"
        );
        assert_eq!(
            eval(&tree, "substring-after('key=value', '=')").string_value(),
            "value"
        );
        assert_eq!(eval(&tree, "substring('12345', 2, 3)").string_value(), "234");
        assert_eq!(eval(&tree, "substring('12345', 2)").string_value(), "2345");
        assert_eq!(eval(&tree, "string-length('abcd')").to_number(), 4.0);
        assert_eq!(
            eval(&tree, "normalize-space('  a   b  ')").string_value(),
            "a b"
        );
        assert_eq!(
            eval(&tree, "translate('bare', 'abr', 'AB')").string_value(),
            "BAe"
        );
    }

    #[test]
    fn numeric_functions() {
        let tree = sample_tree();
        assert_eq!(eval(&tree, "floor(2.7)").to_number(), 2.0);
        assert_eq!(eval(&tree, "ceiling(2.1)").to_number(), 3.0);
        assert_eq!(eval(&tree, "round(2.5)").to_number(), 3.0);
        assert_eq!(eval(&tree, "round(-1.5)").to_number(), -1.0);
    }

    #[test]
    fn count_and_id() {
        let tree = sample_tree();
        assert_eq!(eval(&tree, "count(chapter)").to_number(), 2.0);
        let XPathValue::NodeSet(nodes) = eval(&tree, "id('c1')") else {
            panic!("expected node-set");
        };
        assert_eq!(nodes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn lang_checks_ancestors() {
        let tree = sample_tree();
        let vars = HashMap::new();
        let keys = HashMap::new();
        let root = MockNode { id: 0, tree: &tree };
        let title = MockNode { id: 7, tree: &tree };
        let ctx = Context::new(title, root, 1, 1, &vars, &keys, None);
        let parsed = parse_expression("lang('en')").unwrap();
        assert!(crate::engine::evaluate(&parsed, &ctx).unwrap().to_bool());
        let parsed = parse_expression("lang('de')").unwrap();
        assert!(!crate::engine::evaluate(&parsed, &ctx).unwrap().to_bool());
    }

    #[test]
    fn key_uses_context_indexes() {
        let tree = sample_tree();
        let vars = HashMap::new();
        let mut keys: HashMap<String, HashMap<String, Vec<MockNode>>> = HashMap::new();
        let chapter = MockNode { id: 5, tree: &tree };
        keys.entry("by-lang".to_string())
            .or_default()
            .insert("en".to_string(), vec![chapter]);
        let root = MockNode { id: 0, tree: &tree };
        let ctx = Context::new(root, root, 1, 1, &vars, &keys, None);
        let parsed = parse_expression("key('by-lang', 'en')").unwrap();
        let XPathValue::NodeSet(nodes) = crate::engine::evaluate(&parsed, &ctx).unwrap() else {
            panic!("expected node-set");
        };
        assert_eq!(nodes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn name_functions() {
        let tree = sample_tree();
        assert_eq!(eval(&tree, "local-name(chapter)").string_value(), "chapter");
        assert_eq!(eval(&tree, "name(chapter)").string_value(), "chapter");
    }

    #[test]
    fn unknown_function_is_an_error() {
        let tree = sample_tree();
        let vars = HashMap::new();
        let keys = HashMap::new();
        let root = MockNode { id: 0, tree: &tree };
        let ctx = Context::new(root, root, 1, 1, &vars, &keys, None);
        let parsed = parse_expression("mystery()").unwrap();
        assert!(crate::engine::evaluate(&parsed, &ctx).is_err());
    }

    #[test]
    fn builtin_listing() {
        assert!(is_builtin("concat"));
        assert!(!is_builtin("format-number"));
    }
}
