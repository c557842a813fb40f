//! A `nom` parser for XPath 1.0 expressions.
//!
//! Precedence, loosest first: `or`, `and`, equality, relational, additive,
//! multiplicative, unary minus, union, path.

use crate::ast::*;
use crate::error::XPathError;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, multispace0},
    combinator::{map, opt, peek, recognize},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated},
    IResult, Parser,
};

pub fn parse_expression(input: &str) -> Result<Expression, XPathError> {
    match expression(input.trim()) {
        Ok(("", expr)) => Ok(expr),
        Ok((rest, _)) => Err(XPathError::Parse {
            expr: input.to_string(),
            message: format!("unparsed trailing input: '{}'", rest),
        }),
        Err(e) => Err(XPathError::Parse {
            expr: input.to_string(),
            message: e.to_string(),
        }),
    }
}

// --- Combinator helpers ---

fn lexeme<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

/// Matches a keyword operator and refuses to split a longer name
/// (`or` must not match the start of `order`).
fn word<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> + Clone {
    move |input: &'a str| {
        let (rest, matched) = tag(kw).parse(input)?;
        match rest.chars().next() {
            Some(c) if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' => Err(
                nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)),
            ),
            _ => Ok((rest, matched)),
        }
    }
}

fn binary_chain<'a, F, G>(
    mut operand: F,
    mut operator: G,
) -> impl FnMut(&'a str) -> IResult<&'a str, Expression>
where
    F: Parser<&'a str, Output = Expression, Error = nom::error::Error<&'a str>>,
    G: Parser<&'a str, Output = BinaryOp, Error = nom::error::Error<&'a str>>,
{
    move |input: &'a str| {
        let (mut input, mut expr) = operand.parse(input)?;
        loop {
            let Ok((after_ws, _)) = multispace0::<_, nom::error::Error<&'a str>>(input) else {
                break;
            };
            let Ok((after_op, op)) = operator.parse(after_ws) else {
                break;
            };
            let Ok((after_ws2, _)) = multispace0::<_, nom::error::Error<&'a str>>(after_op)
            else {
                break;
            };
            match operand.parse(after_ws2) {
                Ok((after_rhs, rhs)) => {
                    expr = Expression::Binary {
                        op,
                        lhs: Box::new(expr),
                        rhs: Box::new(rhs),
                    };
                    input = after_rhs;
                }
                Err(_) => break,
            }
        }
        Ok((input, expr))
    }
}

// --- Precedence ladder ---

fn expression(input: &str) -> IResult<&str, Expression> {
    or_expr(input)
}

fn or_expr(input: &str) -> IResult<&str, Expression> {
    binary_chain(and_expr, map(word("or"), |_| BinaryOp::Or))(input)
}

fn and_expr(input: &str) -> IResult<&str, Expression> {
    binary_chain(equality_expr, map(word("and"), |_| BinaryOp::And))(input)
}

fn equality_expr(input: &str) -> IResult<&str, Expression> {
    let op = alt((
        map(tag("!="), |_| BinaryOp::NotEq),
        map(tag("="), |_| BinaryOp::Eq),
    ));
    binary_chain(relational_expr, op)(input)
}

fn relational_expr(input: &str) -> IResult<&str, Expression> {
    // XML-escaped spellings accepted so expressions lifted verbatim out of
    // attribute text keep working.
    let op = alt((
        map(alt((tag("<="), tag("&lt;="))), |_| BinaryOp::LtEq),
        map(alt((tag(">="), tag("&gt;="))), |_| BinaryOp::GtEq),
        map(alt((tag("<"), tag("&lt;"))), |_| BinaryOp::Lt),
        map(alt((tag(">"), tag("&gt;"))), |_| BinaryOp::Gt),
    ));
    binary_chain(additive_expr, op)(input)
}

fn additive_expr(input: &str) -> IResult<&str, Expression> {
    let op = alt((
        map(char('+'), |_| BinaryOp::Add),
        map(char('-'), |_| BinaryOp::Sub),
    ));
    binary_chain(multiplicative_expr, op)(input)
}

fn multiplicative_expr(input: &str) -> IResult<&str, Expression> {
    let op = alt((
        map(char('*'), |_| BinaryOp::Mul),
        map(word("div"), |_| BinaryOp::Div),
        map(word("mod"), |_| BinaryOp::Mod),
    ));
    binary_chain(unary_expr, op)(input)
}

fn unary_expr(input: &str) -> IResult<&str, Expression> {
    let (input, minus) = opt(lexeme(char('-'))).parse(input)?;
    let (input, expr) = union_expr(input)?;
    Ok((
        input,
        match minus {
            Some(_) => Expression::Negate(Box::new(expr)),
            None => expr,
        },
    ))
}

fn union_expr(input: &str) -> IResult<&str, Expression> {
    binary_chain(path_expr, map(char('|'), |_| BinaryOp::Union))(input)
}

/// A primary expression optionally continued by path steps (`$v/x`,
/// `key('k','v')/y`), or a plain location path.
fn path_expr(input: &str) -> IResult<&str, Expression> {
    let (input, head) =
        alt((primary_expr, map(lexeme(location_path), Expression::Path))).parse(input)?;

    let (input, continuation) = many0(pair(alt((tag("//"), tag("/"))), step)).parse(input)?;
    if continuation.is_empty() {
        return Ok((input, head));
    }

    let (start, absolute, steps) = match head {
        Expression::Path(p) => (p.start, p.absolute, p.steps),
        other => (Some(Box::new(other)), false, Vec::new()),
    };
    let mut steps_out = steps;
    for (sep, next) in continuation {
        if sep == "//" {
            steps_out.push(Step::descendant_or_self_node());
        }
        steps_out.push(next);
    }
    Ok((
        input,
        Expression::Path(Path {
            start,
            absolute,
            steps: steps_out,
        }),
    ))
}

fn primary_expr(input: &str) -> IResult<&str, Expression> {
    lexeme(alt((
        map(preceded(char('$'), q_name), Expression::Variable),
        map(number, Expression::Number),
        map(string_literal, Expression::Literal),
        function_call,
        delimited(lexeme(char('(')), expression, lexeme(char(')'))),
    )))
    .parse(input)
}

/// XPath numbers: digits with an optional fraction, or a leading-dot
/// fraction. Deliberately narrower than a general float parser so names
/// like `info` or `divide` never lex as numbers.
fn number(input: &str) -> IResult<&str, f64> {
    let (rest, text) = recognize(alt((
        recognize(pair(digit1, opt(pair(char('.'), digit0)))),
        recognize(pair(char('.'), digit1)),
    )))
    .parse(input)?;
    match text.parse::<f64>() {
        Ok(value) => Ok((rest, value)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Float,
        ))),
    }
}

fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
        )),
        |s: &str| s.to_string(),
    )
    .parse(input)
}

fn nc_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '.'),
    ))
    .parse(input)
}

fn q_name(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(nc_name, opt(pair(tag(":"), nc_name)))),
        |s: &str| s.to_string(),
    )
    .parse(input)
}

fn kind_test(input: &str) -> IResult<&str, NodeTest> {
    map(
        terminated(
            alt((
                tag("text"),
                tag("node"),
                tag("comment"),
                tag("processing-instruction"),
            )),
            pair(lexeme(char('(')), char(')')),
        ),
        |kind: &str| match kind {
            "text" => NodeTest::Kind(KindTest::Text),
            "comment" => NodeTest::Kind(KindTest::Comment),
            "processing-instruction" => NodeTest::Kind(KindTest::ProcessingInstruction),
            _ => NodeTest::Kind(KindTest::Node),
        },
    )
    .parse(input)
}

pub fn node_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        map(tag("*"), |_| NodeTest::Wildcard),
        kind_test,
        map(q_name, NodeTest::Name),
    ))
    .parse(input)
}

fn axis(input: &str) -> IResult<&str, Axis> {
    map(
        terminated(
            alt((
                tag("ancestor-or-self"),
                tag("ancestor"),
                tag("attribute"),
                tag("child"),
                tag("descendant-or-self"),
                tag("descendant"),
                tag("following-sibling"),
                tag("following"),
                tag("parent"),
                tag("preceding-sibling"),
                tag("preceding"),
                tag("self"),
            )),
            tag("::"),
        ),
        |name: &str| match name {
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "ancestor" => Axis::Ancestor,
            "attribute" => Axis::Attribute,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "descendant" => Axis::Descendant,
            "following-sibling" => Axis::FollowingSibling,
            "following" => Axis::Following,
            "parent" => Axis::Parent,
            "preceding-sibling" => Axis::PrecedingSibling,
            "preceding" => Axis::Preceding,
            "self" => Axis::SelfAxis,
            _ => Axis::Child,
        },
    )
    .parse(input)
}

fn predicate(input: &str) -> IResult<&str, Expression> {
    delimited(lexeme(char('[')), expression, lexeme(char(']'))).parse(input)
}

fn step(input: &str) -> IResult<&str, Step> {
    let (input, (axis, test)) = alt((
        map(tag(".."), |_| {
            (Axis::Parent, NodeTest::Kind(KindTest::Node))
        }),
        map(terminated(char('.'), peek_not_digit), |_| {
            (Axis::SelfAxis, NodeTest::Kind(KindTest::Node))
        }),
        map(preceded(char('@'), node_test), |t| (Axis::Attribute, t)),
        map(pair(opt(axis), node_test), |(ax, t)| {
            (ax.unwrap_or(Axis::Child), t)
        }),
    ))
    .parse(input)?;
    let (input, predicates) = many0(predicate).parse(input)?;
    Ok((
        input,
        Step {
            axis,
            test,
            predicates,
        },
    ))
}

/// Keeps `.5` available to the number parser.
fn peek_not_digit(input: &str) -> IResult<&str, ()> {
    match input.chars().next() {
        Some(c) if c.is_ascii_digit() => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
        _ => Ok((input, ())),
    }
}

fn location_path(input: &str) -> IResult<&str, Path> {
    let double_slash: IResult<&str, &str> = tag("//").parse(input);
    let single_slash: IResult<&str, char> = char('/')(input);
    let (input, (absolute, mut steps)) = if let Ok((rest, _)) = double_slash {
        let (rest, first) = step(rest)?;
        (rest, (true, vec![Step::descendant_or_self_node(), first]))
    } else if let Ok((rest, _)) = single_slash {
        match step(rest) {
            Ok((rest, first)) => (rest, (true, vec![first])),
            // The path is just "/".
            Err(_) => (rest, (true, vec![])),
        }
    } else {
        let (rest, first) = step(input)?;
        (rest, (false, vec![first]))
    };

    let (input, continuation) = many0(pair(alt((tag("//"), tag("/"))), step)).parse(input)?;
    for (sep, next) in continuation {
        if sep == "//" {
            steps.push(Step::descendant_or_self_node());
        }
        steps.push(next);
    }

    Ok((
        input,
        Path {
            start: None,
            absolute,
            steps,
        },
    ))
}

fn function_call(input: &str) -> IResult<&str, Expression> {
    let (rest, name) = q_name(input)?;
    let (rest, _) = peek(lexeme(char('('))).parse(rest)?;

    // text() and friends are node tests; the step parser owns them.
    if matches!(
        name.as_str(),
        "text" | "node" | "comment" | "processing-instruction"
    ) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }

    let (rest, _) = multispace0(rest)?;
    let (rest, args) = delimited(
        char('('),
        separated_list0(lexeme(char(',')), expression),
        char(')'),
    )
    .parse(rest)?;
    Ok((rest, Expression::Call { name, args }))
}
