//! Output-producing handlers: text, literal result elements, computed
//! elements and attributes, `value-of`, comments and processing
//! instructions.

use crate::ast::{Avt, SelectExpr, TemplateBody};
use crate::datasource::DomNode;
use crate::error::TransformError;
use crate::executor::TemplateExecutor;
use crate::output::{wrap_raw_markup, XmlOutputBuilder};
use crate::whitespace;
use larch_xml::document::split_qname;
use larch_xpath::{DataSourceNode, NodeType};

pub(crate) fn handle_text(
    content: &str,
    verbatim: bool,
    raw_markup: bool,
    builder: &mut XmlOutputBuilder,
) {
    if raw_markup {
        builder.add_text_verbatim(&wrap_raw_markup(content));
    } else if verbatim {
        builder.add_text_verbatim(content);
    } else {
        builder.add_text(content);
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_literal_element<'a>(
    executor: &mut TemplateExecutor<'a>,
    name: &'a str,
    namespace: Option<&'a str>,
    attributes: &'a [(String, Avt)],
    body: &'a TemplateBody,
    node: DomNode<'a>,
    position: usize,
    size: usize,
    builder: &mut XmlOutputBuilder,
) -> Result<(), TransformError> {
    builder.start_element(name, namespace);
    for (attr_name, avt) in attributes {
        let value = executor.evaluate_avt(avt, node, position, size);
        builder.set_attribute(attr_name, &value);
    }
    let result = executor.execute_body(body, node, position, size, builder);
    builder.end_element();
    result
}

/// `xsl:element`: the name is an AVT; the namespace comes from the
/// `namespace` attribute, a stylesheet prefix binding, or a declaration in
/// scope at the current input node.
#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_element<'a>(
    executor: &mut TemplateExecutor<'a>,
    name: &'a Avt,
    namespace: Option<&'a Avt>,
    body: &'a TemplateBody,
    node: DomNode<'a>,
    position: usize,
    size: usize,
    builder: &mut XmlOutputBuilder,
) -> Result<(), TransformError> {
    let element_name = executor.evaluate_avt(name, node, position, size);
    let ns = match namespace {
        Some(avt) => {
            let value = executor.evaluate_avt(avt, node, position, size);
            (!value.is_empty()).then_some(value)
        }
        None => match split_qname(&element_name).0 {
            Some(prefix) => executor
                .stylesheet
                .namespaces
                .get(prefix)
                .cloned()
                .or_else(|| {
                    node.node_ref()
                        .and_then(|n| n.lookup_namespace(prefix))
                }),
            None => None,
        },
    };

    builder.start_element(&element_name, ns.as_deref());
    let result = executor.execute_body(body, node, position, size, builder);
    builder.end_element();
    result
}

/// `xsl:attribute`: the body runs into a scratch fragment whose text
/// becomes the attribute value on the innermost open element.
pub(crate) fn handle_attribute<'a>(
    executor: &mut TemplateExecutor<'a>,
    name: &'a Avt,
    body: &'a TemplateBody,
    node: DomNode<'a>,
    position: usize,
    size: usize,
    builder: &mut XmlOutputBuilder,
) -> Result<(), TransformError> {
    let attr_name = executor.evaluate_avt(name, node, position, size);
    let mut fragment = XmlOutputBuilder::new();
    executor.execute_body(body, node, position, size, &mut fragment)?;
    builder.set_attribute(&attr_name, &fragment.text_value());
    Ok(())
}

/// `xsl:value-of`: string evaluation, whitespace policy of the nearest
/// input element, optional escaping bypass.
pub(crate) fn handle_value_of<'a>(
    executor: &mut TemplateExecutor<'a>,
    select: &'a SelectExpr,
    raw_markup: bool,
    node: DomNode<'a>,
    position: usize,
    size: usize,
    builder: &mut XmlOutputBuilder,
) -> Result<(), TransformError> {
    let value = executor
        .evaluate_select(select, node, position, size)?
        .string_value();

    let context_element = nearest_element(node);
    let processed =
        whitespace::process_value(&executor.stylesheet.whitespace, &value, context_element);
    if processed.is_empty() {
        return Ok(());
    }
    if raw_markup {
        builder.add_text_verbatim(&wrap_raw_markup(&processed));
    } else {
        builder.add_text(&processed);
    }
    Ok(())
}

fn nearest_element<'a>(node: DomNode<'a>) -> Option<(Option<&'a str>, &'a str)> {
    let mut current = Some(node);
    while let Some(n) = current {
        if n.node_type() == NodeType::Element {
            let node_ref = n.node_ref()?;
            return Some((node_ref.namespace(), node_ref.local_name().unwrap_or("")));
        }
        current = n.parent();
    }
    None
}

/// `xsl:comment`: the body's text value becomes a comment node.
pub(crate) fn handle_comment<'a>(
    executor: &mut TemplateExecutor<'a>,
    body: &'a TemplateBody,
    node: DomNode<'a>,
    position: usize,
    size: usize,
    builder: &mut XmlOutputBuilder,
) -> Result<(), TransformError> {
    let mut fragment = XmlOutputBuilder::new();
    executor.execute_body(body, node, position, size, &mut fragment)?;
    builder.add_comment(&fragment.text_value());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_processing_instruction<'a>(
    executor: &mut TemplateExecutor<'a>,
    name: &'a Avt,
    body: &'a TemplateBody,
    node: DomNode<'a>,
    position: usize,
    size: usize,
    builder: &mut XmlOutputBuilder,
) -> Result<(), TransformError> {
    let target = executor.evaluate_avt(name, node, position, size);
    let mut fragment = XmlOutputBuilder::new();
    executor.execute_body(body, node, position, size, &mut fragment)?;
    builder.add_processing_instruction(&target, &fragment.text_value());
    Ok(())
}
