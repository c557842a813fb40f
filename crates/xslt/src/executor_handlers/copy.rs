use crate::ast::{SelectExpr, TemplateBody};
use crate::datasource::DomNode;
use crate::error::TransformError;
use crate::executor::TemplateExecutor;
use crate::output::XmlOutputBuilder;
use larch_xpath::{DataSourceNode, NodeType, XPathValue};

/// `xsl:copy`: shallow copy of the current node. When the copy opened an
/// element, the instruction body runs inside it; copying the root just runs
/// the body in place.
pub(crate) fn handle_copy<'a>(
    executor: &mut TemplateExecutor<'a>,
    body: &'a TemplateBody,
    node: DomNode<'a>,
    position: usize,
    size: usize,
    builder: &mut XmlOutputBuilder,
) -> Result<(), TransformError> {
    if node.node_type() == NodeType::Root {
        return executor.execute_body(body, node, position, size, builder);
    }
    let opened = builder.copy_node_shallow(node);
    if opened {
        let result = executor.execute_body(body, node, position, size, builder);
        builder.end_element();
        result?;
    }
    Ok(())
}

/// `xsl:copy-of`: node-sets are copied deeply, in document order; scalar
/// results degrade to text.
pub(crate) fn handle_copy_of<'a>(
    executor: &mut TemplateExecutor<'a>,
    select: &'a SelectExpr,
    node: DomNode<'a>,
    position: usize,
    size: usize,
    builder: &mut XmlOutputBuilder,
) -> Result<(), TransformError> {
    match executor.evaluate_select(select, node, position, size)? {
        XPathValue::NodeSet(nodes) => {
            for copied in nodes {
                builder.copy_node_deep(copied);
            }
        }
        other => builder.add_text(&other.string_value()),
    }
    Ok(())
}
