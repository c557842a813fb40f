use crate::ast::{SelectExpr, SortKey, TemplateBody};
use crate::datasource::DomNode;
use crate::error::TransformError;
use crate::executor::TemplateExecutor;
use crate::output::XmlOutputBuilder;
use larch_xpath::XPathValue;

/// Iterates the selected node-set (optionally sorted); each iteration runs
/// the body in its own scope with its own focus.
#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_for_each<'a>(
    executor: &mut TemplateExecutor<'a>,
    select: &'a SelectExpr,
    sort_keys: &'a [SortKey],
    body: &'a TemplateBody,
    node: DomNode<'a>,
    position: usize,
    size: usize,
    builder: &mut XmlOutputBuilder,
) -> Result<(), TransformError> {
    let XPathValue::NodeSet(mut nodes) =
        executor.evaluate_select(select, node, position, size)?
    else {
        return Ok(());
    };
    executor.sort_nodes(&mut nodes, sort_keys)?;

    let total = nodes.len();
    for (i, item) in nodes.into_iter().enumerate() {
        executor.push_scope();
        let result = executor.execute_body(body, item, i + 1, total, builder);
        executor.pop_scope();
        result?;
    }
    Ok(())
}
