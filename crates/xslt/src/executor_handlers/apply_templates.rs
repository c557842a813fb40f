use crate::ast::{SelectExpr, SortKey, VariableDef};
use crate::datasource::DomNode;
use crate::error::TransformError;
use crate::executor::TemplateExecutor;
use crate::output::XmlOutputBuilder;
use larch_xpath::{DataSourceNode, NodeType, XPathValue};

/// Selects candidate nodes (the `select` expression, or the current node's
/// children), sorts them, and pushes each through the mode's template
/// rules. A candidate no rule consumes falls through the built-in rule:
/// text is copied, everything else is dropped.
#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_apply_templates<'a>(
    executor: &mut TemplateExecutor<'a>,
    select: &'a Option<SelectExpr>,
    mode: &'a Option<String>,
    sort_keys: &'a [SortKey],
    params: &'a [VariableDef],
    node: DomNode<'a>,
    position: usize,
    size: usize,
    builder: &mut XmlOutputBuilder,
) -> Result<(), TransformError> {
    let mut candidates: Vec<DomNode<'a>> = match select {
        Some(sel) => match executor.evaluate_select(sel, node, position, size)? {
            XPathValue::NodeSet(nodes) => nodes,
            _ => Vec::new(),
        },
        None => node.children().collect(),
    };

    executor.sort_nodes(&mut candidates, sort_keys)?;
    let with_params = executor.evaluate_with_params(params, node, position, size)?;

    let total = candidates.len();
    for (i, candidate) in candidates.into_iter().enumerate() {
        let fired = executor.try_rules(candidate, i + 1, total, mode, &with_params, builder)?;
        if !fired && candidate.node_type() == NodeType::Text {
            builder.add_text_verbatim(&candidate.string_value());
        }
    }
    Ok(())
}
