use crate::ast::{SelectExpr, TemplateBody, When};
use crate::datasource::DomNode;
use crate::error::TransformError;
use crate::executor::TemplateExecutor;
use crate::output::XmlOutputBuilder;

pub(crate) fn handle_if<'a>(
    executor: &mut TemplateExecutor<'a>,
    test: &'a SelectExpr,
    body: &'a TemplateBody,
    node: DomNode<'a>,
    position: usize,
    size: usize,
    builder: &mut XmlOutputBuilder,
) -> Result<(), TransformError> {
    if executor
        .evaluate_expr(&test.expr, node, position, size)?
        .to_bool()
    {
        executor.execute_body(body, node, position, size, builder)?;
    }
    Ok(())
}

pub(crate) fn handle_choose<'a>(
    executor: &mut TemplateExecutor<'a>,
    whens: &'a [When],
    otherwise: Option<&'a TemplateBody>,
    node: DomNode<'a>,
    position: usize,
    size: usize,
    builder: &mut XmlOutputBuilder,
) -> Result<(), TransformError> {
    for when in whens {
        if executor
            .evaluate_expr(&when.test.expr, node, position, size)?
            .to_bool()
        {
            return executor.execute_body(&when.body, node, position, size, builder);
        }
    }
    if let Some(body) = otherwise {
        executor.execute_body(body, node, position, size, builder)?;
    }
    Ok(())
}
