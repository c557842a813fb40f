use crate::ast::VariableDef;
use crate::datasource::DomNode;
use crate::error::TransformError;
use crate::executor::TemplateExecutor;
use crate::executor_handlers::variables;
use crate::output::XmlOutputBuilder;

/// Invokes a named template with the current focus. `with-param` values are
/// evaluated in the caller's scope, then bound in the callee's fresh scope
/// so its `xsl:param` declarations see them.
pub(crate) fn handle_call_template<'a>(
    executor: &mut TemplateExecutor<'a>,
    name: &'a str,
    params: &'a [VariableDef],
    node: DomNode<'a>,
    position: usize,
    size: usize,
    builder: &mut XmlOutputBuilder,
) -> Result<(), TransformError> {
    let Some(template) = executor.named_template(name) else {
        return Err(TransformError::UnknownTemplate(name.to_string()));
    };

    let passed = executor.evaluate_with_params(params, node, position, size)?;

    executor.push_scope();
    for def in &template.params {
        if let Some((_, value)) = passed.iter().find(|(n, _)| *n == def.name) {
            executor.bind_in_current_scope(def.name.clone(), value.clone());
        } else {
            variables::handle_param(executor, def, node, position, size)?;
        }
    }
    let result = executor.execute_body(&template.body, node, position, size, builder);
    executor.pop_scope();
    result
}
