use crate::ast::VariableDef;
use crate::datasource::DomNode;
use crate::error::TransformError;
use crate::executor::{as_text, TemplateExecutor};

/// `xsl:param`: binds only when the name is not already bound in the
/// current scope (a caller's `with-param` wins), and coerces its value to
/// text.
pub(crate) fn handle_param<'a>(
    executor: &mut TemplateExecutor<'a>,
    def: &'a VariableDef,
    node: DomNode<'a>,
    position: usize,
    size: usize,
) -> Result<(), TransformError> {
    if executor.current_scope_has(&def.name) {
        return Ok(());
    }
    let value = executor.compute_variable_value(def, node, position, size)?;
    executor.bind_in_current_scope(def.name.clone(), as_text(value));
    Ok(())
}
