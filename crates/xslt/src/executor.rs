//! The recursive template executor.
//!
//! One executor drives one transform run. Evaluation state is the focus
//! triple (node, position, size) threaded through calls, plus a stack of
//! variable scopes; everything shared (template rules, caches, whitespace
//! lists, decimal formats, key indexes) lives on the compiled stylesheet or
//! on this struct and is reference-shared by every nested call.

use crate::ast::*;
use crate::datasource::DomNode;
use crate::error::TransformError;
use crate::executor_handlers as handlers;
use crate::functions::{CustomFunctionTable, XsltFunctions};
use crate::output::XmlOutputBuilder;
use crate::processor::{ParamValue, Params};
use crate::whitespace::{self, SpacePolicy};
use larch_xpath::ast::Expression;
use larch_xpath::engine::Context;
use larch_xpath::{DataSourceNode, NodeType, XPathValue};
use std::collections::HashMap;

pub type KeyIndexes<'a> = HashMap<String, HashMap<String, Vec<DomNode<'a>>>>;

pub struct TemplateExecutor<'a> {
    pub(crate) stylesheet: &'a CompiledStylesheet,
    pub(crate) root: DomNode<'a>,
    pub(crate) custom: &'a CustomFunctionTable,
    pub(crate) key_indexes: KeyIndexes<'a>,
    scopes: Vec<HashMap<String, XPathValue<DomNode<'a>>>>,
}

impl<'a> TemplateExecutor<'a> {
    /// Builds the full run environment: key indexes over the input document
    /// and the top-level variable/parameter bindings (host parameters shadow
    /// `xsl:param` defaults).
    pub fn new(
        stylesheet: &'a CompiledStylesheet,
        root: DomNode<'a>,
        custom: &'a CustomFunctionTable,
        params: &Params,
    ) -> Result<Self, TransformError> {
        let mut executor = Self::with_environment(stylesheet, root, custom, HashMap::new());
        executor.key_indexes = executor.build_key_indexes()?;
        executor.bind_globals(params)?;
        Ok(executor)
    }

    /// A bare executor sharing an existing environment; used for nested
    /// runs (`xsl:function` bodies).
    pub(crate) fn with_environment(
        stylesheet: &'a CompiledStylesheet,
        root: DomNode<'a>,
        custom: &'a CustomFunctionTable,
        key_indexes: KeyIndexes<'a>,
    ) -> Self {
        TemplateExecutor {
            stylesheet,
            root,
            custom,
            key_indexes,
            scopes: vec![HashMap::new()],
        }
    }

    /// Seeds the run: template rules are tried against the document root;
    /// when nothing matches it, each element child of the root is offered to
    /// the rules instead (text children are ignored at this level). If the
    /// stylesheet carries top-level literal content and no rule fired at
    /// all, that content runs as a last resort.
    pub fn run(&mut self, builder: &mut XmlOutputBuilder) -> Result<(), TransformError> {
        if self.try_rules(self.root, 1, 1, &None, &[], builder)? {
            return Ok(());
        }

        let elements: Vec<DomNode<'a>> = self
            .root
            .children()
            .filter(|c| c.node_type() == NodeType::Element)
            .collect();
        let total = elements.len();
        let mut fired = false;
        for (i, element) in elements.into_iter().enumerate() {
            fired |= self.try_rules(element, i + 1, total, &None, &[], builder)?;
        }

        if !fired && !self.stylesheet.fallback_body.is_empty() {
            let body = &self.stylesheet.fallback_body;
            self.execute_body(body, self.root, 1, 1, builder)?;
        }
        Ok(())
    }

    // --- Instruction dispatch ---

    pub(crate) fn execute_body(
        &mut self,
        body: &'a TemplateBody,
        node: DomNode<'a>,
        position: usize,
        size: usize,
        builder: &mut XmlOutputBuilder,
    ) -> Result<(), TransformError> {
        for instruction in &body.0 {
            match instruction {
                Instruction::Text {
                    content,
                    verbatim,
                    raw_markup,
                } => handlers::literals::handle_text(content, *verbatim, *raw_markup, builder),
                Instruction::LiteralElement {
                    name,
                    namespace,
                    attributes,
                    body,
                } => handlers::literals::handle_literal_element(
                    self,
                    name,
                    namespace.as_deref(),
                    attributes,
                    body,
                    node,
                    position,
                    size,
                    builder,
                )?,
                Instruction::ApplyTemplates {
                    select,
                    mode,
                    sort_keys,
                    params,
                } => handlers::apply_templates::handle_apply_templates(
                    self, select, mode, sort_keys, params, node, position, size, builder,
                )?,
                Instruction::CallTemplate { name, params } => {
                    handlers::call_template::handle_call_template(
                        self, name, params, node, position, size, builder,
                    )?
                }
                Instruction::ForEach {
                    select,
                    sort_keys,
                    body,
                } => handlers::for_each::handle_for_each(
                    self, select, sort_keys, body, node, position, size, builder,
                )?,
                Instruction::If { test, body } => handlers::control_flow::handle_if(
                    self, test, body, node, position, size, builder,
                )?,
                Instruction::Choose { whens, otherwise } => {
                    handlers::control_flow::handle_choose(
                        self,
                        whens,
                        otherwise.as_ref(),
                        node,
                        position,
                        size,
                        builder,
                    )?
                }
                Instruction::Copy { body } => handlers::copy::handle_copy(
                    self, body, node, position, size, builder,
                )?,
                Instruction::CopyOf { select } => handlers::copy::handle_copy_of(
                    self, select, node, position, size, builder,
                )?,
                Instruction::Element {
                    name,
                    namespace,
                    body,
                } => handlers::literals::handle_element(
                    self,
                    name,
                    namespace.as_ref(),
                    body,
                    node,
                    position,
                    size,
                    builder,
                )?,
                Instruction::Attribute { name, body } => handlers::literals::handle_attribute(
                    self, name, body, node, position, size, builder,
                )?,
                Instruction::ValueOf { select, raw_markup } => {
                    handlers::literals::handle_value_of(
                        self, select, *raw_markup, node, position, size, builder,
                    )?
                }
                Instruction::Variable(def) => {
                    let value = self.compute_variable_value(def, node, position, size)?;
                    self.bind_in_current_scope(def.name.clone(), value);
                }
                Instruction::Param(def) => {
                    handlers::variables::handle_param(self, def, node, position, size)?
                }
                Instruction::Comment { body } => handlers::literals::handle_comment(
                    self, body, node, position, size, builder,
                )?,
                Instruction::ProcessingInstruction { name, body } => {
                    handlers::literals::handle_processing_instruction(
                        self, name, body, node, position, size, builder,
                    )?
                }
            }
        }
        Ok(())
    }

    // --- Template rule selection ---

    pub(crate) fn rules_for(&self, mode: &Option<String>) -> &'a [TemplateRule] {
        self.stylesheet
            .rules_by_mode
            .get(mode)
            .map(|rules| rules.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn named_template(&self, name: &str) -> Option<&'a NamedTemplate> {
        self.stylesheet.named_templates.get(name)
    }

    /// Fires the first rule in `mode` matching `node`. Returns whether one
    /// fired.
    pub(crate) fn try_rules(
        &mut self,
        node: DomNode<'a>,
        position: usize,
        size: usize,
        mode: &Option<String>,
        with_params: &[(String, XPathValue<DomNode<'a>>)],
        builder: &mut XmlOutputBuilder,
    ) -> Result<bool, TransformError> {
        let rules = self.rules_for(mode);
        for rule in rules {
            if rule.pattern.matches(node, self.root) {
                self.push_scope();
                for def in &rule.params {
                    if let Some((_, value)) =
                        with_params.iter().find(|(name, _)| *name == def.name)
                    {
                        self.bind_in_current_scope(def.name.clone(), value.clone());
                    } else {
                        handlers::variables::handle_param(self, def, node, position, size)?;
                    }
                }
                let result = self.execute_body(&rule.body, node, position, size, builder);
                self.pop_scope();
                result?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    // --- Variable scopes ---

    pub(crate) fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub(crate) fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub(crate) fn bind_in_current_scope(
        &mut self,
        name: String,
        value: XPathValue<DomNode<'a>>,
    ) {
        let value = coerce_string_binding(value);
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, value);
        }
    }

    pub(crate) fn current_scope_has(&self, name: &str) -> bool {
        self.scopes
            .last()
            .map(|scope| scope.contains_key(name))
            .unwrap_or(false)
    }

    pub(crate) fn lookup_variable(&self, name: &str) -> Option<XPathValue<DomNode<'a>>> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).cloned())
    }

    /// Flattened view of the scope chain: the nearest binding wins.
    pub(crate) fn merged_variables(&self) -> HashMap<String, XPathValue<DomNode<'a>>> {
        let mut merged = HashMap::new();
        for scope in &self.scopes {
            for (name, value) in scope {
                merged.insert(name.clone(), value.clone());
            }
        }
        merged
    }

    // --- Expression evaluation ---

    pub(crate) fn evaluate_expr(
        &self,
        expr: &Expression,
        node: DomNode<'a>,
        position: usize,
        size: usize,
    ) -> Result<XPathValue<DomNode<'a>>, TransformError> {
        let merged = self.merged_variables();
        let resolver = self.function_environment(node);
        let ctx = Context::new(
            node,
            self.root,
            position,
            size,
            &merged,
            &self.key_indexes,
            Some(&resolver),
        );
        Ok(larch_xpath::evaluate(expr, &ctx)?)
    }

    /// Evaluates a `select`: the bare-child-name shortcut filters children
    /// directly, everything else runs the engine; node-set results are
    /// normalized to document order.
    pub(crate) fn evaluate_select(
        &self,
        select: &SelectExpr,
        node: DomNode<'a>,
        position: usize,
        size: usize,
    ) -> Result<XPathValue<DomNode<'a>>, TransformError> {
        if let Some(name) = select.expr.as_child_name() {
            let local = name.rsplit(':').next().unwrap_or(name);
            let nodes: Vec<DomNode<'a>> = node
                .children()
                .filter(|child| {
                    child.node_type() == NodeType::Element
                        && child.name().is_some_and(|q| q.local == local)
                })
                .collect();
            return Ok(XPathValue::NodeSet(nodes));
        }
        match self.evaluate_expr(&select.expr, node, position, size)? {
            XPathValue::NodeSet(mut nodes) => {
                nodes.sort();
                nodes.dedup();
                Ok(XPathValue::NodeSet(nodes))
            }
            other => Ok(other),
        }
    }

    pub(crate) fn function_environment<'r>(
        &'r self,
        current: DomNode<'a>,
    ) -> XsltFunctions<'a, 'r> {
        XsltFunctions {
            stylesheet: self.stylesheet,
            input_root: self.root,
            current,
            custom: self.custom,
            key_indexes: &self.key_indexes,
        }
    }

    /// Resolves an attribute value template. Parts that failed to compile or
    /// fail to evaluate fall back to their braced source text.
    pub(crate) fn evaluate_avt(
        &self,
        avt: &Avt,
        node: DomNode<'a>,
        position: usize,
        size: usize,
    ) -> String {
        let mut out = String::new();
        for part in &avt.0 {
            match part {
                AvtPart::Static(text) => out.push_str(text),
                AvtPart::Dynamic { source, expr } => {
                    let evaluated = expr
                        .as_ref()
                        .and_then(|e| self.evaluate_expr(e, node, position, size).ok());
                    match evaluated {
                        Some(value) => out.push_str(&whitespace::apply(
                            SpacePolicy::Strip,
                            &value.string_value(),
                        )),
                        None => {
                            out.push('{');
                            out.push_str(source);
                            out.push('}');
                        }
                    }
                }
            }
        }
        out
    }

    // --- Variable values (xsl:variable / param / with-param) ---

    /// The value of a binding definition in the current context: an explicit
    /// `select`, an instruction body collected into a fragment (whose text is
    /// the value), an outer binding of the same name, or the empty string.
    pub(crate) fn compute_variable_value(
        &mut self,
        def: &'a VariableDef,
        node: DomNode<'a>,
        position: usize,
        size: usize,
    ) -> Result<XPathValue<DomNode<'a>>, TransformError> {
        if !def.body.is_empty() {
            let mut fragment = XmlOutputBuilder::new();
            self.push_scope();
            let result = self.execute_body(&def.body, node, position, size, &mut fragment);
            self.pop_scope();
            result?;
            return Ok(XPathValue::String(fragment.text_value()));
        }
        if let Some(select) = &def.select {
            return self.evaluate_select(select, node, position, size);
        }
        Ok(self
            .lookup_variable(&def.name)
            .unwrap_or_else(|| XPathValue::String(String::new())))
    }

    /// Evaluates a `with-param` list in the caller's context.
    pub(crate) fn evaluate_with_params(
        &mut self,
        params: &'a [VariableDef],
        node: DomNode<'a>,
        position: usize,
        size: usize,
    ) -> Result<Vec<(String, XPathValue<DomNode<'a>>)>, TransformError> {
        let mut out = Vec::with_capacity(params.len());
        for def in params {
            let value = self.compute_variable_value(def, node, position, size)?;
            out.push((def.name.clone(), value));
        }
        Ok(out)
    }

    // --- Sorting ---

    /// Reorders `nodes` per the sort keys; evaluation happens in singleton
    /// contexts. The sort is stable, so document order breaks ties.
    pub(crate) fn sort_nodes(
        &self,
        nodes: &mut Vec<DomNode<'a>>,
        sort_keys: &[SortKey],
    ) -> Result<(), TransformError> {
        if sort_keys.is_empty() {
            return Ok(());
        }

        let mut keyed: Vec<(DomNode<'a>, Vec<SortValue>)> = Vec::with_capacity(nodes.len());
        for &node in nodes.iter() {
            let mut values = Vec::with_capacity(sort_keys.len());
            for key in sort_keys {
                let raw = self
                    .evaluate_expr(&key.select.expr, node, 1, 1)?
                    .string_value();
                let value = match key.data_type {
                    SortDataType::Number => {
                        SortValue::Number(raw.trim().parse().unwrap_or(f64::NAN))
                    }
                    SortDataType::Text => SortValue::Text(raw),
                };
                values.push(value);
            }
            keyed.push((node, values));
        }

        keyed.sort_by(|(_, a), (_, b)| {
            for (i, key) in sort_keys.iter().enumerate() {
                let ordering = a[i].compare(&b[i]);
                let ordering = match key.order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                };
                if ordering != std::cmp::Ordering::Equal {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });

        *nodes = keyed.into_iter().map(|(node, _)| node).collect();
        Ok(())
    }

    // --- Setup ---

    fn build_key_indexes(&self) -> Result<KeyIndexes<'a>, TransformError> {
        let mut indexes: KeyIndexes<'a> = HashMap::new();
        if self.stylesheet.keys.is_empty() {
            return Ok(indexes);
        }

        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            for key in &self.stylesheet.keys {
                if key.pattern.matches(node, self.root) {
                    let value = self
                        .evaluate_expr(&key.use_expr.expr, node, 1, 1)?
                        .string_value();
                    indexes
                        .entry(key.name.clone())
                        .or_default()
                        .entry(value)
                        .or_default()
                        .push(node);
                }
            }
            stack.extend(node.attributes());
            stack.extend(node.children());
        }

        for index in indexes.values_mut() {
            for nodes in index.values_mut() {
                nodes.sort();
                nodes.dedup();
            }
        }
        Ok(indexes)
    }

    fn bind_globals(&mut self, params: &Params) -> Result<(), TransformError> {
        for binding in &self.stylesheet.top_level {
            match binding {
                TopLevelBinding::Variable(def) => {
                    let value = self.compute_variable_value(def, self.root, 1, 1)?;
                    self.bind_in_current_scope(def.name.clone(), value);
                }
                TopLevelBinding::Param(def) => {
                    if let Some(host_value) = params.get(&def.name) {
                        let value = match host_value {
                            ParamValue::String(s) => XPathValue::String(s.clone()),
                            ParamValue::Number(n) => XPathValue::Number(*n),
                            ParamValue::Boolean(b) => XPathValue::Boolean(*b),
                        };
                        self.bind_in_current_scope(def.name.clone(), value);
                    } else {
                        let value = self.compute_variable_value(def, self.root, 1, 1)?;
                        let value = as_text(value);
                        self.bind_in_current_scope(def.name.clone(), value);
                    }
                }
            }
        }
        Ok(())
    }
}

/// A computed sort key.
enum SortValue {
    Text(String),
    Number(f64),
}

impl SortValue {
    fn compare(&self, other: &SortValue) -> std::cmp::Ordering {
        match (self, other) {
            (SortValue::Number(a), SortValue::Number(b)) => {
                a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
            }
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            // Mixed kinds cannot happen for one key; fall back to stable.
            _ => std::cmp::Ordering::Equal,
        }
    }
}

/// Coerces parameter-style values to text.
pub(crate) fn as_text<'a>(value: XPathValue<DomNode<'a>>) -> XPathValue<DomNode<'a>> {
    match value {
        XPathValue::NodeSet(_) => XPathValue::String(value.string_value()),
        other => other,
    }
}

/// String bindings recognize booleans and simple decimals; everything else
/// is stored as-is with its whitespace runs collapsed.
fn coerce_string_binding<'a>(value: XPathValue<DomNode<'a>>) -> XPathValue<DomNode<'a>> {
    let XPathValue::String(text) = value else {
        return value;
    };
    match text.as_str() {
        "true" => return XPathValue::Boolean(true),
        "false" => return XPathValue::Boolean(false),
        _ => {}
    }
    if is_simple_decimal(&text) {
        if let Ok(n) = text.parse::<f64>() {
            return XPathValue::Number(n);
        }
    }
    XPathValue::String(whitespace::apply(SpacePolicy::Normalize, &text))
}

/// `^\d+(\.\d*)?$`
fn is_simple_decimal(text: &str) -> bool {
    let mut chars = text.chars().peekable();
    let mut digits = 0;
    while let Some(c) = chars.peek() {
        if c.is_ascii_digit() {
            digits += 1;
            chars.next();
        } else {
            break;
        }
    }
    if digits == 0 {
        return false;
    }
    match chars.next() {
        None => true,
        Some('.') => chars.all(|c| c.is_ascii_digit()),
        Some(_) => false,
    }
}
