//! Compilation of a transform document into a [`CompiledStylesheet`].
//!
//! The include/import pre-pass runs first and mutates this run's parse of
//! the transform text; the compiler then walks the DOM once, turning
//! template bodies into instruction trees and gathering the top-level
//! declarations (output contract, whitespace lists, decimal formats, keys,
//! functions, global bindings). `document()` calls with literal URLs are
//! prefetched here so evaluation never has to wait on I/O.

use crate::ast::*;
use crate::error::TransformError;
use crate::fetch::{resolve_href, DocumentFetcher};
use crate::format::{DecimalFormat, DEFAULT_FORMAT_NAME};
use crate::includes::{process_includes, IncludeOutcome};
use crate::pattern::Pattern;
use crate::whitespace::canonical_name;
use larch_xml::{Document, NodeKind, NodeRef, XSLT_NS};
use larch_xpath::ast::Expression;
use larch_xpath::parse_expression;
use std::collections::HashMap;

pub struct CompileOptions<'f> {
    pub transform_url: Option<String>,
    pub fetcher: &'f dyn DocumentFetcher,
}

pub fn compile(
    transform_xml: &str,
    options: &CompileOptions<'_>,
) -> Result<CompiledStylesheet, TransformError> {
    let mut doc = larch_xml::parse(transform_xml)?;
    let includes = process_includes(&mut doc, options.transform_url.as_deref(), options.fetcher);

    let root_id = doc
        .document_element()
        .ok_or_else(|| TransformError::Structure("transform document is empty".to_string()))?;
    let root = doc.node_ref(root_id);
    if root.namespace() != Some(XSLT_NS)
        || !matches!(root.local_name(), Some("stylesheet") | Some("transform"))
    {
        return Err(TransformError::Structure(
            "transform root must be xsl:stylesheet or xsl:transform".to_string(),
        ));
    }

    let mut sheet = CompiledStylesheet {
        namespaces: collect_namespaces(&doc, root_id),
        transform_url: options.transform_url.clone(),
        ..CompiledStylesheet::default()
    };

    compile_top_level(root, &includes, &mut sheet)?;

    for rules in sheet.rules_by_mode.values_mut() {
        rules.sort_by(|a, b| {
            a.import_precedence
                .cmp(&b.import_precedence)
                .then_with(|| {
                    b.priority
                        .partial_cmp(&a.priority)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
    }

    prefetch_documents(&mut sheet, options);
    Ok(sheet)
}

/// Prefix declarations from the whole transform tree; outer declarations
/// win when a prefix is bound more than once.
fn collect_namespaces(doc: &Document, root: larch_xml::NodeId) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if let Some(data) = doc.element(id) {
            for (prefix, uri) in &data.namespace_decls {
                out.entry(prefix.clone()).or_insert_with(|| uri.clone());
            }
        }
        stack.extend(doc.children(id).iter().copied());
    }
    out
}

fn compile_top_level(
    root: NodeRef<'_>,
    includes: &IncludeOutcome,
    sheet: &mut CompiledStylesheet,
) -> Result<(), TransformError> {
    for child in root.children() {
        match child.kind() {
            NodeKind::Element(_) if child.namespace() == Some(XSLT_NS) => {
                let local = child.local_name().unwrap_or("");
                match local {
                    "template" => compile_template(child, includes, sheet)?,
                    "output" => apply_output(child, &mut sheet.output),
                    "strip-space" => {
                        for name in space_list(child, &sheet.namespaces) {
                            sheet.whitespace.add_strip(name);
                        }
                    }
                    "preserve-space" => {
                        for name in space_list(child, &sheet.namespaces) {
                            sheet.whitespace.add_preserve(name);
                        }
                    }
                    "decimal-format" => {
                        let (name, format) = compile_decimal_format(child);
                        sheet.decimal_formats.insert(name, format);
                    }
                    "key" => {
                        let name = required_attr(child, "name", "key")?;
                        let pattern = Pattern::parse(&required_attr(child, "match", "key")?)?;
                        let use_expr = compile_select(&required_attr(child, "use", "key")?)?;
                        sheet.keys.push(KeyDefinition {
                            name,
                            pattern,
                            use_expr,
                        });
                    }
                    "variable" => {
                        let def = compile_variable_def(child)?;
                        sheet.top_level.push(TopLevelBinding::Variable(def));
                    }
                    "param" => {
                        let def = compile_variable_def(child)?;
                        sheet.top_level.push(TopLevelBinding::Param(def));
                    }
                    "function" => compile_function(child, sheet)?,
                    // Leftover references without an href; the pre-pass
                    // consumed every actionable one.
                    "include" | "import" => {}
                    other => return Err(TransformError::NotImplemented(other.to_string())),
                }
            }
            NodeKind::Element(_) => {
                // A literal element at the top level joins the body that
                // runs when nothing matches the input root.
                if let Some(instr) = compile_node(child, false)? {
                    sheet.fallback_body.0.push(instr);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn compile_template(
    node: NodeRef<'_>,
    includes: &IncludeOutcome,
    sheet: &mut CompiledStylesheet,
) -> Result<(), TransformError> {
    let mut params = Vec::new();
    let mut body = TemplateBody::default();
    for child in node.children() {
        if is_xsl(child, "param") {
            params.push(compile_variable_def(child)?);
        } else if let Some(instr) = compile_node(child, false)? {
            body.0.push(instr);
        }
    }

    let match_attr = node.attribute("match");
    let name_attr = node.attribute("name");
    if match_attr.is_none() && name_attr.is_none() {
        return Err(TransformError::Structure(
            "xsl:template needs a match or name attribute".to_string(),
        ));
    }

    if let Some(name) = name_attr {
        sheet.named_templates.insert(
            name.to_string(),
            NamedTemplate {
                params: params.clone(),
                body: body.clone(),
            },
        );
    }

    if let Some(match_text) = match_attr {
        let pattern = Pattern::parse(match_text)?;
        let priority = match node.attribute("priority") {
            Some(p) => p.parse::<f64>().map_err(|_| {
                TransformError::Compile(format!("invalid template priority '{}'", p))
            })?,
            None => pattern.default_priority(),
        };
        let mode = node.attribute("mode").map(str::to_string);
        let rule = TemplateRule {
            pattern,
            mode: mode.clone(),
            priority,
            import_precedence: includes.precedence.get(&node.id).copied().unwrap_or(0),
            params,
            body,
        };
        sheet.rules_by_mode.entry(mode).or_default().push(rule);
    }
    Ok(())
}

fn compile_function(
    node: NodeRef<'_>,
    sheet: &mut CompiledStylesheet,
) -> Result<(), TransformError> {
    let name = required_attr(node, "name", "function")?;
    let Some((prefix, local)) = name.split_once(':') else {
        return Err(TransformError::Structure(format!(
            "xsl:function name '{}' needs a namespace prefix",
            name
        )));
    };
    let Some(uri) = sheet.namespaces.get(prefix).cloned() else {
        log::warn!("dropping xsl:function '{}': prefix is not bound", name);
        return Ok(());
    };

    let mut params = Vec::new();
    let mut body = TemplateBody::default();
    for child in node.children() {
        if is_xsl(child, "param") {
            params.push(required_attr(child, "name", "param")?);
        } else if let Some(instr) = compile_node(child, false)? {
            body.0.push(instr);
        }
    }
    sheet
        .functions
        .insert((uri, local.to_string()), StylesheetFunction { params, body });
    Ok(())
}

/// Compiles one transform node into an instruction, or `None` for content
/// that produces nothing (dropped whitespace, stray pre-pass elements).
fn compile_node(
    node: NodeRef<'_>,
    preserve_space: bool,
) -> Result<Option<Instruction>, TransformError> {
    match node.kind() {
        NodeKind::Text(text) | NodeKind::CData(text) => {
            if text.trim().is_empty() {
                // Whitespace-only text survives only under xsl:text or an
                // xml:space="preserve" ancestor.
                if preserve_space {
                    Ok(Some(Instruction::Text {
                        content: text.clone(),
                        verbatim: true,
                        raw_markup: false,
                    }))
                } else {
                    Ok(None)
                }
            } else {
                Ok(Some(Instruction::Text {
                    content: text.clone(),
                    verbatim: preserve_space,
                    raw_markup: false,
                }))
            }
        }
        NodeKind::Element(_) if node.namespace() == Some(XSLT_NS) => {
            compile_instruction(node, preserve_space)
        }
        NodeKind::Element(data) => {
            let preserve = match node.attribute("xml:space") {
                Some("preserve") => true,
                Some(_) => false,
                None => preserve_space,
            };
            let attributes = data
                .attributes
                .iter()
                .filter(|a| a.name != "xml:space")
                .map(|a| (a.name.clone(), compile_avt(&a.value)))
                .collect();
            Ok(Some(Instruction::LiteralElement {
                name: data.name.clone(),
                namespace: data.namespace.clone(),
                attributes,
                body: compile_body(node, preserve)?,
            }))
        }
        // Comments and processing instructions in the transform are inert.
        _ => Ok(None),
    }
}

fn compile_body(
    parent: NodeRef<'_>,
    preserve_space: bool,
) -> Result<TemplateBody, TransformError> {
    let mut body = TemplateBody::default();
    for child in parent.children() {
        if let Some(instr) = compile_node(child, preserve_space)? {
            body.0.push(instr);
        }
    }
    Ok(body)
}

fn compile_instruction(
    node: NodeRef<'_>,
    preserve_space: bool,
) -> Result<Option<Instruction>, TransformError> {
    let local = node.local_name().unwrap_or("");
    let instr = match local {
        "apply-templates" => {
            let select = node
                .attribute("select")
                .map(compile_select)
                .transpose()?;
            let mode = node.attribute("mode").map(str::to_string);
            let (sort_keys, params) = compile_sorts_and_params(node)?;
            Instruction::ApplyTemplates {
                select,
                mode,
                sort_keys,
                params,
            }
        }
        "call-template" => {
            let name = required_attr(node, "name", "call-template")?;
            let (_, params) = compile_sorts_and_params(node)?;
            Instruction::CallTemplate { name, params }
        }
        "for-each" => {
            let select = compile_select(&required_attr(node, "select", "for-each")?)?;
            let mut sort_keys = Vec::new();
            let mut body = TemplateBody::default();
            for child in node.children() {
                if is_xsl(child, "sort") {
                    sort_keys.push(compile_sort_key(child)?);
                } else if let Some(instr) = compile_node(child, preserve_space)? {
                    body.0.push(instr);
                }
            }
            Instruction::ForEach {
                select,
                sort_keys,
                body,
            }
        }
        "if" => Instruction::If {
            test: compile_select(&required_attr(node, "test", "if")?)?,
            body: compile_body(node, preserve_space)?,
        },
        "choose" => {
            let mut whens = Vec::new();
            let mut otherwise = None;
            for child in node.children() {
                if is_xsl(child, "when") {
                    whens.push(When {
                        test: compile_select(&required_attr(child, "test", "when")?)?,
                        body: compile_body(child, preserve_space)?,
                    });
                } else if is_xsl(child, "otherwise") {
                    otherwise = Some(compile_body(child, preserve_space)?);
                }
            }
            Instruction::Choose { whens, otherwise }
        }
        "copy" => Instruction::Copy {
            body: compile_body(node, preserve_space)?,
        },
        "copy-of" => Instruction::CopyOf {
            select: compile_select(&required_attr(node, "select", "copy-of")?)?,
        },
        "element" => Instruction::Element {
            name: compile_avt(&required_attr(node, "name", "element")?),
            namespace: node.attribute("namespace").map(compile_avt),
            body: compile_body(node, preserve_space)?,
        },
        "attribute" => Instruction::Attribute {
            name: compile_avt(&required_attr(node, "name", "attribute")?),
            body: compile_body(node, preserve_space)?,
        },
        "text" => Instruction::Text {
            content: node.text_content(),
            verbatim: true,
            raw_markup: node.attribute("disable-output-escaping") == Some("yes"),
        },
        "value-of" => Instruction::ValueOf {
            select: compile_select(&required_attr(node, "select", "value-of")?)?,
            raw_markup: node.attribute("disable-output-escaping") == Some("yes"),
        },
        "variable" => Instruction::Variable(compile_variable_def(node)?),
        "param" => Instruction::Param(compile_variable_def(node)?),
        "comment" => Instruction::Comment {
            body: compile_body(node, preserve_space)?,
        },
        "processing-instruction" => Instruction::ProcessingInstruction {
            name: compile_avt(&required_attr(node, "name", "processing-instruction")?),
            body: compile_body(node, preserve_space)?,
        },
        // Consumed by their enclosing construct or by the pre-passes.
        "sort" | "with-param" | "include" | "import" | "function" => return Ok(None),
        "output" | "strip-space" | "preserve-space" | "decimal-format" | "key" => {
            log::warn!("ignoring top-level element xsl:{} inside a template body", local);
            return Ok(None);
        }
        "stylesheet" | "transform" | "template" => {
            return Err(TransformError::Structure(format!(
                "xsl:{} cannot appear inside a template body",
                local
            )));
        }
        other => return Err(TransformError::NotImplemented(other.to_string())),
    };
    Ok(Some(instr))
}

fn compile_sorts_and_params(
    node: NodeRef<'_>,
) -> Result<(Vec<SortKey>, Vec<VariableDef>), TransformError> {
    let mut sort_keys = Vec::new();
    let mut params = Vec::new();
    for child in node.children() {
        if is_xsl(child, "sort") {
            sort_keys.push(compile_sort_key(child)?);
        } else if is_xsl(child, "with-param") {
            params.push(compile_variable_def(child)?);
        }
    }
    Ok((sort_keys, params))
}

fn compile_sort_key(node: NodeRef<'_>) -> Result<SortKey, TransformError> {
    let select = compile_select(node.attribute("select").unwrap_or("."))?;
    let data_type = match node.attribute("data-type") {
        Some("number") => SortDataType::Number,
        _ => SortDataType::Text,
    };
    let order = match node.attribute("order") {
        Some("descending") => SortOrder::Descending,
        _ => SortOrder::Ascending,
    };
    Ok(SortKey {
        select,
        data_type,
        order,
    })
}

fn compile_variable_def(node: NodeRef<'_>) -> Result<VariableDef, TransformError> {
    Ok(VariableDef {
        name: required_attr(node, "name", "variable")?,
        select: node.attribute("select").map(compile_select).transpose()?,
        body: compile_body(node, false)?,
    })
}

fn apply_output(node: NodeRef<'_>, output: &mut OutputSpec) {
    if let Some(method) = node.attribute("method") {
        output.method = match method {
            "html" => OutputMethod::Html,
            "text" => OutputMethod::Text,
            _ => OutputMethod::Xml,
        };
    }
    if let Some(version) = node.attribute("version") {
        output.version = version.to_string();
    }
    if let Some(encoding) = node.attribute("encoding") {
        output.encoding = encoding.to_string();
    }
    if let Some(omit) = node.attribute("omit-xml-declaration") {
        output.omit_xml_declaration = omit == "yes";
    }
    if let Some(standalone) = node.attribute("standalone") {
        output.standalone = Some(standalone.to_string());
    }
    if let Some(indent) = node.attribute("indent") {
        output.indent = indent == "yes";
    }
    if let Some(media_type) = node.attribute("media-type") {
        output.media_type = Some(media_type.to_string());
    }
}

fn compile_decimal_format(node: NodeRef<'_>) -> (String, DecimalFormat) {
    let mut format = DecimalFormat::default();
    let first_char = |v: &str| v.chars().next();
    if let Some(c) = node.attribute("decimal-separator").and_then(first_char) {
        format.decimal_separator = c;
    }
    if let Some(c) = node.attribute("grouping-separator").and_then(first_char) {
        format.grouping_separator = c;
    }
    if let Some(c) = node.attribute("pattern-separator").and_then(first_char) {
        format.pattern_separator = c;
    }
    if let Some(c) = node.attribute("minus-sign").and_then(first_char) {
        format.minus_sign = c;
    }
    if let Some(c) = node.attribute("zero-digit").and_then(first_char) {
        format.zero_digit = c;
    }
    if let Some(c) = node.attribute("digit").and_then(first_char) {
        format.digit = c;
    }
    if let Some(c) = node.attribute("percent").and_then(first_char) {
        format.percent = c;
    }
    if let Some(c) = node.attribute("per-mille").and_then(first_char) {
        format.per_mille = c;
    }
    if let Some(v) = node.attribute("infinity") {
        format.infinity = v.to_string();
    }
    if let Some(v) = node.attribute("NaN") {
        format.nan = v.to_string();
    }
    let name = node
        .attribute("name")
        .unwrap_or(DEFAULT_FORMAT_NAME)
        .to_string();
    (name, format)
}

fn space_list(node: NodeRef<'_>, namespaces: &HashMap<String, String>) -> Vec<String> {
    node.attribute("elements")
        .unwrap_or("")
        .split_whitespace()
        .map(|name| {
            if name == "*" {
                return "*".to_string();
            }
            match name.split_once(':') {
                Some((prefix, local)) => match namespaces.get(prefix) {
                    Some(uri) => canonical_name(Some(uri), local),
                    None => {
                        log::warn!("whitespace list prefix '{}' is not bound", prefix);
                        local.to_string()
                    }
                },
                None => name.to_string(),
            }
        })
        .collect()
}

fn compile_select(text: &str) -> Result<SelectExpr, TransformError> {
    let expr = parse_expression(text)?;
    Ok(SelectExpr {
        source: text.to_string(),
        expr,
    })
}

/// Attribute value template: literal runs interleaved with `{expr}` parts;
/// `{{` and `}}` escape literal braces. A part that fails to parse keeps
/// its source and degrades to literal output at evaluation time.
fn compile_avt(text: &str) -> Avt {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut rest = text;

    while !rest.is_empty() {
        if let Some(stripped) = rest.strip_prefix("{{") {
            literal.push('{');
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix("}}") {
            literal.push('}');
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('{') {
            match stripped.find('}') {
                Some(close) => {
                    let source = &stripped[..close];
                    if !literal.is_empty() {
                        parts.push(AvtPart::Static(std::mem::take(&mut literal)));
                    }
                    let expr = match parse_expression(source) {
                        Ok(expr) => Some(expr),
                        Err(e) => {
                            log::warn!("attribute template '{}' kept literally: {}", source, e);
                            None
                        }
                    };
                    parts.push(AvtPart::Dynamic {
                        source: source.to_string(),
                        expr,
                    });
                    rest = &stripped[close + 1..];
                }
                None => {
                    // Unbalanced brace: keep the rest as literal text.
                    literal.push('{');
                    rest = stripped;
                }
            }
        } else {
            let next = rest
                .char_indices()
                .find(|(_, c)| *c == '{' || *c == '}')
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            let (run, remainder) = rest.split_at(next.max(1));
            literal.push_str(run);
            rest = remainder;
        }
    }
    if !literal.is_empty() {
        parts.push(AvtPart::Static(literal));
    }
    Avt(parts)
}

fn is_xsl(node: NodeRef<'_>, local: &str) -> bool {
    node.namespace() == Some(XSLT_NS) && node.local_name() == Some(local)
}

fn required_attr(
    node: NodeRef<'_>,
    attr: &str,
    element: &str,
) -> Result<String, TransformError> {
    node.attribute(attr)
        .map(str::to_string)
        .ok_or_else(|| {
            TransformError::Structure(format!(
                "xsl:{} needs a '{}' attribute",
                element, attr
            ))
        })
}

/// Collects literal `document('url')` arguments anywhere in the compiled
/// stylesheet and loads the referenced documents up front.
fn prefetch_documents(sheet: &mut CompiledStylesheet, options: &CompileOptions<'_>) {
    let mut urls: Vec<String> = Vec::new();
    {
        let mut visit = |expr: &Expression| collect_document_urls(expr, &mut urls);
        for rules in sheet.rules_by_mode.values() {
            for rule in rules {
                visit_body(&rule.body, &mut visit);
                for p in &rule.params {
                    visit_variable(p, &mut visit);
                }
            }
        }
        for template in sheet.named_templates.values() {
            visit_body(&template.body, &mut visit);
            for p in &template.params {
                visit_variable(p, &mut visit);
            }
        }
        for function in sheet.functions.values() {
            visit_body(&function.body, &mut visit);
        }
        for key in &sheet.keys {
            visit(&key.use_expr.expr);
        }
        for binding in &sheet.top_level {
            match binding {
                TopLevelBinding::Variable(def) | TopLevelBinding::Param(def) => {
                    visit_variable(def, &mut visit)
                }
            }
        }
        visit_body(&sheet.fallback_body, &mut visit);
    }
    urls.sort();
    urls.dedup();

    for url in urls {
        let resolved = resolve_href(sheet.transform_url.as_deref(), &url);
        match options.fetcher.fetch(&resolved) {
            Ok(text) => match larch_xml::parse(&text) {
                Ok(doc) => sheet.aux_documents.push((url, doc)),
                Err(e) => log::warn!("document('{}') is not parseable: {}", url, e),
            },
            Err(e) => log::warn!("document('{}') is unavailable: {}", url, e),
        }
    }
}

fn visit_body(body: &TemplateBody, visit: &mut impl FnMut(&Expression)) {
    for instr in &body.0 {
        match instr {
            Instruction::Text { .. } => {}
            Instruction::LiteralElement {
                attributes, body, ..
            } => {
                for (_, avt) in attributes {
                    visit_avt(avt, visit);
                }
                visit_body(body, visit);
            }
            Instruction::ApplyTemplates {
                select,
                sort_keys,
                params,
                ..
            } => {
                if let Some(sel) = select {
                    visit(&sel.expr);
                }
                for key in sort_keys {
                    visit(&key.select.expr);
                }
                for p in params {
                    visit_variable(p, visit);
                }
            }
            Instruction::CallTemplate { params, .. } => {
                for p in params {
                    visit_variable(p, visit);
                }
            }
            Instruction::ForEach {
                select,
                sort_keys,
                body,
            } => {
                visit(&select.expr);
                for key in sort_keys {
                    visit(&key.select.expr);
                }
                visit_body(body, visit);
            }
            Instruction::If { test, body } => {
                visit(&test.expr);
                visit_body(body, visit);
            }
            Instruction::Choose { whens, otherwise } => {
                for when in whens {
                    visit(&when.test.expr);
                    visit_body(&when.body, visit);
                }
                if let Some(body) = otherwise {
                    visit_body(body, visit);
                }
            }
            Instruction::Copy { body }
            | Instruction::Comment { body } => visit_body(body, visit),
            Instruction::CopyOf { select } => visit(&select.expr),
            Instruction::Element {
                name,
                namespace,
                body,
            } => {
                visit_avt(name, visit);
                if let Some(ns) = namespace {
                    visit_avt(ns, visit);
                }
                visit_body(body, visit);
            }
            Instruction::Attribute { name, body } => {
                visit_avt(name, visit);
                visit_body(body, visit);
            }
            Instruction::ValueOf { select, .. } => visit(&select.expr),
            Instruction::Variable(def) | Instruction::Param(def) => visit_variable(def, visit),
            Instruction::ProcessingInstruction { name, body } => {
                visit_avt(name, visit);
                visit_body(body, visit);
            }
        }
    }
}

fn visit_variable(def: &VariableDef, visit: &mut impl FnMut(&Expression)) {
    if let Some(sel) = &def.select {
        visit(&sel.expr);
    }
    visit_body(&def.body, visit);
}

fn visit_avt(avt: &Avt, visit: &mut impl FnMut(&Expression)) {
    for part in &avt.0 {
        if let AvtPart::Dynamic {
            expr: Some(expr), ..
        } = part
        {
            visit(expr);
        }
    }
}

fn collect_document_urls(expr: &Expression, urls: &mut Vec<String>) {
    match expr {
        Expression::Call { name, args } => {
            if name == "document" {
                if let Some(Expression::Literal(url)) = args.first() {
                    urls.push(url.clone());
                }
            }
            for arg in args {
                collect_document_urls(arg, urls);
            }
        }
        Expression::Binary { lhs, rhs, .. } => {
            collect_document_urls(lhs, urls);
            collect_document_urls(rhs, urls);
        }
        Expression::Negate(inner) => collect_document_urls(inner, urls),
        Expression::Path(path) => {
            if let Some(start) = &path.start {
                collect_document_urls(start, urls);
            }
            for step in &path.steps {
                for predicate in &step.predicates {
                    collect_document_urls(predicate, urls);
                }
            }
        }
        _ => {}
    }
}
