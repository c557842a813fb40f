//! The compiled form of a stylesheet.
//!
//! Instructions are a tagged sum with one variant per recognized XSLT
//! element; elements outside the XSLT namespace compile to the
//! [`Instruction::LiteralElement`] catch-all.

use crate::pattern::Pattern;
use larch_xml::Document;
use larch_xpath::Expression;
use std::collections::HashMap;

/// An ordered run of compiled instructions (a template body, a `when`
/// branch, an element body, ...).
#[derive(Debug, Clone, Default)]
pub struct TemplateBody(pub Vec<Instruction>);

impl TemplateBody {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One piece of an attribute value template.
#[derive(Debug, Clone)]
pub enum AvtPart {
    Static(String),
    /// `expr` is `None` when the braced text failed to parse as XPath; the
    /// evaluator then falls back to emitting the braced source literally.
    Dynamic {
        source: String,
        expr: Option<Expression>,
    },
}

/// A compiled attribute value template.
#[derive(Debug, Clone)]
pub struct Avt(pub Vec<AvtPart>);

impl Avt {
    pub fn fixed(text: &str) -> Self {
        Avt(vec![AvtPart::Static(text.to_string())])
    }
}

/// A compiled `select`/`test` expression with its source text retained for
/// diagnostics and shortcut detection.
#[derive(Debug, Clone)]
pub struct SelectExpr {
    pub source: String,
    pub expr: Expression,
}

/// `xsl:variable`, `xsl:param` and `xsl:with-param` share one shape:
/// a name plus either a `select` expression or an instruction body.
#[derive(Debug, Clone)]
pub struct VariableDef {
    pub name: String,
    pub select: Option<SelectExpr>,
    pub body: TemplateBody,
}

#[derive(Debug, Clone)]
pub struct When {
    pub test: SelectExpr,
    pub body: TemplateBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDataType {
    Text,
    Number,
}

#[derive(Debug, Clone)]
pub struct SortKey {
    pub select: SelectExpr,
    pub order: SortOrder,
    pub data_type: SortDataType,
}

#[derive(Debug, Clone)]
pub enum Instruction {
    /// Character data from the transform. `verbatim` text (from `xsl:text`
    /// or under `xml:space="preserve"`) bypasses space collapsing;
    /// `raw_markup` wraps markup delimiters in sentinels that survive
    /// serialization (`disable-output-escaping`).
    Text {
        content: String,
        verbatim: bool,
        raw_markup: bool,
    },
    LiteralElement {
        name: String,
        namespace: Option<String>,
        attributes: Vec<(String, Avt)>,
        body: TemplateBody,
    },
    ApplyTemplates {
        select: Option<SelectExpr>,
        mode: Option<String>,
        sort_keys: Vec<SortKey>,
        params: Vec<VariableDef>,
    },
    CallTemplate {
        name: String,
        params: Vec<VariableDef>,
    },
    ForEach {
        select: SelectExpr,
        sort_keys: Vec<SortKey>,
        body: TemplateBody,
    },
    If {
        test: SelectExpr,
        body: TemplateBody,
    },
    Choose {
        whens: Vec<When>,
        otherwise: Option<TemplateBody>,
    },
    Copy {
        body: TemplateBody,
    },
    CopyOf {
        select: SelectExpr,
    },
    Element {
        name: Avt,
        namespace: Option<Avt>,
        body: TemplateBody,
    },
    Attribute {
        name: Avt,
        body: TemplateBody,
    },
    ValueOf {
        select: SelectExpr,
        raw_markup: bool,
    },
    Variable(VariableDef),
    Param(VariableDef),
    Comment {
        body: TemplateBody,
    },
    ProcessingInstruction {
        name: Avt,
        body: TemplateBody,
    },
}

/// A `match` template, pre-sorted into its mode bucket.
#[derive(Debug, Clone)]
pub struct TemplateRule {
    pub pattern: Pattern,
    pub mode: Option<String>,
    pub priority: f64,
    /// Lower wins: the importing stylesheet is 0, each `xsl:import` block
    /// gets the next number.
    pub import_precedence: u32,
    pub params: Vec<VariableDef>,
    pub body: TemplateBody,
}

#[derive(Debug, Clone)]
pub struct NamedTemplate {
    pub params: Vec<VariableDef>,
    pub body: TemplateBody,
}

#[derive(Debug, Clone)]
pub struct KeyDefinition {
    pub name: String,
    pub pattern: Pattern,
    pub use_expr: SelectExpr,
}

/// A stylesheet-defined `xsl:function`, addressable from XPath by its
/// namespace-qualified name.
#[derive(Debug, Clone)]
pub struct StylesheetFunction {
    pub params: Vec<String>,
    pub body: TemplateBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMethod {
    Xml,
    Html,
    Text,
}

#[derive(Debug, Clone)]
pub struct OutputSpec {
    pub method: OutputMethod,
    pub version: String,
    pub encoding: String,
    pub omit_xml_declaration: bool,
    pub standalone: Option<String>,
    pub indent: bool,
    pub media_type: Option<String>,
}

impl Default for OutputSpec {
    fn default() -> Self {
        OutputSpec {
            method: OutputMethod::Xml,
            version: "1.0".to_string(),
            encoding: "UTF-8".to_string(),
            omit_xml_declaration: false,
            standalone: None,
            indent: false,
            media_type: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TopLevelBinding {
    Variable(VariableDef),
    Param(VariableDef),
}

#[derive(Debug, Default)]
pub struct CompiledStylesheet {
    /// Mode -> rules, ordered by (import precedence, priority desc,
    /// document order). `None` holds mode-less templates.
    pub rules_by_mode: HashMap<Option<String>, Vec<TemplateRule>>,
    pub named_templates: HashMap<String, NamedTemplate>,
    /// `(namespace URI, local name)` -> function.
    pub functions: HashMap<(String, String), StylesheetFunction>,
    pub keys: Vec<KeyDefinition>,
    /// Top-level `xsl:variable`/`xsl:param`, in document order.
    pub top_level: Vec<TopLevelBinding>,
    /// Top-level literal result elements, run when no template matches the
    /// input root.
    pub fallback_body: TemplateBody,
    pub output: OutputSpec,
    pub whitespace: crate::whitespace::WhitespaceLists,
    pub decimal_formats: HashMap<String, crate::format::DecimalFormat>,
    /// Prefix -> URI declarations gathered from the transform document.
    pub namespaces: HashMap<String, String>,
    /// Auxiliary documents prefetched for `document()` calls, keyed by the
    /// URL text as written in the expression.
    pub aux_documents: Vec<(String, Document)>,
    pub transform_url: Option<String>,
}

impl CompiledStylesheet {
    pub fn aux_document(&self, url: &str) -> Option<&Document> {
        self.aux_documents
            .iter()
            .find(|(key, _)| key == url)
            .map(|(_, doc)| doc)
    }
}
