//! Result-tree construction and the serialization post-pass.
//!
//! The executor talks to [`XmlOutputBuilder`], which grows a result DOM
//! behind a stack of open elements. Nested builders capture fragments for
//! `xsl:attribute` bodies, result-tree-fragment variables, comments and
//! processing instructions.

use crate::ast::{OutputMethod, OutputSpec};
use crate::datasource::DomNode;
use larch_xml::{serialize_with_options, Document, NodeId, NodeKind, SerializeOptions};
use larch_xpath::{DataSourceNode, NodeType};

#[derive(Debug)]
pub struct XmlOutputBuilder {
    doc: Document,
    open: Vec<NodeId>,
}

impl Default for XmlOutputBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlOutputBuilder {
    pub fn new() -> Self {
        let doc = Document::new();
        let root = doc.root();
        XmlOutputBuilder {
            doc,
            open: vec![root],
        }
    }

    fn current(&self) -> NodeId {
        *self.open.last().expect("output stack never empty")
    }

    pub fn start_element(&mut self, name: &str, namespace: Option<&str>) {
        let el = self.doc.create_element_ns(namespace, name);
        let parent = self.current();
        self.doc.append_child(parent, el);
        self.open.push(el);
    }

    pub fn end_element(&mut self) {
        if self.open.len() > 1 {
            self.open.pop();
        }
    }

    /// Emits character data, collapsing runs of spaces like every other
    /// text-creation site.
    pub fn add_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let t = self.doc.create_text_node(text);
        let parent = self.current();
        self.doc.append_child(parent, t);
    }

    /// Emits character data exactly as given (`xsl:text`, built-in text
    /// copies).
    pub fn add_text_verbatim(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let t = self.doc.create_raw_text(text);
        let parent = self.current();
        self.doc.append_child(parent, t);
    }

    pub fn add_comment(&mut self, text: &str) {
        let c = self.doc.create_comment(text);
        let parent = self.current();
        self.doc.append_child(parent, c);
    }

    pub fn add_processing_instruction(&mut self, target: &str, data: &str) {
        let pi = self.doc.create_processing_instruction(target, data);
        let parent = self.current();
        self.doc.append_child(parent, pi);
    }

    /// Sets an attribute on the innermost open element. Outside any element
    /// there is nothing to attach to; the value is dropped with a warning.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        let target = self.current();
        if self.doc.element(target).is_some() {
            self.doc.set_attribute(target, name, value);
        } else {
            log::warn!("attribute '{}' has no open element to attach to", name);
        }
    }

    /// Shallow-copies an input node. Elements open a new output element
    /// (sans attributes); attribute nodes become attributes of the current
    /// element; text and friends are reconstructed. Returns whether an
    /// element was opened (the caller closes it after its body).
    pub fn copy_node_shallow(&mut self, node: DomNode<'_>) -> bool {
        match node {
            DomNode::Node(src) => match src.kind() {
                NodeKind::Element(data) => {
                    self.start_element(&data.name, data.namespace.as_deref());
                    true
                }
                NodeKind::Text(t) | NodeKind::CData(t) => {
                    self.add_text_verbatim(t);
                    false
                }
                NodeKind::Comment(t) => {
                    self.add_comment(t);
                    false
                }
                NodeKind::ProcessingInstruction { target, data } => {
                    self.add_processing_instruction(target, data);
                    false
                }
                NodeKind::Document | NodeKind::Fragment => false,
            },
            DomNode::Attr { .. } => {
                if let Some(q) = node.name() {
                    let name = match q.prefix {
                        Some(p) => format!("{}:{}", p, q.local),
                        None => q.local.to_string(),
                    };
                    self.set_attribute(&name, &node.string_value());
                }
                false
            }
        }
    }

    /// Recursively copies an input node: itself, its attributes, then its
    /// children. Document and fragment sources copy their children.
    pub fn copy_node_deep(&mut self, node: DomNode<'_>) {
        match node.node_type() {
            NodeType::Root => {
                for child in node.children() {
                    self.copy_node_deep(child);
                }
            }
            _ => {
                let opened = self.copy_node_shallow(node);
                if opened {
                    for attr in node.attributes() {
                        self.copy_node_shallow(attr);
                    }
                    for child in node.children() {
                        self.copy_node_deep(child);
                    }
                    self.end_element();
                }
            }
        }
    }

    /// Concatenated text of everything built so far; used for fragment
    /// capture (`xsl:attribute` bodies, RTF variables).
    pub fn text_value(&self) -> String {
        self.doc.text_content(self.doc.root())
    }

    pub fn finish(self) -> Document {
        self.doc
    }
}

const ESCAPABLE: [char; 5] = ['<', '>', '\'', '"', '&'];

/// Wraps markup delimiters in `[[...]]` sentinels. The serializer escapes
/// the wrapped character; the post-pass below strips sentinel and escape
/// together, leaving raw markup in the output text.
pub fn wrap_raw_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ESCAPABLE.contains(&ch) {
            out.push_str("[[");
            out.push(ch);
            out.push_str("]]");
        } else {
            out.push(ch);
        }
    }
    out
}

/// Serializes the result document per the `xsl:output` contract and applies
/// the text-level fixups: interior XML declarations are dropped,
/// disable-output-escaping sentinels are resolved, and the declaration is
/// prepended unless omitted.
pub fn serialize_output(doc: &Document, output: &OutputSpec) -> String {
    let opts = SerializeOptions {
        indent: output.indent && output.method != OutputMethod::Text,
        text_only: output.method == OutputMethod::Text,
    };
    let body = serialize_with_options(doc, doc.root(), &opts);
    let body = strip_interior_declarations(&body);
    let body = resolve_sentinels(&body);

    if output.method == OutputMethod::Text || output.omit_xml_declaration {
        return body;
    }

    let mut declaration = format!(
        "<?xml version=\"{}\" encoding=\"{}\"",
        output.version, output.encoding
    );
    if let Some(standalone) = &output.standalone {
        declaration.push_str(&format!(" standalone=\"{}\"", standalone));
    }
    declaration.push_str("?>");
    format!("{}{}", declaration, body)
}

fn strip_interior_declarations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<?xml") {
        out.push_str(&rest[..start]);
        match rest[start..].find("?>") {
            Some(end) => rest = &rest[start + end + 2..],
            None => {
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve_sentinels(text: &str) -> String {
    let mut out = text.to_string();
    for (escaped, raw) in [
        ("[[&lt;]]", "<"),
        ("[[&gt;]]", ">"),
        ("[[&apos;]]", "'"),
        ("[[&quot;]]", "\""),
        ("[[&amp;]]", "&"),
    ] {
        out = out.replace(escaped, raw);
    }
    // Any remaining [[x]] unwraps to x.
    loop {
        let Some(start) = out.find("[[") else { break };
        let Some(close) = out[start..].find("]]") else { break };
        let inner = out[start + 2..start + close].to_string();
        out.replace_range(start..start + close + 2, &inner);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::OutputSpec;

    #[test]
    fn builds_nested_elements() {
        let mut b = XmlOutputBuilder::new();
        b.start_element("root", None);
        b.set_attribute("id", "1");
        b.start_element("child", None);
        b.add_text("hi");
        b.end_element();
        b.end_element();

        let doc = b.finish();
        let spec = OutputSpec {
            omit_xml_declaration: true,
            ..OutputSpec::default()
        };
        assert_eq!(
            serialize_output(&doc, &spec),
            "<root id=\"1\"><child>hi</child></root>"
        );
    }

    #[test]
    fn declaration_is_prepended_by_default() {
        let mut b = XmlOutputBuilder::new();
        b.start_element("r", None);
        b.end_element();
        let doc = b.finish();
        let out = serialize_output(&doc, &OutputSpec::default());
        assert_eq!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?><r/>");
    }

    #[test]
    fn raw_markup_survives_serialization() {
        let mut b = XmlOutputBuilder::new();
        b.start_element("r", None);
        b.add_text_verbatim(&wrap_raw_markup("<b>&amp;</b>"));
        b.end_element();
        let doc = b.finish();
        let spec = OutputSpec {
            omit_xml_declaration: true,
            ..OutputSpec::default()
        };
        assert_eq!(serialize_output(&doc, &spec), "<r><b>&amp;</b></r>");
    }

    #[test]
    fn text_method_drops_markup() {
        let mut b = XmlOutputBuilder::new();
        b.start_element("r", None);
        b.add_text("one ");
        b.start_element("e", None);
        b.add_text("two");
        b.end_element();
        b.end_element();
        let doc = b.finish();
        let spec = OutputSpec {
            method: OutputMethod::Text,
            ..OutputSpec::default()
        };
        assert_eq!(serialize_output(&doc, &spec), "one two");
    }

    #[test]
    fn interior_declarations_are_stripped() {
        assert_eq!(
            strip_interior_declarations("<a/><?xml version=\"1.0\"?><b/>"),
            "<a/><b/>"
        );
    }

    #[test]
    fn fragment_text_capture() {
        let mut b = XmlOutputBuilder::new();
        b.start_element("x", None);
        b.add_text("frag");
        b.end_element();
        assert_eq!(b.text_value(), "frag");
    }
}
