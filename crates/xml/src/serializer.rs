//! Serialization of arena documents back to XML text.

use crate::document::{Document, NodeId, NodeKind};
use quick_xml::escape::{escape, partial_escape};

#[derive(Debug, Clone, Default)]
pub struct SerializeOptions {
    /// Pretty-print with two-space indentation.
    pub indent: bool,
    /// Emit only the concatenated text content (the `text` output method).
    pub text_only: bool,
}

/// Serializes a document (or fragment subtree) starting at its root node.
pub fn serialize(doc: &Document) -> String {
    serialize_with_options(doc, doc.root(), &SerializeOptions::default())
}

pub fn serialize_with_options(doc: &Document, start: NodeId, opts: &SerializeOptions) -> String {
    if opts.text_only {
        return doc.text_content(start);
    }
    let mut out = String::new();
    match doc.kind(start) {
        NodeKind::Document | NodeKind::Fragment => {
            for &child in doc.children(start) {
                write_node(doc, child, opts, 0, &mut out);
            }
        }
        _ => write_node(doc, start, opts, 0, &mut out),
    }
    out
}

fn write_node(doc: &Document, id: NodeId, opts: &SerializeOptions, depth: usize, out: &mut String) {
    match doc.kind(id) {
        NodeKind::Element(data) => {
            indent(opts, depth, out);
            out.push('<');
            out.push_str(&data.name);
            for (prefix, uri) in &data.namespace_decls {
                if prefix.is_empty() {
                    out.push_str(" xmlns=\"");
                } else {
                    out.push_str(" xmlns:");
                    out.push_str(prefix);
                    out.push_str("=\"");
                }
                out.push_str(&escape(uri.as_str()));
                out.push('"');
            }
            for attr in &data.attributes {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                out.push_str(&escape(attr.value.as_str()));
                out.push('"');
            }
            let children = doc.children(id);
            if children.is_empty() {
                out.push_str("/>");
            } else {
                out.push('>');
                let element_children_only = children
                    .iter()
                    .all(|&c| !matches!(doc.kind(c), NodeKind::Text(_) | NodeKind::CData(_)));
                for &child in children {
                    write_node(doc, child, opts, depth + 1, out);
                }
                if opts.indent && element_children_only {
                    indent(opts, depth, out);
                }
                out.push_str("</");
                out.push_str(&data.name);
                out.push('>');
            }
        }
        NodeKind::Text(text) => {
            out.push_str(&partial_escape(text.as_str()));
        }
        NodeKind::CData(text) => {
            out.push_str("<![CDATA[");
            out.push_str(text);
            out.push_str("]]>");
        }
        NodeKind::Comment(text) => {
            indent(opts, depth, out);
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeKind::ProcessingInstruction { target, data } => {
            indent(opts, depth, out);
            out.push_str("<?");
            out.push_str(target);
            if !data.is_empty() {
                out.push(' ');
                out.push_str(data);
            }
            out.push_str("?>");
        }
        NodeKind::Document | NodeKind::Fragment => {
            for &child in doc.children(id) {
                write_node(doc, child, opts, depth, out);
            }
        }
    }
}

fn indent(opts: &SerializeOptions, depth: usize, out: &mut String) {
    if opts.indent {
        out.push('\n');
        for _ in 0..depth {
            out.push_str("  ");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn round_trips_simple_documents() {
        let doc = parse("<a><b x=\"1\"/>text</a>").unwrap();
        assert_eq!(serialize(&doc), "<a><b x=\"1\"/>text</a>");
    }

    #[test]
    fn escapes_text_and_attribute_values() {
        let mut doc = Document::new();
        let el = doc.create_element("e");
        doc.append_child(doc.root(), el);
        doc.set_attribute(el, "a", "x \"quoted\" & more");
        let t = doc.create_raw_text("1 < 2 & 3");
        doc.append_child(el, t);
        let xml = serialize(&doc);
        assert!(xml.contains("a=\"x &quot;quoted&quot; &amp; more\""));
        assert!(xml.contains("1 &lt; 2 &amp; 3"));
    }

    #[test]
    fn writes_namespace_declarations() {
        let doc = parse("<p:r xmlns:p=\"urn:p\"><p:c/></p:r>").unwrap();
        assert_eq!(serialize(&doc), "<p:r xmlns:p=\"urn:p\"><p:c/></p:r>");
    }

    #[test]
    fn text_only_mode_drops_markup() {
        let doc = parse("<a>one<b>two</b></a>").unwrap();
        let opts = SerializeOptions { text_only: true, ..Default::default() };
        assert_eq!(serialize_with_options(&doc, doc.root(), &opts), "onetwo");
    }

    #[test]
    fn comments_and_pis_survive() {
        let doc = parse("<a><!--hey--><?t d?></a>").unwrap();
        assert_eq!(serialize(&doc), "<a><!--hey--><?t d?></a>");
    }
}
