//! Event-driven parsing of XML text into the arena document.

use crate::document::{split_qname, Document, NodeId};
use crate::error::XmlError;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Parses an XML string into a [`Document`].
pub fn parse(text: &str) -> Result<Document, XmlError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);

    let mut doc = Document::new();
    let mut stack: Vec<NodeId> = vec![doc.root()];

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let el = open_element(&mut doc, &stack, &e)?;
                let parent = *stack.last().expect("element stack never empty");
                doc.append_child(parent, el);
                stack.push(el);
            }
            Event::Empty(e) => {
                let el = open_element(&mut doc, &stack, &e)?;
                let parent = *stack.last().expect("element stack never empty");
                doc.append_child(parent, el);
            }
            Event::End(_) => {
                if stack.len() <= 1 {
                    return Err(XmlError::Malformed("unbalanced end tag".to_string()));
                }
                stack.pop();
            }
            Event::Text(e) => {
                let raw = std::str::from_utf8(e.as_ref())?;
                let decoded = unescape(raw).map_err(|err| XmlError::Entity(err.to_string()))?;
                let t = doc.create_raw_text(&decoded);
                let parent = *stack.last().expect("element stack never empty");
                doc.append_child(parent, t);
            }
            Event::CData(e) => {
                let content = std::str::from_utf8(e.as_ref())?;
                let c = doc.create_cdata(content);
                let parent = *stack.last().expect("element stack never empty");
                doc.append_child(parent, c);
            }
            Event::Comment(e) => {
                let content = std::str::from_utf8(e.as_ref())?;
                let c = doc.create_comment(content);
                let parent = *stack.last().expect("element stack never empty");
                doc.append_child(parent, c);
            }
            Event::PI(e) => {
                let content = std::str::from_utf8(e.as_ref())?;
                let (target, data) = match content.split_once(char::is_whitespace) {
                    Some((t, d)) => (t, d.trim_start()),
                    None => (content, ""),
                };
                let pi = doc.create_processing_instruction(target, data);
                let parent = *stack.last().expect("element stack never empty");
                doc.append_child(parent, pi);
            }
            Event::Eof => break,
            // Declarations, doctypes and anything newer are skipped.
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(XmlError::Malformed("unclosed element at end of input".to_string()));
    }
    Ok(doc)
}

/// Creates an element node from a start tag, separating namespace
/// declarations from ordinary attributes and resolving the element's own
/// namespace against the declarations in scope.
fn open_element(
    doc: &mut Document,
    stack: &[NodeId],
    e: &BytesStart<'_>,
) -> Result<NodeId, XmlError> {
    let name = std::str::from_utf8(e.name().as_ref())?.to_string();

    let mut decls: Vec<(String, String)> = Vec::new();
    let mut plain: Vec<(String, String)> = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let raw_value = std::str::from_utf8(&attr.value)?;
        let value = unescape(raw_value).map_err(|err| XmlError::Entity(err.to_string()))?;
        if key == "xmlns" {
            decls.push((String::new(), value.into_owned()));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            decls.push((prefix.to_string(), value.into_owned()));
        } else {
            plain.push((key.to_string(), value.into_owned()));
        }
    }

    let (prefix, _) = split_qname(&name);
    let ns = resolve_prefix(doc, stack, &decls, prefix.unwrap_or(""));
    let el = doc.create_element_ns(ns.as_deref(), &name);
    for (p, u) in &decls {
        doc.add_namespace_decl(el, p, u);
    }
    for (key, value) in &plain {
        let attr_ns = match split_qname(key).0 {
            Some(p) => resolve_prefix(doc, stack, &decls, p),
            None => None,
        };
        doc.set_attribute_ns(el, attr_ns.as_deref(), key, value);
    }
    Ok(el)
}

/// Resolves `prefix` against the declarations of the element being opened,
/// then against the open-element stack (innermost first). The empty prefix
/// resolves the default namespace.
fn resolve_prefix(
    doc: &Document,
    stack: &[NodeId],
    own_decls: &[(String, String)],
    prefix: &str,
) -> Option<String> {
    if prefix == "xml" {
        return Some(crate::document::XML_NS.to_string());
    }
    if let Some((_, uri)) = own_decls.iter().find(|(p, _)| p == prefix) {
        return Some(uri.clone());
    }
    for &open in stack.iter().rev() {
        if let Some(data) = doc.element(open) {
            if let Some((_, uri)) = data.namespace_decls.iter().find(|(p, _)| p == prefix) {
                return Some(uri.clone());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{NodeKind, XSLT_NS};

    #[test]
    fn parses_nested_elements_and_text() {
        let doc = parse("<a><b x=\"1\">hi</b><c/></a>").unwrap();
        let a = doc.document_element().unwrap();
        assert_eq!(doc.node_ref(a).name(), Some("a"));
        let kids: Vec<_> = doc.node_ref(a).children().collect();
        assert_eq!(kids.len(), 2);
        assert_eq!(kids[0].attribute("x"), Some("1"));
        assert_eq!(kids[0].text_content(), "hi");
        assert_eq!(kids[1].name(), Some("c"));
    }

    #[test]
    fn decodes_entities_in_text_and_attributes() {
        let doc = parse("<a t=\"x &lt; y &amp; z\">1 &gt; 0</a>").unwrap();
        let a = doc.document_element().unwrap();
        assert_eq!(doc.node_ref(a).attribute("t"), Some("x < y & z"));
        assert_eq!(doc.text_content(a), "1 > 0");
    }

    #[test]
    fn resolves_namespaces_from_declarations() {
        let doc = parse(
            "<xsl:stylesheet xmlns:xsl=\"http://www.w3.org/1999/XSL/Transform\">\
             <xsl:template/></xsl:stylesheet>",
        )
        .unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.node_ref(root).namespace(), Some(XSLT_NS));
        let child = doc
            .node_ref(root)
            .children()
            .find(|c| c.is_element())
            .unwrap();
        assert_eq!(child.namespace(), Some(XSLT_NS));
        assert_eq!(child.local_name(), Some("template"));
    }

    #[test]
    fn default_namespace_applies_to_unprefixed_elements() {
        let doc = parse("<r xmlns=\"urn:d\"><inner/></r>").unwrap();
        let r = doc.document_element().unwrap();
        let inner = doc.node_ref(r).children().next().unwrap();
        assert_eq!(inner.namespace(), Some("urn:d"));
    }

    #[test]
    fn keeps_comments_and_processing_instructions() {
        let doc = parse("<a><!-- note --><?pi data here?></a>").unwrap();
        let a = doc.document_element().unwrap();
        let kids: Vec<_> = doc.node_ref(a).children().collect();
        assert!(matches!(kids[0].kind(), NodeKind::Comment(c) if c == " note "));
        assert!(matches!(
            kids[1].kind(),
            NodeKind::ProcessingInstruction { target, data }
                if target == "pi" && data == "data here"
        ));
    }

    #[test]
    fn whitespace_between_elements_is_preserved() {
        let doc = parse("<a>\n  <b/>\n</a>").unwrap();
        let a = doc.document_element().unwrap();
        assert_eq!(doc.children(a).len(), 3);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse("<a><b></a>").is_err());
        assert!(parse("<a>").is_err());
    }
}
