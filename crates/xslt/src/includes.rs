//! The `xsl:include` / `xsl:import` pre-pass.
//!
//! Runs over the transform DOM before compilation: referenced documents are
//! fetched, parsed, and their top-level children spliced into the transform
//! tree. Included content lands in place of the `xsl:include` element and
//! inherits its precedence; imported content is appended after the existing
//! children and opens a new (weaker) import-precedence block. Fetch and
//! parse failures are logged and the transform proceeds without the
//! referent.

use crate::fetch::{resolve_href, DocumentFetcher};
use larch_xml::{Document, NodeId, XSLT_NS};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct IncludeOutcome {
    /// Import precedence per spliced top-level node; nodes absent from the
    /// map belong to the main stylesheet (precedence 0).
    pub precedence: HashMap<NodeId, u32>,
}

pub fn process_includes(
    doc: &mut Document,
    transform_url: Option<&str>,
    fetcher: &dyn DocumentFetcher,
) -> IncludeOutcome {
    let mut outcome = IncludeOutcome::default();
    let mut next_precedence: u32 = 1;
    let mut seen_urls: HashSet<String> = HashSet::new();

    loop {
        let Some(stylesheet) = doc.document_element() else {
            return outcome;
        };
        let Some((node, local, href)) = find_reference(doc, stylesheet) else {
            return outcome;
        };

        // Erase the href before fetching so a failing splice cannot make
        // this element eligible again.
        doc.remove_attribute(node, "href");

        let base = outcome
            .precedence
            .get(&node)
            .copied()
            .unwrap_or(0);
        let resolved = resolve_href(transform_url, &href);
        if !seen_urls.insert(resolved.clone()) {
            log::debug!("skipping already loaded stylesheet '{}'", resolved);
            doc.detach(node);
            continue;
        }

        let sub_doc = match fetcher.fetch(&resolved) {
            Ok(text) => match larch_xml::parse(&text) {
                Ok(parsed) => parsed,
                Err(e) => {
                    log::warn!("ignoring unparseable stylesheet '{}': {}", resolved, e);
                    doc.detach(node);
                    continue;
                }
            },
            Err(e) => {
                log::warn!("ignoring unavailable stylesheet '{}': {}", resolved, e);
                doc.detach(node);
                continue;
            }
        };

        let block_precedence = if local == "import" {
            let p = next_precedence;
            next_precedence += 1;
            p
        } else {
            base
        };

        splice(
            doc,
            stylesheet,
            node,
            local == "import",
            &sub_doc,
            block_precedence,
            &mut outcome,
        );
        doc.detach(node);
    }
}

/// First remaining `xsl:include`/`xsl:import` child that still carries an
/// `href`. Elements without one stay in the tree and are ignored.
fn find_reference(doc: &Document, stylesheet: NodeId) -> Option<(NodeId, String, String)> {
    for &child in doc.children(stylesheet) {
        let node = doc.node_ref(child);
        if node.namespace() != Some(XSLT_NS) {
            continue;
        }
        let local = match node.local_name() {
            Some(l) if l == "include" || l == "import" => l.to_string(),
            _ => continue,
        };
        if let Some(href) = node.attribute("href") {
            return Some((child, local, href.to_string()));
        }
    }
    None
}

fn splice(
    doc: &mut Document,
    stylesheet: NodeId,
    reference: NodeId,
    is_import: bool,
    sub_doc: &Document,
    precedence: u32,
    outcome: &mut IncludeOutcome,
) {
    let Some(sub_root) = sub_doc.document_element() else {
        return;
    };

    // Copy the fetched root's children through a scratch fragment, then move
    // them to their final position.
    let fragment = doc.create_fragment();
    for &child in sub_doc.children(sub_root) {
        doc.copy_deep(fragment, sub_doc, child);
    }

    let moved: Vec<NodeId> = doc.children(fragment).to_vec();
    for id in moved {
        if is_import {
            doc.append_child(stylesheet, id);
        } else {
            doc.insert_before(stylesheet, id, reference);
        }
        if precedence > 0 {
            outcome.precedence.insert(id, precedence);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use std::collections::HashMap as Map;

    struct MapFetcher(Map<String, String>);

    impl DocumentFetcher for MapFetcher {
        fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.0.get(url).cloned().ok_or_else(|| FetchError {
                url: url.to_string(),
                message: "not found".to_string(),
            })
        }
    }

    const XSL: &str = "xmlns:xsl=\"http://www.w3.org/1999/XSL/Transform\"";

    fn template_names(doc: &Document) -> Vec<String> {
        let root = doc.document_element().unwrap();
        doc.node_ref(root)
            .children()
            .filter(|c| c.local_name() == Some("template"))
            .filter_map(|c| c.attribute("match").map(str::to_string))
            .collect()
    }

    #[test]
    fn include_splices_in_place() {
        let main = format!(
            "<xsl:stylesheet {}><xsl:template match=\"a\"/>\
             <xsl:include href=\"inc.xsl\"/>\
             <xsl:template match=\"z\"/></xsl:stylesheet>",
            XSL
        );
        let inc = format!(
            "<xsl:stylesheet {}><xsl:template match=\"m\"/></xsl:stylesheet>",
            XSL
        );
        let fetcher = MapFetcher(Map::from([("inc.xsl".to_string(), inc)]));

        let mut doc = larch_xml::parse(&main).unwrap();
        let outcome = process_includes(&mut doc, None, &fetcher);

        assert_eq!(template_names(&doc), vec!["a", "m", "z"]);
        // Included content keeps main-stylesheet precedence.
        assert!(outcome.precedence.is_empty());
    }

    #[test]
    fn import_appends_with_new_precedence() {
        let main = format!(
            "<xsl:stylesheet {}><xsl:import href=\"lib.xsl\"/>\
             <xsl:template match=\"a\"/></xsl:stylesheet>",
            XSL
        );
        let lib = format!(
            "<xsl:stylesheet {}><xsl:template match=\"m\"/></xsl:stylesheet>",
            XSL
        );
        let fetcher = MapFetcher(Map::from([("lib.xsl".to_string(), lib)]));

        let mut doc = larch_xml::parse(&main).unwrap();
        let outcome = process_includes(&mut doc, None, &fetcher);

        // Imported templates land after the importer's own children.
        assert_eq!(template_names(&doc), vec!["a", "m"]);
        let root = doc.document_element().unwrap();
        let imported = doc
            .node_ref(root)
            .children()
            .find(|c| c.attribute("match") == Some("m"))
            .unwrap();
        assert_eq!(outcome.precedence.get(&imported.id), Some(&1));
    }

    #[test]
    fn nested_includes_resolve() {
        let main = format!(
            "<xsl:stylesheet {}><xsl:include href=\"a.xsl\"/></xsl:stylesheet>",
            XSL
        );
        let a = format!(
            "<xsl:stylesheet {}><xsl:template match=\"a\"/>\
             <xsl:include href=\"b.xsl\"/></xsl:stylesheet>",
            XSL
        );
        let b = format!(
            "<xsl:stylesheet {}><xsl:template match=\"b\"/></xsl:stylesheet>",
            XSL
        );
        let fetcher = MapFetcher(Map::from([
            ("a.xsl".to_string(), a),
            ("b.xsl".to_string(), b),
        ]));

        let mut doc = larch_xml::parse(&main).unwrap();
        process_includes(&mut doc, None, &fetcher);
        assert_eq!(template_names(&doc), vec!["a", "b"]);
    }

    #[test]
    fn include_cycles_terminate() {
        let main = format!(
            "<xsl:stylesheet {}><xsl:include href=\"loop.xsl\"/></xsl:stylesheet>",
            XSL
        );
        let looped = format!(
            "<xsl:stylesheet {}><xsl:template match=\"l\"/>\
             <xsl:include href=\"loop.xsl\"/></xsl:stylesheet>",
            XSL
        );
        let fetcher = MapFetcher(Map::from([("loop.xsl".to_string(), looped)]));

        let mut doc = larch_xml::parse(&main).unwrap();
        process_includes(&mut doc, None, &fetcher);
        assert_eq!(template_names(&doc), vec!["l"]);
    }

    #[test]
    fn missing_documents_are_tolerated() {
        let main = format!(
            "<xsl:stylesheet {}><xsl:include href=\"gone.xsl\"/>\
             <xsl:template match=\"a\"/></xsl:stylesheet>",
            XSL
        );
        let fetcher = MapFetcher(Map::new());
        let mut doc = larch_xml::parse(&main).unwrap();
        process_includes(&mut doc, None, &fetcher);
        assert_eq!(template_names(&doc), vec!["a"]);
    }
}
