//! The thin host surface: parse, compile, execute, serialize.

use crate::compiler::{compile, CompileOptions};
use crate::datasource::DomNode;
use crate::error::TransformError;
use crate::executor::TemplateExecutor;
use crate::fetch::{DocumentFetcher, FetchCache, FileFetcher};
use crate::functions::CustomFunctionTable;
use crate::output::{serialize_output, XmlOutputBuilder};
use std::collections::HashMap;

/// A value handed in through the parameter map, observable by top-level
/// `xsl:param` declarations.
#[derive(Debug, Clone)]
pub enum ParamValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_string())
    }
}
impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::String(v)
    }
}
impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}
impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Boolean(v)
    }
}

pub type Params = HashMap<String, ParamValue>;

#[derive(Default)]
pub struct TransformOptions<'f> {
    /// Base URL of the input document (kept for host bookkeeping).
    pub input_url: Option<String>,
    /// Base URL the include/import/document hrefs resolve against.
    pub transform_url: Option<String>,
    pub custom_functions: CustomFunctionTable,
    /// Transport for referenced documents; defaults to the filesystem.
    pub fetcher: Option<&'f dyn DocumentFetcher>,
}

/// Runs a transformation and returns the serialized result document.
pub fn process(
    input_xml: &str,
    transform_xml: &str,
    params: &Params,
    options: &TransformOptions<'_>,
) -> Result<String, TransformError> {
    let file_fetcher = FileFetcher;
    let base_fetcher: &dyn DocumentFetcher = options.fetcher.unwrap_or(&file_fetcher);
    let fetcher = FetchCache::new(base_fetcher);

    let stylesheet = compile(
        transform_xml,
        &CompileOptions {
            transform_url: options.transform_url.clone(),
            fetcher: &fetcher,
        },
    )?;

    let input_doc = larch_xml::parse(input_xml)?;
    let root = DomNode::document_root(&input_doc);

    let mut executor =
        TemplateExecutor::new(&stylesheet, root, &options.custom_functions, params)?;
    let mut builder = XmlOutputBuilder::new();
    executor.run(&mut builder)?;

    let result_doc = builder.finish();
    Ok(serialize_output(&result_doc, &stylesheet.output))
}

/// An xslt4node-style invocation bundle.
#[derive(Default)]
pub struct TransformSpec {
    /// The input document text.
    pub source: String,
    /// The stylesheet text.
    pub stylesheet: String,
    pub params: Params,
    pub custom_functions: CustomFunctionTable,
    pub input_url: Option<String>,
    pub transform_url: Option<String>,
}

/// Convenience wrapper over [`process`] for callers holding a
/// [`TransformSpec`]. Fatal errors surface as `Err`; no partial output is
/// produced.
pub fn transform(spec: TransformSpec) -> Result<String, TransformError> {
    let options = TransformOptions {
        input_url: spec.input_url,
        transform_url: spec.transform_url,
        custom_functions: spec.custom_functions,
        fetcher: None,
    };
    process(&spec.source, &spec.stylesheet, &spec.params, &options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;

    fn run(input: &str, xslt: &str) -> String {
        process(input, xslt, &Params::new(), &TransformOptions::default()).unwrap()
    }

    fn run_with_params(input: &str, xslt: &str, params: Params) -> String {
        process(input, xslt, &params, &TransformOptions::default()).unwrap()
    }

    fn sheet(body: &str) -> String {
        format!(
            "<xsl:stylesheet version=\"1.0\" \
             xmlns:xsl=\"http://www.w3.org/1999/XSL/Transform\">\
             <xsl:output omit-xml-declaration=\"yes\"/>{}</xsl:stylesheet>",
            body
        )
    }

    #[test]
    fn identity_transform() {
        let xslt = sheet(
            "<xsl:template match=\"/\"><xsl:copy-of select=\"*\"/></xsl:template>",
        );
        assert_eq!(run("<a><b x=\"1\"/></a>", &xslt), "<a><b x=\"1\"/></a>");
    }

    #[test]
    fn modes_select_disjoint_templates() {
        let xslt = sheet(
            "<xsl:template match=\"/\">\
             <xsl:apply-templates select=\"r/item\"/>\
             <xsl:apply-templates select=\"r/item\" mode=\"x\"/>\
             </xsl:template>\
             <xsl:template match=\"item\" mode=\"x\">X:<xsl:value-of select=\"@id\"/></xsl:template>\
             <xsl:template match=\"item\">id=<xsl:value-of select=\"@id\"/></xsl:template>",
        );
        assert_eq!(
            run("<r><item id=\"1\"/><item id=\"2\"/></r>", &xslt),
            "id=1id=2X:1X:2"
        );
    }

    #[test]
    fn sorted_for_each() {
        let xslt = sheet(
            "<xsl:template match=\"/\"><xsl:for-each select=\"r/n\">\
             <xsl:sort select=\".\" data-type=\"number\" order=\"descending\"/>\
             <v><xsl:value-of select=\".\"/></v>\
             </xsl:for-each></xsl:template>",
        );
        assert_eq!(
            run("<r><n>10</n><n>2</n><n>30</n></r>", &xslt),
            "<v>30</v><v>10</v><v>2</v>"
        );
    }

    #[test]
    fn attribute_value_construction() {
        let xslt = sheet(
            "<xsl:template match=\"/r\">\
             <xsl:element name=\"e\">\
             <xsl:attribute name=\"a\">pre-<xsl:value-of select=\"@x\"/>-post</xsl:attribute>\
             </xsl:element></xsl:template>",
        );
        assert_eq!(run("<r x=\"7\"/>", &xslt), "<e a=\"pre-7-post\"/>");
    }

    #[test]
    fn recursive_call_template_with_params() {
        let xslt = sheet(
            "<xsl:param name=\"n\"/>\
             <xsl:template name=\"sum\">\
             <xsl:param name=\"n\"/><xsl:param name=\"acc\" select=\"0\"/>\
             <xsl:choose>\
             <xsl:when test=\"$n = 0\"><xsl:value-of select=\"$acc\"/></xsl:when>\
             <xsl:otherwise>\
             <xsl:call-template name=\"sum\">\
             <xsl:with-param name=\"n\" select=\"$n - 1\"/>\
             <xsl:with-param name=\"acc\" select=\"$acc + $n\"/>\
             </xsl:call-template>\
             </xsl:otherwise>\
             </xsl:choose>\
             </xsl:template>\
             <xsl:template match=\"/\">\
             <xsl:call-template name=\"sum\">\
             <xsl:with-param name=\"n\" select=\"$n\"/>\
             </xsl:call-template>\
             </xsl:template>",
        );
        let mut params = Params::new();
        params.insert("n".to_string(), ParamValue::Number(5.0));
        assert_eq!(run_with_params("<r v=\"5\"/>", &xslt, params), "15");
    }

    #[test]
    fn format_number_with_negative_pattern() {
        let xslt = sheet(
            "<xsl:template match=\"/\">\
             <xsl:value-of select=\"format-number(-1234.5, '#,##0.00;(#,##0.00)')\"/>\
             </xsl:template>",
        );
        assert_eq!(run("<r/>", &xslt), "(1,234.50)");
    }

    #[test]
    fn named_decimal_format() {
        let xslt = sheet(
            "<xsl:decimal-format name=\"eu\" decimal-separator=\",\" grouping-separator=\".\"/>\
             <xsl:template match=\"/\">\
             <xsl:value-of select=\"format-number(1234.5, '#.##0,00', 'eu')\"/>\
             </xsl:template>",
        );
        assert_eq!(run("<r/>", &xslt), "1.234,50");
    }

    #[test]
    fn literal_elements_resolve_avt_attributes() {
        let xslt = sheet(
            "<xsl:template match=\"/r\">\
             <a href=\"https://example.com/{@id}\">link</a>\
             </xsl:template>",
        );
        assert_eq!(
            run("<r id=\"42\"/>", &xslt),
            "<a href=\"https://example.com/42\">link</a>"
        );
    }

    #[test]
    fn malformed_avt_parts_stay_literal() {
        let xslt = sheet(
            "<xsl:template match=\"/\"><e a=\"x{~~~}y\"/></xsl:template>",
        );
        assert_eq!(run("<r/>", &xslt), "<e a=\"x{~~~}y\"/>");
    }

    #[test]
    fn apply_templates_defaults_to_children_and_copies_text() {
        let xslt = sheet(
            "<xsl:template match=\"/\"><xsl:apply-templates select=\"doc\"/></xsl:template>\
             <xsl:template match=\"doc\"><out><xsl:apply-templates/></out></xsl:template>\
             <xsl:template match=\"b\">[b]</xsl:template>",
        );
        // <b> is consumed by its template; bare text is copied verbatim.
        assert_eq!(
            run("<doc>one<b>two</b>three</doc>", &xslt),
            "<out>one[b]three</out>"
        );
    }

    #[test]
    fn if_and_choose_cascade() {
        let xslt = sheet(
            "<xsl:template match=\"/\"><xsl:for-each select=\"r/i\">\
             <xsl:if test=\"@keep = 'yes'\"><k><xsl:value-of select=\".\"/></k></xsl:if>\
             <xsl:choose>\
             <xsl:when test=\". &gt; 10\"><big/></xsl:when>\
             <xsl:otherwise><small/></xsl:otherwise>\
             </xsl:choose>\
             </xsl:for-each></xsl:template>",
        );
        assert_eq!(
            run(
                "<r><i keep=\"yes\">5</i><i>25</i></r>",
                &xslt
            ),
            "<k>5</k><small/><big/>"
        );
    }

    #[test]
    fn copy_builds_recursive_identity() {
        let xslt = sheet(
            "<xsl:template match=\"/\"><xsl:apply-templates/></xsl:template>\
             <xsl:template match=\"*\">\
             <xsl:copy><xsl:apply-templates/></xsl:copy>\
             </xsl:template>",
        );
        assert_eq!(
            run("<a><b>hi</b><c/></a>", &xslt),
            "<a><b>hi</b><c/></a>"
        );
    }

    #[test]
    fn variables_shadow_outer_scopes() {
        let xslt = sheet(
            "<xsl:template match=\"/\">\
             <xsl:variable name=\"v\" select=\"'outer'\"/>\
             <xsl:for-each select=\"r/x\">\
             <xsl:variable name=\"v\" select=\"'inner'\"/>\
             <i><xsl:value-of select=\"$v\"/></i>\
             </xsl:for-each>\
             <o><xsl:value-of select=\"$v\"/></o>\
             </xsl:template>",
        );
        assert_eq!(
            run("<r><x/></r>", &xslt),
            "<i>inner</i><o>outer</o>"
        );
    }

    #[test]
    fn variable_bodies_become_text_values() {
        let xslt = sheet(
            "<xsl:template match=\"/\">\
             <xsl:variable name=\"v\"><w>frag</w></xsl:variable>\
             <xsl:value-of select=\"$v\"/>\
             </xsl:template>",
        );
        assert_eq!(run("<r/>", &xslt), "frag");
    }

    #[test]
    fn comment_and_processing_instruction_output() {
        let xslt = sheet(
            "<xsl:template match=\"/\">\
             <r><xsl:comment>note <xsl:value-of select=\"r/@id\"/></xsl:comment>\
             <xsl:processing-instruction name=\"target\">data</xsl:processing-instruction></r>\
             </xsl:template>",
        );
        assert_eq!(
            run("<r id=\"9\"/>", &xslt),
            "<r><!--note 9--><?target data?></r>"
        );
    }

    #[test]
    fn disable_output_escaping_passes_markup_through() {
        let xslt = sheet(
            "<xsl:template match=\"/\"><o>\
             <xsl:text disable-output-escaping=\"yes\">&lt;raw/&gt;</xsl:text>\
             <xsl:text>&lt;kept/&gt;</xsl:text>\
             </o></xsl:template>",
        );
        assert_eq!(
            run("<r/>", &xslt),
            "<o><raw/>&lt;kept/&gt;</o>"
        );
    }

    #[test]
    fn xml_declaration_appears_unless_omitted() {
        let xslt = "<xsl:stylesheet version=\"1.0\" \
             xmlns:xsl=\"http://www.w3.org/1999/XSL/Transform\">\
             <xsl:template match=\"/\"><r/></xsl:template></xsl:stylesheet>";
        assert_eq!(
            run("<x/>", xslt),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><r/>"
        );
    }

    #[test]
    fn text_output_method() {
        let xslt = "<xsl:stylesheet version=\"1.0\" \
             xmlns:xsl=\"http://www.w3.org/1999/XSL/Transform\">\
             <xsl:output method=\"text\"/>\
             <xsl:template match=\"/\"><x>only text </x><xsl:value-of select=\"r\"/>\
             </xsl:template></xsl:stylesheet>";
        assert_eq!(run("<r>survives</r>", xslt), "only text survives");
    }

    #[test]
    fn keys_index_the_input_document() {
        let xslt = sheet(
            "<xsl:key name=\"by-dept\" match=\"user\" use=\"dept\"/>\
             <xsl:template match=\"/\">\
             <xsl:for-each select=\"key('by-dept', 'sales')\">\
             <xsl:sort select=\"name\"/>\
             <p><xsl:value-of select=\"name\"/></p>\
             </xsl:for-each>\
             </xsl:template>",
        );
        let input = "<data>\
             <user><name>Zoe</name><dept>sales</dept></user>\
             <user><name>Ann</name><dept>eng</dept></user>\
             <user><name>Bob</name><dept>sales</dept></user>\
             </data>";
        assert_eq!(run(input, &xslt), "<p>Bob</p><p>Zoe</p>");
    }

    #[test]
    fn generate_id_is_stable_within_a_run() {
        let xslt = sheet(
            "<xsl:template match=\"/\">\
             <a><xsl:value-of select=\"generate-id(r/x)\"/></a>\
             <b><xsl:value-of select=\"generate-id(r/x)\"/></b>\
             <c><xsl:value-of select=\"generate-id(r)\"/></c>\
             </xsl:template>",
        );
        let out = run("<r><x/></r>", &xslt);
        let a = &out[3..15];
        let b = &out[22..34];
        let c = &out[41..53];
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn regex_functions() {
        let xslt = sheet(
            "<xsl:template match=\"/\">\
             <a><xsl:value-of select=\"replace(r, '[0-9]+', '#')\"/></a>\
             <b><xsl:value-of select=\"matches(r, '^x')\"/></b>\
             <c><xsl:value-of select=\"upper-case(r)\"/></c>\
             <d><xsl:value-of select=\"lower-case('MiXeD')\"/></d>\
             </xsl:template>",
        );
        assert_eq!(
            run("<r>x12y</r>", &xslt),
            "<a>x#y</a><b>true</b><c>X12Y</c><d>mixed</d>"
        );
    }

    #[test]
    fn function_available_reports_builtins_and_extensions() {
        let xslt = sheet(
            "<xsl:template match=\"/\">\
             <a><xsl:value-of select=\"function-available('concat')\"/></a>\
             <b><xsl:value-of select=\"function-available('no-such-fn')\"/></b>\
             </xsl:template>",
        );
        assert_eq!(run("<r/>", &xslt), "<a>true</a><b>false</b>");
    }

    #[test]
    fn custom_native_functions() {
        let xslt = "<xsl:stylesheet version=\"1.0\" \
             xmlns:xsl=\"http://www.w3.org/1999/XSL/Transform\" \
             xmlns:ext=\"urn:ext\">\
             <xsl:output omit-xml-declaration=\"yes\"/>\
             <xsl:template match=\"/\"><xsl:value-of select=\"ext:shout(r)\"/></xsl:template>\
             </xsl:stylesheet>";
        let mut options = TransformOptions::default();
        options
            .custom_functions
            .register("urn:ext", "shout", |args| {
                format!("{}!", args.first().cloned().unwrap_or_default().to_uppercase())
            });
        let out = process("<r>hey</r>", xslt, &Params::new(), &options).unwrap();
        assert_eq!(out, "HEY!");
    }

    #[test]
    fn stylesheet_functions_run_their_bodies() {
        let xslt = "<xsl:stylesheet version=\"1.0\" \
             xmlns:xsl=\"http://www.w3.org/1999/XSL/Transform\" \
             xmlns:my=\"urn:my\">\
             <xsl:output omit-xml-declaration=\"yes\"/>\
             <xsl:function name=\"my:wrap\">\
             <xsl:param name=\"v\"/>[<xsl:value-of select=\"$v\"/>]\
             </xsl:function>\
             <xsl:template match=\"/\"><xsl:value-of select=\"my:wrap(r)\"/></xsl:template>\
             </xsl:stylesheet>";
        assert_eq!(run("<r>core</r>", xslt), "[core]");
    }

    #[test]
    fn includes_splice_templates() {
        struct Inline;
        impl DocumentFetcher for Inline {
            fn fetch(&self, url: &str) -> Result<String, FetchError> {
                match url {
                    "lib.xsl" => Ok("<xsl:stylesheet version=\"1.0\" \
                        xmlns:xsl=\"http://www.w3.org/1999/XSL/Transform\">\
                        <xsl:template match=\"item\"><inc/></xsl:template>\
                        </xsl:stylesheet>"
                        .to_string()),
                    _ => Err(FetchError {
                        url: url.to_string(),
                        message: "not found".to_string(),
                    }),
                }
            }
        }

        let xslt = sheet(
            "<xsl:include href=\"lib.xsl\"/>\
             <xsl:template match=\"/\"><xsl:apply-templates select=\"r/item\"/></xsl:template>",
        );
        let inline = Inline;
        let options = TransformOptions {
            fetcher: Some(&inline),
            ..TransformOptions::default()
        };
        let out = process("<r><item/></r>", &xslt, &Params::new(), &options).unwrap();
        assert_eq!(out, "<inc/>");
    }

    #[test]
    fn import_yields_to_the_importing_stylesheet() {
        struct Inline;
        impl DocumentFetcher for Inline {
            fn fetch(&self, _url: &str) -> Result<String, FetchError> {
                Ok("<xsl:stylesheet version=\"1.0\" \
                    xmlns:xsl=\"http://www.w3.org/1999/XSL/Transform\">\
                    <xsl:template match=\"item\"><imported/></xsl:template>\
                    </xsl:stylesheet>"
                    .to_string())
            }
        }

        let xslt = sheet(
            "<xsl:import href=\"lib.xsl\"/>\
             <xsl:template match=\"item\"><local/></xsl:template>\
             <xsl:template match=\"/\"><xsl:apply-templates select=\"r/item\"/></xsl:template>",
        );
        let inline = Inline;
        let options = TransformOptions {
            fetcher: Some(&inline),
            ..TransformOptions::default()
        };
        // Both templates match <item>; the importing stylesheet wins.
        let out = process("<r><item/></r>", &xslt, &Params::new(), &options).unwrap();
        assert_eq!(out, "<local/>");
    }

    #[test]
    fn document_function_reads_prefetched_sources() {
        struct Inline;
        impl DocumentFetcher for Inline {
            fn fetch(&self, url: &str) -> Result<String, FetchError> {
                match url {
                    "extra.xml" => Ok("<extra><v>from-doc</v></extra>".to_string()),
                    _ => Err(FetchError {
                        url: url.to_string(),
                        message: "not found".to_string(),
                    }),
                }
            }
        }
        let xslt = sheet(
            "<xsl:template match=\"/\">\
             <xsl:value-of select=\"document('extra.xml')/extra/v\"/>\
             </xsl:template>",
        );
        let inline = Inline;
        let options = TransformOptions {
            fetcher: Some(&inline),
            ..TransformOptions::default()
        };
        let out = process("<r/>", &xslt, &Params::new(), &options).unwrap();
        assert_eq!(out, "from-doc");
    }

    #[test]
    fn with_param_flows_into_applied_templates() {
        let xslt = sheet(
            "<xsl:template match=\"/\">\
             <xsl:apply-templates select=\"r/i\">\
             <xsl:with-param name=\"tag\" select=\"'T'\"/>\
             </xsl:apply-templates>\
             </xsl:template>\
             <xsl:template match=\"i\">\
             <xsl:param name=\"tag\"/>\
             <xsl:value-of select=\"$tag\"/>:<xsl:value-of select=\".\"/>;\
             </xsl:template>",
        );
        assert_eq!(run("<r><i>1</i><i>2</i></r>", &xslt), "T:1;T:2;");
    }

    #[test]
    fn position_and_last_reflect_the_node_list() {
        let xslt = sheet(
            "<xsl:template match=\"/\"><xsl:for-each select=\"r/i\">\
             <xsl:value-of select=\"position()\"/>/<xsl:value-of select=\"last()\"/>;\
             </xsl:for-each></xsl:template>",
        );
        assert_eq!(run("<r><i/><i/><i/></r>", &xslt), "1/3;2/3;3/3;");
    }

    #[test]
    fn unknown_instruction_fails_the_transform() {
        let xslt = sheet("<xsl:template match=\"/\"><xsl:nope/></xsl:template>");
        let err = process("<r/>", &xslt, &Params::new(), &TransformOptions::default())
            .unwrap_err();
        assert!(matches!(err, TransformError::NotImplemented(_)));
    }

    #[test]
    fn malformed_input_fails_before_evaluation() {
        let xslt = sheet("<xsl:template match=\"/\"><out/></xsl:template>");
        assert!(matches!(
            process("<r>", &xslt, &Params::new(), &TransformOptions::default()),
            Err(TransformError::Xml(_))
        ));
    }

    #[test]
    fn transform_spec_wrapper() {
        let spec = TransformSpec {
            source: "<r>v</r>".to_string(),
            stylesheet: sheet(
                "<xsl:template match=\"/\"><o><xsl:value-of select=\"r\"/></o></xsl:template>",
            ),
            ..TransformSpec::default()
        };
        assert_eq!(transform(spec).unwrap(), "<o>v</o>");
    }

    #[test]
    fn strip_space_applies_per_element_policy() {
        let xslt = sheet(
            "<xsl:strip-space elements=\"padded\"/>\
             <xsl:template match=\"/\">\
             <a><xsl:apply-templates select=\"r/padded\"/></a>\
             <b><xsl:apply-templates select=\"r/keep\"/></b>\
             </xsl:template>\
             <xsl:template match=\"padded\"><xsl:value-of select=\".\"/></xsl:template>\
             <xsl:template match=\"keep\"><xsl:value-of select=\".\"/></xsl:template>",
        );
        let out = run(
            "<r><padded>  lots   of space  </padded><keep> kept </keep></r>",
            &xslt,
        );
        // Stripping trims and collapses; the default policy only collapses.
        assert_eq!(out, "<a>lots of space</a><b> kept </b>");
    }
}
