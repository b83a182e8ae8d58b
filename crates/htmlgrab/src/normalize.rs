//! Markup normalization
//!
//! Decodes the fetched bytes, parses them with the HTML5 tree builder and
//! serializes the tree back as indented text. Parsing follows the browser
//! recovery rules, so malformed input always yields a tree.

use crate::types::{FetchResult, NormalizedDocument};
use ego_tree::NodeRef;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use scraper::{Html, Node};
use tracing::{debug, warn};

/// Binary content type prefixes
const BINARY_PREFIXES: &[&str] = &[
    "image/",
    "audio/",
    "video/",
    "application/octet-stream",
    "application/pdf",
    "application/zip",
    "application/gzip",
    "font/",
];

/// Bytes scanned for a `<meta>` charset declaration
const META_SNIFF_LIMIT: usize = 1024;

/// Elements serialized without an end tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr", "img", "input",
    "keygen", "link", "meta", "param", "source", "track", "wbr",
];

/// Elements whose text children are emitted unescaped
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script",
    "style",
    "xmp",
    "iframe",
    "noembed",
    "noframes",
    "plaintext",
    "noscript",
];

/// Elements whose content is whitespace-sensitive
const PREFORMATTED_ELEMENTS: &[&str] = &["pre", "textarea", "listing"];

/// Serializes a parsed document as indented markup
#[derive(Debug, Clone)]
pub struct PrettyPrinter {
    indent: String,
}

impl Default for PrettyPrinter {
    fn default() -> Self {
        Self::new(crate::DEFAULT_INDENT)
    }
}

impl PrettyPrinter {
    /// Indent each nesting level by `width` spaces
    pub fn new(width: usize) -> Self {
        Self {
            indent: " ".repeat(width),
        }
    }

    /// Parse `html` and serialize it
    pub fn prettify(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        if !document.errors.is_empty() {
            debug!(count = document.errors.len(), "Recovered from parse errors");
        }
        self.serialize(&document)
    }

    /// Serialize an already parsed document
    pub fn serialize(&self, document: &Html) -> String {
        let mut out = String::new();
        self.write_node(&mut out, document.tree.root(), 0);
        out
    }

    fn line(&self, out: &mut String, depth: usize, content: &str) {
        for _ in 0..depth {
            out.push_str(&self.indent);
        }
        out.push_str(content);
        out.push('\n');
    }

    fn write_node(&self, out: &mut String, node: NodeRef<'_, Node>, depth: usize) {
        match node.value() {
            Node::Document | Node::Fragment => {
                for child in node.children() {
                    self.write_node(out, child, depth);
                }
            }
            Node::Doctype(doctype) => {
                self.line(out, depth, &doctype_tag(doctype));
            }
            Node::Comment(comment) => {
                self.line(out, depth, &format!("<!--{}-->", &**comment));
            }
            Node::ProcessingInstruction(pi) => {
                self.line(out, depth, &format!("<?{} {}>", pi.target, &**pi));
            }
            Node::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return;
                }
                if parent_is_raw_text(node) {
                    self.line(out, depth, trimmed);
                } else {
                    self.line(out, depth, &escape_text(trimmed));
                }
            }
            Node::Element(element) => {
                let name = element.name();
                let open = start_tag(element);

                if VOID_ELEMENTS.contains(&name) {
                    self.line(out, depth, &open);
                    return;
                }

                if PREFORMATTED_ELEMENTS.contains(&name) {
                    let mut inline = open;
                    // The parser drops one newline right after the start tag.
                    if starts_with_newline(node) {
                        inline.push('\n');
                    }
                    for child in node.children() {
                        write_inline(&mut inline, child);
                    }
                    inline.push_str(&format!("</{name}>"));
                    self.line(out, depth, &inline);
                    return;
                }

                self.line(out, depth, &open);
                for child in node.children() {
                    self.write_node(out, child, depth + 1);
                }
                self.line(out, depth, &format!("</{name}>"));
            }
        }
    }
}

/// Serialize without adding any whitespace
fn write_inline(out: &mut String, node: NodeRef<'_, Node>) {
    match node.value() {
        Node::Text(text) => {
            if parent_is_raw_text(node) {
                out.push_str(text);
            } else {
                out.push_str(&escape_text(text));
            }
        }
        Node::Comment(comment) => {
            out.push_str(&format!("<!--{}-->", &**comment));
        }
        Node::Element(element) => {
            let name = element.name();
            out.push_str(&start_tag(element));
            if VOID_ELEMENTS.contains(&name) {
                return;
            }
            for child in node.children() {
                write_inline(out, child);
            }
            out.push_str(&format!("</{name}>"));
        }
        Node::Document | Node::Fragment => {
            for child in node.children() {
                write_inline(out, child);
            }
        }
        Node::Doctype(_) | Node::ProcessingInstruction(_) => {}
    }
}

fn start_tag(element: &scraper::node::Element) -> String {
    let mut tag = format!("<{}", element.name());
    for (name, value) in element.attrs.iter() {
        tag.push(' ');
        if let Some(prefix) = &name.prefix {
            tag.push_str(prefix);
            tag.push(':');
        }
        tag.push_str(&name.local);
        tag.push_str("=\"");
        tag.push_str(&escape_attr(value));
        tag.push('"');
    }
    tag.push('>');
    tag
}

fn doctype_tag(doctype: &scraper::node::Doctype) -> String {
    let mut tag = format!("<!DOCTYPE {}", doctype.name());
    if !doctype.public_id().is_empty() {
        tag.push_str(&format!(" PUBLIC \"{}\"", doctype.public_id()));
        if !doctype.system_id().is_empty() {
            tag.push_str(&format!(" \"{}\"", doctype.system_id()));
        }
    } else if !doctype.system_id().is_empty() {
        tag.push_str(&format!(" SYSTEM \"{}\"", doctype.system_id()));
    }
    tag.push('>');
    tag
}

fn parent_is_raw_text(node: NodeRef<'_, Node>) -> bool {
    node.parent()
        .and_then(|parent| parent.value().as_element().map(|e| e.name()))
        .is_some_and(|name| RAW_TEXT_ELEMENTS.contains(&name))
}

fn starts_with_newline(node: NodeRef<'_, Node>) -> bool {
    node.first_child()
        .and_then(|child| child.value().as_text().map(|t| t.starts_with('\n')))
        .unwrap_or(false)
}

fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\u{a0}' => escaped.push_str("&nbsp;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\u{a0}' => escaped.push_str("&nbsp;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Check if content type indicates binary content
pub fn is_binary_content_type(content_type: &str) -> bool {
    let ct_lower = content_type.to_lowercase();
    BINARY_PREFIXES
        .iter()
        .any(|prefix| ct_lower.starts_with(prefix))
}

/// Decode a body to text
///
/// Order: byte order mark, `charset` of the Content-Type header, `<meta>`
/// declaration near the start of the body, UTF-8 when the bytes are valid
/// UTF-8, windows-1252 otherwise. Never fails; invalid sequences become
/// U+FFFD.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> (String, &'static Encoding) {
    let declared = content_type
        .and_then(charset_from_content_type)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .or_else(|| {
            sniff_meta_charset(bytes)
                .and_then(|label| Encoding::for_label(label.as_bytes()))
                .map(Encoding::output_encoding)
        });

    let fallback = if std::str::from_utf8(bytes).is_ok() {
        UTF_8
    } else {
        WINDOWS_1252
    };

    // `decode` gives a byte order mark precedence over the declared encoding.
    let (text, used, had_errors) = declared.unwrap_or(fallback).decode(bytes);
    if had_errors {
        warn!(encoding = used.name(), "Body contained malformed sequences");
    }
    (text.into_owned(), used)
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            Some(value.to_string())
        } else {
            None
        }
    })
}

/// Find `charset=` inside a `<meta>` tag within the first bytes of the body
fn sniff_meta_charset(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(META_SNIFF_LIMIT)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();

    let mut rest = head.as_str();
    while let Some(start) = rest.find("<meta") {
        let tag_rest = &rest[start..];
        let end = tag_rest.find('>').unwrap_or(tag_rest.len());
        let tag = &tag_rest[..end];
        if let Some(pos) = tag.find("charset=") {
            let value = tag[pos + "charset=".len()..].trim_start_matches(['"', '\'']);
            let label: String = value
                .chars()
                .take_while(|c| !matches!(c, '"' | '\'' | ';' | '/' | '>') && !c.is_whitespace())
                .collect();
            if !label.is_empty() {
                return Some(label);
            }
        }
        rest = &tag_rest[end..];
    }
    None
}

/// Normalize a fetch result with the default printer
pub fn normalize(result: FetchResult) -> NormalizedDocument {
    normalize_with(result, &PrettyPrinter::default())
}

/// Normalize a fetch result with a custom printer
pub fn normalize_with(result: FetchResult, printer: &PrettyPrinter) -> NormalizedDocument {
    if let Some(ct) = result.content_type.as_deref() {
        if is_binary_content_type(ct) {
            warn!(content_type = ct, "Normalizing binary content as markup");
        }
    }

    let (html, encoding) = decode_body(&result.raw_bytes, result.content_type.as_deref());
    debug!(
        encoding = encoding.name(),
        bytes = result.byte_length,
        "Decoded body"
    );

    NormalizedDocument::with_encoding(printer.prettify(&html), encoding.name())
}
