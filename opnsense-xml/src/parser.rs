use std::fs;
use std::ops::Range;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Reader;
use thiserror::Error;

use crate::document::{Document, SectionSpan};
use crate::tree::XmlNode;

/// Errors that can occur while parsing XML into an [`XmlNode`] tree.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Input XML could not be decoded or tokenized.
    #[error("failed to parse XML: {0}")]
    Xml(#[from] quick_xml::Error),
    /// Input bytes were not valid UTF-8 for tag/attribute/text extraction.
    #[error("invalid UTF-8 while parsing XML: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    /// Failed to decode text entity or bytes.
    #[error("failed to decode XML text: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),
    /// Failed to read input file.
    #[error("failed to read XML file: {0}")]
    Io(#[from] std::io::Error),
    /// Structural issue in XML document.
    #[error("malformed XML: {0}")]
    Malformed(String),
}

/// Parse XML bytes into an [`XmlNode`] tree.
pub fn parse(xml: &[u8]) -> Result<XmlNode, ParseError> {
    parse_document(xml).map(Document::into_root)
}

/// Parse an XML file into an [`XmlNode`] tree.
pub fn parse_file(path: &Path) -> Result<XmlNode, ParseError> {
    let bytes = fs::read(path)?;
    parse(&bytes)
}

/// Parse XML bytes into a [`Document`] that remembers where each top-level
/// section of the root element sits in `xml`.
pub fn parse_document(xml: &[u8]) -> Result<Document, ParseError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    let mut sections: Vec<SectionSpan> = Vec::new();
    let mut section_start = 0usize;
    let mut root_start = 0usize;
    let mut root_span: Option<Range<usize>> = None;
    let mut root_close: Option<usize> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let node = build_node_start(&e, &reader)?;
                let before = tag_start(xml, reader.buffer_position() as usize);
                match stack.len() {
                    0 => root_start = before,
                    1 => section_start = before,
                    _ => {}
                }
                stack.push(node);
            }
            Event::Empty(e) => {
                let node = build_node_start(&e, &reader)?;
                let after = reader.buffer_position() as usize;
                let before = tag_start(xml, after);
                if stack.len() == 1 {
                    sections.push(SectionSpan {
                        tag: node.tag.clone(),
                        range: before..after,
                    });
                }
                if let Some(parent) = stack.last_mut() {
                    attach_child(parent, node);
                } else if root.is_none() {
                    root_span = Some(before..after);
                    root = Some(node);
                } else {
                    return Err(ParseError::Malformed(
                        "multiple top-level elements found".to_string(),
                    ));
                }
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    append_text(current, e.unescape()?.into_owned());
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    append_text(current, std::str::from_utf8(e.as_ref())?.to_string());
                }
            }
            Event::End(_) => {
                let after = reader.buffer_position() as usize;
                let before = tag_start(xml, after);
                let node = stack.pop().ok_or_else(|| {
                    ParseError::Malformed("encountered closing tag without open tag".to_string())
                })?;

                if stack.len() == 1 {
                    sections.push(SectionSpan {
                        tag: node.tag.clone(),
                        range: section_start..after,
                    });
                }

                if let Some(parent) = stack.last_mut() {
                    attach_child(parent, node);
                } else if root.is_none() {
                    root_span = Some(root_start..after);
                    root_close = Some(before);
                    root = Some(node);
                } else {
                    return Err(ParseError::Malformed(
                        "multiple top-level elements found".to_string(),
                    ));
                }
            }
            Event::Eof => break,
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) | Event::Comment(_) => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(ParseError::Malformed(
            "unclosed element(s) at end of document".to_string(),
        ));
    }

    let root = root.ok_or_else(|| ParseError::Malformed("no root element found".to_string()))?;
    let root_span = root_span.unwrap_or(0..xml.len());

    Ok(Document::from_parts(
        root,
        xml.to_vec(),
        sections,
        root_span,
        root_close,
    ))
}

/// Parse an XML file into a [`Document`].
pub fn parse_document_file(path: &Path) -> Result<Document, ParseError> {
    let bytes = fs::read(path)?;
    parse_document(&bytes)
}

/// Add character data to `node`.
///
/// Whitespace between child elements is layout and is dropped. A leaf keeps
/// its text verbatim, including text that is only whitespace.
fn append_text(node: &mut XmlNode, text: String) {
    if text.is_empty() || (!node.children.is_empty() && text.trim().is_empty()) {
        return;
    }
    match &mut node.text {
        Some(existing) => existing.push_str(&text),
        None => node.text = Some(text),
    }
}

/// Attach `child` to `parent`, discarding indentation collected before the
/// first child.
fn attach_child(parent: &mut XmlNode, child: XmlNode) {
    if parent
        .text
        .as_deref()
        .is_some_and(|text| text.trim().is_empty())
    {
        parent.text = None;
    }
    parent.children.push(child);
}

/// Offset of the `<` opening the tag that ends at `end`.
///
/// `<` cannot appear unescaped inside a tag, so the last one before `end` is it.
fn tag_start(xml: &[u8], end: usize) -> usize {
    let end = end.min(xml.len());
    xml[..end].iter().rposition(|b| *b == b'<').unwrap_or(0)
}

fn build_node_start(
    e: &quick_xml::events::BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<XmlNode, ParseError> {
    let tag = qname_to_string(e.name())?;
    let mut node = XmlNode::new(tag);

    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = qname_to_string(attr.key)?;
        let value = attr
            .decode_and_unescape_value(reader.decoder())?
            .into_owned();
        node.attributes.insert(key, value);
    }

    Ok(node)
}

fn qname_to_string(name: QName<'_>) -> Result<String, ParseError> {
    Ok(std::str::from_utf8(name.as_ref())?.to_string())
}

#[cfg(test)]
mod tests {
    use super::parse_document;

    #[test]
    fn records_spans_of_top_level_sections() {
        let xml = b"<?xml version=\"1.0\"?>\n<opnsense>\n  <system><hostname>fw</hostname></system>\n  <hasync/>\n</opnsense>\n";
        let doc = parse_document(xml).expect("parse");

        let system = doc.section_span("system").expect("system span");
        assert_eq!(
            &xml[system],
            b"<system><hostname>fw</hostname></system>".as_slice()
        );
        let hasync = doc.section_span("hasync").expect("hasync span");
        assert_eq!(&xml[hasync], b"<hasync/>".as_slice());
    }

    #[test]
    fn nested_elements_are_not_sections() {
        let xml = b"<opnsense><interfaces><lan><if>em0</if></lan></interfaces></opnsense>";
        let doc = parse_document(xml).expect("parse");

        assert!(doc.section_span("interfaces").is_some());
        assert!(doc.section_span("lan").is_none());
        assert!(doc.section_span("if").is_none());
    }

    #[test]
    fn leaf_text_is_kept_verbatim_and_layout_whitespace_dropped() {
        let xml = b"<opnsense>\n  <hasync>\n    <username>  </username>\n    <password> new pass </password>\n    <synchronizetoip/>\n  </hasync>\n  <empty>\n  </empty>\n</opnsense>";
        let root = parse_document(xml).expect("parse").into_root();

        assert_eq!(root.text, None);
        let hasync = root.get_child("hasync").expect("hasync");
        assert_eq!(hasync.text, None);
        assert_eq!(hasync.get_text(&["username"]), Some("  "));
        assert_eq!(hasync.get_text(&["password"]), Some(" new pass "));
        assert_eq!(hasync.get_text(&["synchronizetoip"]), None);
        assert_eq!(root.get_text(&["empty"]), Some("\n  "));
    }

    #[test]
    fn rejects_unclosed_document() {
        let err = parse_document(b"<opnsense><hasync>").expect_err("should fail");
        assert!(err.to_string().contains("unclosed") || err.to_string().contains("XML"));
    }
}
