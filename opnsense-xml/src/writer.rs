use quick_xml::escape::escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

use crate::tree::XmlNode;

/// Errors that can occur while writing XML from an [`XmlNode`] tree.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Failed to serialize XML bytes.
    #[error("failed to write XML: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Serialize an [`XmlNode`] tree into XML bytes.
pub fn write(node: &XmlNode) -> Result<Vec<u8>, WriteError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_node(&mut writer, node)?;
    Ok(writer.into_inner())
}

/// Serialize an [`XmlNode`] tree as a fragment whose continuation lines start
/// with `indent`, for splicing into a document at an already indented offset.
///
/// Line breaks inside text are written as character references, so the
/// indentation never leaks into element content.
pub fn write_fragment(node: &XmlNode, indent: &[u8]) -> Result<Vec<u8>, WriteError> {
    let raw = write(node)?;
    if indent.is_empty() {
        return Ok(raw);
    }

    let mut out = Vec::with_capacity(raw.len() + indent.len() * 8);
    for byte in raw {
        out.push(byte);
        if byte == b'\n' {
            out.extend_from_slice(indent);
        }
    }
    Ok(out)
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> Result<(), quick_xml::Error> {
    let mut start = BytesStart::new(node.tag.as_str());

    for (key, value) in &node.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if node.children.is_empty() && node.text.is_none() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;

    if let Some(text) = &node.text {
        let escaped = escape(text).replace('\n', "&#10;").replace('\r', "&#13;");
        writer.write_event(Event::Text(BytesText::from_escaped(escaped)))?;
    }

    for child in &node.children {
        write_node(writer, child)?;
    }

    writer.write_event(Event::End(BytesEnd::new(node.tag.as_str())))?;
    Ok(())
}
