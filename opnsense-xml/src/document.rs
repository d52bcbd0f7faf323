use std::ops::Range;

use crate::tree::XmlNode;
use crate::writer::{write_fragment, WriteError};

/// Byte range of one direct child of the root element in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpan {
    pub tag: String,
    pub range: Range<usize>,
}

/// A parsed XML document that keeps its original bytes.
///
/// Sections are edited by splicing a freshly written element over the
/// original byte range, so everything outside that range is reproduced
/// exactly, including comments, declarations and whitespace.
#[derive(Debug, Clone)]
pub struct Document {
    root: XmlNode,
    source: Vec<u8>,
    sections: Vec<SectionSpan>,
    root_span: Range<usize>,
    root_close: Option<usize>,
}

impl Document {
    pub(crate) fn from_parts(
        root: XmlNode,
        source: Vec<u8>,
        sections: Vec<SectionSpan>,
        root_span: Range<usize>,
        root_close: Option<usize>,
    ) -> Self {
        Self {
            root,
            source,
            sections,
            root_span,
            root_close,
        }
    }

    /// Root element of the parsed tree.
    pub fn root(&self) -> &XmlNode {
        &self.root
    }

    /// Consume the document, keeping only the tree.
    pub fn into_root(self) -> XmlNode {
        self.root
    }

    /// Original bytes the document was parsed from.
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// First top-level section with the given tag.
    pub fn section(&self, tag: &str) -> Option<&XmlNode> {
        self.root.get_child(tag)
    }

    /// Byte range of the first top-level section with the given tag.
    pub fn section_span(&self, tag: &str) -> Option<Range<usize>> {
        self.sections
            .iter()
            .find(|span| span.tag == tag)
            .map(|span| span.range.clone())
    }

    /// Render the document with the top-level section named `section.tag`
    /// replaced by `section`, or appended as the last child of the root when
    /// the document has no such section. All other bytes are copied verbatim.
    ///
    /// The replaced section is regenerated from the tree, which does not keep
    /// comments or processing instructions. Comments inside that section are
    /// therefore dropped; comments anywhere else in the file survive.
    pub fn render_with_section(&self, section: &XmlNode) -> Result<Vec<u8>, WriteError> {
        if let Some(range) = self.section_span(&section.tag) {
            let indent = line_indent(&self.source, range.start);
            let fragment = write_fragment(section, &indent)?;
            return Ok(splice(&self.source, range, &fragment));
        }

        let Some(close) = self.root_close else {
            // Self-closing root: nothing inside to preserve, rewrite the root element.
            let mut root = self.root.clone();
            root.children.push(section.clone());
            let indent = line_indent(&self.source, self.root_span.start);
            let fragment = write_fragment(&root, &indent)?;
            return Ok(splice(&self.source, self.root_span.clone(), &fragment));
        };

        let indent = self.child_indent();
        let insert_at = trim_trailing_whitespace(&self.source, self.root_span.start, close);
        let mut fragment = Vec::new();
        fragment.push(b'\n');
        fragment.extend_from_slice(&indent);
        fragment.extend(write_fragment(section, &indent)?);
        if insert_at == close {
            fragment.push(b'\n');
            fragment.extend(line_indent(&self.source, close));
        }
        Ok(splice(&self.source, insert_at..insert_at, &fragment))
    }

    fn child_indent(&self) -> Vec<u8> {
        if let Some(first) = self.sections.first() {
            return line_indent(&self.source, first.range.start);
        }
        let mut indent = line_indent(&self.source, self.root_span.start);
        indent.extend_from_slice(b"  ");
        indent
    }
}

fn splice(source: &[u8], range: Range<usize>, replacement: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(source.len() + replacement.len());
    out.extend_from_slice(&source[..range.start]);
    out.extend_from_slice(replacement);
    out.extend_from_slice(&source[range.end..]);
    out
}

/// Whitespace between the start of the line containing `offset` and `offset`,
/// or nothing when other content precedes `offset` on that line.
fn line_indent(source: &[u8], offset: usize) -> Vec<u8> {
    let line_start = source[..offset]
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|pos| pos + 1)
        .unwrap_or(0);
    let prefix = &source[line_start..offset];
    if prefix.iter().all(|b| *b == b' ' || *b == b'\t') {
        prefix.to_vec()
    } else {
        Vec::new()
    }
}

fn trim_trailing_whitespace(source: &[u8], floor: usize, end: usize) -> usize {
    let mut pos = end;
    while pos > floor && source[pos - 1].is_ascii_whitespace() {
        pos -= 1;
    }
    pos
}
