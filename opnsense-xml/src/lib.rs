//! XML primitives for editing firewall configuration files in place.
//!
//! [`parse`] builds a plain [`XmlNode`] tree. [`parse_document`] additionally
//! records where each top-level section lives in the source bytes so a single
//! section can be rewritten with [`Document::render_with_section`] while the
//! rest of the file is reproduced byte for byte.

pub mod document;
pub mod parser;
pub mod tree;
pub mod writer;

pub use document::{Document, SectionSpan};
pub use parser::{parse, parse_document, parse_document_file, parse_file, ParseError};
pub use tree::XmlNode;
pub use writer::{write, write_fragment, WriteError};
