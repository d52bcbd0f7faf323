use std::collections::BTreeSet;

use opnsense_xml::{parse_document, Document, XmlNode};

use crate::error::HaError;
use crate::model::{HaSettings, SECTION};

const ROOT: &str = "opnsense";

/// A parsed OPNsense `config.xml`.
///
/// Only the `<hasync>` section is ever rewritten; every other byte of the
/// original file is carried over verbatim by [`ConfigDocument::render`].
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    document: Document,
    hasync: Option<XmlNode>,
}

impl ConfigDocument {
    /// Parse raw config bytes. The root element must be `<opnsense>`.
    pub fn parse(raw: &[u8]) -> Result<Self, HaError> {
        let document = parse_document(raw)?;
        let root = document.root();
        if root.tag != ROOT {
            return Err(HaError::MalformedDocument(format!(
                "expected <{ROOT}> root element, found <{}>",
                root.tag
            )));
        }
        let hasync = document.section(SECTION).cloned();
        Ok(Self { document, hasync })
    }

    /// Root element of the parsed tree.
    pub fn root(&self) -> &XmlNode {
        self.document.root()
    }

    /// Current `<hasync>` section, if the document has one.
    pub fn hasync(&self) -> Option<&XmlNode> {
        self.hasync.as_ref()
    }

    /// Typed settings of the current `<hasync>` section; defaults when absent.
    pub fn ha_settings(&self, managed_tags: &BTreeSet<String>) -> HaSettings {
        self.hasync
            .as_ref()
            .map(|node| HaSettings::from_node(node, managed_tags))
            .unwrap_or_default()
    }

    /// Replace the in-memory `<hasync>` section with `settings`.
    pub fn set_ha_settings(&mut self, settings: &HaSettings, managed_tags: &BTreeSet<String>) {
        match self.hasync.as_mut() {
            Some(node) => settings.apply_to_node(node, managed_tags),
            None => self.hasync = Some(settings.to_node(managed_tags)),
        }
    }

    /// Serialize the full document, splicing in the current `<hasync>` section.
    pub fn render(&self) -> Result<Vec<u8>, HaError> {
        let Some(hasync) = &self.hasync else {
            return Ok(self.document.source().to_vec());
        };
        if self.document.section(SECTION) == Some(hasync) {
            return Ok(self.document.source().to_vec());
        }
        self.document
            .render_with_section(hasync)
            .map_err(|err| HaError::MalformedDocument(err.to_string()))
    }
}
