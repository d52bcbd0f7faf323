use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// A generic XML tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlNode {
    /// Element tag name.
    pub tag: String,
    /// XML attributes keyed by name.
    pub attributes: BTreeMap<String, String>,
    /// Child elements.
    pub children: Vec<XmlNode>,
    /// Optional text content.
    pub text: Option<String>,
}

impl XmlNode {
    /// Create a new XML node with no attributes, children, or text.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
            text: None,
        }
    }

    /// Create a leaf node holding `text`.
    pub fn with_text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        let mut node = Self::new(tag);
        node.text = Some(text.into());
        node
    }

    /// Return the first child with the provided tag.
    pub fn get_child(&self, tag: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.tag == tag)
    }

    /// Return the first child with the provided tag, mutably.
    pub fn get_child_mut(&mut self, tag: &str) -> Option<&mut XmlNode> {
        self.children.iter_mut().find(|child| child.tag == tag)
    }

    /// Return all children with the provided tag.
    pub fn get_children(&self, tag: &str) -> Vec<&XmlNode> {
        self.children
            .iter()
            .filter(|child| child.tag == tag)
            .collect()
    }

    /// Walk a nested child path and return terminal node text if found.
    pub fn get_text<'a>(&'a self, path: &[&str]) -> Option<&'a str> {
        if path.is_empty() {
            return self.text.as_deref();
        }

        let mut current = self;
        for segment in path {
            current = current.get_child(segment)?;
        }
        current.text.as_deref()
    }

    /// Set the text of the first child named `tag`, appending the child if missing.
    pub fn set_child_text(&mut self, tag: &str, value: &str) {
        if let Some(child) = self.get_child_mut(tag) {
            child.text = Some(value.to_string());
            return;
        }
        self.children.push(XmlNode::with_text(tag, value));
    }

    /// Clear the text of the first child named `tag`, leaving an empty element.
    ///
    /// Returns `false` when no such child exists.
    pub fn clear_child_text(&mut self, tag: &str) -> bool {
        match self.get_child_mut(tag) {
            Some(child) => {
                child.text = None;
                true
            }
            None => false,
        }
    }

    /// Remove every child named `tag`, returning how many were removed.
    pub fn remove_children(&mut self, tag: &str) -> usize {
        let before = self.children.len();
        self.children.retain(|child| child.tag != tag);
        before - self.children.len()
    }
}

impl Display for XmlNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        for (key, value) in &self.attributes {
            write!(f, " {}=\"{}\"", key, value)?;
        }

        if self.children.is_empty() && self.text.is_none() {
            return write!(f, "/>");
        }

        write!(f, ">")?;
        if let Some(text) = &self.text {
            write!(f, "{}", text)?;
        }
        for child in &self.children {
            write!(f, "{}", child)?;
        }
        write!(f, "</{}>", self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::XmlNode;

    #[test]
    fn get_text_walks_nested_path() {
        let mut root = XmlNode::new("opnsense");
        let mut hasync = XmlNode::new("hasync");
        hasync
            .children
            .push(XmlNode::with_text("pfsyncinterface", "lan"));
        root.children.push(hasync);

        assert_eq!(root.get_text(&["hasync", "pfsyncinterface"]), Some("lan"));
        assert_eq!(root.get_text(&["hasync", "username"]), None);
    }

    #[test]
    fn set_child_text_updates_in_place_before_appending() {
        let mut hasync = XmlNode::new("hasync");
        hasync.children.push(XmlNode::with_text("pfsyncinterface", "lan"));
        hasync.children.push(XmlNode::new("username"));

        hasync.set_child_text("pfsyncinterface", "opt1");
        hasync.set_child_text("pfsyncenabled", "on");

        let tags: Vec<&str> = hasync.children.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, ["pfsyncinterface", "username", "pfsyncenabled"]);
        assert_eq!(hasync.get_text(&["pfsyncinterface"]), Some("opt1"));
    }

    #[test]
    fn clear_and_remove_children() {
        let mut hasync = XmlNode::new("hasync");
        hasync.children.push(XmlNode::with_text("username", "root"));
        hasync.children.push(XmlNode::with_text("synchronizenat", "on"));
        hasync.children.push(XmlNode::with_text("synchronizenat", "on"));

        assert!(hasync.clear_child_text("username"));
        assert!(!hasync.clear_child_text("password"));
        assert_eq!(hasync.remove_children("synchronizenat"), 2);
        assert_eq!(hasync.to_string(), "<hasync><username/></hasync>");
    }
}
