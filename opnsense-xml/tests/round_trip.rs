use std::fs;
use std::path::PathBuf;

use opnsense_xml::{parse, parse_document, parse_document_file, XmlNode};
use pretty_assertions::assert_eq;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn strip_section(text: &str, start: &str, end: &str) -> String {
    let from = text.find(start).expect("section start");
    let to = text.find(end).expect("section end") + end.len();
    format!("{}{}", &text[..from], &text[to..])
}

#[test]
fn replacing_a_section_leaves_every_other_byte_untouched() {
    let path = fixture("fixtures/opnsense-ha.xml");
    let original = fs::read_to_string(&path).expect("read fixture");
    let doc = parse_document_file(&path).expect("parse");

    let mut hasync = doc.section("hasync").expect("hasync").clone();
    hasync.set_child_text("pfsyncenabled", "on");
    hasync.set_child_text("pfsyncinterface", "opt1");

    let rendered = String::from_utf8(doc.render_with_section(&hasync).expect("render"))
        .expect("utf8");

    assert_eq!(
        strip_section(&rendered, "<hasync>", "</hasync>"),
        strip_section(&original, "<hasync>", "</hasync>")
    );
    assert!(rendered.contains("<!-- managed by automation -->"));
    assert!(rendered.starts_with("<?xml version=\"1.0\"?>\n"));
}

#[test]
fn rendered_section_reparses_to_the_edited_tree() {
    let path = fixture("fixtures/opnsense-ha.xml");
    let doc = parse_document_file(&path).expect("parse");

    let mut hasync = doc.section("hasync").expect("hasync").clone();
    hasync.set_child_text("synchronizenat", "on");
    hasync.remove_children("password");

    let rendered = doc.render_with_section(&hasync).expect("render");
    let reparsed = parse(&rendered).expect("reparse");

    assert_eq!(reparsed.get_child("hasync"), Some(&hasync));
    assert_eq!(reparsed.get_child("nat"), doc.root().get_child("nat"));
}

#[test]
fn inserting_a_missing_section_keeps_existing_content() {
    let path = fixture("fixtures/opnsense-no-hasync.xml");
    let original = fs::read(&path).expect("read fixture");
    let doc = parse_document(&original).expect("parse");
    assert!(doc.section_span("hasync").is_none());

    let mut hasync = XmlNode::new("hasync");
    hasync.set_child_text("pfsyncinterface", "lan");
    let rendered = doc.render_with_section(&hasync).expect("render");
    let reparsed = parse_document(&rendered).expect("reparse");

    assert_eq!(
        reparsed.root().get_text(&["hasync", "pfsyncinterface"]),
        Some("lan")
    );
    assert_eq!(reparsed.section("system"), doc.section("system"));
    assert_eq!(reparsed.section("interfaces"), doc.section("interfaces"));
    let text = String::from_utf8(rendered).expect("utf8");
    assert!(text.ends_with("  </hasync>\n</opnsense>\n"));
}
