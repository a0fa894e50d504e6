//! Property tests for ordered insertion and text round trips

use proptest::prelude::*;
use xmldom::dom;

const ORDER: [&str; 5] = ["header", "from", "to", "body", "footer"];

fn element_names(doc: &xmldom::Document, parent: xmldom::NodeId) -> Vec<String> {
    dom::select_children(doc, parent)
        .into_iter()
        .filter_map(|child| doc.node_name(child).map(str::to_string))
        .collect()
}

fn position(name: &str) -> usize {
    ORDER.iter().position(|&n| n == name).unwrap_or(ORDER.len())
}

proptest! {
    #[test]
    fn insertion_keeps_children_in_order(picks in prop::collection::vec(0usize..ORDER.len(), 0..12)) {
        let mut doc = dom::create_document_with_root("message", None).unwrap();
        let root = doc.document_element().unwrap();

        for &pick in &picks {
            let element = dom::create_element(&mut doc, ORDER[pick], None).unwrap();
            dom::insert_element(&mut doc, root, element, &ORDER).unwrap();
        }

        let names = element_names(&doc, root);
        prop_assert_eq!(names.len(), picks.len());
        let positions: Vec<usize> = names.iter().map(|n| position(n)).collect();
        prop_assert!(positions.windows(2).all(|w| w[0] <= w[1]), "out of order: {:?}", names);
    }

    #[test]
    fn insertion_leaves_unlisted_names_after_listed_ones(
        picks in prop::collection::vec(0usize..ORDER.len(), 1..8),
    ) {
        let mut doc = dom::create_document_with_root("message", None).unwrap();
        let root = doc.document_element().unwrap();
        let extra = dom::create_element(&mut doc, "attachment", None).unwrap();
        dom::append_element(&mut doc, root, extra).unwrap();

        for &pick in &picks {
            let element = dom::create_element(&mut doc, ORDER[pick], None).unwrap();
            dom::insert_element(&mut doc, root, element, &ORDER).unwrap();
        }

        let names = element_names(&doc, root);
        prop_assert_eq!(names.last().map(String::as_str), Some("attachment"));
    }

    #[test]
    fn text_survives_serialize_and_parse(text in "[a-zA-Z0-9 <>&'\"]{0,40}") {
        let mut doc = dom::create_document_with_root("root", None).unwrap();
        let root = doc.document_element().unwrap();
        dom::append_text(&mut doc, root, &text).unwrap();
        dom::set_attribute(&mut doc, root, "note", &text).unwrap();

        let xml = dom::as_xml(&doc, doc.root()).unwrap();
        let parsed = dom::parse(&xml).unwrap();

        prop_assert_eq!(dom::select_string(&parsed, parsed.root(), "/root", &[]).unwrap(), text.clone());
        prop_assert_eq!(dom::select_string(&parsed, parsed.root(), "/root/@note", &[]).unwrap(), text);
    }
}
