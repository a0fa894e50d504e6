use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fmt::Write;
use xmldom::{dom, NamespaceContext, NamespaceResolver, Schema, XPath};

fn make_catalog(books: usize) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<catalog xmlns=\"urn:catalog\">\n");
    for i in 0..books {
        let _ = writeln!(
            xml,
            "  <book id=\"bk{i}\"><title>Title {i}</title><price>{}.99</price></book>",
            10 + i
        );
    }
    xml.push_str("</catalog>\n");
    xml
}

const CATALOG_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
    targetNamespace="urn:catalog" xmlns:c="urn:catalog" elementFormDefault="qualified">
  <xs:element name="catalog">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="book" minOccurs="0" maxOccurs="unbounded">
          <xs:complexType>
            <xs:sequence>
              <xs:element name="title" type="xs:string"/>
              <xs:element name="price" type="xs:decimal"/>
            </xs:sequence>
            <xs:attribute name="id" type="xs:ID"/>
          </xs:complexType>
        </xs:element>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

fn bench_parse(c: &mut Criterion) {
    let small = make_catalog(10);
    let large = make_catalog(1000);
    c.bench_function("parse_small", |b| b.iter(|| dom::parse(black_box(&small))));
    c.bench_function("parse_large", |b| b.iter(|| dom::parse(black_box(&large))));
}

fn bench_xpath(c: &mut Criterion) {
    let doc = dom::parse(&make_catalog(1000)).expect("catalog parses");
    let ns = NamespaceContext::new().with_prefix("c", "urn:catalog");
    let resolver: &dyn NamespaceResolver = &ns;
    let compiled =
        XPath::compile_with("//c:book[c:price > 500]/c:title", Some(resolver)).expect("xpath compiles");

    c.bench_function("xpath_compiled", |b| {
        b.iter(|| dom::select_nodes_compiled(&doc, doc.root(), black_box(&compiled)))
    });
    c.bench_function("xpath_count", |b| {
        b.iter(|| dom::select_number(&doc, doc.root(), black_box("count(//c:book)"), &[&ns]))
    });
}

fn bench_edit(c: &mut Criterion) {
    let order = ["title", "author", "price"];
    c.bench_function("insert_ordered", |b| {
        b.iter(|| {
            let mut doc = dom::create_document_with_root("book", None).expect("document");
            let root = doc.document_element().expect("root");
            for name in ["price", "title", "author"].iter().cycle().take(60) {
                let element = dom::create_element(&mut doc, name, None).expect("element");
                dom::insert_element(&mut doc, root, element, &order).expect("insert");
            }
            doc
        })
    });
}

fn bench_serialize(c: &mut Criterion) {
    let doc = dom::parse(&make_catalog(1000)).expect("catalog parses");
    c.bench_function("serialize_large", |b| b.iter(|| dom::as_xml(&doc, doc.root())));
    c.bench_function("serialize_large_indented", |b| {
        b.iter(|| dom::as_xml_indented(&doc, doc.root(), true))
    });
}

fn bench_validate(c: &mut Criterion) {
    let schema = Schema::parse(CATALOG_XSD).expect("schema compiles");
    let doc = dom::parse(&make_catalog(1000)).expect("catalog parses");
    c.bench_function("validate_large", |b| b.iter(|| dom::validate(black_box(&doc), &schema)));
}

criterion_group!(
    benches,
    bench_parse,
    bench_xpath,
    bench_edit,
    bench_serialize,
    bench_validate
);
criterion_main!(benches);
