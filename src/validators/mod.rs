//! XML Schema validation
//!
//! An XSD 1.0 subset: element and attribute declarations, named and anonymous
//! types, model groups with occurrence bounds, wildcards, derivation by
//! extension and restriction, simple types with facets, `xsi:nil`,
//! `xsi:type` and `xs:include`/`xs:import`.
//!
//! Not supported: identity constraints (`xs:key`, `xs:unique`, `xs:keyref`)
//! are ignored, substitution groups are not expanded, and `xs:redefine` is
//! rejected.

mod builders;
pub mod builtins;
mod complex_types;
mod document_validation;
pub mod facets;
mod models;
pub mod particles;
mod schemas;
mod simple_types;
pub mod wildcards;

pub use builtins::Builtin;
pub use schemas::Schema;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::parser::{parse_str, parse_str_with, ParseOptions};

    const ORDER_XSD: &str = r#"
        <xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                   xmlns="urn:shop" targetNamespace="urn:shop"
                   elementFormDefault="qualified">
            <xs:element name="order" type="OrderType"/>
            <xs:complexType name="OrderType">
                <xs:sequence>
                    <xs:element name="customer" type="xs:string"/>
                    <xs:element name="line" type="LineType" maxOccurs="unbounded"/>
                    <xs:element name="note" type="xs:string" minOccurs="0" nillable="true"/>
                </xs:sequence>
                <xs:attribute name="id" type="xs:ID" use="required"/>
                <xs:attribute name="status" type="StatusType" default="open"/>
            </xs:complexType>
            <xs:complexType name="LineType">
                <xs:simpleContent>
                    <xs:extension base="Quantity">
                        <xs:attribute name="sku" type="Sku" use="required"/>
                    </xs:extension>
                </xs:simpleContent>
            </xs:complexType>
            <xs:simpleType name="Quantity">
                <xs:restriction base="xs:positiveInteger">
                    <xs:maxInclusive value="99"/>
                </xs:restriction>
            </xs:simpleType>
            <xs:simpleType name="Sku">
                <xs:restriction base="xs:string">
                    <xs:pattern value="[A-Z]{3}-[0-9]{4}"/>
                </xs:restriction>
            </xs:simpleType>
            <xs:simpleType name="StatusType">
                <xs:restriction base="xs:token">
                    <xs:enumeration value="open"/>
                    <xs:enumeration value="shipped"/>
                </xs:restriction>
            </xs:simpleType>
        </xs:schema>"#;

    fn order(body: &str) -> String {
        format!(r#"<order xmlns="urn:shop" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" {}</order>"#, body)
    }

    fn check(schema: &Schema, xml: &str) -> Result<(), crate::error::ValidationError> {
        schema.validate(&parse_str(xml).unwrap())
    }

    #[test]
    fn test_valid_order() {
        let schema = Schema::parse(ORDER_XSD).unwrap();
        assert_eq!(schema.target_namespace(), Some("urn:shop"));
        let xml = order(r#"id="o1" status=" shipped "><customer>Ann</customer><line sku="ABC-0001">3</line><line sku="XYZ-9999">99</line>"#);
        check(&schema, &xml).unwrap();
    }

    #[test]
    fn test_missing_required_attribute() {
        let schema = Schema::parse(ORDER_XSD).unwrap();
        let xml = order(r#"><customer>Ann</customer><line sku="ABC-0001">3</line>"#);
        let error = check(&schema, &xml).unwrap_err();
        assert!(error.message.contains("required attribute"), "{}", error);
        assert_eq!(error.path.as_deref(), Some("/order"));
    }

    #[test]
    fn test_content_model_violations() {
        let schema = Schema::parse(ORDER_XSD).unwrap();

        let missing_line = order(r#"id="o1"><customer>Ann</customer>"#);
        let error = check(&schema, &missing_line).unwrap_err();
        assert!(error.message.contains("incomplete"), "{}", error);

        let wrong_order = order(r#"id="o1"><line sku="ABC-0001">1</line><customer>Ann</customer>"#);
        let error = check(&schema, &wrong_order).unwrap_err();
        assert!(error.message.contains("not expected"), "{}", error);
        assert_eq!(error.path.as_deref(), Some("/order/line"));
    }

    #[test]
    fn test_simple_value_violations() {
        let schema = Schema::parse(ORDER_XSD).unwrap();
        let too_many = order(r#"id="o1"><customer>Ann</customer><line sku="ABC-0001">100</line>"#);
        assert!(check(&schema, &too_many).is_err());

        let bad_sku = order(r#"id="o1"><customer>Ann</customer><line sku="abc-1">1</line>"#);
        assert!(check(&schema, &bad_sku).is_err());

        let bad_status = order(r#"id="o1" status="lost"><customer>Ann</customer><line sku="ABC-0001">1</line>"#);
        assert!(check(&schema, &bad_status).is_err());
    }

    #[test]
    fn test_nil() {
        let schema = Schema::parse(ORDER_XSD).unwrap();
        let nil = order(r#"id="o1"><customer>Ann</customer><line sku="ABC-0001">1</line><note xsi:nil="true"/>"#);
        check(&schema, &nil).unwrap();

        let nil_with_content =
            order(r#"id="o1"><customer>Ann</customer><line sku="ABC-0001">1</line><note xsi:nil="true">x</note>"#);
        assert!(check(&schema, &nil_with_content).is_err());

        let not_nillable = order(r#"id="o1"><customer xsi:nil="true"/><line sku="ABC-0001">1</line>"#);
        assert!(check(&schema, &not_nillable).is_err());
    }

    #[test]
    fn test_unknown_root() {
        let schema = Schema::parse(ORDER_XSD).unwrap();
        let error = check(&schema, "<invoice/>").unwrap_err();
        assert!(error.message.contains("no global declaration"));
    }

    #[test]
    fn test_unaware_document_does_not_match_namespaced_schema() {
        let schema = Schema::parse(ORDER_XSD).unwrap();
        let xml = order(r#"id="o1"><customer>Ann</customer><line sku="ABC-0001">3</line>"#);
        let doc = parse_str_with(&xml, &ParseOptions::new().namespace_aware(false)).unwrap();
        assert!(!schema.is_valid(&doc));
    }

    #[test]
    fn test_extension_and_choice() {
        let schema = Schema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:complexType name="Base">
                    <xs:sequence><xs:element name="a" type="xs:int"/></xs:sequence>
                    <xs:attribute name="version" type="xs:int"/>
                </xs:complexType>
                <xs:complexType name="Derived">
                    <xs:complexContent>
                        <xs:extension base="Base">
                            <xs:choice>
                                <xs:element name="b" type="xs:boolean"/>
                                <xs:element name="c" type="xs:date"/>
                            </xs:choice>
                        </xs:extension>
                    </xs:complexContent>
                </xs:complexType>
                <xs:element name="root" type="Derived"/>
            </xs:schema>"#,
        )
        .unwrap();
        check(&schema, r#"<root version="2"><a>1</a><b>true</b></root>"#).unwrap();
        check(&schema, "<root><a>1</a><c>2024-05-01</c></root>").unwrap();
        assert!(check(&schema, "<root><a>1</a></root>").is_err());
        assert!(check(&schema, "<root><a>1</a><b>true</b><c>2024-05-01</c></root>").is_err());
        assert!(check(&schema, r#"<root version="x"><a>1</a><b>1</b></root>"#).is_err());
    }

    #[test]
    fn test_all_group_and_mixed() {
        let schema = Schema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:element name="person">
                    <xs:complexType>
                        <xs:all>
                            <xs:element name="name" type="xs:string"/>
                            <xs:element name="age" type="xs:int" minOccurs="0"/>
                        </xs:all>
                    </xs:complexType>
                </xs:element>
                <xs:element name="para">
                    <xs:complexType mixed="true">
                        <xs:sequence>
                            <xs:element name="b" type="xs:string" minOccurs="0" maxOccurs="unbounded"/>
                        </xs:sequence>
                    </xs:complexType>
                </xs:element>
            </xs:schema>"#,
        )
        .unwrap();
        check(&schema, "<person><age>4</age><name>Kim</name></person>").unwrap();
        assert!(check(&schema, "<person><age>4</age></person>").is_err());
        assert!(check(&schema, "<person><name>a</name><name>b</name></person>").is_err());
        assert!(check(&schema, "<person>text<name>a</name></person>").is_err());
        check(&schema, "<para>Some <b>bold</b> text</para>").unwrap();
    }

    #[test]
    fn test_wildcards() {
        let schema = Schema::parse(
            r###"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                          targetNamespace="urn:t" xmlns:t="urn:t">
                <xs:element name="envelope">
                    <xs:complexType>
                        <xs:sequence>
                            <xs:any namespace="##other" processContents="skip" maxOccurs="unbounded"/>
                        </xs:sequence>
                        <xs:anyAttribute namespace="##any" processContents="lax"/>
                    </xs:complexType>
                </xs:element>
            </xs:schema>"###,
        )
        .unwrap();
        check(&schema, r#"<t:envelope xmlns:t="urn:t" xmlns:x="urn:x" extra="1"><x:payload><x:anything/></x:payload></t:envelope>"#).unwrap();
        assert!(check(&schema, r#"<t:envelope xmlns:t="urn:t"><t:payload/></t:envelope>"#).is_err());
        assert!(check(&schema, r#"<t:envelope xmlns:t="urn:t"><payload/></t:envelope>"#).is_err());
    }

    #[test]
    fn test_list_and_union() {
        let schema = Schema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:simpleType name="Sizes">
                    <xs:restriction>
                        <xs:simpleType><xs:list itemType="xs:int"/></xs:simpleType>
                        <xs:maxLength value="3"/>
                    </xs:restriction>
                </xs:simpleType>
                <xs:simpleType name="SizeOrAuto">
                    <xs:union memberTypes="xs:int">
                        <xs:simpleType>
                            <xs:restriction base="xs:string"><xs:enumeration value="auto"/></xs:restriction>
                        </xs:simpleType>
                    </xs:union>
                </xs:simpleType>
                <xs:element name="sizes" type="Sizes"/>
                <xs:element name="size" type="SizeOrAuto"/>
            </xs:schema>"#,
        )
        .unwrap();
        check(&schema, "<sizes> 1 2\n3 </sizes>").unwrap();
        assert!(check(&schema, "<sizes>1 2 3 4</sizes>").is_err());
        assert!(check(&schema, "<sizes>1 x</sizes>").is_err());
        check(&schema, "<size>auto</size>").unwrap();
        check(&schema, "<size>12</size>").unwrap();
        assert!(check(&schema, "<size>big</size>").is_err());
    }

    #[test]
    fn test_groups_and_refs() {
        let schema = Schema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:group name="names">
                    <xs:sequence>
                        <xs:element ref="first"/>
                        <xs:element name="last" type="xs:string"/>
                    </xs:sequence>
                </xs:group>
                <xs:attributeGroup name="audit">
                    <xs:attribute name="created" type="xs:dateTime" use="required"/>
                </xs:attributeGroup>
                <xs:element name="first" type="xs:string"/>
                <xs:element name="person">
                    <xs:complexType>
                        <xs:group ref="names"/>
                        <xs:attributeGroup ref="audit"/>
                    </xs:complexType>
                </xs:element>
            </xs:schema>"#,
        )
        .unwrap();
        check(&schema, r#"<person created="2024-01-01T00:00:00Z"><first>A</first><last>B</last></person>"#).unwrap();
        assert!(check(&schema, "<person><first>A</first><last>B</last></person>").is_err());
    }

    #[test]
    fn test_xsi_type() {
        let schema = Schema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:element name="value" type="xs:anySimpleType"/>
            </xs:schema>"#,
        )
        .unwrap();
        let typed = |value: &str| {
            format!(
                r#"<value xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xs="http://www.w3.org/2001/XMLSchema" xsi:type="xs:int">{}</value>"#,
                value
            )
        };
        check(&schema, &typed("42")).unwrap();
        assert!(check(&schema, &typed("forty-two")).is_err());
    }

    #[test]
    fn test_fixed_and_default() {
        let schema = Schema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:element name="version" type="xs:decimal" fixed="1.0"/>
            </xs:schema>"#,
        )
        .unwrap();
        check(&schema, "<version>1.0</version>").unwrap();
        check(&schema, "<version/>").unwrap();
        assert!(check(&schema, "<version>2.0</version>").is_err());
    }

    #[test]
    fn test_attribute_value_constraints() {
        let schema = |attribute: &str| {
            Schema::parse(&format!(
                r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                    <xs:element name="item">
                        <xs:complexType>{}</xs:complexType>
                    </xs:element>
                </xs:schema>"#,
                attribute
            ))
        };

        let valid = schema(r#"<xs:attribute name="active" type="xs:boolean" default="true"/>"#).unwrap();
        check(&valid, "<item/>").unwrap();
        check(&valid, r#"<item active="0"/>"#).unwrap();

        let bad_default = schema(r#"<xs:attribute name="active" type="xs:boolean" default="yes"/>"#).unwrap_err();
        assert!(bad_default.to_string().contains("default value 'yes'"), "{}", bad_default);

        let bad_fixed = schema(r#"<xs:attribute name="size" type="xs:int" fixed="large"/>"#).unwrap_err();
        assert!(bad_fixed.to_string().contains("fixed value 'large'"), "{}", bad_fixed);

        let required = schema(r#"<xs:attribute name="size" type="xs:int" use="required" default="1"/>"#).unwrap_err();
        assert!(matches!(required, Error::Schema(_)));
    }

    #[test]
    fn test_schema_errors() {
        let not_schema = Schema::parse("<root/>").unwrap_err();
        assert!(matches!(not_schema, Error::Schema(_)));

        let unknown_type = Schema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:element name="a" type="Missing"/>
            </xs:schema>"#,
        )
        .unwrap_err();
        assert!(unknown_type.to_string().contains("unknown type"), "{}", unknown_type);

        let circular = Schema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:simpleType name="A"><xs:restriction base="B"/></xs:simpleType>
                <xs:simpleType name="B"><xs:restriction base="A"/></xs:simpleType>
            </xs:schema>"#,
        )
        .unwrap_err();
        assert!(circular.to_string().contains("circular"), "{}", circular);

        let include = Schema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:include schemaLocation="other.xsd"/>
            </xs:schema>"#,
        )
        .unwrap_err();
        assert!(include.to_string().contains("base directory"), "{}", include);
    }

    #[test]
    fn test_missing_schema_file() {
        let error = Schema::from_file("path/to/nonexistent.xsd").unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }
}
