//! Schemas and documents shared by the integration tests

pub const NOTE_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="note">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="to" type="xs:string"/>
        <xs:element name="from" type="xs:string"/>
        <xs:element name="body" type="xs:string"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>
"#;

pub const NOTE_VALID: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<note xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
      xsi:noNamespaceSchemaLocation="note.xsd">
  <to>Tove</to>
  <from>Jani</from>
  <body>Don't forget me this weekend!</body>
</note>
"#;

/// `from` is missing; libxml2 reports it at the `body` element on line 5
pub const NOTE_MISSING_CHILD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<note xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
      xsi:noNamespaceSchemaLocation="note.xsd">
  <to>Tove</to>
  <body>Don't forget me this weekend!</body>
</note>
"#;

pub const BEANS_XSD: &str = r###"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns="ns:beans"
           targetNamespace="ns:beans"
           elementFormDefault="qualified">
  <xs:element name="beans">
    <xs:complexType>
      <xs:sequence>
        <xs:element ref="bean" maxOccurs="unbounded"/>
        <xs:any namespace="##other" processContents="strict" minOccurs="0" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
  <xs:element name="bean">
    <xs:complexType>
      <xs:attribute name="id" type="xs:ID" use="required"/>
      <xs:attribute name="class" type="xs:string"/>
    </xs:complexType>
  </xs:element>
</xs:schema>
"###;

pub const UTIL_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns="ns:util"
           targetNamespace="ns:util"
           elementFormDefault="qualified">
  <xs:element name="list">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="value" type="xs:string" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>
"#;

pub const BEANS_VALID: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<beans xmlns="ns:beans" xmlns:util="ns:util"
       xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
       xsi:schemaLocation="ns:beans beans.xsd ns:util util.xsd">
  <bean id="first" class="com.example.First"/>
  <util:list>
    <util:value>one</util:value>
  </util:list>
</beans>
"#;

/// Unknown attribute on line 5, disallowed element name on line 7
pub const BEANS_TWO_VIOLATIONS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<beans xmlns="ns:beans" xmlns:util="ns:util"
       xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
       xsi:schemaLocation="ns:beans beans.xsd ns:util util.xsd">
  <bean id="first" noSuchAttribute="x"/>
  <util:list>
    <util:item>one</util:item>
  </util:list>
</beans>
"#;

pub const UNREACHABLE_SCHEMA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<beans xmlns="ns:beans"
       xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
       xsi:schemaLocation="ns:beans http://www.google.com">
  <bean id="first"/>
</beans>
"#;

pub const NO_SCHEMA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project>
  <name>plain</name>
</project>
"#;

/// Note schema split in two: the element lives here, its type in `NOTE_TYPES_XSD`
pub const NOTE_WITH_INCLUDE_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:include schemaLocation="types.xsd"/>
  <xs:element name="note" type="NoteType"/>
</xs:schema>
"#;

pub const NOTE_TYPES_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:complexType name="NoteType">
    <xs:sequence>
      <xs:element name="to" type="xs:string"/>
      <xs:element name="from" type="xs:string"/>
      <xs:element name="body" type="xs:string"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>
"#;

/// Remote no-namespace schema whose file name exists next to the document
pub const PROJECT_NO_NAMESPACE: &str = "<project xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xsi:noNamespaceSchemaLocation=\"http://simple.com/test.xsd\">\n</project>\n";

/// Binds the default namespace to XSD but refers to `xs:anyType`, so it never compiles
pub const PROJECT_BROKEN_XSD: &str = "<schema xmlns=\"http://www.w3.org/2001/XMLSchema\" elementFormDefault=\"qualified\">\n<element name=\"project\" type=\"xs:anyType\"/>\n</schema>";

pub const CHANGES_ONE_LINE: &str = "<document xmlns=\"http://maven.apache.org/changes/1.0.0\" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xsi:schemaLocation=\"http://maven.apache.org/changes/1.0.0 http://maven.apache.org/xsd/changes-1.0.0.xsd\"><body/></document>";

pub const CHANGES_INDENTED: &str = "<document xmlns=\"http://maven.apache.org/changes/1.0.0\" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xsi:schemaLocation=\"http://maven.apache.org/changes/1.0.0 http://maven.apache.org/xsd/changes-1.0.0.xsd\">\n    <body/>\n</document>\n";

pub const WORD_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="w">
    <xs:simpleType>
      <xs:restriction base="xs:string">
        <xs:enumeration value="café"/>
      </xs:restriction>
    </xs:simpleType>
  </xs:element>
</xs:schema>
"#;
