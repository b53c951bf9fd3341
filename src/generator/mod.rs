//! Design-pattern inference and transformation of schema documents.
//!
//! A transformation expands the master global elements into a
//! pattern-neutral shape, then re-emits the declarations:
//!
//! | pattern          | global elements | named complex types |
//! |------------------|-----------------|---------------------|
//! | Russian Doll     | masters only    | no                  |
//! | Venetian Blind   | masters only    | yes                 |
//! | Salami Slice     | all             | no                  |
//! | Garden of Eden   | all             | yes                 |

mod emit;
mod shape;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::TransformError;
use crate::schema::{DeclarationCounts, NodeId, SchemaDocument, SchemaKind};

use self::emit::Emitter;
use self::shape::ShapeSet;

/// Layout of global versus local declarations in a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DesignPattern {
    RussianDoll,
    VenetianBlind,
    SalamiSlice,
    GardenOfEden,
}

impl DesignPattern {
    pub const ALL: [DesignPattern; 4] = [
        Self::RussianDoll,
        Self::VenetianBlind,
        Self::SalamiSlice,
        Self::GardenOfEden,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RussianDoll => "russian-doll",
            Self::VenetianBlind => "venetian-blind",
            Self::SalamiSlice => "salami-slice",
            Self::GardenOfEden => "garden-of-eden",
        }
    }

    /// Every element is declared globally and used through references
    pub fn promotes_elements(self) -> bool {
        matches!(self, Self::SalamiSlice | Self::GardenOfEden)
    }

    /// Element content lives in named global complex types
    pub fn names_types(self) -> bool {
        matches!(self, Self::VenetianBlind | Self::GardenOfEden)
    }
}

impl fmt::Display for DesignPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DesignPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|pattern| pattern.as_str() == normalized)
            .ok_or_else(|| format!("unknown design pattern: {}", s))
    }
}

/// Transformation settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    /// Appended to an element name to name its promoted complex type
    pub type_suffix: String,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            type_suffix: "Type".to_string(),
        }
    }
}

/// Summary of a transformation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformReport {
    pub pattern: DesignPattern,
    /// Names of the master global elements the output was built from
    pub masters: Vec<String>,
    pub counts: DeclarationCounts,
    /// Source declarations with no counterpart in the output, as `kind name`
    pub dropped: Vec<String>,
}

/// A transformed document and its report
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub document: SchemaDocument,
    pub report: TransformReport,
}

/// Guess the pattern a document follows from its global declarations
pub fn infer_design_pattern(doc: &SchemaDocument) -> Option<DesignPattern> {
    let elements = doc.globals(SchemaKind::Element);
    let complex_types = doc.globals(SchemaKind::ComplexType).len();

    if complex_types > 0 {
        if elements.len() > 1 {
            return Some(DesignPattern::GardenOfEden);
        }
        let typed_by_global = elements.first().is_some_and(|element| {
            doc.attribute(*element, "type")
                .and_then(|value| doc.resolve_qname(value))
                .and_then(|qname| doc.find_global_ref(SchemaKind::ComplexType, &qname))
                .is_some_and(|decl| doc.kind(decl) == Some(SchemaKind::ComplexType))
        });
        return Some(if typed_by_global {
            DesignPattern::GardenOfEden
        } else {
            DesignPattern::VenetianBlind
        });
    }

    match elements.len() {
        0 => None,
        1 => Some(DesignPattern::RussianDoll),
        _ => Some(DesignPattern::SalamiSlice),
    }
}

/// Global elements no other global declaration refers to; all global
/// elements when every one of them is referenced
pub fn master_global_elements(doc: &SchemaDocument) -> Vec<NodeId> {
    let mut referenced = HashSet::new();
    for node in doc.descendants(doc.root()) {
        if doc.kind(node) != Some(SchemaKind::Element) {
            continue;
        }
        let Some(target) = doc
            .attribute(node, "ref")
            .and_then(|value| doc.resolve_qname(value))
            .and_then(|qname| doc.find_global_ref(SchemaKind::Element, &qname))
        else {
            continue;
        };
        if doc.top_level_ancestor(node) != Some(target) {
            referenced.insert(target);
        }
    }

    let globals = doc.globals(SchemaKind::Element);
    let masters: Vec<NodeId> = globals
        .iter()
        .copied()
        .filter(|element| !referenced.contains(element))
        .collect();
    if masters.is_empty() { globals } else { masters }
}

/// Name for a synthesized type: `{base}{suffix}`, then numbered until `taken` accepts it
pub(crate) fn type_name(base: &str, suffix: &str, taken: impl Fn(&str) -> bool) -> String {
    let candidate = format!("{}{}", base, suffix);
    if !taken(&candidate) {
        return candidate;
    }
    let mut n = 1;
    loop {
        let numbered = format!("{}{}", candidate, n);
        if !taken(&numbered) {
            return numbered;
        }
        n += 1;
    }
}

/// Rewrite a document into `pattern`.
///
/// Declarations unreachable from the master elements are dropped; a
/// declaration a remaining reference still needs is kept as it was.
pub fn transform(
    doc: &SchemaDocument,
    pattern: DesignPattern,
    options: &TransformOptions,
) -> Result<TransformOutput, TransformError> {
    let masters = master_global_elements(doc);
    if masters.is_empty() {
        return Err(TransformError::NoGlobalElements);
    }

    let shapes = ShapeSet::expand(doc, &masters);
    let mut out = doc.clone();
    out.clear_declarations()?;
    let out = Emitter::new(doc, &shapes, out, pattern, &options.type_suffix).run()?;

    let dropped: Vec<String> = doc
        .children(doc.root())
        .iter()
        .copied()
        .filter_map(|node| {
            let kind = doc.kind(node)?;
            let name = doc.name(node)?;
            if !kind.is_declaration() || out.find_global(kind, name).is_some() {
                return None;
            }
            Some(format!("{} {}", kind.local_name().unwrap_or("declaration"), name))
        })
        .collect();
    for declaration in &dropped {
        debug!(%declaration, "Dropped unreachable declaration");
    }

    let report = TransformReport {
        pattern,
        masters: masters
            .iter()
            .filter_map(|node| doc.name(*node).map(str::to_string))
            .collect(),
        counts: out.declaration_counts(),
        dropped,
    };
    info!(
        document = %doc.id(),
        %pattern,
        global_elements = report.counts.global_elements,
        complex_types = report.counts.complex_types,
        "Transformed schema"
    );
    Ok(TransformOutput {
        document: out,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
        xmlns:l="urn:line" targetNamespace="urn:line" elementFormDefault="qualified">
  <xs:element name="Line">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Point" maxOccurs="unbounded">
          <xs:complexType>
            <xs:attribute name="x" type="xs:int" use="required"/>
            <xs:attribute name="y" type="xs:int" use="required"/>
          </xs:complexType>
        </xs:element>
        <xs:choice>
          <xs:element name="Info">
            <xs:complexType>
              <xs:attribute name="label" type="xs:string"/>
            </xs:complexType>
          </xs:element>
          <xs:element name="Info">
            <xs:complexType>
              <xs:attribute name="code" type="xs:int"/>
            </xs:complexType>
          </xs:element>
        </xs:choice>
        <xs:element name="Info" minOccurs="0">
          <xs:complexType>
            <xs:attribute name="weight" type="xs:decimal"/>
          </xs:complexType>
        </xs:element>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

    fn line() -> SchemaDocument {
        SchemaDocument::parse("line.xsd", LINE).unwrap()
    }

    fn counts(pattern: DesignPattern) -> DeclarationCounts {
        transform(&line(), pattern, &TransformOptions::default())
            .unwrap()
            .report
            .counts
    }

    #[test]
    fn test_pattern_names() {
        assert_eq!(
            "garden-of-eden".parse::<DesignPattern>(),
            Ok(DesignPattern::GardenOfEden)
        );
        assert_eq!(
            "Venetian_Blind".parse::<DesignPattern>(),
            Ok(DesignPattern::VenetianBlind)
        );
        assert!("matryoshka".parse::<DesignPattern>().is_err());
        for pattern in DesignPattern::ALL {
            assert_eq!(pattern.to_string().parse::<DesignPattern>(), Ok(pattern));
        }
    }

    #[test]
    fn test_infer_design_pattern() {
        assert_eq!(infer_design_pattern(&line()), Some(DesignPattern::RussianDoll));
        let empty = SchemaDocument::new("empty.xsd", None);
        assert_eq!(infer_design_pattern(&empty), None);

        let inferred = |pattern| {
            let out = transform(&line(), pattern, &TransformOptions::default()).unwrap();
            infer_design_pattern(&out.document)
        };
        assert_eq!(inferred(DesignPattern::RussianDoll), Some(DesignPattern::RussianDoll));
        assert_eq!(inferred(DesignPattern::SalamiSlice), Some(DesignPattern::SalamiSlice));
        assert_eq!(inferred(DesignPattern::GardenOfEden), Some(DesignPattern::GardenOfEden));
        // A lone global element typed by a global complex type reads as Garden of Eden
        assert_eq!(inferred(DesignPattern::VenetianBlind), Some(DesignPattern::GardenOfEden));
    }

    #[test]
    fn test_russian_doll_counts() {
        let counts = counts(DesignPattern::RussianDoll);
        assert_eq!(counts.global_elements, 1);
        assert_eq!(counts.complex_types, 0);
        assert_eq!(counts.simple_types, 0);
        assert_eq!(counts.local_elements, 4);
    }

    #[test]
    fn test_venetian_blind_counts() {
        let counts = counts(DesignPattern::VenetianBlind);
        assert_eq!(counts.global_elements, 1);
        assert_eq!(counts.complex_types, 5);
    }

    #[test]
    fn test_salami_slice_counts() {
        let counts = counts(DesignPattern::SalamiSlice);
        assert_eq!(counts.global_elements, 3);
        assert_eq!(counts.complex_types, 0);
        assert_eq!(counts.element_refs, 2);
        // The later Info declarations have other shapes and stay local
        assert_eq!(counts.local_elements, 2);
    }

    #[test]
    fn test_garden_of_eden_names_types() {
        let out = transform(&line(), DesignPattern::GardenOfEden, &TransformOptions::default()).unwrap();
        assert_eq!(out.report.counts.global_elements, 3);
        assert_eq!(out.report.counts.complex_types, 5);
        let mut names: Vec<_> = out
            .document
            .globals(SchemaKind::ComplexType)
            .into_iter()
            .filter_map(|node| out.document.name(node).map(str::to_string))
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec!["InfoType", "InfoType1", "InfoType2", "LineType", "PointType"]
        );
        assert_eq!(out.report.masters, vec!["Line"]);
    }

    #[test]
    fn test_round_trip_back_to_russian_doll() {
        let options = TransformOptions::default();
        let garden = transform(&line(), DesignPattern::GardenOfEden, &options).unwrap();
        let doll = transform(&garden.document, DesignPattern::RussianDoll, &options).unwrap();
        assert_eq!(doll.report.counts.global_elements, 1);
        assert_eq!(doll.report.counts.complex_types, 0);
        assert_eq!(doll.report.counts.simple_types, 0);
        assert_eq!(doll.report.masters, vec!["Line"]);
    }

    #[test]
    fn test_recursive_type_survives_russian_doll() {
        let tree = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
            xmlns:t="urn:t" targetNamespace="urn:t">
  <xs:element name="tree" type="t:NodeType"/>
  <xs:complexType name="NodeType">
    <xs:sequence>
      <xs:element name="node" type="t:NodeType" minOccurs="0" maxOccurs="unbounded"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#;
        let doc = SchemaDocument::parse("tree.xsd", tree).unwrap();
        let out = transform(&doc, DesignPattern::RussianDoll, &TransformOptions::default()).unwrap();
        assert_eq!(out.report.counts.global_elements, 1);
        assert_eq!(out.report.counts.complex_types, 1);
        assert!(out.document.find_global(SchemaKind::ComplexType, "NodeType").is_some());
    }

    #[test]
    fn test_groups_flatten_only_for_russian_doll() {
        let grouped = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
            xmlns:g="urn:g" targetNamespace="urn:g">
  <xs:element name="person">
    <xs:complexType>
      <xs:group ref="g:names"/>
      <xs:attributeGroup ref="g:ids"/>
    </xs:complexType>
  </xs:element>
  <xs:group name="names">
    <xs:sequence>
      <xs:element name="first" type="xs:string"/>
      <xs:element name="last" type="xs:string"/>
    </xs:sequence>
  </xs:group>
  <xs:attributeGroup name="ids">
    <xs:attribute name="id" type="xs:ID"/>
  </xs:attributeGroup>
  <xs:simpleType name="Unused">
    <xs:restriction base="xs:string"/>
  </xs:simpleType>
</xs:schema>"#;
        let doc = SchemaDocument::parse("g.xsd", grouped).unwrap();
        let options = TransformOptions::default();

        let blind = transform(&doc, DesignPattern::VenetianBlind, &options).unwrap();
        assert_eq!(blind.report.counts.groups, 1);
        assert_eq!(blind.report.counts.attribute_groups, 1);
        assert_eq!(blind.report.dropped, vec!["simpleType Unused"]);

        let doll = transform(&doc, DesignPattern::RussianDoll, &options).unwrap();
        assert_eq!(doll.report.counts.groups, 0);
        assert_eq!(doll.report.counts.attribute_groups, 0);
        assert_eq!(doll.report.counts.local_elements, 2);
    }

    #[test]
    fn test_form_kept_on_local_elements() {
        let qualified = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
            xmlns:f="urn:f" targetNamespace="urn:f">
  <xs:element name="root">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="q" type="xs:string" form="qualified"/>
        <xs:element name="u" type="xs:string"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;
        let doc = SchemaDocument::parse("f.xsd", qualified).unwrap();
        for pattern in DesignPattern::ALL {
            let out = transform(&doc, pattern, &TransformOptions::default()).unwrap();
            let xml = out.document.to_xml().unwrap();
            match out.document.find_global(SchemaKind::Element, "q") {
                // Global declarations are always qualified and may not carry a form
                Some(global) => {
                    assert!(pattern.promotes_elements(), "{pattern}");
                    assert_eq!(out.document.attribute(global, "form"), None, "{pattern}");
                    assert!(!xml.contains("form="), "{pattern}");
                }
                None => {
                    assert!(!pattern.promotes_elements(), "{pattern}");
                    assert_eq!(xml.matches(r#"form="qualified""#).count(), 1, "{pattern}");
                }
            }
        }
    }

    #[test]
    fn test_no_global_elements() {
        let doc = SchemaDocument::new("types.xsd", Some("urn:types"));
        assert_eq!(
            transform(&doc, DesignPattern::GardenOfEden, &TransformOptions::default()).unwrap_err(),
            TransformError::NoGlobalElements
        );
    }

    #[test]
    fn test_type_name_numbering() {
        let taken = ["InfoType", "InfoType1"];
        assert_eq!(type_name("Info", "Type", |n| taken.contains(&n)), "InfoType2");
        assert_eq!(type_name("Point", "Type", |_| false), "PointType");
    }
}
