mod common;

use common::test_helpers::{TestFixtures, child_names, load_fixture};
use xml_axi::{
    ComponentKind, ComponentType, DesignPattern, SchemaDocument, SchemaKind, TransformError,
    TransformOptions, infer_design_pattern, transform,
};

fn line() -> SchemaDocument {
    let fixtures = TestFixtures::new();
    SchemaDocument::parse("line.xsd", &fixtures.schema_text("line.xsd")).unwrap()
}

#[test]
fn test_line_round_trip_through_garden_of_eden() {
    let options = TransformOptions::default();
    let source = line();
    assert_eq!(infer_design_pattern(&source), Some(DesignPattern::RussianDoll));

    let garden = transform(&source, DesignPattern::GardenOfEden, &options).unwrap();
    assert_eq!(garden.report.counts.global_elements, 3);
    assert_eq!(garden.report.counts.complex_types, 5);

    let doll = transform(&garden.document, DesignPattern::RussianDoll, &options).unwrap();
    assert_eq!(doll.report.counts.global_elements, 1);
    assert_eq!(doll.report.counts.complex_types, 0);
    assert_eq!(doll.report.counts.simple_types, 0);
    assert_eq!(
        doll.report.counts.local_elements,
        source.declaration_counts().local_elements
    );
}

#[test]
fn test_distinct_names_all_become_globals_in_garden_of_eden() {
    let options = TransformOptions::default();
    let fixtures = TestFixtures::new();
    let source =
        SchemaDocument::parse("line_numbered.xsd", &fixtures.schema_text("line_numbered.xsd")).unwrap();

    let garden = transform(&source, DesignPattern::GardenOfEden, &options).unwrap();
    assert_eq!(garden.report.counts.global_elements, 5);
    assert_eq!(garden.report.counts.complex_types, 5);
    assert_eq!(garden.report.counts.element_refs, 4);
    assert_eq!(garden.report.counts.local_elements, 0);
    for name in ["Info1Type", "Info2Type", "Info3Type", "LineType", "PointType"] {
        assert!(garden.document.find_global(SchemaKind::ComplexType, name).is_some(), "{name}");
    }

    let doll = transform(&garden.document, DesignPattern::RussianDoll, &options).unwrap();
    assert_eq!(doll.report.counts.global_elements, 1);
    assert_eq!(doll.report.counts.complex_types, 0);
    assert_eq!(doll.report.counts.simple_types, 0);
    assert_eq!(doll.report.counts.local_elements, 4);
}

#[test]
fn test_transformed_documents_serialize_and_reparse() {
    let options = TransformOptions::default();
    for pattern in DesignPattern::ALL {
        let output = transform(&line(), pattern, &options).unwrap();
        let xml = output.document.to_xml().unwrap();
        let reparsed = SchemaDocument::parse("line.xsd", &xml).unwrap();
        assert_eq!(reparsed.declaration_counts(), output.report.counts, "{pattern}");
    }
}

#[test]
fn test_custom_type_suffix() {
    let options = TransformOptions {
        type_suffix: "Kind".to_string(),
    };
    let output = transform(&line(), DesignPattern::VenetianBlind, &options).unwrap();
    let doc = &output.document;
    assert!(doc.find_global(SchemaKind::ComplexType, "LineKind").is_some());
    assert!(doc.find_global(SchemaKind::ComplexType, "PointKind").is_some());
    assert!(doc.find_global(SchemaKind::ComplexType, "LineType").is_none());
}

#[test]
fn test_registry_transform_preserves_component_identity() {
    let (mut registry, id) = load_fixture("line.xsd");
    let model = registry.model(id).unwrap();
    let line_element = model.find_global(ComponentKind::Element, "Line").unwrap();
    let root = model.reference(model.root());

    let report = registry.transform(id, DesignPattern::GardenOfEden).unwrap();
    assert_eq!(report.pattern, DesignPattern::GardenOfEden);
    assert_eq!(report.masters, vec!["Line"]);

    let model = registry.model(id).unwrap();
    assert_eq!(model.schema_design_pattern(), Some(DesignPattern::GardenOfEden));
    assert_eq!(model.find_global(ComponentKind::Element, "Line"), Some(line_element));
    assert_eq!(model.global_elements().len(), 3);
    assert_eq!(model.content_models().len(), 5);
    let line = model.get(line_element).unwrap();
    assert!(line.content_type().is_some());
    assert!(registry.verify(id).unwrap().is_empty());

    let mut names = child_names(&mut registry, root);
    names.sort();
    assert_eq!(
        names,
        vec!["Info", "InfoType", "InfoType1", "InfoType2", "Line", "LineType", "Point", "PointType"]
    );

    registry.transform(id, DesignPattern::RussianDoll).unwrap();
    let model = registry.model(id).unwrap();
    assert_eq!(model.find_global(ComponentKind::Element, "Line"), Some(line_element));
    assert_eq!(model.global_elements().len(), 1);
    assert!(model.content_models().is_empty());
    assert!(model.get(line_element).unwrap().content_type().is_none());
    assert!(registry.verify(id).unwrap().is_empty());
}

#[test]
fn test_salami_slice_through_registry_uses_references() {
    let (mut registry, id) = load_fixture("line.xsd");
    registry.transform(id, DesignPattern::SalamiSlice).unwrap();

    let model = registry.model(id).unwrap();
    let point = model.find_global(ComponentKind::Element, "Point").unwrap();
    let info = model.find_global(ComponentKind::Element, "Info").unwrap();
    assert_eq!(model.get(point).unwrap().ref_set().len(), 1);
    assert_eq!(model.get(info).unwrap().ref_set().len(), 1);
    let references = model
        .iter()
        .filter(|(_, c)| c.component_type() == ComponentType::Reference)
        .count();
    assert_eq!(references, 2);
    assert!(registry.verify(id).unwrap().is_empty());
}

#[test]
fn test_foreign_references_survive_transformation() {
    let (mut registry, po) = load_fixture("po.xsd");
    let report = registry.transform(po, DesignPattern::RussianDoll).unwrap();
    assert_eq!(report.masters, vec!["purchaseOrder"]);
    assert_eq!(report.counts.global_elements, 1);
    assert_eq!(report.counts.complex_types, 0);
    // Inlined into purchaseOrder
    assert_eq!(
        report.dropped,
        vec!["element comment", "complexType PurchaseOrderType"]
    );

    let doc = registry.model(po).unwrap().document();
    assert_eq!(doc.external_refs().len(), 2);
    let xml = doc.to_xml().unwrap();
    assert!(xml.contains(r#"type="ad:USAddress""#));
    assert!(xml.contains(r#"ref="it:items""#));
    assert!(registry.verify(po).unwrap().is_empty());

    // The imported models are untouched
    assert_eq!(registry.len(), 3);
    for model in registry.models().filter(|m| m.id() != po) {
        assert_eq!(model.schema_design_pattern(), None);
    }
}

#[test]
fn test_schema_without_elements_cannot_be_transformed() {
    let fixtures = TestFixtures::new();
    let address =
        SchemaDocument::parse("address.xsd", &fixtures.schema_text("address.xsd")).unwrap();
    assert_eq!(
        transform(&address, DesignPattern::SalamiSlice, &TransformOptions::default()).unwrap_err(),
        TransformError::NoGlobalElements
    );
}
