mod common;

use common::test_helpers::{collect_tree, load_fixture};
use xml_axi::{ComponentType, ModelRegistry};

fn whole_tree(registry: &mut ModelRegistry, id: xml_axi::ModelId) -> Vec<xml_axi::ComponentRef> {
    let model = registry.model(id).unwrap();
    let root = model.reference(model.root());
    collect_tree(registry, root)
}

#[test]
fn test_proxy_chains_terminate_within_document_count() {
    let (mut registry, po) = load_fixture("po.xsd");
    let documents = registry.len();
    let tree = whole_tree(&mut registry, po);

    for component in tree {
        if registry.component_type(component).unwrap() != ComponentType::Proxy {
            continue;
        }
        let (terminal, depth) = registry.terminal(component).unwrap();
        assert_ne!(registry.component_type(terminal).unwrap(), ComponentType::Proxy);
        // One step per document crossed, plus one for a same-document content model
        assert!(depth <= documents + 1, "{component} needed {depth} steps");
    }
}

#[test]
fn test_ref_set_symmetry() {
    let (mut registry, id) = load_fixture("rename.xsd");
    whole_tree(&mut registry, id);
    let model = registry.model(id).unwrap();

    for (shared_id, shared) in model.iter().filter(|(_, c)| c.is_shared()) {
        let pointing = model
            .iter()
            .filter(|(_, c)| c.component_type() == ComponentType::Reference)
            .filter(|(_, c)| c.shared() == Some(shared_id))
            .count();
        assert_eq!(shared.ref_set().len(), pointing);
    }

    let b = model
        .find_global(xml_axi::ComponentKind::Element, "b")
        .unwrap();
    assert_eq!(model.get(b).unwrap().ref_set().len(), 2);
}

#[test]
fn test_children_of_references_and_proxies_are_proxies() {
    for fixture in ["po.xsd", "rename.xsd", "line.xsd"] {
        let (mut registry, id) = load_fixture(fixture);
        let tree = whole_tree(&mut registry, id);
        for component in tree {
            let delegated = matches!(
                registry.component_type(component).unwrap(),
                ComponentType::Reference | ComponentType::Proxy
            ) || registry.component(component).unwrap().content_type().is_some();
            if !delegated {
                continue;
            }
            for child in registry.children(component).unwrap() {
                assert_eq!(
                    registry.component_type(child).unwrap(),
                    ComponentType::Proxy,
                    "{fixture}: child {child} of {component}"
                );
            }
        }
    }
}

#[test]
fn test_every_component_but_the_root_has_a_parent() {
    let (mut registry, po) = load_fixture("po.xsd");
    let tree = whole_tree(&mut registry, po);
    let root = registry.model(po).unwrap().root();

    for component in tree {
        let parent = registry.component(component).unwrap().parent();
        if component.id == root {
            assert!(parent.is_none());
        } else {
            let parent = parent.unwrap_or_else(|| panic!("{component} has no parent"));
            assert!(registry.model(po).unwrap().children(parent).contains(&component.id));
        }
    }
    assert!(registry.verify(po).unwrap().is_empty());
}

#[test]
fn test_cross_namespace_components_are_proxies_into_other_models() {
    let (mut registry, po) = load_fixture("po.xsd");
    assert_eq!(registry.len(), 3);
    let tree = whole_tree(&mut registry, po);

    let mut foreign = 0;
    for component in tree {
        let namespace = registry.target_namespace(component).unwrap();
        if namespace.as_deref() == Some("urn:po") {
            continue;
        }
        foreign += 1;
        assert_eq!(component.model, po);
        assert_eq!(registry.component_type(component).unwrap(), ComponentType::Proxy);
        let (terminal, _) = registry.terminal(component).unwrap();
        assert_ne!(terminal.model, po);
        let owner = registry.model(terminal.model).unwrap();
        assert_eq!(owner.document().target_namespace(), namespace.as_deref());
        assert_ne!(owner.instance(), registry.model(po).unwrap().instance());
    }
    // Address content under shipTo and billTo, plus the items subtree
    assert!(foreign >= 10, "only {foreign} foreign components");
}

#[test]
fn test_every_loaded_model_verifies() {
    let (registry, _) = load_fixture("po.xsd");
    for model in registry.models() {
        assert!(registry.verify(model.id()).unwrap().is_empty());
    }
}
