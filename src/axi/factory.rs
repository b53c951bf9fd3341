use super::component::{
    Component, ComponentId, ComponentKind, ComponentType, CompositorKind, ContentModelKind,
};
use super::model::AxiModel;
use crate::error::{AxiError, Result};
use crate::schema::is_ncname;

/// Creates detached components bound to one model.
///
/// New components have no parent and no schema node; they become part of the
/// tree when attached inside a transaction, and reach the document on flush.
pub struct ComponentFactory<'a> {
    model: &'a mut AxiModel,
}

impl<'a> ComponentFactory<'a> {
    pub(crate) fn new(model: &'a mut AxiModel) -> Self {
        Self { model }
    }

    pub fn create_element(&mut self, name: &str) -> Result<ComponentId> {
        self.create_named(ComponentKind::Element, name)
    }

    pub fn create_attribute(&mut self, name: &str) -> Result<ComponentId> {
        self.create_named(ComponentKind::Attribute, name)
    }

    pub fn create_compositor(&mut self, kind: CompositorKind) -> ComponentId {
        self.create(Component::new(
            ComponentKind::Compositor(kind),
            ComponentType::Local,
        ))
    }

    pub fn create_content_model(&mut self, kind: ContentModelKind, name: &str) -> Result<ComponentId> {
        self.create_named(ComponentKind::ContentModel(kind), name)
    }

    /// Components created through any factory of this model
    pub fn created(&self) -> usize {
        self.model.created
    }

    fn create_named(&mut self, kind: ComponentKind, name: &str) -> Result<ComponentId> {
        if !is_ncname(name) {
            return Err(AxiError::InvalidName {
                name: name.to_string(),
            });
        }
        let mut component = Component::new(kind, ComponentType::Local);
        component.name = Some(name.to_string());
        Ok(self.create(component))
    }

    fn create(&mut self, component: Component) -> ComponentId {
        self.model.created += 1;
        self.model.alloc(component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axi::component::ModelId;
    use crate::schema::SchemaDocument;

    #[test]
    fn test_factory_creates_detached_components() {
        let mut model = AxiModel::new(
            ModelId::new(0),
            SchemaDocument::new("f.xsd", Some("urn:f")),
            None,
        );
        let mut factory = model.factory();
        let element = factory.create_element("item").unwrap();
        let sequence = factory.create_compositor(CompositorKind::Sequence);
        let group = factory
            .create_content_model(ContentModelKind::Group, "items")
            .unwrap();
        assert_eq!(factory.created(), 3);

        for id in [element, sequence, group] {
            let component = model.get(id).unwrap();
            assert_eq!(component.parent(), None);
            assert_eq!(component.peer(), None);
            assert_eq!(component.component_type(), ComponentType::Local);
            assert_eq!(component.target_namespace(), Some("urn:f"));
        }
        assert_eq!(model.name(element), Some("item"));
        assert_eq!(model.created_components(), 3);
    }

    #[test]
    fn test_factory_rejects_invalid_names() {
        let mut model = AxiModel::new(ModelId::new(0), SchemaDocument::new("f.xsd", None), None);
        let result = model.factory().create_attribute("not a name");
        assert!(matches!(result, Err(AxiError::InvalidName { .. })));
        assert_eq!(model.created_components(), 0);
    }
}
