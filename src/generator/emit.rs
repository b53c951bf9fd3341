//! Re-emission of an expanded shape in a target design pattern.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::shape::{Content, ElementId, Item, ShapeSet, TypeId};
use super::{DesignPattern, type_name};
use crate::error::TransformError;
use crate::schema::{NodeId, SchemaDocument, SchemaKind};

type Result<T> = std::result::Result<T, TransformError>;

/// Declarations only a global element may carry
const GLOBAL_ONLY: &[&str] = &["abstract", "substitutionGroup", "final"];

/// Declarations a global element may not carry
const LOCAL_ONLY: &[&str] = &["form"];

/// Reference attributes checked by the closure pass, with the kind they name
const REFERENCE_ATTRIBUTES: &[(SchemaKind, &str, SchemaKind)] = &[
    (SchemaKind::Element, "ref", SchemaKind::Element),
    (SchemaKind::Element, "substitutionGroup", SchemaKind::Element),
    (SchemaKind::Element, "type", SchemaKind::ComplexType),
    (SchemaKind::Attribute, "ref", SchemaKind::Attribute),
    (SchemaKind::Attribute, "type", SchemaKind::SimpleType),
    (SchemaKind::Group, "ref", SchemaKind::Group),
    (SchemaKind::AttributeGroup, "ref", SchemaKind::AttributeGroup),
    (SchemaKind::Extension, "base", SchemaKind::ComplexType),
    (SchemaKind::Restriction, "base", SchemaKind::ComplexType),
    (SchemaKind::Other, "itemType", SchemaKind::SimpleType),
];

pub(crate) struct Emitter<'a> {
    source: &'a SchemaDocument,
    shapes: &'a ShapeSet,
    out: SchemaDocument,
    suffix: &'a str,
    promote_elements: bool,
    name_types: bool,
    keep_groups: bool,
    keep_simple_types: bool,
    /// Global element name to the shape that owns it
    claimed: HashMap<String, ElementId>,
    emitted_elements: HashSet<ElementId>,
    type_names: HashMap<TypeId, String>,
    reserved_types: HashSet<String>,
    emitted_types: HashSet<TypeId>,
    emitted_groups: HashSet<NodeId>,
    element_stack: Vec<ElementId>,
    type_stack: Vec<TypeId>,
}

impl<'a> Emitter<'a> {
    pub(crate) fn new(
        source: &'a SchemaDocument,
        shapes: &'a ShapeSet,
        out: SchemaDocument,
        pattern: DesignPattern,
        suffix: &'a str,
    ) -> Self {
        let promote_elements = pattern.promotes_elements();
        let name_types = pattern.names_types();

        let reserved_types = [SchemaKind::ComplexType, SchemaKind::SimpleType]
            .into_iter()
            .flat_map(|kind| source.globals(kind))
            .filter_map(|node| source.name(node).map(str::to_string))
            .collect();

        // Source global elements keep their names ahead of promoted locals
        let claimed = if promote_elements {
            shapes
                .global_elements()
                .map(|id| (shapes.elements[id].name.clone(), id))
                .collect()
        } else {
            HashMap::new()
        };

        Self {
            source,
            shapes,
            out,
            suffix,
            promote_elements,
            name_types,
            keep_groups: pattern != DesignPattern::RussianDoll,
            keep_simple_types: name_types,
            claimed,
            emitted_elements: HashSet::new(),
            type_names: HashMap::new(),
            reserved_types,
            emitted_types: HashSet::new(),
            emitted_groups: HashSet::new(),
            element_stack: Vec::new(),
            type_stack: Vec::new(),
        }
    }

    pub(crate) fn run(mut self) -> Result<SchemaDocument> {
        self.out.ensure_target_prefix();
        let shapes = self.shapes;
        for master in &shapes.masters {
            self.global_element(*master)?;
        }
        self.close_references()?;
        Ok(self.out)
    }

    fn global_element(&mut self, id: ElementId) -> Result<()> {
        if !self.emitted_elements.insert(id) {
            return Ok(());
        }
        let name = self.shapes.elements[id].name.clone();
        let node = self.out.add_global(SchemaKind::Element, &name)?;
        self.fill_element(node, id, true)
    }

    /// Declaration attributes, annotations, content and identity constraints of an element
    fn fill_element(&mut self, node: NodeId, id: ElementId, global: bool) -> Result<()> {
        let shapes = self.shapes;
        let shape = &shapes.elements[id];
        for (key, value) in &shape.attributes {
            let allowed = if global {
                !LOCAL_ONLY.contains(&key.as_str())
            } else {
                !GLOBAL_ONLY.contains(&key.as_str())
            };
            if allowed {
                self.out.set_attribute(node, key, value)?;
            }
        }
        for annotation in &shape.leading {
            self.out.copy_subtree(self.source, *annotation, node)?;
        }

        self.element_stack.push(id);
        let result = match &shape.content {
            Content::Empty => Ok(()),
            Content::Simple { value, named } => self.simple_type(node, value, *named),
            Content::InlineSimple(simple) => self
                .out
                .copy_subtree(self.source, *simple, node)
                .map(|_| ())
                .map_err(TransformError::from),
            Content::Complex(type_id) => self.complex_content(node, *type_id, &shape.name),
        };
        self.element_stack.pop();
        result?;

        for constraint in &shape.trailing {
            self.out.copy_subtree(self.source, *constraint, node)?;
        }
        Ok(())
    }

    /// Point at a named simple type, or inline it when the pattern keeps no simple types
    fn simple_type(&mut self, node: NodeId, value: &str, named: Option<NodeId>) -> Result<()> {
        match named {
            Some(decl) if !self.keep_simple_types => {
                let inline = self.out.copy_subtree(self.source, decl, node)?;
                self.out.remove_attribute(inline, "name")?;
                self.out.remove_attribute(node, "type")?;
            }
            _ => self.out.set_attribute(node, "type", value)?,
        }
        Ok(())
    }

    fn complex_content(&mut self, node: NodeId, id: TypeId, element_name: &str) -> Result<()> {
        // A type that contains itself cannot be written inline
        if self.name_types || self.type_stack.contains(&id) {
            let name = self.named_type(id, element_name)?;
            let reference = self.out.qualify(&name);
            self.out.set_attribute(node, "type", &reference)?;
            return Ok(());
        }
        let complex = self.out.create_node(SchemaKind::ComplexType);
        let index = self
            .out
            .children(node)
            .iter()
            .take_while(|child| self.out.kind(**child) == Some(SchemaKind::Annotation))
            .count();
        self.out.insert_child(node, index, complex)?;
        self.fill_type(complex, id)
    }

    /// Global name of a complex type, emitting the declaration the first time
    fn named_type(&mut self, id: TypeId, element_name: &str) -> Result<String> {
        let name = match self.type_names.get(&id) {
            Some(name) => name.clone(),
            None => {
                let name = match &self.shapes.types[id].name {
                    Some(original) => original.clone(),
                    None => {
                        let reserved = &self.reserved_types;
                        let assigned: HashSet<&String> = self.type_names.values().collect();
                        type_name(element_name, self.suffix, |candidate| {
                            reserved.contains(candidate) || assigned.iter().any(|n| n.as_str() == candidate)
                        })
                    }
                };
                self.type_names.insert(id, name.clone());
                name
            }
        };
        if self.emitted_types.insert(id) {
            let complex = self.out.add_global(SchemaKind::ComplexType, &name)?;
            self.fill_type(complex, id)?;
        }
        Ok(name)
    }

    fn fill_type(&mut self, node: NodeId, id: TypeId) -> Result<()> {
        let shapes = self.shapes;
        let shape = &shapes.types[id];
        for (key, value) in &shape.attributes {
            self.out.set_attribute(node, key, value)?;
        }
        if shape.verbatim {
            for child in self.source.children(shape.node).to_vec() {
                self.out.copy_subtree(self.source, child, node)?;
            }
            return Ok(());
        }
        self.type_stack.push(id);
        let result = self.items(node, &shape.items);
        self.type_stack.pop();
        result
    }

    fn items(&mut self, parent: NodeId, items: &[Item]) -> Result<()> {
        for item in items {
            self.item(parent, item, None)?;
        }
        Ok(())
    }

    /// Emit one item; `occurs` overrides the cardinality of a flattened group's compositor
    fn item(&mut self, parent: NodeId, item: &Item, occurs: Option<NodeId>) -> Result<()> {
        match item {
            Item::Element { element, site } => self.element_use(parent, *element, *site),
            Item::Compositor { node, kind, items } => {
                let compositor = self.out.create_node(*kind);
                copy_occurs(self.source, *node, &mut self.out, compositor)?;
                if let Some(site) = occurs {
                    copy_occurs(self.source, site, &mut self.out, compositor)?;
                }
                self.out.append_child(parent, compositor)?;
                self.items(compositor, items)
            }
            Item::Group { decl, site } => {
                let shapes = self.shapes;
                let body = shapes.groups.get(decl).map(Vec::as_slice).unwrap_or_default();
                if self.keep_groups {
                    self.reference_global(parent, *decl, *site, SchemaKind::Group, body)
                } else {
                    for inner in body {
                        if matches!(inner, Item::Compositor { .. }) {
                            self.item(parent, inner, Some(*site))?;
                        } else if !matches!(inner, Item::Verbatim(_)) {
                            self.item(parent, inner, None)?;
                        }
                    }
                    Ok(())
                }
            }
            Item::AttributeGroup { decl, site } => {
                let shapes = self.shapes;
                let body = shapes
                    .attribute_groups
                    .get(decl)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                if self.keep_groups {
                    self.reference_global(parent, *decl, *site, SchemaKind::AttributeGroup, body)
                } else {
                    for inner in body {
                        if !matches!(inner, Item::Verbatim(node) if self.source.kind(*node) == Some(SchemaKind::Annotation)) {
                            self.item(parent, inner, None)?;
                        }
                    }
                    Ok(())
                }
            }
            Item::Attribute { site, decl } => self.attribute(parent, *site, *decl),
            Item::Verbatim(node) => {
                self.out.copy_subtree(self.source, *node, parent)?;
                Ok(())
            }
        }
    }

    /// Write `<group ref>` or `<attributeGroup ref>` and emit its global declaration once
    fn reference_global(
        &mut self,
        parent: NodeId,
        decl: NodeId,
        site: NodeId,
        kind: SchemaKind,
        body: &[Item],
    ) -> Result<()> {
        let name = self.source.name(decl).unwrap_or_default().to_string();
        let reference = self.out.create_node(kind);
        let qualified = self.out.qualify(&name);
        self.out.set_attribute(reference, "ref", &qualified)?;
        copy_occurs(self.source, site, &mut self.out, reference)?;
        self.out.append_child(parent, reference)?;

        if self.emitted_groups.insert(decl) {
            let global = self.out.add_global(kind, &name)?;
            self.items(global, body)?;
        }
        Ok(())
    }

    fn element_use(&mut self, parent: NodeId, id: ElementId, site: NodeId) -> Result<()> {
        let name = self.shapes.elements[id].name.clone();
        let global = if self.promote_elements {
            self.promoted_owner(id, &name)
        } else if self.shapes.elements[id].global && self.element_stack.contains(&id) {
            // Recursion back to an enclosing element needs a global to point at
            Some(id)
        } else {
            None
        };

        match global {
            Some(owner) => {
                let reference = self.out.create_node(SchemaKind::Element);
                let qualified = self.out.qualify(&self.shapes.elements[owner].name);
                self.out.set_attribute(reference, "ref", &qualified)?;
                copy_occurs(self.source, site, &mut self.out, reference)?;
                self.out.append_child(parent, reference)?;
                self.global_element(owner)
            }
            None => {
                let local = self.out.create_node(SchemaKind::Element);
                self.out.set_attribute(local, "name", &name)?;
                copy_occurs(self.source, site, &mut self.out, local)?;
                self.out.append_child(parent, local)?;
                self.fill_element(local, id, false)
            }
        }
    }

    /// Shape whose global declaration a promoted element should reference,
    /// or `None` when a differently shaped element already holds the name
    fn promoted_owner(&mut self, id: ElementId, name: &str) -> Option<ElementId> {
        match self.claimed.get(name).copied() {
            Some(owner) if owner == id => Some(owner),
            Some(owner) => {
                let same = self.shapes.signature(self.source, owner)
                    == self.shapes.signature(self.source, id);
                if !same {
                    debug!(element = name, "Name already taken by a different shape; staying local");
                }
                same.then_some(owner)
            }
            None => {
                self.claimed.insert(name.to_string(), id);
                Some(id)
            }
        }
    }

    fn attribute(&mut self, parent: NodeId, site: NodeId, decl: Option<NodeId>) -> Result<()> {
        let inline_global = !self.keep_groups;
        let node = match decl {
            Some(decl) if inline_global => {
                // Local copy of the global declaration, with the use site's settings
                let copy = self.out.copy_subtree(self.source, decl, parent)?;
                if let Ok(site_node) = self.source.get(site) {
                    for (key, value) in site_node.attributes() {
                        if key != "ref" {
                            self.out.set_attribute(copy, key, value)?;
                        }
                    }
                }
                copy
            }
            _ => self.out.copy_subtree(self.source, site, parent)?,
        };

        if !self.keep_simple_types
            && let Some(value) = self.out.attribute(node, "type").map(str::to_string)
            && let Some(qname) = self.source.resolve_qname(&value)
            && self.source.is_own_namespace(&qname)
            && let Some(simple) = self.source.find_global(SchemaKind::SimpleType, &qname.local)
        {
            let inline = self.out.copy_subtree(self.source, simple, node)?;
            self.out.remove_attribute(inline, "name")?;
            self.out.remove_attribute(node, "type")?;
        }
        Ok(())
    }

    /// Copy every same-namespace global the output still refers to but does not declare
    fn close_references(&mut self) -> Result<()> {
        loop {
            let mut missing: Vec<NodeId> = Vec::new();
            for node in self.out.descendants(self.out.root()) {
                let Some(holder) = self.out.kind(node) else {
                    continue;
                };
                for (kind, attribute, target) in REFERENCE_ATTRIBUTES {
                    if *kind != holder {
                        continue;
                    }
                    let Some(qname) = self
                        .out
                        .attribute(node, attribute)
                        .and_then(|value| self.out.resolve_qname(value))
                    else {
                        continue;
                    };
                    if qname.is_builtin() || self.out.find_global_ref(*target, &qname).is_some() {
                        continue;
                    }
                    if let Some(decl) = self.source.find_global_ref(*target, &qname)
                        && !missing.contains(&decl)
                    {
                        missing.push(decl);
                    }
                }
            }
            if missing.is_empty() {
                return Ok(());
            }
            for decl in missing {
                debug!(
                    name = self.source.name(decl).unwrap_or_default(),
                    "Keeping global declaration required by a reference"
                );
                let root = self.out.root();
                self.out.copy_subtree(self.source, decl, root)?;
            }
        }
    }
}

fn copy_occurs(
    source: &SchemaDocument,
    site: NodeId,
    out: &mut SchemaDocument,
    node: NodeId,
) -> std::result::Result<(), crate::error::SchemaError> {
    for attribute in ["minOccurs", "maxOccurs"] {
        if let Some(value) = source.attribute(site, attribute) {
            out.set_attribute(node, attribute, value)?;
        }
    }
    Ok(())
}
