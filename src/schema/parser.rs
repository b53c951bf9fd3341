use roxmltree::{Document, Node, ParsingOptions};

use super::{DocumentId, MAX_SCHEMA_SIZE, NodeId, Result, SchemaDocument, SchemaKind, SchemaNode, XS_NAMESPACE};
use crate::error::SchemaError;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

pub(super) fn parse(id: DocumentId, text: &str) -> Result<SchemaDocument> {
    if text.len() > MAX_SCHEMA_SIZE {
        return Err(SchemaError::TooLarge {
            size: text.len(),
            max: MAX_SCHEMA_SIZE,
        });
    }

    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let xml = Document::parse_with_options(text, options).map_err(|e| SchemaError::Parse {
        document: id.to_string(),
        details: e.to_string(),
    })?;

    let root = xml.root_element();
    if root.tag_name().namespace() != Some(XS_NAMESPACE) || root.tag_name().name() != "schema" {
        return Err(SchemaError::NotASchema {
            document: id.to_string(),
            root: root.tag_name().name().to_string(),
        });
    }

    let mut doc = SchemaDocument::with_root(id);
    for namespace in root.namespaces() {
        let prefix = namespace.name().unwrap_or("");
        if prefix != "xml" {
            doc.namespaces
                .push((prefix.to_string(), namespace.uri().to_string()));
        }
    }

    let schema_root = doc.root;
    copy_attributes(root, &mut doc, schema_root);
    copy_children(root, &mut doc, schema_root)?;
    doc.revision = 0;
    Ok(doc)
}

fn copy_attributes(source: Node<'_, '_>, doc: &mut SchemaDocument, target: NodeId) {
    for attribute in source.attributes() {
        let key = match attribute.namespace() {
            None => attribute.name().to_string(),
            Some(XML_NAMESPACE) => format!("xml:{}", attribute.name()),
            Some(uri) => match source.lookup_prefix(uri) {
                Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, attribute.name()),
                _ => attribute.name().to_string(),
            },
        };
        doc.write_attribute(target, &key, attribute.value());
    }
}

fn copy_children(source: Node<'_, '_>, doc: &mut SchemaDocument, parent: NodeId) -> Result<()> {
    for child in source.children() {
        if child.is_element() {
            // Foreign markup (appinfo payloads) is not part of the schema model
            if child.tag_name().namespace() != Some(XS_NAMESPACE) {
                continue;
            }
            let tag = child.tag_name().name();
            let id = doc.alloc(SchemaNode::new(SchemaKind::from_local_name(tag), tag));
            copy_attributes(child, doc, id);
            doc.append_child(parent, id)?;
            copy_children(child, doc, id)?;
        } else if child.is_text() {
            let text = child.text().unwrap_or_default();
            if !text.trim().is_empty() {
                doc.get_mut(parent)?.text = Some(text.trim().to_string());
            }
        }
    }
    Ok(())
}
