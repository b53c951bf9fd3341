use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use super::{NodeId, Result, SchemaDocument};
use crate::error::SchemaError;

fn serialize_error(error: impl std::fmt::Display) -> SchemaError {
    SchemaError::Serialize(error.to_string())
}

pub(super) fn write(doc: &SchemaDocument) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(serialize_error)?;

    let prefix = doc.xs_prefix().to_string();
    write_node(&mut writer, doc, doc.root(), &prefix)?;

    String::from_utf8(writer.into_inner()).map_err(serialize_error)
}

fn write_node(
    writer: &mut Writer<Vec<u8>>,
    doc: &SchemaDocument,
    id: NodeId,
    prefix: &str,
) -> Result<()> {
    let node = doc.get(id)?;
    let name = if prefix.is_empty() {
        node.tag().to_string()
    } else {
        format!("{}:{}", prefix, node.tag())
    };

    let mut start = BytesStart::new(name.as_str());
    if id == doc.root() {
        for (ns_prefix, uri) in doc.namespaces() {
            let key = if ns_prefix.is_empty() {
                "xmlns".to_string()
            } else {
                format!("xmlns:{}", ns_prefix)
            };
            start.push_attribute((key.as_str(), uri.as_str()));
        }
    }
    for (key, value) in node.attributes() {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if node.children().is_empty() && node.text().is_none() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(serialize_error);
    }

    writer
        .write_event(Event::Start(start))
        .map_err(serialize_error)?;
    if let Some(text) = node.text() {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(serialize_error)?;
    }
    for child in node.children() {
        write_node(writer, doc, *child, prefix)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(name.as_str())))
        .map_err(serialize_error)
}
