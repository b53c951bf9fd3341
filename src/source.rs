use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::error::{AxiError, Result};
use crate::schema::DocumentId;

/// Storage collaborator: maps schema locations to document identities and text
pub trait SchemaSource {
    /// Resolve `location` (as written in `schemaLocation`) relative to the including document
    fn resolve(&self, location: &str, base: Option<&DocumentId>) -> DocumentId;

    /// Load the text of a resolved document
    fn load(&self, id: &DocumentId) -> Result<String>;
}

/// Type of schema location
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaLocation {
    Local(PathBuf),
    Remote(String),
}

impl SchemaLocation {
    /// Classify a location, resolving relative paths against the base document's directory
    pub fn classify(location: &str, base: Option<&Path>) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            return SchemaLocation::Remote(location.to_string());
        }
        let path = Path::new(location);
        if path.is_absolute() {
            return SchemaLocation::Local(normalize(path));
        }
        let directory = base
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new(""));
        SchemaLocation::Local(normalize(&directory.join(path)))
    }
}

/// Lexically fold `.` and `..` segments
fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push("..");
                }
            }
            other => result.push(other.as_os_str()),
        }
    }
    result
}

fn location_string(location: SchemaLocation) -> String {
    match location {
        SchemaLocation::Local(path) => path.to_string_lossy().replace('\\', "/"),
        SchemaLocation::Remote(url) => url,
    }
}

/// Validate that loaded content looks like an XML Schema before handing it to the parser
fn validate_schema_content(data: &[u8], source: &str) -> Result<String> {
    let content = String::from_utf8(data.to_vec()).map_err(|_| AxiError::Source {
        location: source.to_string(),
        details: "Schema content is not valid UTF-8".to_string(),
    })?;

    if !content.trim_start().starts_with('<') {
        return Err(AxiError::Source {
            location: source.to_string(),
            details: "Schema content does not appear to be XML".to_string(),
        });
    }

    Ok(content)
}

/// Schemas held in memory, keyed by location
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    documents: HashMap<String, String>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, location: impl Into<String>, text: impl Into<String>) {
        self.documents.insert(location.into(), text.into());
    }

    /// Builder-style [`InMemorySource::insert`]
    pub fn with(mut self, location: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(location, text);
        self
    }
}

impl SchemaSource for InMemorySource {
    fn resolve(&self, location: &str, base: Option<&DocumentId>) -> DocumentId {
        let base = base.map(|id| Path::new(id.as_str()));
        DocumentId::new(location_string(SchemaLocation::classify(location, base)))
    }

    fn load(&self, id: &DocumentId) -> Result<String> {
        let text = self
            .documents
            .get(id.as_str())
            .ok_or_else(|| AxiError::Source {
                location: id.to_string(),
                details: "Schema not found".to_string(),
            })?;
        validate_schema_content(text.as_bytes(), id.as_str())
    }
}

/// Schemas read from the local filesystem below a root directory
#[derive(Debug, Clone)]
pub struct FileSystemSource {
    root: PathBuf,
}

impl FileSystemSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SchemaSource for FileSystemSource {
    fn resolve(&self, location: &str, base: Option<&DocumentId>) -> DocumentId {
        let base = match base {
            Some(id) => PathBuf::from(id.as_str()),
            // Top-level locations are relative to the root directory
            None => self.root.join("_"),
        };
        DocumentId::new(location_string(SchemaLocation::classify(
            location,
            Some(&base),
        )))
    }

    fn load(&self, id: &DocumentId) -> Result<String> {
        let path = match SchemaLocation::classify(id.as_str(), None) {
            SchemaLocation::Local(path) => path,
            SchemaLocation::Remote(url) => {
                return Err(AxiError::Source {
                    location: url,
                    details: "Remote schemas are not supported by the filesystem source"
                        .to_string(),
                });
            }
        };

        let data = std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AxiError::Source {
                location: path.display().to_string(),
                details: "Schema not found".to_string(),
            },
            _ => AxiError::Io(e),
        })?;

        validate_schema_content(&data, &path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_classify_locations() {
        assert_eq!(
            SchemaLocation::classify("https://example.com/a.xsd", None),
            SchemaLocation::Remote("https://example.com/a.xsd".to_string())
        );
        assert_eq!(
            SchemaLocation::classify("common/address.xsd", Some(Path::new("po/po.xsd"))),
            SchemaLocation::Local(PathBuf::from("po/common/address.xsd"))
        );
        assert_eq!(
            SchemaLocation::classify("../shared/items.xsd", Some(Path::new("po/po.xsd"))),
            SchemaLocation::Local(PathBuf::from("shared/items.xsd"))
        );
        assert_eq!(
            SchemaLocation::classify("./items.xsd", None),
            SchemaLocation::Local(PathBuf::from("items.xsd"))
        );
    }

    #[test]
    fn test_in_memory_source_resolves_relative_to_base() {
        let source = InMemorySource::new()
            .with("po/po.xsd", "<schema/>")
            .with("po/address.xsd", "<schema/>");

        let po = source.resolve("po/po.xsd", None);
        let address = source.resolve("address.xsd", Some(&po));
        assert_eq!(address.as_str(), "po/address.xsd");
        assert!(source.load(&address).is_ok());

        let missing = source.resolve("missing.xsd", Some(&po));
        let result = source.load(&missing);
        assert!(matches!(result, Err(AxiError::Source { details, .. }) if details.contains("not found")));
    }

    #[test]
    fn test_in_memory_source_rejects_non_xml() {
        let source = InMemorySource::new().with("bad.xsd", "just some text");
        let id = source.resolve("bad.xsd", None);
        assert!(source.load(&id).is_err());
    }

    #[test]
    fn test_filesystem_source() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("common")).unwrap();
        std::fs::write(temp_dir.path().join("main.xsd"), "<xs:schema/>").unwrap();
        std::fs::write(temp_dir.path().join("common/types.xsd"), "<xs:schema/>").unwrap();

        let source = FileSystemSource::new(temp_dir.path());
        let main = source.resolve("main.xsd", None);
        assert!(main.as_str().ends_with("main.xsd"));
        assert_eq!(source.load(&main).unwrap(), "<xs:schema/>");

        let types = source.resolve("common/types.xsd", Some(&main));
        assert!(source.load(&types).is_ok());

        let missing = source.resolve("nope.xsd", Some(&main));
        assert!(matches!(source.load(&missing), Err(AxiError::Source { .. })));

        let remote = source.resolve("http://example.com/remote.xsd", Some(&main));
        assert!(source.load(&remote).is_err());
    }
}
