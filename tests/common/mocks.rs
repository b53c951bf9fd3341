use std::sync::{Arc, Mutex};

use xml_axi::{AxiError, DocumentId, InMemorySource, SchemaSource};

/// Source that serves fixed documents and records every load it performs
pub struct RecordingSource {
    inner: InMemorySource,
    loads: Arc<Mutex<Vec<String>>>,
    failing: Vec<String>,
}

impl RecordingSource {
    pub fn new() -> Self {
        Self {
            inner: InMemorySource::new(),
            loads: Arc::new(Mutex::new(Vec::new())),
            failing: Vec::new(),
        }
    }

    pub fn with(mut self, location: &str, text: &str) -> Self {
        self.inner.insert(location, text);
        self
    }

    /// Make loads of `location` fail with an I/O error
    pub fn failing(mut self, location: &str) -> Self {
        self.failing.push(location.to_string());
        self
    }

    /// Shared view of the load log, usable after the source moved into a registry
    pub fn load_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.loads)
    }
}

impl SchemaSource for RecordingSource {
    fn resolve(&self, location: &str, base: Option<&DocumentId>) -> DocumentId {
        self.inner.resolve(location, base)
    }

    fn load(&self, id: &DocumentId) -> xml_axi::Result<String> {
        self.loads.lock().unwrap().push(id.to_string());
        if self.failing.iter().any(|location| location == id.as_str()) {
            return Err(AxiError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "simulated failure",
            )));
        }
        self.inner.load(id)
    }
}
