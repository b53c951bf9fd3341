use std::collections::VecDeque;
use std::path::PathBuf;

use xml_axi::{ComponentRef, FileSystemSource, ModelId, ModelRegistry};

/// Test fixture paths
pub struct TestFixtures {
    pub fixtures_dir: PathBuf,
}

impl TestFixtures {
    pub fn new() -> Self {
        let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures");

        Self { fixtures_dir }
    }

    pub fn schemas_dir(&self) -> PathBuf {
        self.fixtures_dir.join("schemas")
    }

    pub fn schema(&self, name: &str) -> PathBuf {
        self.schemas_dir().join(name)
    }

    pub fn schema_text(&self, name: &str) -> String {
        std::fs::read_to_string(self.schema(name)).unwrap()
    }

    pub fn source(&self) -> FileSystemSource {
        FileSystemSource::new(self.schemas_dir())
    }
}

/// Registry over the fixture directory with one schema (and its imports) loaded
pub fn load_fixture(name: &str) -> (ModelRegistry, ModelId) {
    init_tracing();
    let mut registry = ModelRegistry::new(TestFixtures::new().source());
    let id = registry.load(name).unwrap();
    (registry, id)
}

/// Route library logs to the test harness; `RUST_LOG` selects the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Every component reachable from `root`, materializing lazy children on the way
pub fn collect_tree(registry: &mut ModelRegistry, root: ComponentRef) -> Vec<ComponentRef> {
    let mut seen = Vec::new();
    let mut queue = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        assert!(seen.len() < 10_000, "tree under {root} does not end");
        seen.push(current);
        queue.extend(registry.children(current).unwrap());
    }
    seen
}

/// First child of `parent` whose effective name is `name`
pub fn child_named(
    registry: &mut ModelRegistry,
    parent: ComponentRef,
    name: &str,
) -> Option<ComponentRef> {
    let children = registry.children(parent).unwrap();
    children
        .into_iter()
        .find(|child| registry.name(*child).unwrap().as_deref() == Some(name))
}

/// Effective names of the children of `parent`, unnamed ones as `-`
pub fn child_names(registry: &mut ModelRegistry, parent: ComponentRef) -> Vec<String> {
    let children = registry.children(parent).unwrap();
    children
        .iter()
        .map(|child| registry.name(*child).unwrap().unwrap_or_else(|| "-".to_string()))
        .collect()
}
