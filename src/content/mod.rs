pub mod cache;
pub mod capability;
pub mod host;
pub mod sources;
pub mod store;
pub mod trash;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::layout::Layout;

pub use cache::{ContentCache, MemoryCache};
pub use capability::{ReferenceCapability, ReferenceRules};
pub use host::{EditorHost, HeadlessHost, SceneMode};
pub use sources::{MirrorMapper, SourceMapper};
pub use store::{ContentStore, JsonStore};
pub use trash::{TrashDir, TrashSink};

/// Prefix of content paths that point at built-in default content.
pub const DEFAULT_CONTENT_PREFIX: &str = "Default:";

/// A path-based handle to another content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    /// `None` marks an explicit null reference.
    pub path: Option<String>,
}

impl ContentRef {
    pub fn to(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn null() -> Self {
        Self { path: None }
    }

    pub fn is_explicit_null(&self) -> bool {
        self.path.is_none()
    }

    pub fn is_default_content(&self) -> bool {
        self.path
            .as_deref()
            .is_some_and(|p| p.starts_with(DEFAULT_CONTENT_PREFIX))
    }
}

/// A field value inside a content object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Field {
    Text(String),
    Number(f64),
    Bool(bool),
    Ref(ContentRef),
    List(Vec<Field>),
    Map(BTreeMap<String, Field>),
}

/// A loaded content object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Field>,
}

impl Resource {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Field) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Paths of every non-null reference, in visiting order.
    pub fn reference_paths(&mut self) -> Vec<String> {
        let mut paths = Vec::new();
        self.visit_references(&mut |r| {
            if let Some(p) = &r.path {
                paths.push(p.clone());
            }
        });
        paths
    }
}

/// Implemented by everything that can embed content references. Visitors may
/// rewrite the references they are handed.
pub trait VisitReferences {
    fn visit_references(&mut self, visitor: &mut dyn FnMut(&mut ContentRef));
}

impl VisitReferences for ContentRef {
    fn visit_references(&mut self, visitor: &mut dyn FnMut(&mut ContentRef)) {
        visitor(self);
    }
}

impl VisitReferences for Field {
    fn visit_references(&mut self, visitor: &mut dyn FnMut(&mut ContentRef)) {
        match self {
            Field::Ref(r) => r.visit_references(visitor),
            Field::List(items) => items.iter_mut().for_each(|f| f.visit_references(visitor)),
            Field::Map(map) => map.values_mut().for_each(|f| f.visit_references(visitor)),
            Field::Text(_) | Field::Number(_) | Field::Bool(_) => {}
        }
    }
}

impl VisitReferences for Resource {
    fn visit_references(&mut self, visitor: &mut dyn FnMut(&mut ContentRef)) {
        for field in self.fields.values_mut() {
            field.visit_references(visitor);
        }
    }
}

/// Content kind encoded in a file name: `Name.Kind.res` yields `Kind`.
pub fn kind_from_file_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let (_, kind) = stem.rsplit_once('.')?;
    (!kind.is_empty()).then(|| kind.to_owned())
}

/// The external systems the reconcilers and the rewriter act upon.
pub struct Collaborators {
    pub cache: Box<dyn ContentCache>,
    pub store: Box<dyn ContentStore>,
    pub sources: Box<dyn SourceMapper>,
    pub capability: Box<dyn ReferenceCapability>,
    pub trash: Box<dyn TrashSink>,
    pub host: Box<dyn EditorHost>,
}

impl Collaborators {
    /// The default file-backed collaborators for a project, driven by a
    /// [`HeadlessHost`]. The returned host handle shares state with the one
    /// installed here.
    pub fn headless(layout: &Layout, config: &SyncConfig) -> (Self, HeadlessHost) {
        let host = HeadlessHost::new(config.reload_policy);
        let env = Self {
            cache: Box::new(MemoryCache::new()),
            store: Box::new(JsonStore),
            sources: Box::new(MirrorMapper::new(layout.clone())),
            capability: Box::new(ReferenceRules::new(config.references.clone())),
            trash: Box::new(TrashDir::new(&layout.root, &layout.trash_dir)),
            host: Box::new(host.clone()),
        };
        (env, host)
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("cached", &self.cache.loaded_paths().len())
            .finish_non_exhaustive()
    }
}
