pub mod context;
pub mod descriptor;
pub mod registry;
pub mod render;
pub mod sandbox;
pub mod validate;
#[cfg(feature = "plugins")]
pub mod wasm;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, StencilError};
use crate::materialize::sanitize_file_name;
use crate::model::params::Fields;
use crate::prompt::PromptStep;

pub use context::Export;
pub use descriptor::{TemplateDescriptor, TemplateKey};
pub use registry::TemplateRegistry;

/// A template instance: its prompt chain and how it turns collected fields
/// into an artifact.
pub trait Template {
    fn descriptor(&self) -> &TemplateDescriptor;

    /// The field-collection chain, with `seed` values offered as defaults.
    fn prompt_steps(&self, seed: &Fields) -> Vec<PromptStep>;

    fn render(&mut self, fields: &Fields) -> Result<Artifact>;
}

/// Produces fresh template instances for a loaded definition.
pub trait TemplateConstructor {
    fn construct(&self) -> Result<Box<dyn Template>>;
}

/// A loaded definition, cached by the registry for the current scan.
#[derive(Clone)]
pub struct TemplateHandle {
    key: TemplateKey,
    path: PathBuf,
    export: String,
    descriptor: Arc<TemplateDescriptor>,
    constructor: Arc<dyn TemplateConstructor>,
}

impl TemplateHandle {
    pub fn new(key: TemplateKey, path: PathBuf, export_name: String, export: Export) -> Self {
        Self {
            key,
            path,
            export: export_name,
            descriptor: export.descriptor,
            constructor: export.constructor,
        }
    }

    pub fn key(&self) -> &TemplateKey {
        &self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn export_name(&self) -> &str {
        &self.export
    }

    pub fn descriptor(&self) -> &TemplateDescriptor {
        &self.descriptor
    }

    pub fn display_name(&self) -> String {
        self.descriptor.display_name(&self.key)
    }

    pub fn instantiate(&self) -> Result<Box<dyn Template>> {
        self.constructor.construct()
    }
}

impl fmt::Debug for TemplateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateHandle")
            .field("key", &self.key)
            .field("path", &self.path)
            .field("export", &self.export)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Rendered output, ready for the write step. Only constructible with
/// non-blank content and a usable file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    folder: String,
    name: String,
    content: String,
}

impl Artifact {
    pub fn new(folder: &str, name: &str, content: String) -> Result<Self> {
        if content.trim().is_empty() {
            return Err(StencilError::params("template content is unset"));
        }

        let name = sanitize_file_name(name);
        if name.is_empty() {
            return Err(StencilError::params("title leaves no usable file name"));
        }

        let folder = context::confined_relative(folder)
            .ok_or_else(|| StencilError::params(format!("folder {folder:?} leaves the vault")))?;

        Ok(Self {
            folder: folder.to_string_lossy().into_owned(),
            name,
            content,
        })
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}
