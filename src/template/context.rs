use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use crate::model::params::Fields;
use crate::template::descriptor::TemplateDescriptor;
use crate::template::validate;
use crate::template::{Artifact, TemplateConstructor};

/// The parent abstraction every definition extends: required-field
/// enforcement and the artifact factory handed to the write step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseCapability {
    name: String,
}

impl BaseCapability {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enforce_required(&self, descriptor: &TemplateDescriptor, fields: &Fields) -> Result<()> {
        validate::validate_params(descriptor, fields)
    }

    pub fn artifact(&self, folder: &str, name: &str, content: String) -> Result<Artifact> {
        Artifact::new(folder, name, content)
    }
}

/// One exported template, as published into the slot during evaluation.
#[derive(Clone)]
pub struct Export {
    pub descriptor: Arc<TemplateDescriptor>,
    pub constructor: Arc<dyn TemplateConstructor>,
}

/// Bindings visible to a single definition while it is evaluated. Built fresh
/// for each load and consumed by [`ExecutionContext::take_export`].
pub struct ExecutionContext<'a> {
    base: &'a BaseCapability,
    root: &'a Path,
    exports: Vec<(String, Export)>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(base: &'a BaseCapability, root: &'a Path) -> Self {
        Self {
            base,
            root,
            exports: Vec::new(),
        }
    }

    pub fn base(&self) -> &'a BaseCapability {
        self.base
    }

    /// Resolve a path relative to the definition root. Absolute paths and
    /// anything climbing out of the root are refused.
    pub fn resolve_path(&self, relative: &str) -> std::result::Result<PathBuf, String> {
        let relative = confined_relative(relative)
            .ok_or_else(|| format!("path {relative:?} escapes the template directory"))?;
        Ok(self.root.join(relative))
    }

    /// Publish an export. A repeated name keeps the first one.
    pub fn export(&mut self, name: impl Into<String>, export: Export) {
        let name = name.into();
        if self.exports.iter().any(|(existing, _)| *existing == name) {
            tracing::warn!("duplicate export {name}, keeping the first");
            return;
        }
        self.exports.push((name, export));
    }

    pub fn export_names(&self) -> impl Iterator<Item = &str> {
        self.exports.iter().map(|(name, _)| name.as_str())
    }

    /// Extract one export and drop the rest of the context with it.
    pub fn take_export(self, name: &str) -> Option<Export> {
        self.exports
            .into_iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, export)| export)
    }
}

/// Normalize a relative path, refusing absolute paths and `..` segments.
/// `.` segments and empty input are allowed (the latter means "the root").
pub fn confined_relative(raw: &str) -> Option<PathBuf> {
    let path = Path::new(raw.trim());
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    Some(out)
}
