//! Loading a definition file into an isolated [`ExecutionContext`].
//!
//! A script definition is a TOML document:
//!
//! ```toml
//! extends = "BaseTemplate"
//!
//! [exports.WishlistTemplate]
//! folder = "Wishlist/Items"
//! body_file = "wishlist.md"
//!
//! [exports.WishlistTemplate.descriptor]
//! name = "Wishlist"
//! required_fields = ["title", "url", "type", "price"]
//!
//! [[exports.WishlistTemplate.prompts]]
//! field = "price"
//! pattern = '^\d+(\.\d{1,2})?$'
//! ```
//!
//! Evaluation only sees the bindings the context hands out: the base
//! capability named by `extends`, `resolve_path` for includes, and the export
//! slot. The constructor is then pulled out by export name and the context is
//! dropped.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StencilError};
use crate::model::params::Fields;
use crate::prompt::{FieldRule, PromptRequest, PromptStep};
use crate::template::context::{BaseCapability, ExecutionContext, Export};
use crate::template::descriptor::{TemplateDescriptor, TemplateKey};
use crate::template::render::{has_placeholders, render_placeholders};
use crate::template::{Artifact, Template, TemplateConstructor, TemplateHandle};

/// Turns one definition file into a [`TemplateHandle`].
pub trait TemplateLoader {
    /// File extension (without the dot) this loader claims during discovery.
    fn extension(&self) -> &'static str;

    fn load(&self, key: &TemplateKey, path: &Path, base: &BaseCapability) -> Result<TemplateHandle>;
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptSource {
    extends: String,
    #[serde(default)]
    export: Option<String>,
    #[serde(default)]
    exports: BTreeMap<String, ExportSource>,
}

#[derive(Debug, Deserialize)]
struct ExportSource {
    descriptor: Option<TemplateDescriptor>,
    #[serde(default)]
    folder: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    body_file: Option<String>,
    #[serde(default)]
    prompts: Option<Vec<PromptSource>>,
}

/// Declarative prompt entry, shared with the WASM ABI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSource {
    pub field: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub retry_message: Option<String>,
}

fn default_required() -> bool {
    true
}

impl PromptSource {
    pub fn compile(&self) -> std::result::Result<PromptStep, String> {
        if self.field.trim().is_empty() {
            return Err("prompt entry without a field name".to_string());
        }

        let message = self.message.clone().unwrap_or_else(|| capitalize(&self.field));
        let mut request = if self.choices.is_empty() {
            PromptRequest::text(&self.field, message)
        } else {
            PromptRequest::choice(&self.field, message, self.choices.clone())
        };
        request.placeholder = self.placeholder.clone();
        request.default = self.default.clone();
        request.required = self.required;

        let mut step = PromptStep::new(request);
        if let Some(pattern) = &self.pattern {
            let regex = Regex::new(pattern)
                .map_err(|err| format!("field {}: invalid pattern: {err}", self.field))?;
            let message = self
                .retry_message
                .clone()
                .unwrap_or_else(|| format!("{} must match {pattern}", self.field));
            step = step.with_rule(FieldRule::Pattern { regex, message });
        }

        Ok(step)
    }
}

fn capitalize(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Loader for TOML script definitions.
#[derive(Debug, Default)]
pub struct ScriptLoader;

impl ScriptLoader {
    /// Evaluate `source` as the definition named `key`, found at `path`.
    pub fn load_source(
        &self,
        source: &str,
        key: &TemplateKey,
        path: &Path,
        base: &BaseCapability,
    ) -> Result<TemplateHandle> {
        let script: ScriptSource =
            toml::from_str(source).map_err(|err| StencilError::script_load(path, err))?;

        if script.extends != base.name() {
            return Err(StencilError::script_load(
                path,
                format!("extends unknown base {:?}, expected {:?}", script.extends, base.name()),
            ));
        }

        let root = path.parent().unwrap_or_else(|| Path::new("."));
        let mut ctx = ExecutionContext::new(base, root);

        for (name, export) in script.exports {
            let definition = evaluate_export(&ctx, key, &name, export)
                .map_err(|reason| StencilError::script_load(path, reason))?;
            ctx.export(
                name,
                Export {
                    descriptor: Arc::clone(&definition.descriptor),
                    constructor: Arc::new(ScriptConstructor(Arc::new(definition))),
                },
            );
        }

        let export_name = script.export.unwrap_or_else(|| key.export_name());
        tracing::debug!(
            exports = ?ctx.export_names().collect::<Vec<_>>(),
            wanted = %export_name,
            "evaluated {}",
            path.display()
        );
        let export = ctx
            .take_export(&export_name)
            .ok_or_else(|| StencilError::ExportNotFound {
                path: path.to_path_buf(),
                export: export_name.clone(),
            })?;

        Ok(TemplateHandle::new(
            key.clone(),
            path.to_path_buf(),
            export_name,
            export,
        ))
    }
}

impl TemplateLoader for ScriptLoader {
    fn extension(&self) -> &'static str {
        "toml"
    }

    fn load(&self, key: &TemplateKey, path: &Path, base: &BaseCapability) -> Result<TemplateHandle> {
        let source = fs::read_to_string(path).map_err(|err| StencilError::script_load(path, err))?;
        self.load_source(&source, key, path, base)
    }
}

fn evaluate_export(
    ctx: &ExecutionContext<'_>,
    key: &TemplateKey,
    name: &str,
    export: ExportSource,
) -> std::result::Result<ScriptDefinition, String> {
    let descriptor = export
        .descriptor
        .ok_or_else(|| format!("export {name} has no descriptor"))?;

    let prompts = export
        .prompts
        .ok_or_else(|| format!("export {name} does not define prompts"))?;

    let body = match (export.body, export.body_file) {
        (Some(_), Some(_)) => {
            return Err(format!("export {name} sets both body and body_file"));
        }
        (Some(body), None) => body,
        (None, Some(file)) => {
            let include = ctx.resolve_path(&file)?;
            fs::read_to_string(&include)
                .map_err(|err| format!("export {name}: {}: {err}", include.display()))?
        }
        (None, None) => return Err(format!("export {name} does not define a body")),
    };

    let steps = prompts
        .iter()
        .map(PromptSource::compile)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(ScriptDefinition {
        key: key.clone(),
        descriptor: Arc::new(descriptor),
        base: ctx.base().clone(),
        folder: export.folder,
        body,
        steps,
    })
}

#[derive(Debug)]
struct ScriptDefinition {
    key: TemplateKey,
    descriptor: Arc<TemplateDescriptor>,
    base: BaseCapability,
    folder: String,
    body: String,
    steps: Vec<PromptStep>,
}

struct ScriptConstructor(Arc<ScriptDefinition>);

impl TemplateConstructor for ScriptConstructor {
    fn construct(&self) -> Result<Box<dyn Template>> {
        Ok(Box::new(ScriptTemplate(Arc::clone(&self.0))))
    }
}

struct ScriptTemplate(Arc<ScriptDefinition>);

impl Template for ScriptTemplate {
    fn descriptor(&self) -> &TemplateDescriptor {
        &self.0.descriptor
    }

    fn prompt_steps(&self, seed: &Fields) -> Vec<PromptStep> {
        seed_steps(&self.0.steps, seed, self.0.key.as_str())
    }

    fn render(&mut self, fields: &Fields) -> Result<Artifact> {
        let definition = &self.0;
        definition
            .base
            .enforce_required(&definition.descriptor, fields)?;

        let key = definition.key.as_str();
        let folder = render_placeholders(&definition.folder, fields, key);
        let content = render_placeholders(&definition.body, fields, key);
        let title = fields.get("title").unwrap_or_default();

        definition.base.artifact(&folder, title, content)
    }
}

/// Offer seed values as defaults: declared defaults are rendered against the
/// seed, otherwise a seed value for the same field becomes the default.
pub fn seed_steps(steps: &[PromptStep], seed: &Fields, key: &str) -> Vec<PromptStep> {
    steps
        .iter()
        .cloned()
        .map(|mut step| {
            let request = &mut step.request;
            request.default = match request.default.take() {
                Some(default) if has_placeholders(&default) => {
                    Some(render_placeholders(&default, seed, key)).filter(|d| !d.is_empty())
                }
                Some(default) => Some(default),
                None => seed.non_blank(&request.field).map(str::to_string),
            };
            step
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::WISHLIST;
    use std::path::PathBuf;

    fn base() -> BaseCapability {
        BaseCapability::new("BaseTemplate")
    }

    fn load(source: &str, key: &str) -> Result<TemplateHandle> {
        ScriptLoader.load_source(
            source,
            &TemplateKey::new(key),
            &PathBuf::from("/srv/templates").join(format!("{key}.toml")),
            &base(),
        )
    }

    #[test]
    fn loads_the_conventional_export() {
        let handle = load(WISHLIST, "wishlist").unwrap();
        assert_eq!(handle.export_name(), "WishlistTemplate");
        assert_eq!(handle.descriptor().name, "Wishlist");
        assert_eq!(handle.display_name(), "Wishlist");
    }

    #[test]
    fn missing_export_is_export_not_found() {
        let err = load(WISHLIST, "gift").unwrap_err();
        match err {
            StencilError::ExportNotFound { export, .. } => assert_eq!(export, "GiftTemplate"),
            other => panic!("expected ExportNotFound, got {other:?}"),
        }
    }

    #[test]
    fn explicit_export_overrides_the_convention() {
        let source = WISHLIST.replacen(
            "extends = \"BaseTemplate\"",
            "extends = \"BaseTemplate\"\nexport = \"WishlistTemplate\"",
            1,
        );
        let handle = load(&source, "gift").unwrap();
        assert_eq!(handle.key().as_str(), "gift");
        assert_eq!(handle.export_name(), "WishlistTemplate");
    }

    #[test]
    fn unparseable_source_is_a_load_error() {
        let err = load("extends = [unterminated", "broken").unwrap_err();
        assert!(matches!(err, StencilError::ScriptLoad { .. }));
    }

    #[test]
    fn unknown_base_is_a_load_error() {
        let source = WISHLIST.replace("extends = \"BaseTemplate\"", "extends = \"Other\"");
        let err = load(&source, "wishlist").unwrap_err();
        assert!(err.to_string().contains("unknown base"));
    }

    #[test]
    fn export_without_prompts_fails_shape_check() {
        let source = r#"
extends = "BaseTemplate"
[exports.NoteTemplate]
body = "x"
[exports.NoteTemplate.descriptor]
name = "Note"
"#;
        let err = load(source, "note").unwrap_err();
        assert!(err.to_string().contains("does not define prompts"));
    }

    #[test]
    fn export_without_body_fails_shape_check() {
        let source = r#"
extends = "BaseTemplate"
[exports.NoteTemplate]
prompts = []
[exports.NoteTemplate.descriptor]
name = "Note"
"#;
        let err = load(source, "note").unwrap_err();
        assert!(err.to_string().contains("does not define a body"));
    }

    #[test]
    fn invalid_pattern_is_a_load_error() {
        let source = WISHLIST.replace(r"^\d+(\.\d{1,2})?$", "([");
        let err = load(&source, "wishlist").unwrap_err();
        assert!(err.to_string().contains("invalid pattern"));
    }

    #[test]
    fn body_file_is_resolved_inside_the_script_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("note.md"), "# {{title}}\n").unwrap();
        let source = r#"
extends = "BaseTemplate"
[exports.NoteTemplate]
body_file = "note.md"
prompts = []
[exports.NoteTemplate.descriptor]
name = "Note"
required_fields = ["title", "url", "type"]
"#;
        let path = dir.path().join("note.toml");
        let handle = ScriptLoader
            .load_source(source, &TemplateKey::new("note"), &path, &base())
            .unwrap();

        let mut template = handle.instantiate().unwrap();
        let fields: Fields = [("title", "Foo"), ("url", "u"), ("type", "note")]
            .into_iter()
            .collect();
        assert_eq!(template.render(&fields).unwrap().content(), "# Foo\n");

        let escaping = source.replace("note.md", "../note.md");
        let err = ScriptLoader
            .load_source(&escaping, &TemplateKey::new("note"), &path, &base())
            .unwrap_err();
        assert!(err.to_string().contains("escapes the template directory"));
    }

    #[test]
    fn seed_values_become_defaults() {
        let handle = load(WISHLIST, "wishlist").unwrap();
        let template = handle.instantiate().unwrap();
        let seed: Fields = [("title", "Foo"), ("url", "https://x")].into_iter().collect();

        let steps = template.prompt_steps(&seed);
        let fields: Vec<_> = steps.iter().map(|s| s.field()).collect();
        assert_eq!(fields, ["title", "price", "category"]);
        assert_eq!(steps[0].request.default.as_deref(), Some("Foo"));
        assert_eq!(steps[1].request.default, None);
        assert_eq!(steps[1].request.placeholder.as_deref(), Some("0.00"));
    }

    #[test]
    fn templated_defaults_render_against_the_seed() {
        let steps = vec![PromptStep::new(
            PromptRequest::text("alias", "Alias").with_default("{{title}} ({{type}})"),
        )];
        let seed: Fields = [("title", "Foo"), ("type", "book")].into_iter().collect();
        let seeded = seed_steps(&steps, &seed, "book");
        assert_eq!(seeded[0].request.default.as_deref(), Some("Foo (book)"));
    }

    #[test]
    fn render_fills_folder_and_body() {
        let handle = load(WISHLIST, "wishlist").unwrap();
        let mut template = handle.instantiate().unwrap();
        let fields: Fields = [
            ("type", "wishlist"),
            ("url", "https://x"),
            ("title", "Foo"),
            ("price", "12.50"),
            ("category", "books"),
        ]
        .into_iter()
        .collect();

        let artifact = template.render(&fields).unwrap();
        assert_eq!(artifact.folder(), "Wishlist/Items");
        assert_eq!(artifact.name(), "Foo");
        assert!(artifact.content().contains("- price: 12.50"));
        assert!(artifact.content().contains("- category: books"));
    }

    #[test]
    fn each_load_gets_its_own_definition() {
        let first = load(WISHLIST, "wishlist").unwrap();
        let changed = WISHLIST.replace("name = \"Wishlist\"", "name = \"Changed\"");
        let second = load(&changed, "wishlist").unwrap();

        assert_eq!(first.descriptor().name, "Wishlist");
        assert_eq!(second.descriptor().name, "Changed");
    }
}
