//! Templates compiled to WebAssembly and run through extism.
//!
//! A module exports two functions. `describe` takes no input and returns
//! `{"descriptor": {...}, "prompts": [...]}`; `render` takes the collected
//! fields as a JSON object and returns `{"folder", "name", "content"}`. The
//! module is instantiated without WASI and without host functions.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use extism::{Manifest, Plugin, Wasm};
use serde::Deserialize;

use crate::error::{Result, StencilError};
use crate::model::params::Fields;
use crate::prompt::PromptStep;
use crate::template::context::{BaseCapability, Export};
use crate::template::descriptor::{TemplateDescriptor, TemplateKey};
use crate::template::sandbox::{PromptSource, TemplateLoader, seed_steps};
use crate::template::{Artifact, Template, TemplateConstructor, TemplateHandle};

#[derive(Debug, Deserialize)]
struct Description {
    descriptor: TemplateDescriptor,
    #[serde(default)]
    prompts: Vec<PromptSource>,
}

#[derive(Debug, Deserialize)]
struct Rendered {
    #[serde(default)]
    folder: String,
    #[serde(default)]
    name: Option<String>,
    content: String,
}

#[derive(Debug, Default)]
pub struct WasmLoader;

impl TemplateLoader for WasmLoader {
    fn extension(&self) -> &'static str {
        "wasm"
    }

    fn load(&self, key: &TemplateKey, path: &Path, base: &BaseCapability) -> Result<TemplateHandle> {
        let bytes = fs::read(path).map_err(|err| StencilError::script_load(path, err))?;
        let module = Arc::new(bytes);

        let mut plugin = instantiate(&module).map_err(|err| StencilError::script_load(path, err))?;
        let raw: String = plugin
            .call::<&str, String>("describe", "")
            .map_err(|err| StencilError::script_load(path, format!("describe: {err}")))?;
        let description: Description = serde_json::from_str(&raw)
            .map_err(|err| StencilError::script_load(path, format!("describe: {err}")))?;

        let steps = description
            .prompts
            .iter()
            .map(PromptSource::compile)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|reason| StencilError::script_load(path, reason))?;

        // A module exports exactly one template, always under the conventional name.
        let descriptor = Arc::new(description.descriptor);
        let export = Export {
            descriptor: Arc::clone(&descriptor),
            constructor: Arc::new(WasmConstructor {
                key: key.clone(),
                module,
                descriptor,
                base: base.clone(),
                steps,
            }),
        };

        Ok(TemplateHandle::new(
            key.clone(),
            path.to_path_buf(),
            key.export_name(),
            export,
        ))
    }
}

fn instantiate(module: &[u8]) -> std::result::Result<Plugin, extism::Error> {
    let manifest = Manifest::new([Wasm::data(module.to_vec())]);
    Plugin::new(&manifest, [], false)
}

struct WasmConstructor {
    key: TemplateKey,
    module: Arc<Vec<u8>>,
    descriptor: Arc<TemplateDescriptor>,
    base: BaseCapability,
    steps: Vec<PromptStep>,
}

impl TemplateConstructor for WasmConstructor {
    fn construct(&self) -> Result<Box<dyn Template>> {
        let plugin = instantiate(&self.module)
            .map_err(|err| StencilError::script_load(self.key.as_str(), err))?;

        Ok(Box::new(WasmTemplate {
            key: self.key.clone(),
            plugin,
            descriptor: Arc::clone(&self.descriptor),
            base: self.base.clone(),
            steps: self.steps.clone(),
        }))
    }
}

struct WasmTemplate {
    key: TemplateKey,
    plugin: Plugin,
    descriptor: Arc<TemplateDescriptor>,
    base: BaseCapability,
    steps: Vec<PromptStep>,
}

impl Template for WasmTemplate {
    fn descriptor(&self) -> &TemplateDescriptor {
        &self.descriptor
    }

    fn prompt_steps(&self, seed: &Fields) -> Vec<PromptStep> {
        seed_steps(&self.steps, seed, self.key.as_str())
    }

    fn render(&mut self, fields: &Fields) -> Result<Artifact> {
        self.base.enforce_required(&self.descriptor, fields)?;

        let input: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|(key, value)| (key.to_string(), serde_json::Value::from(value)))
            .collect();
        let input = serde_json::Value::Object(input).to_string();

        let raw: String = self
            .plugin
            .call::<&str, String>("render", &input)
            .map_err(|err| StencilError::script_load(self.key.as_str(), format!("render: {err}")))?;
        let rendered: Rendered = serde_json::from_str(&raw)
            .map_err(|err| StencilError::script_load(self.key.as_str(), format!("render: {err}")))?;

        let name = rendered
            .name
            .unwrap_or_else(|| fields.get("title").unwrap_or_default().to_string());
        self.base.artifact(&rendered.folder, &name, rendered.content)
    }
}
