//! The resolve → validate → prompt → validate → materialize sequence.

use std::path::PathBuf;

use crate::error::{Result, StencilError};
use crate::materialize::Materializer;
use crate::model::params::{Fields, ParameterBag};
use crate::prompt::{PromptRequest, PromptStep, Prompter, run_chain};
use crate::template::validate::{validate_metadata, validate_params};
use crate::template::{TemplateHandle, TemplateRegistry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created(PathBuf),
    /// The user cancelled a prompt; nothing was written and nothing failed.
    Abandoned,
}

/// Drives one invocation at a time. Every entry point takes `&mut self`, so a
/// dispatcher never has two prompt chains in flight.
pub struct Dispatcher<P, M> {
    registry: TemplateRegistry,
    prompter: P,
    materializer: M,
}

impl<P: Prompter, M: Materializer> Dispatcher<P, M> {
    pub fn new(registry: TemplateRegistry, prompter: P, materializer: M) -> Self {
        Self {
            registry,
            prompter,
            materializer,
        }
    }

    #[cfg(test)]
    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    #[cfg(test)]
    pub fn materializer(&self) -> &M {
        &self.materializer
    }

    /// Automated path: a protocol call or command-style parameter bag.
    pub fn invoke(&mut self, bag: &ParameterBag) -> Result<Outcome> {
        let mut supplied = bag.normalize();
        let key = supplied
            .non_blank("type")
            .map(|key| key.trim().to_string())
            .ok_or_else(|| StencilError::MissingParameter("type".to_string()))?;
        tracing::info!(template = %key, "protocol invocation");

        // Discovery lookup only; the definition is not loaded until the core
        // fields are in.
        if !self.registry.contains(&key) {
            return Err(StencilError::TemplateNotFound(key));
        }
        supplied.require_core()?;
        supplied.insert("type", key.as_str());

        let handle = self.prepare(&key)?;

        self.complete(&handle, supplied)
    }

    /// Manual path: pick a template when `key` is `None`, ask for `url` and
    /// `title`, then run the template's own chain.
    pub fn create_manual(&mut self, key: Option<&str>) -> Result<Outcome> {
        let key = match key {
            Some(key) => key.to_string(),
            None => match self.choose_template()? {
                Some(key) => key,
                None => return Ok(Outcome::Abandoned),
            },
        };
        tracing::info!(template = %key, "manual invocation");

        let handle = self.prepare(&key)?;

        let entry = [
            PromptStep::new(PromptRequest::text("url", "URL")),
            PromptStep::new(PromptRequest::text("title", "Title")),
        ];
        let Some(entered) = run_chain(&mut self.prompter, &entry)? else {
            return Ok(Outcome::Abandoned);
        };

        let mut supplied = Fields::new();
        supplied.insert("type", key);
        supplied.merge(&entered);
        self.complete(&handle, supplied)
    }

    fn choose_template(&mut self) -> Result<Option<String>> {
        let keys: Vec<String> = self.registry.list().map(|(key, _)| key.0).collect();
        if keys.is_empty() {
            return Err(StencilError::TemplateNotFound(format!(
                "no templates in {}",
                self.registry.script_dir().display()
            )));
        }

        let step = PromptStep::new(PromptRequest::choice("type", "Template", keys));
        Ok(run_chain(&mut self.prompter, &[step])?
            .and_then(|fields| fields.get("type").map(str::to_string)))
    }

    fn prepare(&mut self, key: &str) -> Result<TemplateHandle> {
        let handle = self.registry.resolve(key)?;
        validate_metadata(handle.descriptor())?;
        Ok(handle)
    }

    fn complete(&mut self, handle: &TemplateHandle, supplied: Fields) -> Result<Outcome> {
        let mut template = handle.instantiate()?;
        let steps = template.prompt_steps(&supplied);

        let Some(collected) = run_chain(&mut self.prompter, &steps)? else {
            return Ok(Outcome::Abandoned);
        };

        let mut fields = supplied;
        fields.merge(&collected);
        validate_params(template.descriptor(), &fields)?;

        let artifact = template.render(&fields)?;
        let path = self.materializer.write_artifact(
            artifact.folder(),
            artifact.name(),
            artifact.content(),
        )?;

        tracing::info!(template = %handle.key(), path = %path.display(), "artifact created");
        Ok(Outcome::Created(path))
    }
}

/// Surface a failure once to the user and log the full detail.
pub fn report(err: &StencilError) {
    tracing::error!(error = ?err, "invocation failed");
    eprintln!("stencil: {err}");
}
