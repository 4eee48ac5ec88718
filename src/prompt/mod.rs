//! Sequential, retryable field collection.
//!
//! A template describes its inputs as a list of [`PromptStep`]s. The chain in
//! [`chain`] walks them in order against a [`Prompter`] surface, re-asking a
//! step whenever its rules reject the answer and stopping the whole chain on
//! an explicit cancellation.

pub mod chain;
#[cfg(test)]
pub mod scripted;
pub mod terminal;

use regex::Regex;

use crate::error::Result;

pub use chain::run_chain;
pub use terminal::TerminalPrompter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptKind {
    Text,
    Choice(Vec<String>),
}

/// One question put to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub field: String,
    pub message: String,
    pub placeholder: Option<String>,
    pub default: Option<String>,
    pub required: bool,
    pub kind: PromptKind,
}

impl PromptRequest {
    pub fn text(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            placeholder: None,
            default: None,
            required: true,
            kind: PromptKind::Text,
        }
    }

    pub fn choice(field: impl Into<String>, message: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            kind: PromptKind::Choice(options),
            ..Self::text(field, message)
        }
    }

    #[cfg(test)]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// What a prompt surface hands back. `Cancelled` is the "no answer" sentinel
/// and is distinct from an empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptAnswer {
    Value(String),
    Cancelled,
}

/// Tagged result of a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Value(String),
    Cancelled,
    Retryable(String),
}

/// Per-field check applied after the surface answers.
#[derive(Debug, Clone)]
pub enum FieldRule {
    Pattern { regex: Regex, message: String },
}

impl FieldRule {
    fn check(&self, value: &str) -> std::result::Result<(), String> {
        match self {
            FieldRule::Pattern { regex, message } => {
                if regex.is_match(value) {
                    Ok(())
                } else {
                    Err(message.clone())
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptStep {
    pub request: PromptRequest,
    pub rules: Vec<FieldRule>,
}

impl PromptStep {
    pub fn new(request: PromptRequest) -> Self {
        Self {
            request,
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn field(&self) -> &str {
        &self.request.field
    }

    /// Turn a raw answer into a step outcome.
    pub fn evaluate(&self, raw: String) -> StepOutcome {
        let request = &self.request;
        let value = match (&request.default, raw.trim().is_empty()) {
            (Some(default), true) => default.clone(),
            _ => raw.trim().to_string(),
        };

        if value.is_empty() {
            return if request.required {
                StepOutcome::Retryable(format!("{} cannot be empty", request.field))
            } else {
                StepOutcome::Value(value)
            };
        }

        if let PromptKind::Choice(options) = &request.kind {
            if !options.iter().any(|option| *option == value) {
                return StepOutcome::Retryable(format!(
                    "{value:?} is not one of: {}",
                    options.join(", ")
                ));
            }
        }

        for rule in &self.rules {
            if let Err(reason) = rule.check(&value) {
                return StepOutcome::Retryable(reason);
            }
        }

        StepOutcome::Value(value)
    }
}

/// An interactive surface able to answer one request at a time.
pub trait Prompter {
    /// Ask `request`. `retry_reason` is set when the same request is being
    /// re-issued after a rejected answer.
    fn ask(&mut self, request: &PromptRequest, retry_reason: Option<&str>) -> Result<PromptAnswer>;
}
