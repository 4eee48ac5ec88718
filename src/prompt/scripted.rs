use std::collections::VecDeque;

use crate::error::{Result, StencilError};
use crate::prompt::{PromptAnswer, PromptRequest, Prompter};

/// Replays queued answers and records every request it was asked.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<PromptAnswer>,
    pub asked: Vec<(PromptRequest, Option<String>)>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_answers(
            answers
                .into_iter()
                .map(|answer| PromptAnswer::Value(answer.into()))
                .collect(),
        )
    }

    pub fn from_answers(answers: Vec<PromptAnswer>) -> Self {
        Self {
            answers: answers.into(),
            asked: Vec::new(),
        }
    }

    pub fn fields_asked(&self) -> Vec<&str> {
        self.asked.iter().map(|(request, _)| request.field.as_str()).collect()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, request: &PromptRequest, retry_reason: Option<&str>) -> Result<PromptAnswer> {
        self.asked
            .push((request.clone(), retry_reason.map(str::to_string)));
        self.answers
            .pop_front()
            .ok_or_else(|| StencilError::PromptFailed(format!("no scripted answer for {}", request.field)))
    }
}
