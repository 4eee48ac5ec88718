use std::io::{self, BufRead, Write};

use crossterm::style::Stylize;
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::error::{Result, StencilError};
use crate::prompt::{PromptAnswer, PromptKind, PromptRequest, Prompter};

/// Typed on its own line, cancels the whole chain. End of input does the same.
pub const CANCEL_INPUT: &str = ":q";

/// Line-based prompt surface over any reader/writer pair.
pub struct TerminalPrompter<R, W> {
    reader: R,
    writer: W,
}

impl TerminalPrompter<io::StdinLock<'static>, io::Stderr> {
    /// Prompts go to stderr so stdout stays clean for command output.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    fn render(&mut self, request: &PromptRequest, retry_reason: Option<&str>) -> io::Result<()> {
        if let Some(reason) = retry_reason {
            writeln!(self.writer, "{}", format!("! {reason}").red())?;
        }

        if let PromptKind::Choice(options) = &request.kind {
            for (idx, option) in options.iter().enumerate() {
                writeln!(self.writer, "  {}) {option}", idx + 1)?;
            }
        }

        let hint = request.default.as_ref().or(request.placeholder.as_ref());
        match hint {
            Some(hint) => write!(self.writer, "{} [{}]: ", request.message.as_str().bold(), hint)?,
            None => write!(self.writer, "{}: ", request.message.as_str().bold())?,
        }
        self.writer.flush()
    }

    fn read_answer(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        let line = line.trim_end_matches(['\r', '\n']).to_string();
        if line.trim() == CANCEL_INPUT {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn ask(&mut self, request: &PromptRequest, retry_reason: Option<&str>) -> Result<PromptAnswer> {
        self.render(request, retry_reason)
            .map_err(|err| StencilError::PromptFailed(err.to_string()))?;

        let Some(raw) = self
            .read_answer()
            .map_err(|err| StencilError::PromptFailed(err.to_string()))?
        else {
            let _ = writeln!(self.writer);
            return Ok(PromptAnswer::Cancelled);
        };

        match &request.kind {
            PromptKind::Text => Ok(PromptAnswer::Value(raw)),
            PromptKind::Choice(options) => Ok(PromptAnswer::Value(pick_option(options, &raw))),
        }
    }
}

/// Resolve a choice answer: a 1-based index or a fuzzy query. Anything that
/// matches nothing is returned unchanged so the step rules can reject it.
pub fn pick_option(options: &[String], raw: &str) -> String {
    let query = raw.trim();
    if query.is_empty() {
        return raw.to_string();
    }

    if let Ok(index) = query.parse::<usize>() {
        if let Some(option) = index.checked_sub(1).and_then(|idx| options.get(idx)) {
            return option.clone();
        }
    }

    if options.iter().any(|option| option == query) {
        return query.to_string();
    }

    let matcher = SkimMatcherV2::default();
    options
        .iter()
        .filter_map(|option| matcher.fuzzy_match(option, query).map(|score| (score, option)))
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, option)| option.clone())
        .unwrap_or_else(|| query.to_string())
}
