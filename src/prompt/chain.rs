use crate::error::Result;
use crate::model::params::Fields;
use crate::prompt::{PromptAnswer, PromptStep, Prompter, StepOutcome};

/// Ask one step once.
pub fn run_step(
    prompter: &mut dyn Prompter,
    step: &PromptStep,
    retry_reason: Option<&str>,
) -> Result<StepOutcome> {
    match prompter.ask(&step.request, retry_reason)? {
        PromptAnswer::Cancelled => Ok(StepOutcome::Cancelled),
        PromptAnswer::Value(raw) => Ok(step.evaluate(raw)),
    }
}

/// Walk `steps` in order.
///
/// Returns `Ok(None)` when the user cancels at any step; a surface error ends
/// the chain with `Err`. A retryable outcome re-issues the same request until
/// it yields a value or a cancellation.
pub fn run_chain(prompter: &mut dyn Prompter, steps: &[PromptStep]) -> Result<Option<Fields>> {
    let mut fields = Fields::new();

    for (idx, step) in steps.iter().enumerate() {
        let mut retry_reason: Option<String> = None;

        loop {
            match run_step(prompter, step, retry_reason.as_deref())? {
                StepOutcome::Value(value) => {
                    tracing::debug!(field = step.field(), step = idx, "field collected");
                    fields.insert(step.field(), value);
                    break;
                }
                StepOutcome::Cancelled => {
                    tracing::info!(field = step.field(), step = idx, "prompt chain cancelled");
                    return Ok(None);
                }
                StepOutcome::Retryable(reason) => {
                    tracing::debug!(field = step.field(), %reason, "re-prompting");
                    retry_reason = Some(reason);
                }
            }
        }
    }

    Ok(Some(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StencilError;
    use crate::prompt::scripted::ScriptedPrompter;
    use crate::prompt::PromptRequest;

    fn steps() -> Vec<PromptStep> {
        vec![
            PromptStep::new(PromptRequest::text("title", "Title")),
            PromptStep::new(PromptRequest::text("price", "Price")),
        ]
    }

    #[test]
    fn collects_fields_in_order() {
        let mut prompter = ScriptedPrompter::new(["Foo", "10"]);
        let fields = run_chain(&mut prompter, &steps()).unwrap().unwrap();

        assert_eq!(fields.keys().collect::<Vec<_>>(), ["title", "price"]);
        assert_eq!(fields.get("price"), Some("10"));
        assert_eq!(prompter.asked.len(), 2);
    }

    #[test]
    fn retry_reissues_the_same_request_until_valid() {
        let mut prompter = ScriptedPrompter::new(["", " ", "", "Foo", "10"]);
        let fields = run_chain(&mut prompter, &steps()).unwrap().unwrap();
        assert_eq!(fields.get("title"), Some("Foo"));

        let title_asks: Vec<_> = prompter
            .asked
            .iter()
            .filter(|(request, _)| request.field == "title")
            .collect();
        assert_eq!(title_asks.len(), 4);
        assert!(title_asks.iter().all(|(request, _)| *request == steps()[0].request));
        assert_eq!(title_asks[0].1, None);
        assert_eq!(title_asks[3].1.as_deref(), Some("title cannot be empty"));
    }

    #[test]
    fn cancellation_aborts_without_error() {
        let mut prompter = ScriptedPrompter::from_answers(vec![
            PromptAnswer::Value("Foo".into()),
            PromptAnswer::Cancelled,
        ]);
        assert_eq!(run_chain(&mut prompter, &steps()).unwrap(), None);
        assert_eq!(prompter.asked.len(), 2);
    }

    #[test]
    fn cancellation_during_retry_still_aborts() {
        let mut prompter = ScriptedPrompter::from_answers(vec![
            PromptAnswer::Value(String::new()),
            PromptAnswer::Value(String::new()),
            PromptAnswer::Cancelled,
        ]);
        assert_eq!(run_chain(&mut prompter, &steps()).unwrap(), None);
    }

    #[test]
    fn surface_failure_is_fatal() {
        let mut prompter = ScriptedPrompter::new(["Foo"]);
        let err = run_chain(&mut prompter, &steps()).unwrap_err();
        assert!(matches!(err, StencilError::PromptFailed(_)));
    }

    #[test]
    fn empty_chain_yields_empty_fields() {
        let mut prompter = ScriptedPrompter::new(Vec::<&str>::new());
        let fields = run_chain(&mut prompter, &[]).unwrap().unwrap();
        assert!(fields.is_empty());
    }
}
