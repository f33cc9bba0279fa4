//! Task classification.

use tracing::{info, warn};

use super::PhaseContext;
use crate::id::RunId;
use crate::invoker::Assistant;
use crate::layout::Component;
use crate::state::TaskType;
use crate::template::{self, TemplateName};

/// The first classification word in `text` (case-insensitive, whole words
/// only), or [`TaskType::Unknown`].
pub fn parse_task_type(text: &str) -> TaskType {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .find_map(|word| {
            let word = word.to_ascii_lowercase();
            TaskType::CLASSIFIED
                .into_iter()
                .find(|t| t.as_str() == word)
        })
        .unwrap_or(TaskType::Unknown)
}

/// Ask the assistant to classify `request`. One attempt; any failure
/// yields [`TaskType::Unknown`]. A blank request is not sent at all.
///
/// The classify template is read by the caller so a missing template
/// surfaces before anything is written.
pub async fn classify(
    ctx: &PhaseContext,
    assistant: &dyn Assistant,
    run_id: &RunId,
    template_body: &str,
    request: &str,
) -> TaskType {
    if request.trim().is_empty() {
        info!(run_id = %run_id, "empty request, skipping classification");
        return TaskType::Unknown;
    }

    let mut req = ctx.request(
        run_id,
        Component::Classifier,
        template::render(template_body, request),
    );
    req.single_attempt = true;

    let response = ctx.invoke_and_summarize(assistant, &req, |_| None).await;
    if !response.success {
        warn!(
            run_id = %run_id,
            error = response.error_message(),
            "classification failed, recording task type as unknown"
        );
        return TaskType::Unknown;
    }

    let task_type = parse_task_type(&response.output);
    info!(run_id = %run_id, task_type = %task_type, "request classified");
    task_type
}

/// Load the classify template.
pub(crate) fn load_template(ctx: &PhaseContext) -> Result<String, template::TemplateError> {
    template::load(&ctx.layout, TemplateName::Classify)
}
