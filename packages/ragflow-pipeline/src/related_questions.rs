//! Related-question generation (`aperag/pipeline/base_pipeline.py::
//! generate_related_question`): a second, independently-configured
//! completion call producing up to three follow-up questions. The source
//! prefers a structured tool-call response and falls back to parsing a
//! numbered or bulleted list out of plain text when no tool call comes
//! back; this workspace has no tool-calling channel on `CompletionService`
//! (spec.md's Non-goals exclude provider-exact streaming envelopes), so
//! only the text-parsing fallback is implemented.

use futures::StreamExt;
use once_cell::sync::Lazy;
use ragflow_core::Result;
use regex::Regex;

use ragflow_runners::CompletionService;

const MAX_RELATED_QUESTIONS: usize = 3;

static LIST_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*(?:\d+[.)]|[-*])\s*(.+?)\s*$").unwrap());

/// Ask `service` for up to three follow-up questions about `query` given
/// `context`, using `template` to render the prompt (`{query}`/`{context}`
/// placeholders, same convention as the main completion prompt template).
pub async fn generate_related_questions(
    service: &dyn CompletionService,
    template: &str,
    query: &str,
    context: &str,
) -> Result<Vec<String>> {
    let prompt = template.replace("{query}", query).replace("{context}", context);
    let mut stream = service.stream(Vec::new(), prompt, 256).await?;
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        text.push_str(&chunk?);
    }
    Ok(parse_related_questions(&text))
}

fn parse_related_questions(text: &str) -> Vec<String> {
    LIST_ITEM
        .captures_iter(text)
        .map(|m| m[1].to_string())
        .filter(|q| !q.is_empty())
        .take(MAX_RELATED_QUESTIONS)
        .collect()
}
