//! Renders the whole history as one HTML document for the display surface.
//! Every update regenerates the full markup; there is no diffing.

use askama::Template;
use tracing::warn;

use crate::history::{EntryStatus, History};

/// Labels shown in front of each block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderStyle {
    pub question_label: String,
    pub answer_label: String,
    pub failure_label: String,
    pub cancelled_label: String,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            question_label: "Frage".into(),
            answer_label: "Antwort".into(),
            failure_label: "Fehler".into(),
            cancelled_label: "Abgebrochen".into(),
        }
    }
}

// Every interpolated value goes through askama's HTML escaper.
#[derive(Template)]
#[template(
    source = "<html>\
{% for entry in entries %}\
<div class='question' style='border-radius: 15px; background-color: #d1e7ff; padding: 5px; \
margin: 5px 0; width: 80%; float: left; text-align: justify; white-space: pre-wrap;'>\
<strong>{{ style.question_label }}: </strong>{{ entry.question }}</div>\
<div class='answer' style='border-radius: 15px; background-color: #f7f7f7; padding: 5px; \
margin: 5px 0; width: 80%; float: right; text-align: justify; white-space: pre-wrap; \
margin-left: 20%;'>\
<strong>{{ style.answer_label }}: </strong>{{ entry.answer }}\
{% if !entry.note.is_empty() %}<em class='note' style='color: #a40000;'>{{ entry.note }}</em>{% endif %}\
</div><br style='clear: both;'>\
{% endfor %}\
</html>",
    ext = "html"
)]
struct HistoryTemplate<'a> {
    style: &'a RenderStyle,
    entries: Vec<EntryView<'a>>,
}

struct EntryView<'a> {
    question: &'a str,
    answer: &'a str,
    /// Failure or cancellation marker; empty for pending and answered entries.
    note: String,
}

/// Render `history` as `<html>` with a question block and an answer block per entry.
pub fn render_history(history: &History, style: &RenderStyle) -> String {
    let entries = history
        .iter()
        .map(|entry| EntryView {
            question: &entry.question,
            answer: &entry.answer,
            note: match &entry.status {
                EntryStatus::Pending | EntryStatus::Answered => String::new(),
                EntryStatus::Failed(reason) => format!("{}: {}", style.failure_label, reason),
                EntryStatus::Cancelled => style.cancelled_label.clone(),
            },
        })
        .collect();
    HistoryTemplate { style, entries }
        .render()
        .unwrap_or_else(|e| {
            warn!(error = %e, "failed to render chat history");
            String::from("<html></html>")
        })
}
