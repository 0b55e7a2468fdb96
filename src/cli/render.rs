//! Plain-text rendering of [`AppState`].

use std::fmt::Write;

use console::{style, truncate_str, StyledObject};

use crate::api::types::UploadSummary;
use crate::models::{Element, Label};
use crate::state::AppState;

const TEXT_WIDTH: usize = 96;

pub fn label_tag(label: Label) -> StyledObject<&'static str> {
    match label {
        Label::Pos => style("[pos]").green().bold(),
        Label::Neg => style("[neg]").red().bold(),
        Label::None => style("[   ]").dim(),
    }
}

fn prediction_note(element: &Element) -> String {
    match element.prediction {
        Some(p) => {
            let verdict = if p.label { "pos" } else { "neg" };
            match p.score {
                Some(score) => format!(" (model: {} {:.2})", verdict, score),
                None => format!(" (model: {})", verdict),
            }
        }
        None => String::new(),
    }
}

pub fn element_line(element: &Element, in_positives: bool) -> String {
    let marker = if in_positives { "*" } else { " " };
    let text = element.text.replace('\n', " ");
    format!(
        "{} {}{} {}{}",
        label_tag(element.user_label),
        marker,
        style(&element.id).cyan(),
        truncate_str(&text, TEXT_WIDTH, "..."),
        style(prediction_note(element)).dim()
    )
}

pub fn label_counts(state: &AppState) -> String {
    format!(
        "{} positive, {} negative in this document; {} positive, {} negative in the workspace",
        state.label_count.pos,
        state.label_count.neg,
        state.label_count_global.pos,
        state.label_count_global.neg
    )
}

pub fn document_list(state: &AppState) -> String {
    let mut out = String::new();
    if state.documents.is_empty() {
        let _ = writeln!(out, "{}", style("Workspace has no documents").dim());
        return out;
    }
    for (i, doc) in state.documents.iter().enumerate() {
        let current = state.document.is_some() && i == state.cur_doc_index;
        let marker = if current { ">" } else { " " };
        let _ = writeln!(out, "{} {:>4}  {}", marker, i, doc.document_id);
    }
    out
}

/// Header, visible elements and footer of the current document page.
pub fn document_page(state: &AppState) -> String {
    let mut out = String::new();
    let Some(name) = state.current_doc_name() else {
        let _ = writeln!(out, "{}", style("No document loaded").dim());
        return out;
    };

    let _ = writeln!(
        out,
        "{} ({}/{})  Text Entries: {}",
        style(name).bold(),
        state.cur_doc_index + 1,
        state.documents.len().max(1),
        state.elements().len()
    );

    let page = state.current_page();
    for element in page.visible {
        let _ = writeln!(
            out,
            "{}",
            element_line(element, state.positive_labels.contains(&element.id))
        );
    }
    if page.is_pagination_required {
        let _ = writeln!(
            out,
            "{}",
            style(format!("page {} of {}", page.effective_page, page.total_pages)).dim()
        );
    }
    let _ = writeln!(out, "{}", label_counts(state));
    if let Some(ref message) = state.error_message {
        let _ = writeln!(out, "{}", style(message).red());
    }
    out
}

pub fn upload_summary(summary: &UploadSummary) -> String {
    let mut out = String::new();
    match summary.total {
        Some(total) => {
            let _ = writeln!(out, "{} {} labels", style("Uploaded").green(), total);
        }
        None => {
            let _ = writeln!(out, "{}", style("Uploaded").green());
        }
    }
    for (key, value) in &summary.details {
        let _ = writeln!(out, "  {}: {}", key, value);
    }
    out
}
