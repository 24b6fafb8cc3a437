//! Format status listings, pass reports, and the part tree for the terminal.

use crate::error::ApiError;
use crate::session::PartStatus;
use crate::state::SyncReport;
use crate::tree::{PartTree, StatusIcon};
use crate::types::ChangeKind;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;
use std::path::Path;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn kind_label(kind: ChangeKind) -> String {
    let label = kind.as_str().replace('_', " ");
    match kind {
        ChangeKind::Unchanged => label,
        ChangeKind::ChangedByUser => format!("{}", label.cyan()),
        ChangeKind::ChangedFromOutside => format!("{}", label.yellow()),
        ChangeKind::Added => format!("{}", label.green()),
        ChangeKind::Deleted => format!("{}", label.red()),
    }
}

fn marker(icon: StatusIcon) -> &'static str {
    match icon {
        StatusIcon::ChangedFromOutside => "*",
        StatusIcon::NewlyAdded => "+",
        StatusIcon::DeletedPendingAck => "-",
        StatusIcon::None | StatusIcon::Folder | StatusIcon::File => "",
    }
}

/// Status of every part as a table.
pub fn format_status_text(container: &Path, parts: &[PartStatus]) -> String {
    let mut out = format!(
        "{}\n\n",
        format_section_heading(&format!("Parts of {}", container.display()))
    );
    if parts.is_empty() {
        out.push_str("  No parts.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["", "Part", "State"]);
    for part in parts {
        table.add_row(vec![
            marker(part.icon).to_string(),
            part.part.clone(),
            kind_label(part.kind),
        ]);
    }
    out.push_str(&format!("{}\n", table));

    let pending = parts
        .iter()
        .filter(|p| p.kind != ChangeKind::Unchanged)
        .count();
    out.push_str(&format!("\n{} part(s), {} not in sync\n", parts.len(), pending));
    out
}

pub fn format_status_json(container: &Path, parts: &[PartStatus]) -> Result<String, ApiError> {
    let value = json!({
        "container": container.display().to_string(),
        "checked_at": chrono::Utc::now().to_rfc3339(),
        "parts": parts,
    });
    serde_json::to_string_pretty(&value).map_err(|e| ApiError::OutputError(e.to_string()))
}

/// One-line summary of a reconciliation pass.
pub fn format_report(report: &SyncReport) -> String {
    let mut line = if report.first_load {
        format!("Loaded {} part(s)", report.added)
    } else {
        format!(
            "{} changed, {} added, {} unchanged, {} pending delete, {} removed",
            report.changed, report.added, report.unchanged, report.tombstoned, report.removed
        )
    };
    if report.pending_edits > 0 {
        line.push_str(&format!("; kept {} unsaved edit(s)", report.pending_edits));
    }
    if report.skipped > 0 {
        line.push_str(&format!("; skipped {} unsafe entr(ies)", report.skipped));
    }
    line.push_str(&format!(" in {} ms", report.duration_ms));
    line
}

/// Indented outline of the tree with change markers.
pub fn format_tree(tree: &PartTree) -> String {
    let mut out = String::new();
    for id in tree.walk() {
        let node = tree.node(id);
        let indent = "  ".repeat(tree.depth(id).saturating_sub(1));
        let name = if node.is_leaf() {
            node.name.clone()
        } else {
            format!("{}/", node.name)
        };
        let mark = marker(node.status);
        if mark.is_empty() {
            out.push_str(&format!("{}{}\n", indent, name));
        } else {
            out.push_str(&format!("{}{} {}\n", indent, name, mark.bold()));
        }
    }
    out
}
