//! Plain-text views of the workspace model.

use chrono::DateTime;
use chrono::Utc;
use forge_core::log_stream::TerminalChunk;
use forge_core::mutation::MutationReport;
use forge_core::tabs::OpenFiles;
use forge_core::timeline::TimelineEntry;
use forge_core::tree::Projection;
use forge_core::tree::TreeNode;

pub fn tree_lines(projection: &Projection<'_>) -> Vec<String> {
    projection
        .rows()
        .into_iter()
        .map(|(depth, node)| {
            let indent = "  ".repeat(depth);
            match node {
                TreeNode::Directory { name, .. } => format!("{indent}{name}/"),
                TreeNode::File { name, .. } => format!("{indent}{name}"),
            }
        })
        .collect()
}

fn clock(ms: Option<u64>) -> String {
    ms.and_then(|ms| i64::try_from(ms).ok())
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

pub fn timeline_line(entry: &TimelineEntry) -> String {
    format!(
        "[{}] {:<7} {}: {}",
        clock(entry.updated_at_ms),
        entry.status.label(),
        entry.agent_name,
        entry.content
    )
}

pub fn terminal_line(chunk: &TerminalChunk) -> String {
    format!("[{}] {}", chunk.log_path, chunk.text.trim_end())
}

pub fn tabs_line(tabs: &OpenFiles) -> String {
    tabs.paths()
        .iter()
        .map(|path| {
            if tabs.selected() == Some(path.as_str()) {
                format!("*{path}")
            } else {
                path.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("  ")
}

pub fn report_line(report: &MutationReport) -> String {
    match &report.error {
        None => format!("{} #{}: {:?}", report.kind.label(), report.id.0, report.phase),
        Some(err) => format!(
            "{} #{}: {:?} ({err})",
            report.kind.label(),
            report.id.0,
            report.phase
        ),
    }
}
