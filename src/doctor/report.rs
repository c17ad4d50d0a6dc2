// ABOUTME: Human-readable rendering of doctor check results.
// ABOUTME: Groups tools by provider with status glyphs and remediation hints.

use super::{ToolReport, ToolStatus};
use crate::types::ProviderKind;
use std::fmt::Write;

/// Render an aggregate check as text for the terminal.
pub fn render_report(reports: &[ToolReport]) -> String {
    let mut out = String::new();

    for kind in ProviderKind::ALL {
        let group: Vec<&ToolReport> = reports
            .iter()
            .filter(|r| r.requirement.category == kind)
            .collect();
        if group.is_empty() {
            continue;
        }

        let _ = writeln!(out, "{kind}:");
        for report in group {
            let _ = writeln!(out, "  {}", render_line(report));
        }
    }

    out
}

fn render_line(report: &ToolReport) -> String {
    let name = &report.requirement.display_name;
    match &report.status {
        ToolStatus::Installed { version } => format!("✓ {name} ({version})"),
        ToolStatus::NotInstalled => format!(
            "✗ {name}: not installed. {}",
            report.requirement.install_hint
        ),
        ToolStatus::NotAuthenticated => {
            format!("! {name}: installed but not authenticated")
        }
        ToolStatus::Error(reason) => format!("? {name}: check failed: {reason}"),
    }
}
