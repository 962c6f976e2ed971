//! Shared display helpers for prerequisite status.
//!
//! Used by `check` and by `install` when it re-checks afterwards.

use crate::prerequisites::{PrerequisiteStatus, StatusReport, Verification};
use crate::ui::{PreflightTheme, Table, UserInterface};

/// Version cell for a status row.
///
/// Per-version prerequisites list every checked version with its result.
pub fn version_cell(status: &PrerequisiteStatus) -> String {
    match &status.versions {
        Some(versions) if !versions.is_empty() => versions
            .iter()
            .map(|v| {
                let mark = if v.installed { "✓" } else { "✗" };
                format!("{} {}", mark, v.version)
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => status.version.clone().unwrap_or_default(),
    }
}

/// Detail cell: why a prerequisite is missing or undetermined.
pub fn detail_cell(status: &PrerequisiteStatus) -> String {
    if let Verification::Undetermined { reason } = &status.verification {
        return reason.clone();
    }
    if status.installed {
        return String::new();
    }
    status
        .failure
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default()
}

/// Build the status table for a report, plugins nested under their parent.
pub fn status_table(theme: &PreflightTheme, report: &StatusReport) -> Table {
    let mut table = Table::new(&["Prerequisite", "Status", "Version", "Detail"]);

    for status in &report.statuses {
        table.add_row(&[
            status.name.clone(),
            theme.format_status(status),
            version_cell(status),
            detail_cell(status),
        ]);

        for plugin in &status.plugins {
            let cell = if plugin.installed {
                theme.format_success("installed")
            } else {
                theme.format_error("missing")
            };
            let detail = plugin
                .failure
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            table.add_row(&[format!("  └ {}", plugin.name), cell, String::new(), detail]);
        }
    }

    table
}

/// Print the table and a one-line verdict.
pub fn show_report(ui: &mut dyn UserInterface, report: &StatusReport) {
    let table = status_table(ui.theme(), report);
    ui.message(&table.render());
    ui.message("");

    let blocking = report.blocking();
    if blocking.is_empty() {
        let incomplete = report.statuses.iter().filter(|s| !s.is_complete()).count();
        if incomplete == 0 {
            ui.success("All prerequisites installed");
        } else {
            ui.success("All required prerequisites installed");
        }
    } else {
        let names: Vec<&str> = blocking.iter().map(|s| s.name.as_str()).collect();
        ui.error(&format!(
            "{} required prerequisite{} missing: {}",
            blocking.len(),
            if blocking.len() == 1 { "" } else { "s" },
            names.join(", ")
        ));
    }

    if !report.installable().is_empty() {
        ui.message("Run `preflight install --missing` to install what is missing");
    }
}
