//! Output → human/json string formatting.
//!
//! Two modes:
//! - **Human** (default): aligned `label: value` report
//! - **JSON** (`--json`): `serde_json::to_string_pretty`

use std::fmt::Write;

use neostore_core::Error;

use crate::actions::{ContainerReport, Output};

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Format a successful output.
pub fn format_output(output: &Output, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => serde_json::to_string_pretty(output)
            .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e)),
        OutputMode::Human => format_human(output),
    }
}

/// Format an error.
pub fn format_error(err: &Error, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => serde_json::to_string_pretty(&serde_json::json!({
            "error": format!("{}", err)
        }))
        .unwrap_or_else(|_| format!("{{\"error\": \"{}\"}}", err)),
        OutputMode::Human => format!("(error) {}", err),
    }
}

fn format_human(output: &Output) -> String {
    match output {
        Output::Report(report) => format_report(report),
        Output::MetaWritten {
            path,
            group,
            written,
            resealed,
        } => {
            let group = if group.is_empty() { "root" } else { group.as_str() };
            let mut line = format!(
                "OK: {} entr{} written to [{}] of {}",
                written,
                plural_y(*written),
                group,
                path
            );
            if *resealed {
                line.push_str(" (resealed)");
            }
            line
        }
    }
}

fn plural_y(n: usize) -> &'static str {
    if n == 1 {
        "y"
    } else {
        "ies"
    }
}

fn format_report(report: &ContainerReport) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = writeln!(out, "path:       {}", report.path);
    let _ = writeln!(out, "format:     NEO5 v{}", report.format_version);
    let _ = writeln!(out, "file uuid:  {}", report.file_uuid);
    let _ = writeln!(out, "created:    {}", report.created_at);
    let _ = writeln!(out, "records:    {} ({} bytes)", report.records, report.valid_bytes);
    match (&report.sealed_by, &report.sealed_at) {
        (Some(by), Some(at)) => {
            let _ = writeln!(out, "state:      complete (sealed by {} at {})", by, at);
        }
        _ => {
            let _ = writeln!(out, "state:      incomplete (no seal record)");
        }
    }
    if report.torn_tail {
        let _ = writeln!(out, "torn tail:  yes");
    }

    for (group, entries) in &report.groups {
        let label = if group.is_empty() { "root" } else { group.as_str() };
        let _ = writeln!(out, "[{}]", label);
        for (key, value) in entries {
            let _ = writeln!(out, "  {} = {}", key, value);
        }
    }

    if report.datasets.is_empty() {
        let _ = write!(out, "datasets:   (none)");
    } else {
        let _ = write!(out, "datasets:");
        for ds in &report.datasets {
            let expand = ds
                .expand_dim
                .map(|d| format!(", expands along {}", d))
                .unwrap_or_default();
            let _ = write!(
                out,
                "\n  {} {} {:?}{}, {} chunk{}",
                ds.name,
                ds.dtype,
                ds.shape,
                expand,
                ds.chunks,
                if ds.chunks == 1 { "" } else { "s" }
            );
        }
    }
    out
}
