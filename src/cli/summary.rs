// Human-readable run summary printed after a successful run.

use crate::core::pipeline::{formatting, PipelineReport};

/// Bytes as kilobytes with two decimals, e.g. ` 2.05K`.
pub fn kilobytes(bytes: u64) -> String {
    format!("{:6.2}K", bytes as f64 / 1000.0)
}

pub fn render(report: &PipelineReport) -> Vec<String> {
    let file = &report.file;
    let mut lines = vec![
        format!(
            "* Downloaded '{}' ({}, {}, size: {})",
            file.name,
            file.mime_type,
            file.modified_time.to_rfc3339(),
            kilobytes(file.size.unwrap_or_default()).trim()
        ),
        format!(
            "* Uploaded '{}' to bucket '{}' ({})",
            report.archive.object_name,
            report.archive.bucket,
            report.archive.gs_uri()
        ),
        format!(
            "* Top {} labels from Vision: {}",
            report.analysis.len(),
            formatting::label_summary(&report.analysis)
        ),
    ];

    if let Some(description) = &report.description {
        lines.push(format!("* Description from Gemini: {}", description));
    }
    if let Some(location) = file.location {
        lines.push(format!("* Photo location: {}", location.maps_url()));
    }

    lines.push(format!("* Added {} cells to the report sheet", report.cells_updated));
    lines
}
