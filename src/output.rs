//! Human-readable and JSON rendering of a [`ScanReport`].

use crate::{DuplicateGroup, GroupType, ScanReport};

/// Output format selector for the demo CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Renders a [`ScanReport`] as text or JSON.
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn render(&self, report: &ScanReport) -> anyhow::Result<String> {
        match self.format {
            OutputFormat::Text => Ok(self.format_as_text(report)),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        }
    }

    fn format_as_text(&self, report: &ScanReport) -> String {
        let mut out = String::new();

        out.push_str("SCAN RESULTS\n");
        out.push_str(&"=".repeat(50));
        out.push('\n');
        out.push_str(&format!("Files scanned: {}\n", report.total_files));
        out.push_str(&format!("Files processed: {}\n", report.files_processed));
        out.push_str(&format!("Files failed: {}\n", report.files_failed));
        out.push_str(&format!("Duplicate groups: {}\n", report.total_duplicate_groups));
        out.push_str(&format!("Duplicate files: {}\n", report.total_duplicate_files));
        out.push_str(&format!("Storage savings: {}\n", format_bytes(report.total_storage_savings_bytes)));
        out.push('\n');

        if report.total_duplicate_groups == 0 {
            out.push_str("No duplicates found.\n");
            return out;
        }

        out.push_str(&self.render_section("EXACT DUPLICATES", &report.exact_duplicates));
        out.push_str(&self.render_section("SUPERSET/SUBSET DUPLICATES", &report.superset_subset_duplicates));
        out.push_str(&self.render_section("NEAR DUPLICATES", &report.near_duplicates));

        if !report.errors.is_empty() {
            out.push_str("ERRORS\n");
            out.push_str(&"-".repeat(50));
            out.push('\n');
            for err in &report.errors {
                out.push_str(&format!("  {}: {}\n", err.file_name, err.error));
            }
        }

        out
    }

    fn render_section(&self, title: &str, groups: &[DuplicateGroup]) -> String {
        if groups.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        out.push_str(&format!("{title} ({})\n", groups.len()));
        out.push_str(&"-".repeat(50));
        out.push('\n');
        for (index, group) in groups.iter().enumerate() {
            out.push_str(&self.render_group(group, index + 1));
        }
        out.push('\n');
        out
    }

    fn render_group(&self, group: &DuplicateGroup, number: usize) -> String {
        let mut out = format!(
            "  #{number} primary: {} ({})\n",
            group.primary_file.name,
            format_bytes(group.primary_file.size)
        );
        out.push_str(&format!("    similarity: {:.2}\n", group.similarity_score));
        if let Some(containment) = group.containment_score {
            out.push_str(&format!("    containment: {containment:.2}\n"));
        }
        if let Some(method) = group.detection_method {
            out.push_str(&format!("    method: {method:?}\n"));
        }
        out.push_str(&format!("    savings: {}\n", format_bytes(group.storage_savings_bytes)));
        for dup in &group.duplicate_files {
            let marker = match group.group_type {
                GroupType::Exact => "=",
                GroupType::SupersetSubset => "⊂",
                GroupType::Near => "~",
            };
            out.push_str(&format!("    {marker} {}\n", dup.name));
        }
        out
    }
}

/// Human-readable byte sizes (B, KB, MB, GB, TB).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = ((bytes_f.ln() / THRESHOLD.ln()).floor() as usize).min(UNITS.len() - 1);
    let value = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{bytes} {}", UNITS[unit_index])
    } else {
        format!("{value:.2} {}", UNITS[unit_index])
    }
}
