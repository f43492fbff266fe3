//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use console::Term;
use opsched_config::Config;
use opsched_ops::Operation;
use opsched_types::{BadgeSet, OperationStatus};
use std::io;

/// Final state of one operation, as shown after a run
#[derive(Debug, Clone)]
pub struct OperationSummary {
    pub label: String,
    pub status: OperationStatus,
    pub badges: Option<BadgeSet>,
    pub output_lines: usize,
}

impl OperationSummary {
    pub fn capture(label: impl Into<String>, operation: &Operation) -> Self {
        Self {
            label: label.into(),
            status: operation.status(),
            badges: operation.badges(),
            output_lines: operation.output().len(),
        }
    }
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    /// Use JSON output format
    json_output: bool,
    /// Terminal instance
    term: Term,
}

impl OutputRenderer {
    /// Create new output renderer
    pub fn new(json_output: bool) -> Self {
        Self {
            json_output,
            term: Term::stdout(),
        }
    }

    /// Render the outcome of a run
    pub fn render_summary(&self, summaries: &[OperationSummary]) -> io::Result<()> {
        if self.json_output {
            let json: Vec<serde_json::Value> = summaries
                .iter()
                .map(|summary| {
                    serde_json::json!({
                        "command": summary.label,
                        "status": summary.status,
                        "badges": summary.badges,
                        "output_lines": summary.output_lines,
                    })
                })
                .collect();
            let rendered = serde_json::to_string_pretty(&json).map_err(io::Error::other)?;
            println!("{rendered}");
            return Ok(());
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Command").add_attribute(Attribute::Bold),
                Cell::new("Status").add_attribute(Attribute::Bold),
                Cell::new("Badges").add_attribute(Attribute::Bold),
                Cell::new("Lines").add_attribute(Attribute::Bold),
            ]);

        for summary in summaries {
            table.add_row(vec![
                Cell::new(&summary.label),
                self.format_status(summary.status),
                Cell::new(format_badges(summary.badges)),
                Cell::new(summary.output_lines),
            ]);
        }

        self.term.write_line(&table.to_string())
    }

    /// Render the effective configuration
    pub fn render_config(&self, config: &Config) -> io::Result<()> {
        if self.json_output {
            let json = serde_json::json!({
                "scheduler": {
                    "parallel_operations": config.scheduler.parallel_operations,
                    "poll_interval_ms": config.scheduler.poll_interval_ms,
                }
            });
            let rendered = serde_json::to_string_pretty(&json).map_err(io::Error::other)?;
            println!("{rendered}");
            return Ok(());
        }

        let rendered = config.to_toml().map_err(io::Error::other)?;
        self.term.write_str(&rendered)
    }

    fn format_status(&self, status: OperationStatus) -> Cell {
        let color = match status {
            OperationStatus::Succeeded => Color::Green,
            OperationStatus::Failed => Color::Red,
            OperationStatus::Canceled => Color::Yellow,
            OperationStatus::InQueue | OperationStatus::Running => Color::Blue,
        };
        Cell::new(status.to_string()).fg(color)
    }
}

fn format_badges(badges: Option<BadgeSet>) -> String {
    let Some(badges) = badges else {
        return "-".to_string();
    };
    let mut parts = Vec::new();
    if badges.as_administrator {
        parts.push("admin");
    }
    if badges.interactive {
        parts.push("interactive");
    }
    if badges.skip_integrity_check {
        parts.push("no-integrity-check");
    }
    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(", ")
    }
}
