//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use sluice_pipeline::{RunReport, StatusReport, Termination};
use tabled::{
    builder::Builder,
    settings::{object::Columns, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format the summary of a finished run.
    pub fn format_report(&self, report: &RunReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
            OutputFormat::Quiet => Ok(report.termination.to_string()),
            OutputFormat::Table => Ok(self.format_report_table(report)),
        }
    }

    fn format_report_table(&self, report: &RunReport) -> String {
        let remaining = |v: Option<u64>| v.map(|n| n.to_string()).unwrap_or_else(|| "unknown".to_string());

        let rows = [
            ("Mode", report.mode.to_string()),
            ("Iterations", report.iterations.to_string()),
            ("Claimed", report.claimed.to_string()),
            ("Completed", report.completed.to_string()),
            ("Failed", report.failed.to_string()),
            ("  of which validation", report.validation_failed.to_string()),
            ("Quota stopped", report.quota_stopped.to_string()),
            ("Lost races", report.lost_races.to_string()),
            ("Crashed", report.crashed.to_string()),
            ("Superseded", report.superseded.to_string()),
            ("Still pending", remaining(report.still_pending)),
            ("Still processing", remaining(report.still_processing)),
        ];

        let mut builder = Builder::default();
        for (label, value) in rows {
            builder.push_record([label.to_string(), value]);
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Columns::last()).with(Alignment::right()));

        format!("{}\n{}", table, self.termination(&report.termination))
    }

    /// Format the read-only status snapshot.
    pub fn format_status(&self, status: &StatusReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&status.to_json())?),
            OutputFormat::Quiet => Ok(status.tasks.pending.to_string()),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Status", "Tasks"]);
                for (name, count) in status.tasks.as_map() {
                    builder.push_record([name.to_string(), count.to_string()]);
                }
                builder.push_record(["total".to_string(), status.tasks.total().to_string()]);

                let mut table = builder.build();
                table
                    .with(Style::rounded())
                    .with(Modify::new(Columns::last()).with(Alignment::right()));

                Ok(format!(
                    "{}\n{}",
                    table,
                    self.info(&format!(
                        "{} documents in the destination store",
                        status.destination_documents
                    ))
                ))
            }
        }
    }

    /// Format a count returned by an operator command.
    pub fn count(&self, count: u64, message: &str) -> String {
        match self.format {
            OutputFormat::Json => serde_json::json!({ "count": count }).to_string(),
            OutputFormat::Quiet => count.to_string(),
            OutputFormat::Table => self.success(&format!("{} {}", count, message)),
        }
    }

    /// Format a termination reason.
    pub fn termination(&self, termination: &Termination) -> String {
        let message = format!("Run ended: {}", termination);
        match termination {
            Termination::Fatal(_) => self.error(&message),
            Termination::QuotaExhausted | Termination::Cancelled | Termination::IterationCap => {
                self.warning(&message)
            }
            Termination::EmptyQueue | Termination::SinglePass => self.success(&message),
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_domain::TaskStats;
    use sluice_pipeline::RunMode;

    fn finished_report() -> RunReport {
        let mut report = RunReport::new(RunMode::DrainUntilEmpty);
        report.iterations = 2;
        report.claimed = 5;
        report.completed = 4;
        report.failed = 1;
        report.still_pending = Some(0);
        report.still_processing = Some(0);
        report.termination = Termination::EmptyQueue;
        report
    }

    #[test]
    fn test_report_table() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_report(&finished_report()).unwrap();
        assert!(output.contains("Completed"));
        assert!(output.contains("drain-until-empty"));
        assert!(output.ends_with("✓ Run ended: empty queue"));
    }

    #[test]
    fn test_report_json() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let output = formatter.format_report(&finished_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["completed"], 4);
        assert_eq!(value["mode"], "drain-until-empty");
        assert_eq!(value["termination"], "empty_queue");
    }

    #[test]
    fn test_report_quiet() {
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        let mut report = finished_report();
        report.termination = Termination::QuotaExhausted;
        assert_eq!(formatter.format_report(&report).unwrap(), "quota exhausted");
    }

    #[test]
    fn test_status_table() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let status = StatusReport {
            tasks: TaskStats {
                pending: 3,
                processing: 1,
                completed: 10,
                failed: 2,
            },
            destination_documents: 10,
        };
        let output = formatter.format_status(&status).unwrap();
        assert!(output.contains("pending"));
        assert!(output.contains("16"));
        assert!(output.contains("10 documents"));
    }

    #[test]
    fn test_fatal_termination_is_error() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let line = formatter.termination(&Termination::Fatal("disk gone".into()));
        assert_eq!(line, "✗ Run ended: fatal error: disk gone");
    }

    #[test]
    fn test_colorize_disabled() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        assert_eq!(formatter.success("test"), "✓ test");
        assert_eq!(formatter.count(2, "tasks requeued"), "✓ 2 tasks requeued");
    }
}
