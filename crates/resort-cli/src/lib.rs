use resort_core::models::{PurgeOutcome, SweepSummary};
use std::fmt::Write as _;
use std::str::FromStr;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid format. Must be: table or json")),
        }
    }
}

/// Render a sweep summary for stdout.
pub fn render_summary(summary: &SweepSummary, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(summary)?),
        OutputFormat::Table => {
            let mut out = String::new();
            writeln!(
                out,
                "found: {}  purged: {}  superseded: {}  failed: {}  alerting: {}",
                summary.found,
                summary.purged,
                summary.superseded,
                summary.failed,
                summary.alerting
            )?;
            if summary.outcomes.is_empty() {
                return Ok(out);
            }
            writeln!(out, "{:<38} {:<10} {}", "BOOKING", "STATE", "DETAIL")?;
            for outcome in &summary.outcomes {
                match outcome {
                    PurgeOutcome::Purged {
                        booking_id,
                        already_absent,
                    } => {
                        let detail = if *already_absent { "already absent" } else { "" };
                        writeln!(out, "{:<38} {:<10} {}", booking_id, "purged", detail)?;
                    }
                    PurgeOutcome::Superseded { booking_id, .. } => {
                        writeln!(
                            out,
                            "{:<38} {:<10} {}",
                            booking_id, "superseded", "reference changed"
                        )?;
                    }
                    PurgeOutcome::RemoteDeleteFailed {
                        booking_id,
                        error,
                        attempts,
                        ..
                    } => {
                        let attempts = attempts
                            .map(|a| format!(" (attempts: {})", a))
                            .unwrap_or_default();
                        writeln!(out, "{:<38} {:<10} {}{}", booking_id, "failed", error, attempts)?;
                    }
                }
            }
            Ok(out)
        }
    }
}

fn wants_json_logs(log_format: Option<&str>) -> bool {
    log_format.is_some_and(|f| f.trim().eq_ignore_ascii_case("json"))
}

/// Initialize tracing for CLI binaries.
///
/// `RUST_LOG` controls the filter (default `info`); `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if wants_json_logs(std::env::var("LOG_FORMAT").ok().as_deref()) {
        builder.json().init();
    } else {
        builder.init();
    }
}
