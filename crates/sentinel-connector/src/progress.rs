//! Terminal progress output

use chrono::Local;
use colored::Colorize;
use sentinel_connector_cloud::{ProgressObserver, RunSummary, Step, StepRecord, StepStatus};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct ConsoleProgress {
    start_time: Instant,
    current_step: Mutex<Option<(Step, Instant)>>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            current_step: Mutex::new(None),
        }
    }

    /// Final summary after a successful run
    pub fn print_summary(&self, summary: RunSummary) {
        println!();
        println!("{}", "═".repeat(60).bright_blue());
        println!(
            "{} Provisioning complete: {} ({})",
            "✓".green().bold(),
            summary.to_string().bold(),
            format_duration(self.start_time.elapsed()).dimmed()
        );
        println!("{}", "═".repeat(60).bright_blue());
    }

    fn step_elapsed(&self) -> Option<Duration> {
        self.current_step
            .lock()
            .ok()
            .and_then(|current| current.map(|(_, start)| start.elapsed()))
    }
}

impl ProgressObserver for ConsoleProgress {
    fn step_started(&self, step: Step) {
        let timestamp = Local::now().format("%H:%M:%S").to_string();
        println!();
        println!(
            "[{}] {} {}",
            timestamp.dimmed(),
            "▶".cyan(),
            format!("【Step {}/{}】{}", step.number(), Step::ALL.len(), step.name()).bold()
        );
        if let Ok(mut current) = self.current_step.lock() {
            *current = Some((step, Instant::now()));
        }
    }

    fn record(&self, record: &StepRecord) {
        let timestamp = Local::now().format("%H:%M:%S").to_string();
        let marker = match record.status {
            StepStatus::Created | StepStatus::Deployed => "✓".green().bold(),
            StepStatus::Reused | StepStatus::Resolved => "✓".cyan(),
            StepStatus::Skipped | StepStatus::AlreadyExists => "⏭".yellow(),
        };
        let elapsed = self
            .step_elapsed()
            .map(format_duration)
            .unwrap_or_default();
        println!(
            "[{}] {} {} {} {}",
            timestamp.dimmed(),
            marker,
            record.status.to_string().bold(),
            record.subject,
            elapsed.dimmed()
        );
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{}m {}s", duration.as_secs() / 60, duration.as_secs() % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }
}
