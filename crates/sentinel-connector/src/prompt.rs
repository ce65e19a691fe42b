use colored::Colorize;
use sentinel_connector_config::Prompter;
use std::io::{BufRead, Write};

/// Prompts on stdout, reads answers from stdin
pub struct StdioPrompter;

impl Prompter for StdioPrompter {
    fn prompt(&mut self, label: &str, default: Option<&str>) -> std::io::Result<String> {
        match default {
            Some(default) => print!("{} [{}]: ", label.bold(), default.dimmed()),
            None => print!("{}: ", label.bold()),
        }
        std::io::stdout().flush()?;

        let mut input = String::new();
        // EOF は空入力として扱う
        std::io::stdin().lock().read_line(&mut input)?;
        Ok(input.trim().to_string())
    }
}
