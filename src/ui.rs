/// User Interface Module
///
/// Terminal output helpers shared by the Driver and Worker: colored status
/// lines, the environment inventory table, progress spinners for staging, and
/// confirmation prompts for the recovery and reuse flows.
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;

/// Interactive confirmation prompt.
pub fn confirm_action(message: &str, default: bool) -> bool {
    let default_char = if default { "Y/n" } else { "y/N" };
    print!("{} {} [{}]: ", "?".yellow().bold(), message, default_char);
    io::stdout().flush().unwrap_or(());

    let mut input = String::new();
    match io::stdin().read_line(&mut input) {
        Ok(_) => {
            let input = input.trim().to_lowercase();
            if input.is_empty() {
                default
            } else {
                matches!(input.as_str(), "y" | "yes")
            }
        }
        Err(_) => default,
    }
}

/// Read a free-form line of input, used by the recovery "ask" prompt and the
/// reuse-mode "same/different/abort" prompt.
pub fn prompt_line(message: &str) -> String {
    print!("{} {}: ", "?".yellow().bold(), message);
    io::stdout().flush().unwrap_or(());
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap_or(0);
    input.trim().to_string()
}

/// Display a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", format!("▶ {}", title).bold().bright_blue());
    println!("{}", "─".repeat(title.len() + 2).bright_blue());
}

/// Display operation status with icon.
pub fn print_operation_status(operation: &str, status: &str, details: Option<&str>) {
    let (icon, color) = match status.to_lowercase().as_str() {
        "success" | "completed" | "ok" => ("✓", Color::Green),
        "error" | "failed" | "fail" => ("✗", Color::Red),
        "warning" | "warn" => ("⚠", Color::Yellow),
        "info" | "running" | "in_progress" => ("ℹ", Color::Cyan),
        "pending" | "waiting" => ("⏳", Color::Yellow),
        _ => ("•", Color::White),
    };

    let status_text = format!("{} {}", icon, operation).color(color).bold();

    if let Some(details) = details {
        println!("  {} {}", status_text, details.dimmed());
    } else {
        println!("  {}", status_text);
    }
}

/// Display a step in a process.
pub fn print_step(step_num: usize, total_steps: usize, description: &str) {
    println!(
        "  {} {} {}",
        format!("[{}/{}]", step_num, total_steps).bright_cyan().bold(),
        "→".bright_blue(),
        description
    );
}

/// Display key-value information in a formatted way.
pub fn print_key_value(key: &str, value: &str) {
    println!("  {}: {}", key.bold().bright_white(), value.bright_green());
}

/// Display a table with headers and rows — used for the environment
/// inventory (hostname, fixed IP, floating IP) printed before staging.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    if headers.is_empty() || rows.is_empty() {
        return;
    }

    let mut col_widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < col_widths.len() {
                col_widths[i] = col_widths[i].max(cell.len());
            }
        }
    }

    print!("  ");
    for (i, header) in headers.iter().enumerate() {
        print!("{:<width$}", header.bold().bright_cyan(), width = col_widths[i] + 2);
    }
    println!();

    print!("  ");
    for width in &col_widths {
        print!("{}", "─".repeat(width + 2));
    }
    println!();

    for row in rows {
        print!("  ");
        for (i, cell) in row.iter().enumerate() {
            if i < col_widths.len() {
                print!("{:<width$}", cell, width = col_widths[i] + 2);
            }
        }
        println!();
    }
    println!();
}

/// Display a spinner for long-running operations (staging, polling).
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format duration in human-readable form.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs} seconds")
    } else if secs < 3600 {
        format!("{} minutes", secs / 60)
    } else if secs < 86400 {
        format!("{} hours", secs / 3600)
    } else {
        format!("{} days", secs / 86400)
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "✅".green(), message);
}

pub fn print_error(message: &str) {
    println!("{} {}", "❌".red(), message.red());
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠️".yellow(), message.yellow());
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ️".blue(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(45)), "45 seconds");
        assert_eq!(format_duration(Duration::from_secs(120)), "2 minutes");
        assert_eq!(format_duration(Duration::from_secs(7200)), "2 hours");
    }
}
