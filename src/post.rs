/// Post-Processor: the thin collaborator the orchestration core hands
/// results to. Only the interface is in scope here — aggregation into
/// meaningful summary/overtime statistics and graph rendering are a
/// separate concern; this module covers loading a results
/// file and rendering it as a table, CSV, or JSON/YAML passthrough.
use std::path::Path;

use crate::error::CpResult;
use crate::run::TestResult;
use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "csv" => OutputFormat::Csv,
            "json" => OutputFormat::Json,
            "yaml" => OutputFormat::Yaml,
            _ => OutputFormat::Table,
        }
    }
}

pub fn load_results(path: &Path) -> CpResult<Vec<TestResult>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Render a results file's raw per-worker samples in the requested format.
/// Summarizing a test's numeric fields into min/max/average ("the
/// aggregation this module's full counterpart would perform") is out of
/// scope here; this renders what was collected.
pub fn render(results: &[TestResult], format: OutputFormat) -> CpResult<String> {
    match format {
        OutputFormat::Table => Ok(render_table(results)),
        OutputFormat::Csv => render_csv(results),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(results)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(results)?),
    }
}

fn render_table(results: &[TestResult]) -> String {
    let rows: Vec<Vec<String>> = results
        .iter()
        .map(|r| vec![r.hostname.clone(), r.results.to_string()])
        .collect();
    let mut buf = Vec::new();
    if rows.is_empty() {
        return String::new();
    }
    // ui::print_table writes to stdout; build the same layout here for a
    // returned string instead of printing directly.
    buf.push(format!("{:<30}{}", "hostname", "results"));
    for row in &rows {
        buf.push(format!("{:<30}{}", row[0], row[1]));
    }
    buf.join("\n")
}

fn render_csv(results: &[TestResult]) -> CpResult<String> {
    let mut lines = vec!["hostname,results".to_string()];
    for result in results {
        let escaped = result.results.to_string().replace('"', "\"\"");
        lines.push(format!("{},\"{escaped}\"", result.hostname));
    }
    Ok(lines.join("\n"))
}

pub fn emit(results: &[TestResult], format: OutputFormat, output: Option<&Path>) -> CpResult<()> {
    let rendered = render(results, format)?;
    match output {
        Some(path) => std::fs::write(path, rendered)?,
        None => {
            if format == OutputFormat::Table {
                println!("{rendered}");
            } else {
                println!("{rendered}");
            }
        }
    }
    ui::print_success("results rendered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<TestResult> {
        vec![TestResult {
            hostname: "cloudpunch-1-s1".into(),
            results: serde_json::json!({"ping": "0.5ms"}),
        }]
    }

    #[test]
    fn table_render_includes_hostname() {
        let rendered = render(&sample(), OutputFormat::Table).unwrap();
        assert!(rendered.contains("cloudpunch-1-s1"));
    }

    #[test]
    fn json_round_trips() {
        let rendered = render(&sample(), OutputFormat::Json).unwrap();
        let parsed: Vec<TestResult> = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn format_parse_defaults_to_table() {
        assert_eq!(OutputFormat::parse("bogus"), OutputFormat::Table);
        assert_eq!(OutputFormat::parse("CSV"), OutputFormat::Csv);
    }
}
