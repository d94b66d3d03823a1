use super::COLUMNS;
use crate::harness::types::{ResponseMetrics, TestCase};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// One (test case, model) pair, flattened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    #[serde(rename = "Test Case")]
    pub test_case: String,
    #[serde(rename = "Prompt")]
    pub prompt: String,
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "Response")]
    pub response: String,
    #[serde(rename = "Passed")]
    pub passed: &'static str,
    #[serde(rename = "Prompt Tokens")]
    pub prompt_tokens: u64,
    #[serde(rename = "Completion Tokens")]
    pub completion_tokens: u64,
    #[serde(rename = "Total Tokens")]
    pub total_tokens: u64,
    #[serde(rename = "Cost ($)")]
    pub cost: String,
    #[serde(rename = "Latency (s)")]
    pub latency: String,
}

impl ExportRow {
    fn new(test_case: &TestCase, model: &str, response: &ResponseMetrics) -> Self {
        let usage = &response.usage;
        Self {
            test_case: test_case.name.clone(),
            prompt: test_case.prompt.clone(),
            model: model.to_string(),
            response: response.response_content.clone(),
            passed: if response.is_passed() { "Yes" } else { "No" },
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            cost: format!("{:.4}", usage.cost),
            latency: format!("{:.2}", usage.latency),
        }
    }
}

/// Test cases without responses contribute no rows.
pub fn export_rows(test_cases: &[TestCase]) -> Vec<ExportRow> {
    test_cases
        .iter()
        .flat_map(|case| {
            case.responses
                .iter()
                .map(move |(model, response)| ExportRow::new(case, model, response))
        })
        .collect()
}

/// Writes the header and one row per response. Returns the row count.
///
/// The header is always written, so an empty export still re-imports.
pub fn write_csv<W: io::Write>(writer: W, test_cases: &[TestCase]) -> Result<usize, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(COLUMNS)?;

    let rows = export_rows(test_cases);
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(rows.len())
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("langmetres-evaluation-{}.csv", date.format("%Y-%m-%d"))
}

/// Exports into `dir`, creating it if needed, and returns the file path and
/// the number of rows written. A same-day export overwrites the earlier one.
pub fn export_to_dir(dir: &Path, test_cases: &[TestCase], date: NaiveDate) -> Result<(PathBuf, usize)> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create export directory {}", dir.display()))?;
    let path = dir.join(export_file_name(date));
    let file = File::create(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let rows = write_csv(file, test_cases)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), rows, "evaluation exported");
    Ok((path, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::types::UsageMetrics;

    fn graded_case() -> TestCase {
        let mut case = TestCase::new("Greeting");
        case.prompt = "Say hi, politely".into();
        let mut ok = ResponseMetrics::completed(
            "gpt-4o",
            "Hello \"there\"\nfriend",
            UsageMetrics {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
                cost: 0.000_123_4,
                latency: 1.236,
            },
        );
        ok.passed = Some(true);
        case.responses.insert("gpt-4o".into(), ok);
        case.responses
            .insert("claude".into(), ResponseMetrics::failed("claude", "HTTP error! status: 500"));
        case
    }

    #[test]
    fn rows_format_passed_and_fixed_decimals() {
        let rows = export_rows(&[graded_case()]);
        assert_eq!(rows.len(), 2);

        let gpt = rows.iter().find(|row| row.model == "gpt-4o").unwrap();
        assert_eq!(gpt.passed, "Yes");
        assert_eq!(gpt.cost, "0.0001");
        assert_eq!(gpt.latency, "1.24");
        assert_eq!(gpt.total_tokens, 15);

        let claude = rows.iter().find(|row| row.model == "claude").unwrap();
        assert_eq!(claude.passed, "No");
        assert_eq!(claude.response, "Error: HTTP error! status: 500");
        assert_eq!(claude.cost, "0.0000");
        assert_eq!(claude.latency, "0.00");
    }

    #[test]
    fn empty_test_cases_contribute_no_rows() {
        let rows = export_rows(&[TestCase::new("empty"), graded_case()]);
        assert!(rows.iter().all(|row| row.test_case == "Greeting"));
    }

    #[test]
    fn header_order_is_fixed() {
        let mut out = Vec::new();
        let written = write_csv(&mut out, &[]).unwrap();
        assert_eq!(written, 0);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text.trim_end(),
            "Test Case,Prompt,Model,Response,Passed,Prompt Tokens,Completion Tokens,Total Tokens,Cost ($),Latency (s)"
        );
    }

    #[test]
    fn file_name_embeds_export_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(export_file_name(date), "langmetres-evaluation-2026-03-07.csv");
    }

    #[test]
    fn export_to_dir_creates_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("exports");
        let date = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();

        let (path, rows) = export_to_dir(&dir, &[graded_case()], date).unwrap();

        assert_eq!(rows, 2);
        assert!(path.ends_with("langmetres-evaluation-2026-01-02.csv"));
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("\"Hello \"\"there\"\"\nfriend\""));
    }
}
