use super::COLUMNS;
use crate::error::ImportError;
use crate::harness::store::HarnessStore;
use crate::harness::types::{ERROR_MARKER, ResponseMetrics, TestCase, UsageMetrics};
use serde::Deserialize;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct ImportedRow {
    #[serde(rename = "Test Case")]
    test_case: String,
    #[serde(rename = "Prompt")]
    prompt: String,
    #[serde(rename = "Model")]
    model: String,
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Passed")]
    passed: String,
    #[serde(rename = "Prompt Tokens")]
    prompt_tokens: String,
    #[serde(rename = "Completion Tokens")]
    completion_tokens: String,
    #[serde(rename = "Total Tokens")]
    total_tokens: String,
    #[serde(rename = "Cost ($)")]
    cost: String,
    #[serde(rename = "Latency (s)")]
    latency: String,
}

/// A fully parsed file, ready to replace the harness state.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedEvaluation {
    pub selected_models: Vec<String>,
    pub test_cases: Vec<TestCase>,
}

impl ImportedEvaluation {
    pub fn response_count(&self) -> usize {
        self.test_cases.iter().map(|case| case.responses.len()).sum()
    }
}

fn required(row: usize, column: &'static str, value: String) -> Result<String, ImportError> {
    if value.trim().is_empty() {
        return Err(ImportError::MissingValue { row, column });
    }
    Ok(value)
}

fn parse_tokens(row: usize, column: &'static str, raw: &str) -> Result<u64, ImportError> {
    raw.trim().parse().map_err(|_| ImportError::InvalidNumber {
        row,
        column,
        value: raw.to_string(),
    })
}

fn parse_decimal(row: usize, column: &'static str, raw: &str) -> Result<f64, ImportError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
        .ok_or_else(|| ImportError::InvalidNumber {
            row,
            column,
            value: raw.to_string(),
        })
}

fn into_response(row: usize, imported: &ImportedRow, model: &str) -> Result<ResponseMetrics, ImportError> {
    let usage = UsageMetrics {
        prompt_tokens: parse_tokens(row, "Prompt Tokens", &imported.prompt_tokens)?,
        completion_tokens: parse_tokens(row, "Completion Tokens", &imported.completion_tokens)?,
        total_tokens: parse_tokens(row, "Total Tokens", &imported.total_tokens)?,
        cost: parse_decimal(row, "Cost ($)", &imported.cost)?,
        latency: parse_decimal(row, "Latency (s)", &imported.latency)?,
    };

    // Exported failures are recognisable only by their rendered marker.
    let mut response = match imported.response.strip_prefix(ERROR_MARKER) {
        Some(message) if usage.is_zero() => ResponseMetrics::failed(model, message),
        _ => ResponseMetrics::completed(model, imported.response.clone(), usage),
    };
    response.passed = Some(imported.passed.trim().eq_ignore_ascii_case("yes"));
    Ok(response)
}

/// Parses an exported evaluation.
///
/// Rows are grouped by `Test Case` in first-seen order and the first `Prompt`
/// of each group wins. The selection becomes every `Model` seen, in order.
/// Nothing is returned unless every row parses.
pub fn read_csv<R: io::Read>(reader: R) -> Result<ImportedEvaluation, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let missing: Vec<String> = COLUMNS
        .iter()
        .filter(|column| !headers.iter().any(|header| header == **column))
        .map(ToString::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing));
    }

    let mut selected_models: Vec<String> = Vec::new();
    let mut test_cases: Vec<TestCase> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    let mut divergent_prompts = 0_usize;

    for (offset, record) in reader.records().enumerate() {
        let row = offset + 1;
        let record = record?;
        let imported: ImportedRow = record.deserialize(Some(&headers))?;
        let name = required(row, "Test Case", imported.test_case.clone())?;
        let model = required(row, "Model", imported.model.trim().to_string())?;
        let response = into_response(row, &imported, &model)?;

        let index = *by_name.entry(name.clone()).or_insert_with(|| {
            let mut case = TestCase::new(name);
            case.prompt.clone_from(&imported.prompt);
            test_cases.push(case);
            test_cases.len() - 1
        });
        let case = &mut test_cases[index];
        if case.prompt != imported.prompt {
            divergent_prompts += 1;
        }
        case.responses.insert(model.clone(), response);

        if !selected_models.contains(&model) {
            selected_models.push(model);
        }
    }

    if divergent_prompts > 0 {
        warn!(rows = divergent_prompts, "rows with a differing prompt kept their group's first prompt");
    }

    Ok(ImportedEvaluation {
        selected_models,
        test_cases,
    })
}

/// Reads `path` and, only if it parses completely, replaces the selection and
/// every test case in `store`. Model configs survive.
pub async fn import_file(path: &Path, store: &HarnessStore) -> Result<ImportedEvaluation, ImportError> {
    let bytes = tokio::fs::read(path).await?;
    let imported = read_csv(bytes.as_slice())?;
    store.replace_evaluation(imported.selected_models.clone(), imported.test_cases.clone());
    info!(
        path = %path.display(),
        test_cases = imported.test_cases.len(),
        responses = imported.response_count(),
        "evaluation imported"
    );
    Ok(imported)
}
