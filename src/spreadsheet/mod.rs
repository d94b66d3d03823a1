//! Tabular export and import of an evaluation.
//!
//! The file format is CSV: UTF-8, comma separated, one header row carrying
//! [`COLUMNS`] in order, then one row per (test case, model) response. The
//! column names and their order are an external contract: files written by
//! [`write_csv`] must re-import through [`read_csv`] with grading intact.
//! Spreadsheet workbooks (`.xlsx`) are not read; save them as CSV with the
//! same header row first.

pub mod export;
pub mod import;

pub use export::{ExportRow, export_file_name, export_rows, export_to_dir, write_csv};
pub use import::{ImportedEvaluation, import_file, read_csv};

pub const COLUMNS: [&str; 10] = [
    "Test Case",
    "Prompt",
    "Model",
    "Response",
    "Passed",
    "Prompt Tokens",
    "Completion Tokens",
    "Total Tokens",
    "Cost ($)",
    "Latency (s)",
];
