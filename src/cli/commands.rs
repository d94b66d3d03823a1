use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// `LangMetres` - compare generative models on your own prompts.
#[derive(Parser, Debug)]
#[command(name = "langmetres")]
#[command(author = "spksoft")]
#[command(version)]
#[command(about = "Run prompts against several models side by side and grade the answers.", long_about = None)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Test cases are numbered from 1 on the command line.
fn parse_position(raw: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err("test cases are numbered from 1".into()),
        Ok(position) => Ok(position),
        Err(_) => Err(format!("{raw:?} is not a test case number")),
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Browse the catalog and manage the selected models
    Models {
        #[command(subcommand)]
        models_command: ModelCommands,
    },

    /// Create, edit, grade and inspect test cases
    Case {
        #[command(subcommand)]
        case_command: CaseCommands,
    },

    /// Send a test case's prompt to every selected model
    Run {
        /// Test case number
        #[arg(value_parser = parse_position, required_unless_present = "all")]
        case: Option<usize>,

        /// Run every test case, one after another
        #[arg(long, conflicts_with = "case")]
        all: bool,
    },

    /// Write the evaluation to langmetres-evaluation-<date>.csv
    Export {
        /// Target directory (default: config `export_dir`, then the working directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Replace the selection and all test cases with an exported file
    Import {
        /// CSV file written by `export`
        file: PathBuf,
    },

    /// Edit and push backend environment variables
    Env {
        #[command(subcommand)]
        env_command: EnvCommands,
    },

    /// Discard the saved evaluation (environment settings are kept)
    Reset,

    /// Check that the completion backend is reachable
    Health,
}

/// Model selection subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ModelCommands {
    /// List catalog models with their pricing
    List {
        /// Include non-chat models
        #[arg(long)]
        all: bool,
    },
    /// Add a model to the selection
    Add {
        /// Model identifier, e.g. gpt-4o
        model: String,
    },
    /// Remove a model and every response it produced
    Remove {
        /// Model identifier
        model: String,
    },
    /// Show the selection with sampling settings
    Selected,
    /// Change sampling settings of a selected model
    Config {
        /// Model identifier
        model: String,
        /// Temperature (0.0 - 2.0)
        #[arg(long)]
        temperature: Option<f64>,
        /// Nucleus sampling (0.0 - 1.0)
        #[arg(long)]
        top_p: Option<f64>,
    },
}

/// Test case subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CaseCommands {
    /// Append an empty test case
    Add,
    /// Delete a test case (the last one is always kept)
    Delete {
        #[arg(value_parser = parse_position)]
        case: usize,
    },
    /// Rename a test case
    Rename {
        #[arg(value_parser = parse_position)]
        case: usize,
        name: String,
    },
    /// Set the prompt of a test case
    Prompt {
        #[arg(value_parser = parse_position)]
        case: usize,
        /// Prompt text
        #[arg(required_unless_present = "file")]
        text: Option<String>,
        /// Read the prompt from a file
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },
    /// Show one test case with its responses, or list them all
    Show {
        #[arg(value_parser = parse_position)]
        case: Option<usize>,
    },
    /// Mark a model's response as passed or failed
    #[command(group(ArgGroup::new("verdict").required(true).args(["pass", "fail"])))]
    Grade {
        #[arg(value_parser = parse_position)]
        case: usize,
        /// Model identifier
        model: String,
        #[arg(long)]
        pass: bool,
        #[arg(long)]
        fail: bool,
    },
    /// Toggle between rendered markdown and raw text for one response
    View {
        #[arg(value_parser = parse_position)]
        case: usize,
        /// Model identifier
        model: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
}

/// Environment variable subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum EnvCommands {
    /// Replace the KEY=VALUE text and push it to the backend
    Set {
        /// KEY=VALUE lines
        #[arg(required_unless_present = "file")]
        text: Option<String>,
        /// Read KEY=VALUE lines from a file
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },
    /// Push the cached text to the backend again
    Push,
    /// Allow or forbid caching the text on disk
    Save {
        #[arg(value_enum)]
        state: Switch,
    },
    /// Show cached variable names (values stay hidden)
    Show,
    /// Forget the cached text and the save setting
    Reset,
}
