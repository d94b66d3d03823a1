use crate::app::render::{
    render_case_list, render_catalog, render_outcome, render_selection, render_test_case,
};
use crate::app::session::Session;
use crate::catalog::ModelCatalog;
use crate::cli::commands::{CaseCommands, Cli, Commands, EnvCommands, ModelCommands, Switch};
use crate::client::{CompletionClient, HttpCompletionClient};
use crate::config::Config;
use crate::env::{parse_env_vars, variable_names};
use crate::error::StoreError;
use crate::harness::{EvaluationDispatcher, ModelConfigField};
use crate::spreadsheet;
use crate::ui::style;
use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Command-line positions are 1-based; the store is 0-based.
fn to_index(position: usize) -> usize {
    position.saturating_sub(1)
}

fn load_catalog(config: &Config) -> Result<ModelCatalog> {
    match &config.catalog_path {
        Some(path) => ModelCatalog::load(path),
        None => Ok(ModelCatalog::builtin()),
    }
}

fn read_text_arg(text: Option<String>, file: Option<PathBuf>) -> Result<String> {
    match (text, file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display())),
        (None, None) => bail!("provide the text inline or with --file"),
    }
}

fn handle_models(session: &Session, command: ModelCommands) -> crate::Result<()> {
    let store = &session.store;
    match command {
        ModelCommands::List { all } => {
            let catalog = load_catalog(&session.config)?;
            let state = store.snapshot();
            println!("{}", render_catalog(&catalog, all, &state.selected_models));
        }
        ModelCommands::Add { model } => {
            let catalog = load_catalog(&session.config)?;
            if store.select_model(&model)? {
                println!("{} selected {}", style::success("✓"), style::accent(model.trim()));
                if !catalog.chat_models().contains(&model.trim()) {
                    println!(
                        "  {}",
                        style::yellow("not in the catalog; the backend must know this identifier")
                    );
                }
            } else {
                println!("{} is already selected", style::accent(model.trim()));
            }
        }
        ModelCommands::Remove { model } => {
            if store.remove_model(&model) {
                println!(
                    "{} removed {} with its settings and responses",
                    style::success("✓"),
                    style::accent(&model)
                );
            } else {
                println!("{} was not selected", style::accent(&model));
            }
        }
        ModelCommands::Selected => println!("{}", render_selection(&store.snapshot())),
        ModelCommands::Config {
            model,
            temperature,
            top_p,
        } => {
            let fields: Vec<ModelConfigField> = temperature
                .map(ModelConfigField::Temperature)
                .into_iter()
                .chain(top_p.map(ModelConfigField::TopP))
                .collect();
            if fields.is_empty() {
                let state = store.snapshot();
                if !state.is_selected(&model) {
                    return Err(StoreError::ModelNotSelected(model).into());
                }
                let config = state.config_for(&model);
                println!(
                    "{}  temperature {}  top_p {}",
                    style::accent(&model),
                    style::value(config.temperature),
                    style::value(config.top_p)
                );
                return Ok(());
            }
            let mut config = None;
            for field in fields {
                config = Some(store.set_model_config(&model, field)?);
            }
            if let Some(config) = config {
                println!(
                    "{} {}  temperature {}  top_p {}",
                    style::success("✓"),
                    style::accent(&model),
                    style::value(config.temperature),
                    style::value(config.top_p)
                );
            }
        }
    }
    Ok(())
}

fn handle_case(session: &Session, command: CaseCommands) -> crate::Result<()> {
    let store = &session.store;
    match command {
        CaseCommands::Add => {
            let index = store.add_test_case();
            let state = store.snapshot();
            let name = state.test_case(index).map_or("", |case| case.name.as_str());
            println!(
                "{} added #{} {}",
                style::success("✓"),
                index + 1,
                style::accent(name)
            );
        }
        CaseCommands::Delete { case } => {
            if store.delete_test_case(to_index(case))? {
                println!("{} deleted test case #{case}", style::success("✓"));
            } else {
                println!(
                    "{}",
                    style::yellow("The last test case cannot be deleted; at least one is kept.")
                );
            }
        }
        CaseCommands::Rename { case, name } => {
            store.rename_test_case(to_index(case), &name)?;
            println!("{} renamed #{case} to {}", style::success("✓"), style::accent(&name));
        }
        CaseCommands::Prompt { case, text, file } => {
            let prompt = read_text_arg(text, file)?;
            store.set_prompt(to_index(case), &prompt)?;
            println!(
                "{} prompt of #{case} set ({} chars)",
                style::success("✓"),
                prompt.chars().count()
            );
        }
        CaseCommands::Show { case: Some(case) } => {
            let state = store.snapshot();
            let text = render_test_case(&state, to_index(case)).ok_or(
                StoreError::TestCaseOutOfRange {
                    index: to_index(case),
                    len: state.test_cases.len(),
                },
            )?;
            println!("{text}");
        }
        CaseCommands::Show { case: None } => println!("{}", render_case_list(&store.snapshot())),
        CaseCommands::Grade {
            case, model, pass, ..
        } => {
            store.set_passed(to_index(case), &model, pass)?;
            let verdict = if pass {
                style::success("passed")
            } else {
                style::failure("failed")
            };
            println!("{} #{case} {} marked {verdict}", style::success("✓"), style::accent(&model));
        }
        CaseCommands::View { case, model } => {
            let mode = store.toggle_view_mode(to_index(case), &model)?;
            println!(
                "{} #{case} {} now shown as {}",
                style::success("✓"),
                style::accent(&model),
                style::value(mode)
            );
        }
    }
    Ok(())
}

async fn handle_run(session: &Session, case: Option<usize>, all: bool) -> Result<()> {
    let client: Arc<dyn CompletionClient> =
        Arc::new(HttpCompletionClient::from_config(&session.config));
    let dispatcher = EvaluationDispatcher::new(Arc::clone(&session.store), client);

    let indices: Vec<usize> = if all {
        (0..session.store.snapshot().test_cases.len()).collect()
    } else {
        case.map(to_index).into_iter().collect()
    };

    for index in indices {
        let name = session
            .store
            .snapshot()
            .test_case(index)
            .map(|case| case.name.clone())
            .unwrap_or_default();
        println!("{} #{} {}", style::header("Running"), index + 1, style::accent(&name));

        let report = dispatcher
            .run_with(index, |outcome| println!("{}", render_outcome(outcome)))
            .await
            .with_context(|| format!("could not run test case #{}", index + 1))?;

        let failed = report.failed().count();
        let succeeded = report.succeeded().count();
        info!(test_case = index, succeeded, failed, "run finished");
        println!(
            "  {}",
            style::dim(format!("{succeeded} succeeded, {failed} failed"))
        );
    }
    Ok(())
}

fn handle_export(session: &Session, dir: Option<PathBuf>) -> Result<()> {
    let dir = match dir.or_else(|| session.config.export_dir.clone()) {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to resolve the working directory")?,
    };
    let state = session.store.snapshot();
    let today = chrono::Local::now().date_naive();
    let (path, rows) = spreadsheet::export_to_dir(&dir, &state.test_cases, today)?;
    println!(
        "{} exported {rows} rows to {}",
        style::success("✓"),
        style::value(path.display())
    );
    if rows == 0 {
        println!("  {}", style::yellow("No test case has responses yet."));
    }
    Ok(())
}

async fn handle_import(session: &Session, file: &Path) -> Result<()> {
    let imported = spreadsheet::import_file(file, &session.store)
        .await
        .with_context(|| format!("could not import {}", file.display()))?;
    println!(
        "{} imported {} test cases and {} responses across {} models",
        style::success("✓"),
        imported.test_cases.len(),
        imported.response_count(),
        imported.selected_models.len()
    );
    Ok(())
}

async fn push_env(config: &Config, text: &str) -> Result<()> {
    let variables = parse_env_vars(text);
    let client = HttpCompletionClient::from_config(config);
    let ack = client
        .update_environment(&variables)
        .await
        .context("failed to update environment variables")?;
    let updated = if ack.updated_vars.is_empty() {
        variables.keys().cloned().collect::<Vec<_>>()
    } else {
        ack.updated_vars
    };
    println!(
        "{} {}",
        style::success("✓"),
        if ack.message.is_empty() {
            "Environment variables updated".to_string()
        } else {
            ack.message
        }
    );
    println!("  {}", style::dim(updated.join(", ")));
    Ok(())
}

async fn handle_env(session: &Session, command: EnvCommands) -> Result<()> {
    let cache = &session.env_cache;
    match command {
        EnvCommands::Set { text, file } => {
            let text = read_text_arg(text, file)?;
            if cache.store_text(&text)? {
                println!("{}", style::dim("saved locally"));
            }
            push_env(&session.config, &text).await?;
        }
        EnvCommands::Push => {
            let settings = cache.load()?;
            if settings.text.trim().is_empty() {
                bail!(
                    "no environment text is saved; run `langmetres env set` (with `env save on` to keep it)"
                );
            }
            push_env(&session.config, &settings.text).await?;
        }
        EnvCommands::Save { state } => {
            let enabled = state == Switch::On;
            cache.set_save_enabled(enabled)?;
            if enabled {
                println!("{} environment text will be saved locally", style::success("✓"));
            } else {
                println!("{} saved environment text removed", style::success("✓"));
            }
        }
        EnvCommands::Show => {
            let settings = cache.load()?;
            println!(
                "save to storage: {}",
                if settings.save_to_storage {
                    style::value("on")
                } else {
                    style::dim("off")
                }
            );
            let names = variable_names(&settings.text);
            if names.is_empty() {
                println!("{}", style::dim("no saved variables"));
            } else {
                for name in names {
                    println!("  {}={}", style::accent(name), style::dim("••••"));
                }
            }
        }
        EnvCommands::Reset => {
            cache.reset()?;
            println!("{} environment settings cleared", style::success("✓"));
        }
    }
    Ok(())
}

async fn handle_health(config: &Config) -> Result<()> {
    let client = HttpCompletionClient::from_config(config);
    let health = client
        .health()
        .await
        .with_context(|| format!("backend at {} is unreachable", config.backend_url))?;
    if health.is_healthy() {
        println!("{} {} is {}", style::success("✓"), style::url(&config.backend_url), health.status);
        Ok(())
    } else {
        bail!("backend at {} reported status {:?}", config.backend_url, health.status)
    }
}

pub async fn dispatch(cli: Cli, config: Arc<Config>) -> Result<()> {
    if let Commands::Health = cli.command {
        return handle_health(&config).await;
    }

    let session = Session::open(config)?;
    if let Commands::Reset = cli.command {
        session.store.reset();
        session.discard().await?;
        println!("{} evaluation cleared", style::success("✓"));
        return Ok(());
    }

    let outcome = match cli.command {
        Commands::Models { models_command } => {
            handle_models(&session, models_command).map_err(anyhow::Error::from)
        }
        Commands::Case { case_command } => {
            handle_case(&session, case_command).map_err(anyhow::Error::from)
        }
        Commands::Run { case, all } => handle_run(&session, case, all).await,
        Commands::Export { dir } => handle_export(&session, dir),
        Commands::Import { file } => handle_import(&session, &file).await,
        Commands::Env { env_command } => handle_env(&session, env_command).await,
        Commands::Health | Commands::Reset => Ok(()),
    };

    // Persist whatever changed, even when the command itself failed.
    session.close().await?;
    outcome
}
