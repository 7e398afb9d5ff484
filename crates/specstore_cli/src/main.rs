//! Command-line front end over `specstore_core`.
//!
//! # Responsibility
//! - Expose init/migrate/list/show/validate/delete/draft operations.
//! - Print results as JSON and failures as one human-readable line.

use clap::{Parser, Subcommand};
use log::warn;
use serde_json::json;
use specstore_core::{
    init_logging, migrate_legacy_metadata, parse_entity_ref, EntityType, ReferenceValidator,
    SpecManager, StoreConfig,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "specstore", version, about = "File-backed specification entity store")]
struct Cli {
    /// Specs root folder (defaults to $SPECSTORE_ROOT or ./specs).
    #[arg(long, global = true, value_name = "PATH")]
    root: Option<PathBuf>,

    /// Log level: trace|debug|info|warn|error.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create all entity folders and seed specs.json from existing files.
    Init,
    /// Seed specs.json from existing files when it does not exist yet.
    Migrate,
    /// List every valid entity of one type.
    List { entity_type: EntityType },
    /// Show one entity by ID, e.g. `brq-3` or `pln-2-rollout`.
    Show { id: String },
    /// Check that an entity and everything it references exists.
    Validate { id: String },
    /// Delete one entity by ID.
    Delete { id: String },
    /// Print the last number issued for a type.
    LastId { entity_type: EntityType },
    /// List envelope drafts of the guided creation flow.
    Drafts,
    /// Turn an envelope draft into a real entity.
    Promote { draft_id: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut config = StoreConfig::from_env();
    if let Some(root) = cli.root.clone() {
        config.specs_root = root;
    }
    if let Some(level) = cli.log_level.clone() {
        config.log_level = level;
    }

    start_logging(&config);

    match run(cli.command, &config) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn start_logging(config: &StoreConfig) {
    let result = config
        .resolve_log_dir()
        .map_err(|err| err.to_string())
        .and_then(|dir| init_logging(&config.log_level, &dir).map_err(|err| err.to_string()));
    if let Err(message) = result {
        eprintln!("warning: logging disabled: {message}");
    }
}

fn run(command: Command, config: &StoreConfig) -> Result<ExitCode, Box<dyn Error>> {
    let specs = SpecManager::open(config);

    match command {
        Command::Init => print_json(&specs.initialize()?)?,
        Command::Migrate => print_json(&migrate_legacy_metadata(&specs)?)?,
        Command::List { entity_type } => print_json(&specs.list_any(entity_type)?)?,
        Command::Show { id } => {
            let reference = parse_entity_ref(&id)?;
            match specs.get_any(reference.entity_type, reference.number)? {
                Some(entity) => print_json(&entity)?,
                None => {
                    eprintln!("error: {} not found", reference.key());
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Command::Validate { id } => {
            let outcome = ReferenceValidator::new(&specs).validate_reference(&id);
            print_json(&outcome)?;
            if !outcome.valid {
                warn!(
                    "event=cli_validate module=cli status=error id={} errors={}",
                    id,
                    outcome.errors.len()
                );
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Delete { id } => {
            let reference = parse_entity_ref(&id)?;
            specs.delete_any(reference.entity_type, reference.number)?;
            print_json(&json!({ "deleted": reference.key() }))?;
        }
        Command::LastId { entity_type } => {
            let last_id = specs.metadata().get_last_id(entity_type)?;
            print_json(&json!({ "type": entity_type, "lastId": last_id }))?;
        }
        Command::Drafts => print_json(&specs.drafts().list()?)?,
        Command::Promote { draft_id } => print_json(&specs.promote_draft(&draft_id)?)?,
    }

    Ok(ExitCode::SUCCESS)
}

fn print_json(value: &impl serde::Serialize) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
