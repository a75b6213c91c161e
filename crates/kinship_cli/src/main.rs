//! Command-line front end for kinship_core.
//!
//! # Responsibility
//! - Expose import, inference and reset against a SQLite database file.
//! - Print results as JSON on stdout; errors go to stderr with exit code 1.

use clap::{Parser, Subcommand};
use kinship_core::db::open_db;
use kinship_core::{
    core_version, init_logging_from_env, FamilyRepository, ImportService, InferenceService,
    InferenceSettings, OwnerId, SqliteFamilyRepository, TreeId,
};
use serde_json::json;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use uuid::Uuid;

type CliResult = Result<serde_json::Value, Box<dyn Error>>;

/// Kinship: genealogy import and birth-year inference
#[derive(Parser, Debug)]
#[command(name = "kinship")]
#[command(version, about, long_about = None)]
struct Args {
    /// Print compact single-line JSON
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a genealogy document into a tree
    Import {
        /// SQLite database file (created when missing)
        db: PathBuf,
        /// Document to import
        document: PathBuf,
        /// Target tree id (random when omitted)
        #[arg(long, value_parser = Uuid::parse_str)]
        tree_id: Option<TreeId>,
        /// Owning user id (random when omitted)
        #[arg(long, value_parser = Uuid::parse_str)]
        owner_id: Option<OwnerId>,
    },
    /// Impute missing birth years of a tree
    Infer {
        db: PathBuf,
        #[arg(value_parser = Uuid::parse_str)]
        tree_id: TreeId,
        /// JSON file overriding pass count and year offsets
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },
    /// Clear every imputed year of a tree
    Reset {
        db: PathBuf,
        #[arg(value_parser = Uuid::parse_str)]
        tree_id: TreeId,
    },
    /// Dump the family records and members of a tree
    Families {
        db: PathBuf,
        #[arg(value_parser = Uuid::parse_str)]
        tree_id: TreeId,
    },
    /// Print the core library version
    Version,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = init_logging_from_env() {
        eprintln!("logging disabled: {err}");
    }

    let result = match args.command {
        Command::Import {
            db,
            document,
            tree_id,
            owner_id,
        } => run_import(&db, &document, tree_id, owner_id),
        Command::Infer {
            db,
            tree_id,
            settings,
        } => run_infer(&db, tree_id, settings.as_deref()),
        Command::Reset { db, tree_id } => run_reset(&db, tree_id),
        Command::Families { db, tree_id } => run_families(&db, tree_id),
        Command::Version => Ok(json!({ "version": core_version() })),
    };

    match result {
        Ok(output) if args.compact => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Ok(output) => {
            println!("{output:#}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("event=cli module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_import(
    db: &Path,
    document: &Path,
    tree_id: Option<TreeId>,
    owner_id: Option<OwnerId>,
) -> CliResult {
    let tree_id = tree_id.unwrap_or_else(Uuid::new_v4);
    let owner_id = owner_id.unwrap_or_else(Uuid::new_v4);
    let raw = std::fs::read(document)
        .map_err(|err| format!("failed to read document `{}`: {err}", document.display()))?;

    let conn = open_db(db)?;
    let service = ImportService::new(SqliteFamilyRepository::try_new(&conn)?);
    let report = service.import_document(&raw, tree_id, owner_id)?;
    Ok(json!({
        "tree_id": tree_id,
        "owner_id": owner_id,
        "report": report,
    }))
}

fn run_infer(db: &Path, tree_id: TreeId, settings: Option<&Path>) -> CliResult {
    let settings = settings
        .map(load_settings)
        .transpose()?
        .unwrap_or_default();
    let conn = open_db(db)?;
    let service =
        InferenceService::with_settings(SqliteFamilyRepository::try_new(&conn)?, settings);
    Ok(serde_json::to_value(service.run_inference(tree_id)?)?)
}

fn run_reset(db: &Path, tree_id: TreeId) -> CliResult {
    let conn = open_db(db)?;
    let service = InferenceService::new(SqliteFamilyRepository::try_new(&conn)?);
    Ok(serde_json::to_value(service.reset_inference(tree_id)?)?)
}

fn run_families(db: &Path, tree_id: TreeId) -> CliResult {
    let conn = open_db(db)?;
    let repo = SqliteFamilyRepository::try_new(&conn)?;
    let records = repo.list_family_records(tree_id)?;
    let ids = records.iter().map(|record| record.id).collect::<Vec<_>>();
    let members = repo.list_members(&ids)?;

    let families = records
        .iter()
        .map(|record| {
            let rows = members
                .iter()
                .filter(|member| member.family_record_id == record.id)
                .collect::<Vec<_>>();
            json!({ "family": record, "members": rows })
        })
        .collect::<Vec<_>>();
    Ok(json!({ "tree_id": tree_id, "families": families }))
}

fn load_settings(path: &Path) -> Result<InferenceSettings, Box<dyn Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read settings `{}`: {err}", path.display()))?;
    parse_settings(&raw)
        .map_err(|err| format!("invalid settings `{}`: {err}", path.display()).into())
}

fn parse_settings(raw: &str) -> serde_json::Result<InferenceSettings> {
    serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::{load_settings, parse_settings, Args, Command};
    use clap::Parser;
    use uuid::Uuid;

    #[test]
    fn import_takes_optional_ids_as_flags() {
        let tree_id = Uuid::new_v4();
        let args = Args::try_parse_from([
            "kinship",
            "import",
            "tree.db",
            "family.ged",
            "--tree-id",
            &tree_id.to_string(),
        ])
        .unwrap();
        match args.command {
            Command::Import {
                tree_id: parsed,
                owner_id,
                ..
            } => {
                assert_eq!(parsed, Some(tree_id));
                assert_eq!(owner_id, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn malformed_ids_are_rejected_by_the_parser() {
        assert!(Args::try_parse_from(["kinship", "infer", "tree.db", "not-a-uuid"]).is_err());
        assert!(Args::try_parse_from([
            "kinship",
            "import",
            "tree.db",
            "family.ged",
            "--owner-id",
            "nope"
        ])
        .is_err());
    }

    #[test]
    fn subcommand_help_is_available() {
        let err = Args::try_parse_from(["kinship", "import", "tree.db", "family.ged", "--help"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn settings_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"passes": 1, "spouse_gap": 5}"#).unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.passes, 1);
        assert_eq!(settings.spouse_gap, 5);
        assert_eq!(settings.sibling_gap, 3);

        assert!(parse_settings("{\"passes\": \"three\"}").is_err());
        assert!(load_settings(&dir.path().join("missing.json")).is_err());
    }
}
