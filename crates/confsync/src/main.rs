use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use confsync::config::{apply_env_overrides, load_settings};
use confsync::{
    AccountError, AccountService, Artifact, ArtifactWriter, ConfigDocument, ConfigError,
    ConfigurationRepository, ConfsyncError, Database, LogFormat, Settings, StorageError,
    SyncEngine, SyncReport,
};

#[derive(Parser)]
#[command(name = "confsync", version, about = "Keep per-user configuration exports in sync")]
struct Cli {
    /// Settings file (JSON).
    #[arg(long, env = "CONFSYNC_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Overrides the export root directory.
    #[arg(long, global = true)]
    output_root: Option<PathBuf>,

    /// Overrides the SQLite database path.
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Print reports as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Re-derive one user's export files.
    Sync { username: String },
    /// Re-derive export files for every user.
    SyncAll,
    /// Print the export files of a user.
    Inspect { username: String },
    /// Register a user with an already-hashed password.
    Register {
        username: String,
        #[arg(long)]
        password_hash: String,
    },
    /// Save a configuration document (JSON file) for a user.
    SetConfig { username: String, file: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match resolve_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("confsync: {}", e);
            return ExitCode::from(2);
        }
    };

    if let Err(e) = init_logging(settings.log_format) {
        eprintln!("confsync: failed to initialize logging: {}", e);
    }

    match run(&cli, &settings) {
        Ok(all_written) if all_written => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("confsync: {}", e);
            ExitCode::from(2)
        }
    }
}

fn resolve_settings(cli: &Cli) -> Result<Settings, ConfigError> {
    let mut settings = match &cli.config {
        Some(path) => load_settings(path)?,
        None => Settings::default(),
    };
    apply_env_overrides(&mut settings)?;
    if let Some(root) = &cli.output_root {
        settings.output_root = root.clone();
    }
    if let Some(db) = &cli.database {
        settings.database_path = db.clone();
    }
    Ok(settings)
}

fn init_logging(format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    tracing_log::LogTracer::init()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("confsync=info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_writer(std::io::stderr)),
        )?,
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_writer(std::io::stderr)),
        )?,
    }
    Ok(())
}

/// Returns whether every artifact touched by the command was written.
fn run(cli: &Cli, settings: &Settings) -> Result<bool, ConfsyncError> {
    match &cli.command {
        Command::Sync { username } => {
            let db = Arc::new(Database::open(&settings.database_path)?);
            let user = db
                .get_user(username)?
                .ok_or_else(|| AccountError::UserNotFound(username.clone()))?;
            let engine = SyncEngine::from_settings(db, settings);
            let report = engine.sync_user(&user);
            print_report(&report, cli.json);
            Ok(report.is_success())
        }
        Command::SyncAll => {
            let db = Arc::new(Database::open(&settings.database_path)?);
            let engine = SyncEngine::from_settings(db, settings);
            let reports = engine.sync_all()?;
            for report in &reports {
                print_report(report, cli.json);
            }
            Ok(reports.iter().all(SyncReport::is_success))
        }
        Command::Inspect { username } => {
            let writer = ArtifactWriter::new(&settings.output_root);
            Ok(inspect(&writer, username))
        }
        Command::Register {
            username,
            password_hash,
        } => {
            let service = account_service(settings)?;
            let outcome = service.register(username, password_hash)?;
            print_report(&outcome.report, cli.json);
            Ok(outcome.report.is_success())
        }
        Command::SetConfig { username, file } => {
            let content = std::fs::read_to_string(file).map_err(|e| StorageError::ReadFile {
                path: file.clone(),
                source: e,
            })?;
            let value: serde_json::Value =
                serde_json::from_str(&content).map_err(ConfigError::from)?;
            let document = ConfigDocument::from_value(value);

            let service = account_service(settings)?;
            let outcome = service.save_configuration(username, &document)?;
            print_report(&outcome.report, cli.json);
            Ok(outcome.report.is_success())
        }
    }
}

fn account_service(settings: &Settings) -> Result<AccountService<Database>, ConfsyncError> {
    let db = Arc::new(Database::open(&settings.database_path)?);
    let engine = SyncEngine::from_settings(Arc::clone(&db), settings);
    Ok(AccountService::new(db, engine))
}

fn print_report(report: &SyncReport, json: bool) {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("confsync: failed to serialize report: {}", e),
        }
    } else {
        println!("{}", report);
    }
}

fn inspect(writer: &ArtifactWriter, username: &str) -> bool {
    let mut all_read = true;
    for artifact in Artifact::ALL {
        println!("== {}", artifact.file_name());
        match writer.read(username, artifact.file_name()) {
            Ok(table) => {
                for row in table.rows() {
                    let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
                    println!("{}", cells.join("\t"));
                }
            }
            Err(e) => {
                println!("(unreadable: {})", e);
                all_read = false;
            }
        }
    }
    all_read
}
