//! helium-analysis: cache hotspot challenges and report witness statistics.

mod app;
mod config;
mod output;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use hotspot_cache::ReconcilePlan;
use hotspot_client::{HttpClient, ThreadSleeper};
use hotspot_store::{DeleteRange, StoreError};
use hotspot_store_lmdb::LmdbEnvironment;
use hotspot_types::Hotspot;
use hotspot_utils::{format_timestamp, init_logging, parse_date, LogFormat, SystemClock};

use app::{App, ChallengeExport};
use config::AnalysisConfig;
use output::{read_json, write_json, Output};

#[derive(Parser)]
#[command(name = "helium-analysis", about = "Helium hotspot challenge cache and witness analysis")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base; flags
    /// and env vars override them.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// LMDB database directory.
    #[arg(long, env = "HELIUM_ANALYSIS_DB", global = true)]
    database: Option<PathBuf>,

    /// Base URL of the Helium API.
    #[arg(long, env = "HELIUM_API_URL", global = true)]
    api_url: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "HELIUM_ANALYSIS_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "HELIUM_ANALYSIS_LOG_FORMAT", global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Manage the per-hotspot challenge cache.
    Challenges {
        #[command(subcommand)]
        action: ChallengesAction,
    },
    /// Manage the hotspot directory.
    Hotspots {
        #[command(subcommand)]
        action: HotspotsAction,
    },
    /// Hotspot name bindings.
    Names {
        #[command(subcommand)]
        action: NamesAction,
    },
    /// Refresh a hotspot's challenges and write witness reports.
    Analyze {
        /// Hotspot address or name.
        hotspot: String,
        #[command(flatten)]
        window: WindowArgs,
        /// Valid samples a direction needs to be reported.
        #[arg(long)]
        min: Option<usize>,
        /// Directory to write reports into.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(clap::Args)]
struct WindowArgs {
    /// Days of history to cover.
    #[arg(long)]
    days: Option<u64>,
    /// Holddown buffer in hours.
    #[arg(long)]
    buffer: Option<u64>,
}

#[derive(clap::Subcommand)]
enum ChallengesAction {
    /// Bring the cache up to date for the lookback window.
    Refresh {
        hotspot: String,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Dump every cached challenge as JSON.
    Export {
        hotspot: String,
        /// Output file, or "stdout".
        #[arg(long, default_value = "stdout")]
        file: Output,
    },
    /// Load challenges from a JSON export.
    Import {
        hotspot: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete cached challenges before or from a UTC date.
    Delete {
        hotspot: String,
        /// Remove challenges before YYYY-MM-DD.
        #[arg(long, conflicts_with = "after", required_unless_present = "after")]
        before: Option<String>,
        /// Remove challenges on or after YYYY-MM-DD.
        #[arg(long)]
        after: Option<String>,
    },
    /// Delete every cached challenge of a hotspot.
    DeleteAll { hotspot: String },
    /// Show cached hotspots and their time spans.
    List,
}

#[derive(clap::Subcommand)]
enum HotspotsAction {
    /// Download the directory if it lags the chain.
    Refresh {
        /// Download even if the stored directory is current.
        #[arg(long)]
        force: bool,
    },
    Export {
        #[arg(long, default_value = "stdout")]
        file: Output,
    },
    Import {
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(clap::Subcommand)]
enum NamesAction {
    Export {
        #[arg(long, default_value = "stdout")]
        file: Output,
    },
}

fn open_environment(config: &AnalysisConfig) -> anyhow::Result<LmdbEnvironment> {
    let path = &config.database;
    match LmdbEnvironment::open(path, config.max_dbs, config.map_size()) {
        Ok(env) => Ok(env),
        Err(StoreError::SchemaMismatch { found, expected }) => bail!(
            "database {} has schema version {found}, this build expects {expected}; \
             remove it to rebuild the cache",
            path.display()
        ),
        Err(e) => Err(e).with_context(|| format!("unable to open database {}", path.display())),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<AnalysisConfig> {
    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::from_toml_file(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(database) = &cli.database {
        config.database = database.clone();
    }
    if let Some(api_url) = &cli.api_url {
        config.api_url = api_url.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    match &cli.command {
        Command::Analyze { window, min, .. } => {
            apply_window(&mut config, window);
            if let Some(min) = min {
                config.min_samples = *min;
            }
        }
        Command::Challenges {
            action: ChallengesAction::Refresh { window, .. },
        } => apply_window(&mut config, window),
        _ => {}
    }
    config.validate()?;
    Ok(config)
}

fn apply_window(config: &mut AnalysisConfig, window: &WindowArgs) {
    if let Some(days) = window.days {
        config.days = days;
    }
    if let Some(buffer) = window.buffer {
        config.holddown_hours = buffer;
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(config.log_format, &config.log_level);
    if let Some(path) = &cli.config {
        tracing::info!(path = %path.display(), "loaded config");
    }

    let env = open_environment(&config)?;
    let client = || {
        HttpClient::new(
            &config.api_url,
            config.request_timeout(),
            config.rate_limit_fallback(),
        )
    };
    let mut app = App::new(
        config.clone(),
        &env,
        client()?,
        client()?,
        Arc::new(SystemClock),
        Arc::new(ThreadSleeper),
    );

    run(&mut app, &config, cli.command)
}

fn run(
    app: &mut App<HttpClient, HttpClient>,
    config: &AnalysisConfig,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Challenges { action } => match action {
            ChallengesAction::Refresh { hotspot, .. } => {
                let (address, outcome) =
                    app.refresh_challenges(&hotspot, config.days, config.holddown())?;
                let status = match outcome.plan {
                    ReconcilePlan::UpToDate => "up to date".to_string(),
                    ReconcilePlan::Fetch { reason, .. } => format!("refreshed ({reason})"),
                };
                println!(
                    "{address}: {status}, fetched {}, stored {}",
                    outcome.fetched, outcome.written
                );
            }
            ChallengesAction::Export { hotspot, file } => {
                let export = app.export_challenges(&hotspot)?;
                tracing::info!(
                    address = %export.address,
                    count = export.challenges.len(),
                    "exporting challenges"
                );
                write_json(&file, &export)?;
            }
            ChallengesAction::Import { hotspot, file } => {
                let export: ChallengeExport = read_json(&file)?;
                let written = app.import_challenges(&hotspot, &export)?;
                println!("imported {written} challenges");
            }
            ChallengesAction::Delete {
                hotspot,
                before,
                after,
            } => {
                let range = match (before, after) {
                    (Some(date), None) => DeleteRange::Before(parse_date(&date)?),
                    (None, Some(date)) => DeleteRange::After(parse_date(&date)?),
                    _ => bail!("exactly one of --before or --after is required"),
                };
                let removed = app.delete_challenges(&hotspot, range)?;
                println!("deleted {removed} challenges");
            }
            ChallengesAction::DeleteAll { hotspot } => {
                let removed = app.delete_all_challenges(&hotspot)?;
                println!("deleted {removed} challenges");
            }
            ChallengesAction::List => {
                for row in app.list_challenges()? {
                    let span = match (row.first, row.last) {
                        (Some(first), Some(last)) => {
                            format!("{} .. {}", format_timestamp(first), format_timestamp(last))
                        }
                        _ => "-".to_string(),
                    };
                    println!(
                        "{:<32} {} {:>7} {span}",
                        row.name.as_deref().unwrap_or("?"),
                        row.address,
                        row.count
                    );
                }
            }
        },
        Command::Hotspots { action } => match action {
            HotspotsAction::Refresh { force } => match app.refresh_directory(force)? {
                Some(count) => println!("stored {count} hotspots"),
                None => println!("hotspot directory is current"),
            },
            HotspotsAction::Export { file } => write_json(&file, &app.export_hotspots()?)?,
            HotspotsAction::Import { file } => {
                let hotspots: Vec<Hotspot> = read_json(&file)?;
                let count = app.import_hotspots(&hotspots)?;
                println!("imported {count} hotspots");
            }
        },
        Command::Names { action } => match action {
            NamesAction::Export { file } => write_json(&file, &app.export_names()?)?,
        },
        Command::Analyze { hotspot, out, .. } => {
            analyze(app, config, &hotspot, &out)?;
        }
    }
    Ok(())
}

fn analyze(
    app: &mut App<HttpClient, HttpClient>,
    config: &AnalysisConfig,
    hotspot: &str,
    out: &Path,
) -> anyhow::Result<()> {
    let summary = app.analyze(
        hotspot,
        config.days,
        config.holddown(),
        config.min_samples,
        out,
    )?;
    if !summary.refreshed {
        eprintln!("warning: challenge refresh failed, reports use cached data");
    }
    println!(
        "{}: {} challenges, {} peer reports, {} beacons, {} witnessed distances -> {}",
        summary.address,
        summary.records,
        summary.peers,
        summary.beacons,
        summary.distances,
        summary.directory.display()
    );
    Ok(())
}
