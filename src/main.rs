use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use marketplace::application::engine::MarketplaceEngine;
use marketplace::config::{
    DEFAULT_BEST_CLIENTS_LIMIT, DEFAULT_DEPOSIT_LIMIT_PERCENT, MarketplaceConfig,
};
use marketplace::domain::contract::ContractId;
use marketplace::domain::job::JobId;
use marketplace::domain::money::Balance;
use marketplace::domain::ports::StoreHandle;
use marketplace::domain::profile::ProfileId;
use marketplace::error::MarketplaceError;
use marketplace::infrastructure::in_memory::InMemoryStore;
use marketplace::interfaces::csv::seed_reader::read_seed_dir;
use marketplace::interfaces::csv::writer::{OutputFormat, RecordWriter};
use miette::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory with profiles.csv, contracts.csv and jobs.csv to load at startup
    #[arg(long, global = true, env = "MARKETPLACE_SEED")]
    seed: Option<PathBuf>,

    /// RocksDB directory to keep the marketplace in between runs
    #[arg(long, global = true, env = "MARKETPLACE_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Output format of the results written to stdout
    #[arg(long, global = true, value_enum, default_value_t = Format::Csv)]
    format: Format,

    /// Largest deposit, as a percentage of the unpaid active-contract job total
    #[arg(
        long,
        global = true,
        env = "MARKETPLACE_DEPOSIT_LIMIT_PERCENT",
        default_value_t = DEFAULT_DEPOSIT_LIMIT_PERCENT
    )]
    deposit_limit_percent: Decimal,

    /// Rows returned by best-clients when --limit is not given
    #[arg(
        long,
        global = true,
        env = "MARKETPLACE_BEST_CLIENTS_LIMIT",
        default_value_t = DEFAULT_BEST_CLIENTS_LIMIT
    )]
    best_clients_limit: usize,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => OutputFormat::Csv,
            Format::Json => OutputFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Pay one of the caller's jobs
    Pay {
        /// Calling profile
        #[arg(long)]
        profile: u32,
        job_id: u32,
    },
    /// Add funds to a profile's balance
    Deposit {
        /// Calling profile
        #[arg(long)]
        profile: u32,
        profile_id: u32,
        #[arg(allow_negative_numbers = true)]
        amount: Decimal,
    },
    /// List the caller's non-terminated contracts
    Contracts {
        #[arg(long)]
        profile: u32,
    },
    /// Show one of the caller's contracts
    Contract {
        #[arg(long)]
        profile: u32,
        contract_id: u32,
    },
    /// List unpaid jobs of the caller's active contracts
    UnpaidJobs {
        #[arg(long)]
        profile: u32,
    },
    /// Sum the prices of the caller's unpaid jobs
    UnpaidTotal {
        #[arg(long)]
        profile: u32,
    },
    /// Profession that earned the most within a time window
    BestProfession {
        #[arg(long, value_parser = parse_start)]
        start: DateTime<Utc>,
        #[arg(long, value_parser = parse_end)]
        end: DateTime<Utc>,
    },
    /// Clients that paid the most within a time window
    BestClients {
        #[arg(long, value_parser = parse_start)]
        start: DateTime<Utc>,
        #[arg(long, value_parser = parse_end)]
        end: DateTime<Utc>,
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Serialize)]
struct UnpaidTotalRow {
    profile: ProfileId,
    total: Balance,
}

fn parse_start(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    parse_timestamp(value, NaiveTime::MIN)
}

fn parse_end(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    let end_of_day = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
        .ok_or_else(|| "invalid end of day".to_string())?;
    parse_timestamp(value, end_of_day)
}

/// Accepts RFC 3339, or a bare date taken at `time` UTC.
fn parse_timestamp(value: &str, time: NaiveTime) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.to_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| date.and_time(time).and_utc())
        .map_err(|_| format!("expected an RFC 3339 timestamp or a YYYY-MM-DD date, got `{value}`"))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A second init only happens in tests; the first subscriber wins.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(verbose)
        .compact()
        .try_init();
}

/// Picks the store backend. The flag tells whether the store outlives this run.
#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<&Path>) -> Result<(StoreHandle, bool)> {
    use marketplace::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => Ok((Arc::new(RocksDBStore::open(path)?), true)),
        None => Ok((Arc::new(InMemoryStore::new()), false)),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<&Path>) -> Result<(StoreHandle, bool)> {
    if let Some(path) = db_path {
        tracing::warn!(
            path = %path.display(),
            "--db-path given but the 'storage-rocksdb' feature is not enabled, falling back to the in-memory store"
        );
    }
    Ok((Arc::new(InMemoryStore::new()), false))
}

async fn run<W: Write>(
    engine: &MarketplaceEngine,
    command: Command,
    writer: &mut RecordWriter<W>,
) -> marketplace::error::Result<()> {
    match command {
        Command::Pay { profile, job_id } => {
            let caller = engine.profile(ProfileId(profile)).await?;
            let receipt = engine.pay_job(caller.id, JobId(job_id)).await?;
            writer.write_receipt(&receipt)
        }
        Command::Deposit {
            profile,
            profile_id,
            amount,
        } => {
            engine.profile(ProfileId(profile)).await?;
            let updated = engine.deposit(ProfileId(profile_id), amount).await?;
            writer.write_profiles(&[updated])
        }
        Command::Contracts { profile } => {
            let contracts = engine.active_contracts(ProfileId(profile)).await?;
            writer.write_contracts(&contracts)
        }
        Command::Contract {
            profile,
            contract_id,
        } => {
            let contract = engine
                .contract(ProfileId(profile), ContractId(contract_id))
                .await?;
            writer.write_contracts(&[contract])
        }
        Command::UnpaidJobs { profile } => {
            let jobs = engine.unpaid_jobs(ProfileId(profile)).await?;
            writer.write_jobs(&jobs)
        }
        Command::UnpaidTotal { profile } => {
            let total = engine.unpaid_jobs_total(ProfileId(profile)).await?;
            writer.write_rows(&[UnpaidTotalRow {
                profile: ProfileId(profile),
                total,
            }])
        }
        Command::BestProfession { start, end } => {
            let best = engine.best_profession(start, end).await?;
            writer.write_optional(best.as_ref())
        }
        Command::BestClients { start, end, limit } => {
            let rows = engine.best_clients(start, end, limit).await?;
            writer.write_rows(&rows)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = MarketplaceConfig::new(cli.deposit_limit_percent, cli.best_clients_limit)?;
    let (store, persistent) = open_store(cli.db_path.as_deref())?;
    let engine = MarketplaceEngine::new(store, config);

    if let Some(dir) = &cli.seed {
        let data = read_seed_dir(dir)?;
        match engine.import(data).await {
            Ok(_) => {}
            // A persistent database keeps the seed from an earlier run.
            Err(MarketplaceError::Conflict(reason)) if persistent => {
                tracing::info!(%reason, "seed already present, skipping import");
            }
            Err(err) => return Err(err.into()),
        }
    }

    let stdout = io::stdout();
    let mut writer = RecordWriter::new(stdout.lock(), cli.format.into());
    run(&engine, cli.command, &mut writer).await?;

    Ok(())
}
