pub mod cli;
pub mod error;
pub mod identifier;
pub mod infer;
pub mod io_utils;
pub mod load;
pub mod repl;
pub mod session;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::Cli,
    error::ImportError,
    identifier::{IdentifierRules, RewritePolicy},
    load::LoadOptions,
    session::{Session, SessionOptions},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_to_sqlite", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    execute(&cli)
}

/// Loads every `(csv, table)` pair of `cli` in order, then starts the
/// interactive prompt when no output database was named.
pub fn execute(cli: &Cli) -> Result<()> {
    let pairs = cli
        .table_pairs()
        .ok_or(ImportError::UnpairedArguments {
            count: cli.csv_table_pairs.len(),
        })?;
    let options = load_options(cli)?;
    debug!("Reading CSV with the '{}' dialect", cli.dialect.name());

    let mut session = Session::open(
        cli.output.as_deref(),
        SessionOptions { wal: cli.wal },
    )?;
    for (csv_path, table) in &pairs {
        load::load_table(&mut session, csv_path, table, &options)
            .with_context(|| format!("Loading {csv_path:?} into table '{table}'"))?;
    }
    info!(
        "Imported {} table(s) into {}",
        pairs.len(),
        session.location()
    );

    if cli.output.is_none() {
        repl::run_stdio(&session)?;
    }
    Ok(())
}

fn load_options(cli: &Cli) -> Result<LoadOptions> {
    let encoding = io_utils::resolve_encoding(cli.input_encoding.as_deref())?;
    let rewrite = if cli.strict_identifiers {
        RewritePolicy::Reject
    } else {
        RewritePolicy::Rewrite
    };
    Ok(LoadOptions {
        dialect: cli.dialect,
        encoding,
        rules: IdentifierRules::sqlite(rewrite, cli.reserved_words),
    })
}
