use anyhow::{bail, Context};
use clap::Parser;
use runtests_core::RunTests;
use serde::Serialize;
use std::io::{self, Write};
use tracing::{debug, info};

mod exit_codes;

/// Reference worker: decodes its run configuration and reports one record
/// per scheduled test through the configured result conduit.
#[derive(Parser, Debug)]
#[command(name = "runtests-worker", version)]
struct Cli {
    /// Serialized run configuration
    #[arg(long = "worker-json", value_name = "JSON")]
    worker_json: String,

    /// Stop after this many test runs; required for forever runs
    #[arg(long)]
    max_units: Option<usize>,
}

/// One NDJSON line in the result stream.
#[derive(Debug, Serialize)]
struct TestRecord<'a> {
    test_name: &'a str,
    match_tests: Option<&'a [String]>,
    worker_pid: u32,
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .try_init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let code = match run(cli) {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("fatal: {e:?}");
            exit_codes::for_error(&e)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let runtests =
        RunTests::from_json(&cli.worker_json).context("decoding worker configuration")?;
    if runtests.forever() && cli.max_units.is_none() {
        bail!("forever run needs --max-units to bound the test sequence");
    }
    debug!(
        tests = runtests.tests().len(),
        forever = runtests.forever(),
        random_seed = ?runtests.random_seed(),
        "decoded worker configuration"
    );

    let mut out: Box<dyn Write> = match runtests.json_file() {
        Some(conduit) => Box::new(
            conduit
                .open_writer()
                .context("opening result conduit")?,
        ),
        None => Box::new(io::stdout().lock()),
    };

    let worker_pid = std::process::id();
    let limit = cli.max_units.unwrap_or(usize::MAX);
    let mut units = 0usize;
    for test_name in runtests.iter_tests().take(limit) {
        let record = TestRecord {
            test_name,
            match_tests: runtests.filters_for(test_name),
            worker_pid,
        };
        serde_json::to_writer(&mut out, &record)?;
        writeln!(out)?;
        units += 1;
    }
    out.flush()?;

    info!(units, "worker finished");
    Ok(())
}
