// Remaps each writer's page while the writers write timestamps through it,
// then checks that every write landed where the page was mapped at the time.
//
// Exit status: 0 if all writers passed, 1 on any weird or lost write,
// 2 if the test could not be set up.

use clap::Parser;
use tlbflush_data::config::{self, RunConfig};
use tlbflush_data::host;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Read the config from this TOML file first.
    #[arg(long)]
    config: Option<String>,

    /// CPUs (threads) to use, the controller included.
    #[arg(long)]
    cpus: Option<usize>,

    #[arg(long)]
    rounds: Option<u32>,

    /// Timestamps each writer writes per round.
    #[arg(long)]
    iterations: Option<usize>,

    /// Frames each dynamic page rotates through.
    #[arg(long)]
    pool: Option<usize>,

    /// Minimum remaps per writer per round.
    #[arg(long)]
    remaps: Option<u32>,

    #[arg(long)]
    audit_capacity: Option<usize>,

    /// Invalidate only the remapped page instead of everything.
    #[arg(long)]
    page: bool,

    #[arg(long)]
    verbose: bool,

    /// Make invalidations no-ops (implies --lockstep); every round is then
    /// expected to fail.
    #[arg(long)]
    broken_flush: bool,

    /// Writers wait for their page to be remapped before every write.
    #[arg(long)]
    lockstep: bool,

    /// Bare words: page, all, verbose, nosync, cycles=N, iterations=N,
    /// pool=N, remaps=N, audit=N.
    words: Vec<String>,
}

fn run_config(args: &Args) -> anyhow::Result<RunConfig> {
    let mut config = match args.config.as_deref() {
        Some(path) => config::read_from_file(path)
            .map_err(|err| anyhow::anyhow!("Error reading config file '{path}': {err}"))?,
        None => RunConfig::default(),
    };

    if let Some(cpus) = args.cpus {
        config.cpus = cpus;
    }
    if let Some(rounds) = args.rounds {
        config.audit.rounds = rounds;
    }
    if let Some(iterations) = args.iterations {
        config.audit.iterations = iterations;
    }
    if let Some(pool) = args.pool {
        config.audit.pool_size = pool;
    }
    if let Some(remaps) = args.remaps {
        config.audit.remaps_per_round = remaps;
    }
    if let Some(capacity) = args.audit_capacity {
        config.audit.audit_capacity = capacity;
    }
    if args.page {
        config.audit.flush_scope = tlb_audit::FlushScope::Page;
    }
    if args.verbose {
        config.audit.verbose = true;
    }
    if args.lockstep {
        config.lockstep = true;
    }
    if args.broken_flush {
        config.break_flush();
    }
    config.apply_words(&args.words)?;

    Ok(config)
}

fn main() {
    let args = Args::parse();
    let config = run_config(&args);

    let verbose = match &config {
        Ok(config) => config.audit.verbose,
        Err(_) => args.verbose,
    };
    env_logger::builder()
        .filter_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .init();

    let outcome = config.and_then(|config| host::run(&config));
    match outcome {
        Ok(outcome) => std::process::exit(outcome.exit_code),
        Err(err) => {
            log::error!("tlbflush-data: setup failed: {err:#}");
            std::process::exit(2);
        }
    }
}
