#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use conjoint_harness::config::{ClientConfig, FailurePolicy, StudyConfig};
use conjoint_harness::gateway::TracingUsageSink;
use conjoint_harness::profiles::{AttributeCatalog, ProfileSpace};
use conjoint_harness::respondent::LlmRespondent;
use conjoint_harness::study::{
    self, export, run_study, CancelSignal, JsonlTraceSink, StudyOptions, StudyStopReason, TokioPacer,
    TraceSink,
};

#[derive(Parser)]
#[command(name = "conjoint", version, about = "Simulated conjoint surveys with LLM respondents")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the full-factorial profile table as CSV
    Profiles {
        /// Catalog JSON (default: built-in laptop catalog)
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Output path (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Sample pairs and write their prompts as CSV, without calling the model
    Pairs {
        #[arg(long)]
        catalog: Option<PathBuf>,
        #[arg(long, default_value_t = conjoint_harness::config::DEFAULT_SAMPLE_SIZE)]
        sample_size: usize,
        #[arg(long)]
        seed: Option<u64>,
        /// Output path (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run a study against the chat-completions endpoint
    ///
    /// The bearer token is read from CONJOINT_API_KEY (or OPENAI_API_KEY).
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Study config JSON; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Results CSV path
    #[arg(long)]
    out: PathBuf,

    /// JSONL trace of every call
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Full report (records, stop reason, summary) as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    #[arg(long)]
    catalog: Option<PathBuf>,

    #[arg(long, env = "CONJOINT_MODEL")]
    model: Option<String>,

    #[arg(long, env = "CONJOINT_BASE_URL")]
    base_url: Option<String>,

    /// Seconds to wait before each call
    #[arg(long, env = "CONJOINT_PAUSE_SECONDS")]
    pause_seconds: Option<f64>,

    #[arg(long, env = "CONJOINT_MAX_REPLY_TOKENS")]
    max_reply_tokens: Option<u32>,

    /// Pairs to sample
    #[arg(long, env = "CONJOINT_SAMPLE_SIZE")]
    sample_size: Option<usize>,

    /// Leading sampled pairs to submit
    #[arg(long, env = "CONJOINT_SUBMIT_COUNT")]
    submit_count: Option<usize>,

    #[arg(long, env = "CONJOINT_SEED")]
    seed: Option<u64>,

    #[arg(long, value_enum)]
    failure_policy: Option<CliFailurePolicy>,

    #[arg(long, env = "CONJOINT_TIMEOUT_SECONDS")]
    timeout_seconds: Option<u64>,
}

/// CLI-facing failure policy enum (clap::ValueEnum).
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliFailurePolicy {
    Skip,
    Abort,
}

impl From<CliFailurePolicy> for FailurePolicy {
    fn from(p: CliFailurePolicy) -> Self {
        match p {
            CliFailurePolicy::Skip => FailurePolicy::SkipAndContinue,
            CliFailurePolicy::Abort => FailurePolicy::Abort,
        }
    }
}

impl RunArgs {
    fn study_config(&self) -> Result<StudyConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => StudyConfig::from_path(path)?,
            None => StudyConfig::default(),
        };
        if let Some(v) = &self.catalog {
            config.catalog = Some(v.clone());
        }
        if let Some(v) = &self.model {
            config.model = v.clone();
        }
        if let Some(v) = &self.base_url {
            config.base_url = v.clone();
        }
        if let Some(v) = self.pause_seconds {
            config.pause_seconds = v;
        }
        if let Some(v) = self.max_reply_tokens {
            config.max_reply_tokens = v;
        }
        if let Some(v) = self.sample_size {
            config.sample_size = v;
        }
        if let Some(v) = self.submit_count {
            config.submit_count = v;
        }
        if let Some(v) = self.seed {
            config.seed = Some(v);
        }
        if let Some(v) = self.failure_policy {
            config.failure_policy = v.into();
        }
        if let Some(v) = self.timeout_seconds {
            config.timeout_seconds = v;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "conjoint_harness=debug,conjoint=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_catalog(path: Option<&PathBuf>) -> Result<AttributeCatalog, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => AttributeCatalog::from_path(path)?,
        None => AttributeCatalog::laptops(),
    })
}

fn output(path: Option<&PathBuf>) -> io::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout().lock()),
    })
}

fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Profiles { catalog, out } => {
            let space = ProfileSpace::new(load_catalog(catalog.as_ref())?);
            export::write_profiles_csv(space.profiles(), output(out.as_ref())?)?;
        }
        Commands::Pairs {
            catalog,
            sample_size,
            seed,
            out,
        } => {
            let space = ProfileSpace::new(load_catalog(catalog.as_ref())?);
            let mut rng = rng_from_seed(seed);
            let pairs = study::sample_pair_records(&space, sample_size, &mut rng);
            export::write_pairs_csv(&pairs, output(out.as_ref())?)?;
        }
        Commands::Run(args) => run(args).await?,
    }

    Ok(())
}

async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.study_config()?;
    // Credentials are checked before anything touches the network.
    let client_config = ClientConfig::from_env()?.with_study(&config);

    let space = ProfileSpace::new(load_catalog(config.catalog.as_ref())?);
    let mut rng = rng_from_seed(config.seed);
    let mut pairs = study::sample_pair_records(&space, config.sample_size, &mut rng);
    pairs.truncate(config.submit_count);
    info!(
        profiles = space.len(),
        submitting = pairs.len(),
        model = %client_config.model,
        "Prepared study"
    );

    let respondent = LlmRespondent::new(&client_config, Arc::new(TracingUsageSink))?;

    let cancel = CancelSignal::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            warn!("Interrupt received; stopping the study (Ctrl-C again to exit now)");
            cancel.cancel();
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Second interrupt; exiting without writing results");
                std::process::exit(130);
            }
        });
    }

    let trace = match &args.trace {
        Some(path) => Some(JsonlTraceSink::new(path)?),
        None => None,
    };
    let trace_sink = trace.as_ref().map(|(sink, _)| sink as &dyn TraceSink);

    let report = run_study(
        &respondent,
        &TokioPacer,
        &pairs,
        &StudyOptions::from(&config),
        trace_sink,
        Some(&cancel),
    )
    .await;

    if let Some((sink, worker)) = trace {
        drop(sink);
        worker.join()?;
    }

    export::write_results_csv_path(&report.records, &args.out)?;
    if let Some(path) = &args.report {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, &report)?;
    }

    println!("{}", serde_json::to_string_pretty(&report.summary)?);

    match report.stop_reason {
        StudyStopReason::Completed => Ok(()),
        StudyStopReason::Cancelled => {
            warn!(collected = report.records.len(), "Study cancelled");
            Ok(())
        }
        StudyStopReason::Aborted {
            pair_index,
            error_code,
            message,
        } => Err(format!("study aborted at pair {pair_index} ({error_code}): {message}").into()),
    }
}
