//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use ttabkit_acquire::{Fetcher, ListingClient, Window};
use ttabkit_appeals::{AppealMatcher, CourtListenerClient};
use ttabkit_core::{
    AcquirePlan, ExtractPlan, ProgressReporter, RunStats, Tee, acquire, enrich, extract,
};
use ttabkit_export::CsvExporter;
use ttabkit_parser::{CaseExtractor, Classifier, DocumentSet};
use ttabkit_shared::{
    AppConfig, Dataset, RateLimiter, RetryPolicy, init_config, load_config, load_config_from,
    read_credential,
};
use ttabkit_storage::Storage;

/// Days covered when no window flag is given.
const DEFAULT_RECENT_DAYS: u32 = 7;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ttabkit: Board decisions from bulk XML to CSV and libSQL.
#[derive(Parser)]
#[command(
    name = "ttabkit",
    version,
    about = "Download TTAB bulk archives, extract decided opinions, and match Federal Circuit appeals.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.ttabkit/ttabkit.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum DatasetArg {
    /// Daily files for the current year.
    Daily,
    /// Annual historical files.
    Annual,
}

impl From<DatasetArg> for Dataset {
    fn from(arg: DatasetArg) -> Self {
        match arg {
            DatasetArg::Daily => Dataset::Daily,
            DatasetArg::Annual => Dataset::Annual,
        }
    }
}

/// Which archives to acquire.
#[derive(Args, Debug)]
pub(crate) struct SourceArgs {
    /// Directory holding archives and unpacked documents.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "daily")]
    pub dataset: DatasetArg,

    /// Files from the last N days (default 7).
    #[arg(long, conflicts_with_all = ["year", "all"])]
    pub recent: Option<u32>,

    /// Files covering one calendar year.
    #[arg(long, conflicts_with = "all")]
    pub year: Option<i32>,

    /// Every listed file.
    #[arg(long)]
    pub all: bool,

    /// Download even when a local copy exists.
    #[arg(long)]
    pub force: bool,
}

impl SourceArgs {
    fn window(&self) -> Window {
        match (self.recent, self.year, self.all) {
            (_, _, true) => Window::All,
            (_, Some(year), _) => Window::Year(year),
            (Some(days), _, _) => Window::RecentDays(days),
            _ => Window::RecentDays(DEFAULT_RECENT_DAYS),
        }
    }
}

/// Where extracted records go.
#[derive(Args, Debug)]
pub(crate) struct OutputArgs {
    /// CSV output file.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// libSQL database file.
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Stop after this many opinions.
    #[arg(long)]
    pub limit: Option<u64>,

    /// Look up Federal Circuit appeals while extracting.
    #[arg(long)]
    pub match_appeals: bool,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// List, download and unpack bulk archives.
    Download {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Extract opinions from unpacked documents.
    Parse {
        /// Directory (or single XML file) to read.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Match stored cases that have no appeal yet.
    Enrich {
        /// libSQL database file.
        #[arg(long)]
        db: Option<PathBuf>,

        /// Stop after this many cases.
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Download, then extract.
    Run {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "ttabkit=info",
        1 => "ttabkit=debug",
        _ => "ttabkit=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Download { source } => cmd_download(&config, &source).await,
        Command::Parse { data_dir, output } => {
            cmd_parse(&config, data_dir.as_deref(), &output).await
        }
        Command::Enrich { db, limit } => cmd_enrich(&config, db.as_deref(), limit).await,
        Command::Run { source, output } => cmd_run(&config, &source, &output).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&config).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Collaborator setup
// ---------------------------------------------------------------------------

fn data_dir(config: &AppConfig, flag: Option<&Path>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.defaults.data_dir))
}

fn sources(config: &AppConfig, source: &SourceArgs) -> Result<(ListingClient, Fetcher)> {
    let api_key = read_credential(&config.uspto.api_key_env, "USPTO bulk data")?;
    let limiter = Arc::new(RateLimiter::new(Duration::from_secs(
        config.uspto.download_interval_secs,
    )));
    let listing = ListingClient::new(&config.uspto, api_key.clone())?;
    let fetcher = Fetcher::new(
        &config.uspto,
        data_dir(config, source.data_dir.as_deref()),
        api_key,
        limiter,
    )?
    .force(source.force);
    Ok((listing, fetcher))
}

fn acquire_plan<'a>(
    config: &AppConfig,
    source: &SourceArgs,
    listing: &'a ListingClient,
    fetcher: &'a Fetcher,
) -> AcquirePlan<'a> {
    AcquirePlan {
        listing,
        fetcher,
        dataset: source.dataset.into(),
        window: source.window(),
        today: chrono::Utc::now().date_naive(),
        retry: RetryPolicy::new(
            config.uspto.max_attempts,
            Duration::from_millis(config.uspto.retry_backoff_ms),
        ),
    }
}

/// The appeal matcher, when requested and enabled. The token is checked
/// here, before any network call or document read.
fn matcher(config: &AppConfig, requested: bool) -> Result<Option<AppealMatcher>> {
    if !requested {
        return Ok(None);
    }
    if !config.courtlistener.enabled {
        warn!("appeal matching requested but disabled in [courtlistener]");
        return Ok(None);
    }
    build_matcher(config).map(Some)
}

fn build_matcher(config: &AppConfig) -> Result<AppealMatcher> {
    let cl = &config.courtlistener;
    let token = read_credential(&cl.api_token_env, "CourtListener")?;
    let limiter = Arc::new(RateLimiter::new(Duration::from_millis(cl.min_interval_ms)));
    let client = CourtListenerClient::new(cl, token, limiter)?;
    Ok(AppealMatcher::new(client, cl, config.matching.clone()))
}

async fn open_storage(config: &AppConfig, flag: Option<&Path>) -> Result<Storage> {
    let path = flag
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.defaults.db_path));
    Ok(Storage::open(&path).await?)
}

/// CSV file plus database, with a run-history row opened for `command`.
struct Outputs {
    storage: Storage,
    exporter: CsvExporter,
    run_id: String,
}

impl Outputs {
    async fn open(config: &AppConfig, output: &OutputArgs, command: &str) -> Result<Self> {
        let storage = open_storage(config, output.db.as_deref()).await?;
        let csv_path = output
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.defaults.output_csv));
        let exporter = CsvExporter::create(&csv_path)?;
        let run_id = storage.insert_run(command).await?;
        Ok(Self {
            storage,
            exporter,
            run_id,
        })
    }
}

fn extract_plan<'a>(
    classifier: &'a Classifier,
    matcher: Option<&'a AppealMatcher>,
    storage: &'a Storage,
    output: &OutputArgs,
) -> ExtractPlan<'a> {
    ExtractPlan {
        classifier,
        extractor: CaseExtractor::new(),
        matcher,
        known: Some(storage),
        limit: output.limit,
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_download(config: &AppConfig, source: &SourceArgs) -> Result<()> {
    let (listing, fetcher) = sources(config, source)?;
    let plan = acquire_plan(config, source, &listing, &fetcher);
    info!(
        data_dir = %fetcher.data_dir().display(),
        window = ?plan.window,
        "starting download"
    );

    let reporter = CliProgress::new();
    let stats = acquire(&plan, &reporter).await?;
    print_summary(&stats, None);
    Ok(())
}

async fn cmd_parse(config: &AppConfig, dir: Option<&Path>, output: &OutputArgs) -> Result<()> {
    let matcher = matcher(config, output.match_appeals)?;
    let root = data_dir(config, dir);
    let documents = DocumentSet::scan(&root)?;
    info!(root = %root.display(), documents = documents.len(), "starting extraction");

    let Outputs {
        storage,
        exporter,
        run_id,
    } = Outputs::open(config, output, "parse").await?;
    let csv_path = exporter.output().to_path_buf();
    let classifier = Classifier::new(&config.classifier);
    let plan = extract_plan(&classifier, matcher.as_ref(), &storage, output);

    let reporter = CliProgress::new();
    let stats = extract(&documents, &plan, Tee(exporter, &storage), &reporter).await?;
    storage.finish_run(&run_id, &stats.to_json()).await?;
    print_summary(&stats, Some(&csv_path));
    Ok(())
}

async fn cmd_run(config: &AppConfig, source: &SourceArgs, output: &OutputArgs) -> Result<()> {
    let matcher = matcher(config, output.match_appeals)?;
    let (listing, fetcher) = sources(config, source)?;
    let acquire = acquire_plan(config, source, &listing, &fetcher);

    let Outputs {
        storage,
        exporter,
        run_id,
    } = Outputs::open(config, output, "run").await?;
    let csv_path = exporter.output().to_path_buf();
    let classifier = Classifier::new(&config.classifier);
    let plan = extract_plan(&classifier, matcher.as_ref(), &storage, output);

    let reporter = CliProgress::new();
    let stats = ttabkit_core::run(&acquire, &plan, Tee(exporter, &storage), &reporter).await?;
    storage.finish_run(&run_id, &stats.to_json()).await?;
    print_summary(&stats, Some(&csv_path));
    Ok(())
}

async fn cmd_enrich(config: &AppConfig, db: Option<&Path>, limit: Option<u32>) -> Result<()> {
    let matcher = build_matcher(config)?;
    let storage = open_storage(config, db).await?;
    let run_id = storage.insert_run("enrich").await?;

    let reporter = CliProgress::new();
    let stats = enrich(&storage, &matcher, limit, &reporter).await?;
    storage.finish_run(&run_id, &stats.to_json()).await?;
    print_summary(&stats, None);
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_summary(stats: &RunStats, csv: Option<&Path>) {
    println!();
    println!("  Fetched:            {}", stats.fetched);
    println!("  Skipped duplicate:  {}", stats.skipped_duplicate);
    println!(
        "  Failed:             {}",
        stats.fetch_failed + stats.unpack_failed
    );
    println!("  Opinions extracted: {}", stats.opinions_extracted);
    println!("  Matched:            {}", stats.matched);
    println!("  Unmatched:          {}", stats.unmatched);
    if !stats.data_issues.is_empty() {
        let issues: Vec<String> = stats
            .data_issues
            .iter()
            .map(|(kind, n)| format!("{kind}={n}"))
            .collect();
        println!("  Data issues:        {}", issues.join(", "));
    }
    if let Some(csv) = csv {
        println!("  CSV:                {}", csv.display());
    }
    if stats.limit_reached {
        println!("  (stopped at --limit)");
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn file_acquired(&self, name: &str, current: usize, total: usize) {
        self.spinner.set_message(format!("[{current}/{total}] {name}"));
    }

    fn document(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("[{current}/{total}] reading {name}"));
    }

    fn record(&self, case_number: &str, count: u64) {
        self.spinner
            .set_message(format!("{count} records (last: {case_number})"));
    }

    fn done(&self, stats: &RunStats) {
        self.spinner
            .set_message(format!("{} opinions so far", stats.opinions_extracted));
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        self.spinner.finish_and_clear();
    }
}
