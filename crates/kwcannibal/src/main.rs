use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use kwcannibal_core::{AnalysisConfig, ReportPolicy, ReportShape};
use kwcannibal_local::observe::TracingObserver;
use kwcannibal_local::{corpus, pipeline, LocalFetcher};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "kwcannibal")]
#[command(
    about = "Find pages of a site whose content overlaps enough to compete for the same keywords",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// URL list, one URL per line (blank lines are skipped).
    #[arg(long, env = "KWCANNIBAL_URLS", default_value = "urls.txt")]
    urls: PathBuf,
    /// Report path (default: cannibalization_report.csv, or
    /// cannibalization_group_report.csv for --policy groups).
    #[arg(long, env = "KWCANNIBAL_OUT")]
    out: Option<PathBuf>,
    /// `pairs`: each overlapping pair once. `groups`: every page with each page it overlaps.
    #[arg(long, env = "KWCANNIBAL_POLICY", value_enum, default_value_t = PolicyArg::Pairs)]
    policy: PolicyArg,
    /// Report pairs strictly above this similarity (default: 0.3 for pairs, 0.7 for groups).
    #[arg(long, env = "KWCANNIBAL_THRESHOLD")]
    threshold: Option<f64>,
    /// `detailed` adds titles and H1s; `simple` is URLs + score (pairs only).
    #[arg(long, env = "KWCANNIBAL_REPORT_SHAPE", value_enum, default_value_t = ShapeArg::Detailed)]
    report_shape: ShapeArg,
    /// Per-page fetch timeout.
    #[arg(long, env = "KWCANNIBAL_TIMEOUT_MS", default_value_t = 15_000)]
    timeout_ms: u64,
    /// Cap on bytes read per page.
    #[arg(long, env = "KWCANNIBAL_MAX_BYTES", default_value_t = 5_000_000)]
    max_bytes: u64,
    /// Pages fetched at once.
    #[arg(long, env = "KWCANNIBAL_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,
    #[arg(long, env = "KWCANNIBAL_USER_AGENT", default_value = "kwcannibal/0.1")]
    user_agent: String,
    /// More logging (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Only warnings and errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    Pairs,
    Groups,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ShapeArg {
    Detailed,
    Simple,
}

impl Cli {
    fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            policy: match self.policy {
                PolicyArg::Pairs => ReportPolicy::Pairs,
                PolicyArg::Groups => ReportPolicy::Groups,
            },
            threshold: self.threshold,
            report_shape: match self.report_shape {
                ShapeArg::Detailed => ReportShape::Detailed,
                ShapeArg::Simple => ReportShape::Simple,
            },
            timeout_ms: self.timeout_ms,
            max_bytes: self.max_bytes,
            concurrency: self.concurrency,
            user_agent: self.user_agent.clone(),
        }
    }

    fn log_level(&self) -> Level {
        if self.quiet {
            return Level::WARN;
        }
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the report path.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level())
        .with_target(false)
        .without_time()
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cfg = cli.analysis_config();
    cfg.validate()?;
    let out = cli
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(cfg.policy.default_output()));

    let urls = corpus::load_urls(&cli.urls)?;
    let observer = TracingObserver;
    let fetcher = LocalFetcher::new(&cfg.user_agent).context("building http client")?;

    let analysis = pipeline::analyze_urls(&fetcher, &urls, &cfg, &observer).await?;
    pipeline::save_report(&analysis, &cfg, &out, &observer)?;

    println!("{}", out.display());
    Ok(())
}
