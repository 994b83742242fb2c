//! covdelta - coverage delta gate
//!
//! Usage:
//!   covdelta check               - Evaluate added/modified files and post comments
//!   covdelta extract REPORT PATH - Print the line-rate recorded for paths

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use covdelta::{
    CommentSink, CoverageGate, CoverageReport, DirectorySink, Extraction, GateConfig, GateStatus,
    Ratio, ReportFormat, ReportRenderer, ThresholdPolicy, ValueStyle, WriterSink, extract,
};

#[derive(Parser)]
#[command(name = "covdelta", version, about = "Coverage delta gate for added and modified files")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the change and write the coverage comments
    Check(CheckArgs),
    /// Print the line-rate a report records for each path
    Extract {
        /// Cobertura XML report
        report: PathBuf,
        /// Exact file paths to look up
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(clap::Args)]
struct CheckArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory relative paths resolve against
    #[arg(long)]
    root: Option<PathBuf>,

    /// Candidate coverage report
    #[arg(long)]
    current: Option<PathBuf>,

    /// Baseline report path, may contain {baseline}
    #[arg(long)]
    baseline_report: Option<String>,

    /// Baseline branch or revision
    #[arg(long)]
    baseline: Option<String>,

    /// Added files list
    #[arg(long)]
    added: Option<PathBuf>,

    /// Modified files list
    #[arg(long)]
    modified: Option<PathBuf>,

    /// Threshold preset applied before individual thresholds
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// Minimum coverage for every added/modified file (e.g. 0.80)
    #[arg(long)]
    min_coverage: Option<String>,

    /// Allowed coverage drop for modified files (e.g. 0.05 or -0.05)
    #[arg(long, allow_hyphen_values = true)]
    max_coverage_change: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "markdown")]
    format: FormatArg,

    /// Show ratios as percentages
    #[arg(long)]
    percent: bool,

    /// Write one file per comment into this directory instead of stdout
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Print a GitHub Actions annotation with the verdict
    #[arg(long)]
    annotate: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    Default,
    Strict,
    Relaxed,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Markdown,
    Text,
    Json,
}

impl From<FormatArg> for ReportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Markdown => ReportFormat::Markdown,
            FormatArg::Text => ReportFormat::Text,
            FormatArg::Json => ReportFormat::Json,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let result = match cli.command {
        Commands::Check(args) => check(args),
        Commands::Extract { report, paths } => extract_paths(&report, &paths),
    };

    match result {
        Ok(status) => ExitCode::from(status.exit_code()),
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(GateStatus::Fatal.exit_code())
        }
    }
}

fn init_logger(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn check(args: CheckArgs) -> Result<GateStatus> {
    let config = build_config(&args)?;
    log::info!(
        "Checking coverage against baseline {:?} (minimum {}, max change {})",
        config.baseline,
        config.policy.min_coverage(),
        config.policy.max_coverage_change()
    );

    let format = ReportFormat::from(args.format);
    let style = if args.percent {
        ValueStyle::Percent
    } else {
        ValueStyle::Ratio
    };
    let renderer = ReportRenderer::new(config.policy.clone())
        .with_format(format)
        .with_style(style);

    let run = CoverageGate::new(config)
        .run()
        .context("Coverage gate could not run")?;
    let comments = run.comments(&renderer);

    match args.output_dir {
        Some(dir) => {
            let mut sink = DirectorySink::create(&dir, format)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            sink.post_all(&comments)?;
        }
        None => {
            let mut sink = WriterSink::new(io::stdout().lock());
            sink.post_all(&comments)?;
        }
    }

    if args.annotate {
        println!("{}", renderer.github_annotation(&run.outcome));
    }

    Ok(run.status())
}

/// Defaults, then the config file, then workflow inputs, then flags
fn build_config(args: &CheckArgs) -> Result<GateConfig> {
    let mut config = match &args.config {
        Some(path) => GateConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => GateConfig::default(),
    };
    config = config.apply_env().context("Invalid workflow input")?;

    if let Some(preset) = args.preset {
        config.policy = match preset {
            Preset::Default => ThresholdPolicy::default(),
            Preset::Strict => ThresholdPolicy::strict(),
            Preset::Relaxed => ThresholdPolicy::relaxed(),
        };
    }
    if let Some(min) = &args.min_coverage {
        let min = Ratio::parse(min).context("Invalid --min-coverage")?;
        config = config.with_min_coverage(min)?;
    }
    if let Some(change) = &args.max_coverage_change {
        let change = Ratio::parse(change).context("Invalid --max-coverage-change")?;
        config = config.with_max_coverage_change(change)?;
    }
    if let Some(baseline) = &args.baseline {
        config = config.with_baseline(baseline.clone());
    }
    if let Some(root) = &args.root {
        config = config.with_root(root.clone());
    }
    if let Some(current) = &args.current {
        config.reports.current = current.clone();
    }
    if let Some(template) = &args.baseline_report {
        config.reports.baseline = template.clone();
    }
    if let Some(added) = &args.added {
        config.files.added = added.clone();
    }
    if let Some(modified) = &args.modified {
        config.files.modified = modified.clone();
    }

    Ok(config)
}

fn extract_paths(path: &Path, paths: &[String]) -> Result<GateStatus> {
    let report = CoverageReport::from_file(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    for path in paths {
        match extract(&report, path) {
            Extraction::Present(ratio) => println!("{}\t{}", path, ratio),
            Extraction::Absent => println!("{}\tabsent", path),
            Extraction::Malformed { raw } => println!("{}\tmalformed ({:?})", path, raw),
        }
    }

    Ok(GateStatus::Pass)
}
