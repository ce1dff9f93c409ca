//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use apiscout_chunker::SourceText;
use apiscout_core::pipeline::{self, ProgressReporter};
use apiscout_extractors::{Extractor, ExtractorRegistry, LlmExtractor, RegexExtractor};
use apiscout_shared::{
    AnalysisReport, AnalyzeConfig, init_config, load_config, validate_api_key,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// apiscout — discover API endpoints in JavaScript source.
#[derive(Parser)]
#[command(
    name = "apiscout",
    version,
    about = "Discover HTTP/WebSocket/GraphQL endpoints in JavaScript source.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Analyze a JavaScript file for API endpoints.
    Analyze {
        /// JavaScript file to analyze.
        #[arg(long)]
        js: PathBuf,

        /// Write the full JSON report to this path.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the report as JSON instead of a human-readable summary.
        #[arg(long)]
        json: bool,

        /// Window size in lines.
        #[arg(long)]
        window_size: Option<u32>,

        /// Lines shared between consecutive windows.
        #[arg(long)]
        overlap: Option<u32>,

        /// Maximum concurrent LLM invocations.
        #[arg(long)]
        concurrency: Option<u32>,

        /// Per-invocation timeout in seconds.
        #[arg(long)]
        timeout: Option<u64>,

        /// Retries after a failed (extractor, window) invocation.
        #[arg(long)]
        retries: Option<u32>,

        /// Abandon outstanding work after this many seconds and report
        /// whatever was collected by then.
        #[arg(long)]
        run_timeout: Option<u64>,

        /// Disable the semantic LLM extractor.
        #[arg(long)]
        no_llm: bool,

        /// Disable the deterministic regex extractor.
        #[arg(long)]
        no_regex: bool,
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
        0 => "apiscout=info",
        1 => "apiscout=debug",
        _ => "apiscout=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Analyze {
            js,
            output,
            json,
            window_size,
            overlap,
            concurrency,
            timeout,
            retries,
            run_timeout,
            no_llm,
            no_regex,
        } => {
            let overrides = AnalyzeOverrides {
                window_size,
                overlap,
                concurrency,
                timeout,
                retries,
                run_timeout,
                no_llm,
                no_regex,
            };
            cmd_analyze(&js, output.as_deref(), json, overrides).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// CLI flag overrides applied on top of the config file.
struct AnalyzeOverrides {
    window_size: Option<u32>,
    overlap: Option<u32>,
    concurrency: Option<u32>,
    timeout: Option<u64>,
    retries: Option<u32>,
    run_timeout: Option<u64>,
    no_llm: bool,
    no_regex: bool,
}

// ---------------------------------------------------------------------------
// analyze
// ---------------------------------------------------------------------------

async fn cmd_analyze(
    js: &Path,
    output: Option<&Path>,
    json: bool,
    overrides: AnalyzeOverrides,
) -> Result<()> {
    let config = load_config()?;

    let mut analyze_config = AnalyzeConfig::from(&config);
    if let Some(window_size) = overrides.window_size {
        analyze_config.window_size = window_size;
    }
    if let Some(overlap) = overrides.overlap {
        analyze_config.overlap = overlap;
    }
    if let Some(concurrency) = overrides.concurrency {
        analyze_config.concurrency = concurrency;
    }
    if let Some(timeout) = overrides.timeout {
        analyze_config.timeout = Duration::from_secs(timeout);
    }
    if let Some(retries) = overrides.retries {
        analyze_config.retries = retries;
    }
    if let Some(run_timeout) = overrides.run_timeout {
        analyze_config.run_timeout = Some(Duration::from_secs(run_timeout));
    }

    let use_regex = config.extractors.regex && !overrides.no_regex;
    let use_llm = config.extractors.llm && !overrides.no_llm;
    if !use_regex && !use_llm {
        return Err(eyre!("all extractors are disabled; nothing to do"));
    }
    if use_llm {
        validate_api_key(&config)?;
    }

    let source = SourceText::new(read_source(js)?);
    if source.total_lines() < 10 && source.text().len() > 2_000 {
        warn!(
            lines = source.total_lines(),
            bytes = source.text().len(),
            "input looks minified; line-based windows will be coarse"
        );
    }

    let mut registry = ExtractorRegistry::new();
    if use_regex {
        registry.register(Extractor::Regex(RegexExtractor::new()));
    }
    if use_llm {
        registry.register(Extractor::Llm(LlmExtractor::new(
            &config.openrouter,
            &config.prompts,
        )?));
    }

    let label = js.display().to_string();
    info!(source = %label, regex = use_regex, llm = use_llm, "starting analysis");

    let reporter = CliProgress::new();
    let report = pipeline::analyze(&label, &source, &analyze_config, registry, &reporter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)
            .map_err(|e| eyre!("cannot write {}: {e}", path.display()))?;
        if !json {
            println!("  Full report saved to {}", path.display());
            println!();
        }
    }

    Ok(())
}

/// Read a JavaScript file, tolerating non-UTF-8 bundles.
fn read_source(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| eyre!("cannot read {}: {e}", path.display()))?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            warn!(path = %path.display(), "input is not valid UTF-8, converting lossily");
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    })
}

/// Print the human-readable report rendering.
fn print_summary(report: &AnalysisReport) {
    let summary = &report.summary;

    println!();
    println!("  Analysis summary for {}", report.source);
    println!("  Total endpoints: {}", summary.total_endpoints);
    for (extractor, count) in &summary.findings_by_extractor {
        println!("  Found by {extractor}: {count}");
    }
    println!("  Corroborated by both: {}", summary.combined_findings);
    println!("  Requiring auth: {}", summary.endpoints_with_auth);

    if !summary.failures_by_extractor.is_empty() {
        println!();
        for (extractor, count) in &summary.failures_by_extractor {
            println!("  Failed {extractor} window(s): {count}");
        }
    }

    println!();
    println!("  Discovered endpoints:");
    for endpoint in &report.endpoints {
        println!();
        println!("    Path:       {}", endpoint.path);
        if endpoint.method_conflict {
            println!("    Method:     {} (conflicting sightings)", endpoint.method);
        } else {
            println!("    Method:     {}", endpoint.method);
        }
        println!("    Confidence: {:.2}", endpoint.confidence);

        let lines: Vec<String> = endpoint
            .occurrences
            .iter()
            .map(|o| format!("{} ({})", o.line, o.extractor))
            .collect();
        println!("    Lines:      {}", lines.join(", "));

        if endpoint.auth.required {
            println!("    Auth:       required");
            if let Some(auth_type) = &endpoint.auth.auth_type {
                println!("    Auth type:  {auth_type}");
            }
            if let Some(location) = &endpoint.auth.location {
                println!("    Auth via:   {location}");
            }
        }
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _report: &AnalysisReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let rendered = toml::to_string_pretty(&config)?;
    println!("{rendered}");
    Ok(())
}
