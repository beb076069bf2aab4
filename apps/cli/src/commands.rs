//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::Result;
use docdigest_core::{
    DigestConfig, ProgressReporter, QueryCounter, resolve_question, run_and_persist,
};
use docdigest_extract::TikaExtractor;
use docdigest_llm::OllamaChat;
use docdigest_shared::{AppConfig, init_config, load_config, validate_endpoints};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::batch;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docdigest: ask one question of a whole directory of documents.
#[derive(Parser)]
#[command(
    name = "docdigest",
    version,
    about = "Map-reduce question answering over a directory of documents, via Tika and Ollama.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Enable debug output (same as -v).
    #[arg(short = 'z', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl a directory, query every chunk, and consolidate one answer.
    Run {
        /// Directory to crawl.
        #[arg(short = 'd', long)]
        directory: PathBuf,

        /// Write the final answer to this file.
        #[arg(short = 'u', long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        digest: DigestArgs,
    },

    /// Run once per first-level subdirectory, writing `<name>.txt` to the current directory.
    Batch {
        /// Directory whose subdirectories are digested.
        parent: PathBuf,

        /// Capture each run's output into map-reduce-subdirs.log.
        #[arg(short = 'l', long)]
        log: bool,

        #[command(flatten)]
        digest: DigestArgs,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options shared by `run` and `batch`. Unset values fall back to the config file.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct DigestArgs {
    /// Comma-separated path regexes; a file is used if any matches.
    #[arg(short = 'p', long)]
    pub path: Option<String>,

    /// Question to ask.
    #[arg(short = 'q', long)]
    pub query: Option<String>,

    /// Read the question from a file (wins over --query).
    #[arg(short = 'f', long)]
    pub query_file: Option<PathBuf>,

    /// Ollama model name.
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Maximum segment size in characters.
    #[arg(short = 'c', long)]
    pub chunk_size: Option<usize>,

    /// Overlap between segments in characters.
    #[arg(short = 'o', long)]
    pub chunk_overlap: Option<usize>,

    /// Sampling temperature.
    #[arg(short = 't', long)]
    pub temperature: Option<f32>,

    /// Context window size; also the reduce budget.
    #[arg(short = 'x', long)]
    pub num_ctx: Option<u32>,

    /// Top-k sampling.
    #[arg(short = 'K', long)]
    pub top_k: Option<u32>,

    /// Top-p sampling.
    #[arg(short = 'P', long)]
    pub top_p: Option<f32>,

    /// Maximum tokens to generate (-1 infinite, -2 fill context).
    #[arg(short = 'g', long, allow_negative_numbers = true)]
    pub num_predict: Option<i32>,

    /// Tika server endpoint.
    #[arg(short = 's', long)]
    pub tika_server: Option<String>,

    /// Print every response.
    #[arg(short = 'n', long)]
    pub print_responses: bool,

    /// Print every query.
    #[arg(short = 'e', long)]
    pub print_queries: bool,
}

impl DigestArgs {
    /// Overlay the flags that were given onto `config`.
    pub(crate) fn apply(&self, config: &mut AppConfig) {
        if let Some(model) = &self.model {
            config.ollama.model = model.clone();
        }
        if let Some(v) = self.temperature {
            config.ollama.temperature = v;
        }
        if let Some(v) = self.num_ctx {
            config.ollama.num_ctx = v;
        }
        if let Some(v) = self.num_predict {
            config.ollama.num_predict = v;
        }
        if self.top_k.is_some() {
            config.ollama.top_k = self.top_k;
        }
        if self.top_p.is_some() {
            config.ollama.top_p = self.top_p;
        }
        if let Some(v) = self.chunk_size {
            config.splitter.chunk_size = v;
        }
        if let Some(v) = self.chunk_overlap {
            config.splitter.chunk_overlap = v;
        }
        if let Some(endpoint) = &self.tika_server {
            config.tika.endpoint = endpoint.clone();
        }
    }

    /// Path patterns, defaulting to everything.
    pub(crate) fn patterns(&self) -> Vec<String> {
        self.path
            .as_deref()
            .unwrap_or(".*")
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect()
    }
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

    let level = cli.verbose.max(u8::from(cli.debug));
    let filter = match level {
        0 => "docdigest=info",
        1 => "docdigest=debug",
        _ => "docdigest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
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
    let passthrough = batch::GlobalFlags {
        verbose: cli.verbose,
        debug: cli.debug,
        log_format: cli.log_format,
    };

    match cli.command {
        Command::Run {
            directory,
            output,
            digest,
        } => cmd_run(&directory, output.as_deref(), &digest).await,
        Command::Batch {
            parent,
            log,
            digest,
        } => batch::cmd_batch(&parent, log, &digest, passthrough).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(directory: &Path, output: Option<&Path>, args: &DigestArgs) -> Result<()> {
    let mut config = load_config()?;
    args.apply(&mut config);
    validate_endpoints(&config)?;

    let question = resolve_question(args.query.as_deref(), args.query_file.as_deref())?;
    let digest = DigestConfig {
        input_dir: directory.to_path_buf(),
        patterns: args.patterns(),
        question,
        split: config.splitter,
        budget: config.ollama.num_ctx as usize,
    };

    let extractor = TikaExtractor::new(&config.tika)?;
    let backend = OllamaChat::new(&config.ollama)?;

    info!(
        directory = %directory.display(),
        model = backend.model(),
        tika = extractor.endpoint(),
        chunk_size = digest.split.chunk_size,
        chunk_overlap = digest.split.chunk_overlap,
        budget = digest.budget,
        "starting digest"
    );

    let reporter = CliProgress::new(args.print_queries, args.print_responses);
    let outcome = run_and_persist(&digest, output, &extractor, &backend, &reporter).await;
    reporter.finish();
    let result = outcome?;

    println!();
    println!("Final Answer:");
    println!("{}", result.answer);
    println!();

    if let Some(path) = &result.saved_to {
        println!("Output saved to: {}", path.display());
    }

    println!("  Documents: {}", result.documents);
    println!("  Segments:  {}", result.segments);
    println!("  Queries:   {}", result.queries.completed());
    if !result.crawl.errors.is_empty() {
        println!("  Skipped:   {} file(s) failed extraction", result.crawl.errors.len());
    }
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
    print_queries: bool,
    print_responses: bool,
}

impl CliProgress {
    fn new(print_queries: bool, print_responses: bool) -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self {
            spinner,
            print_queries,
            print_responses,
        }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn file_ingesting(&self, path: &Path, current: usize) {
        self.spinner
            .println(format!("Ingesting [{current}]: {}", path.display()));
    }

    fn document_split(&self, name: &str, chunks: usize) {
        self.spinner
            .println(format!("{name}: split into {chunks} chunk(s)"));
    }

    fn query_started(&self, counter: &QueryCounter, detail: &str, prompt: &str) {
        let step = format!(
            "Query {}/{}: {detail}",
            counter.completed() + 1,
            counter.expected()
        );
        self.spinner.set_message(step.clone());
        if self.print_queries {
            self.spinner.suspend(|| {
                println!("{step}");
                println!("{prompt}");
                println!();
            });
        }
    }

    fn query_answered(&self, counter: &QueryCounter, answer: &str) {
        if self.print_responses {
            self.spinner.suspend(|| {
                println!("Response {}/{}:", counter.completed(), counter.expected());
                println!("{answer}");
                println!();
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_parse_with_short_names() {
        let cli = Cli::try_parse_from([
            "docdigest", "run", "-d", "/data", "-p", r"\.pdf$, \.docx$", "-q", "Risks?", "-c",
            "5000", "-o", "50", "-x", "8192", "-K", "40", "-P", "0.9", "-g", "-1", "-n", "-z",
        ])
        .unwrap();

        assert!(cli.debug);
        let Command::Run {
            directory, digest, ..
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(directory, PathBuf::from("/data"));
        assert_eq!(digest.patterns(), vec![r"\.pdf$", r"\.docx$"]);
        assert_eq!(digest.num_predict, Some(-1));
        assert!(digest.print_responses);
        assert!(!digest.print_queries);

        let mut config = AppConfig::default();
        digest.apply(&mut config);
        assert_eq!(config.splitter.chunk_size, 5000);
        assert_eq!(config.splitter.chunk_overlap, 50);
        assert_eq!(config.ollama.num_ctx, 8192);
        assert_eq!(config.ollama.top_k, Some(40));
        assert_eq!(config.ollama.top_p, Some(0.9));
        assert_eq!(config.ollama.model, "phi4");
    }

    #[test]
    fn default_pattern_matches_everything() {
        assert_eq!(DigestArgs::default().patterns(), vec![".*"]);
    }

    #[test]
    fn unset_flags_keep_config_values() {
        let mut config = AppConfig::default();
        config.ollama.model = "llama3".into();
        DigestArgs::default().apply(&mut config);
        assert_eq!(config.ollama.model, "llama3");
        assert_eq!(config.splitter.chunk_size, 100_000);
    }
}
