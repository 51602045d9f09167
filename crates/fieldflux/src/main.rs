use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use fieldflux_core::{outputs, FieldDataProcessor, PipelineConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Field survey cleaning and weather-station enrichment",
    long_about = None
)]
struct Cli {
    /// Log verbosity; `none` disables logging. RUST_LOG, when set, overrides this flag.
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load, rename, correct and enrich the field data
    Run(RunArgs),
    /// Parse and validate a config file without touching any data
    CheckConfig(ConfigArgs),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Path to a TOML or JSON config file
    #[arg(long, env = "FIELDFLUX_CONFIG")]
    config: PathBuf,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,
    /// Write the processed table here (.parquet for Parquet, otherwise CSV)
    #[arg(long)]
    output: Option<PathBuf>,
    /// Number of rows to print once processing finishes
    #[arg(long, default_value_t = 10)]
    preview: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    None,
}

impl LogLevel {
    fn directive(self) -> Option<&'static str> {
        match self {
            LogLevel::Debug => Some("debug"),
            LogLevel::Info => Some("info"),
            LogLevel::Warn => Some("warn"),
            LogLevel::Error => Some("error"),
            LogLevel::None => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    match cli.command {
        Command::Run(args) => handle_run(args).await,
        Command::CheckConfig(args) => handle_check_config(args),
    }
}

fn init_tracing(level: LogLevel) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let Some(filter) = log_filter(level, rust_log.as_deref()) else {
        return;
    };
    tracing_subscriber::fmt().with_env_filter(filter).json().init();
}

/// A valid, non-empty RUST_LOG wins over `--log-level`, `none` included.
fn log_filter(level: LogLevel, rust_log: Option<&str>) -> Option<EnvFilter> {
    let from_env = rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok());
    from_env.or_else(|| level.directive().map(EnvFilter::new))
}

fn load_config(args: &ConfigArgs) -> Result<PipelineConfig> {
    let config = PipelineConfig::from_path(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    Ok(config.with_env_overrides())
}

async fn handle_run(args: RunArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let mut processor = FieldDataProcessor::new(config)?;

    processor
        .process()
        .await
        .context("field data processing failed")?;

    let mut table = processor
        .into_table()
        .context("processing finished without a table")?;

    println!("{}", table.head(Some(args.preview)));

    if let Some(path) = args.output {
        let format = outputs::write_table(&path, &mut table)?;
        info!(path = %path.display(), ?format, rows = table.height(), "wrote output");
    }

    Ok(())
}

fn handle_check_config(args: ConfigArgs) -> Result<()> {
    let config = load_config(&args)?;
    let swap = config.validate()?;
    println!("Config OK: {}", args.config.display());
    println!("  data source:      {}", config.db_path);
    println!("  swap columns:     {} <-> {}", swap.source, swap.target);
    println!("  value renames:    {}", config.values_to_rename.len());
    println!("  weather mapping:  {}", config.weather_mapping_csv);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_accepts_output_and_log_level() {
        let cli = Cli::try_parse_from([
            "fieldflux",
            "--log-level",
            "none",
            "run",
            "--config",
            "survey.toml",
            "--output",
            "out.parquet",
        ])
        .unwrap();

        assert_eq!(cli.log_level, LogLevel::None);
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.config.config, PathBuf::from("survey.toml"));
        assert_eq!(args.output, Some(PathBuf::from("out.parquet")));
        assert_eq!(args.preview, 10);
    }

    #[test]
    fn rust_log_overrides_the_log_level_flag() {
        let filter = log_filter(LogLevel::None, Some("fieldflux_core=debug")).unwrap();
        assert_eq!(filter.to_string(), "fieldflux_core=debug");

        let filter = log_filter(LogLevel::Warn, Some("debug")).unwrap();
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn log_level_flag_applies_without_rust_log() {
        assert!(log_filter(LogLevel::None, None).is_none());
        assert!(log_filter(LogLevel::None, Some("  ")).is_none());
        assert_eq!(log_filter(LogLevel::Warn, None).unwrap().to_string(), "warn");
    }

    #[test]
    fn none_level_has_no_directive() {
        assert_eq!(LogLevel::None.directive(), None);
        assert_eq!(LogLevel::Debug.directive(), Some("debug"));
    }
}
