//! Binary entry point for `infini-bot`.
//!
//! This module provides the command-line interface for infini-bot with options
//! for configuration, the rule-package directory, and logging verbosity.

use clap::Parser;
use infini_bot::base::{
    config::{Config, ConfigInner},
    types::Void,
};
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};

/// Infini-bot - forwards Slack messages to a rule core and answers with its outputs.
///
/// Configuration can come from `config.toml` or environment variables
/// prefixed with `INFINI_BOT_`. Rule packages are read from the configured
/// packages directory and mounted with `.ipm add <package>` in chat.
#[derive(Parser, Debug)]
#[command(version, author, about, long_about = None)]
struct Args {
    /// Override the config file path (optional).
    ///
    /// By default, the bot will look for a config file at `.hidden/config.toml`
    /// in the current directory.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
    /// Override the directory rule packages are loaded from.
    #[arg(short, long)]
    packages_dir: Option<String>,
    /// Increase log verbosity (-v, -vv, etc.).
    ///
    /// - No flag: INFO level
    /// - -v: DEBUG level
    /// - -vv or more: TRACE level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Install the stdout and OTLP tracing layers.
fn init_tracing(verbose: u8) -> Void {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let level_filter = tracing_subscriber::filter::LevelFilter::from_level(level);

    let stdout = tracing_subscriber::fmt::layer()
        .without_time()
        .with_ansi(true)
        .with_level(true)
        .with_target(false)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    let exporter = opentelemetry_otlp::SpanExporter::builder().with_http().with_protocol(Protocol::HttpBinary).build()?;
    let tracer = opentelemetry_sdk::trace::SdkTracerProvider::builder().with_simple_exporter(exporter).build().tracer("infini-bot");
    let otel = tracing_opentelemetry::layer().with_tracer(tracer);

    tracing_subscriber::registry().with(otel).with(level_filter).with(stdout).init();

    Ok(())
}

/// Main entry point for the infini-bot binary.
///
/// Sets up logging based on verbosity, loads configuration, and starts the bot.
#[tokio::main]
async fn main() -> Void {
    let args = Args::parse();

    init_tracing(args.verbose)?;

    let mut config = Config::load(args.config.as_deref())?;

    if let Some(packages_dir) = args.packages_dir {
        config = Config::from(ConfigInner {
            packages_dir,
            ..(*config.inner).clone()
        });
    }

    infini_bot::start(config).await
}
