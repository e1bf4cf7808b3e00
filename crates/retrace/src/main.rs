use anyhow::Context;
use clap::{Parser, Subcommand};
use retrace_engine::config::{ConfigLoader, RetraceConfig};
use retrace_engine::driver::Driver;
use retrace_engine::formatter::{format_candidates, format_run};
use retrace_engine::replay::{ReplayEngine, ReplayOptions, TracingObserver};
use retrace_engine::resolution::resolve_html;
use retrace_engine::schema::{ElementDescriptor, ReplayDocument};
use retrace_h::HeadlessDriver;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "retrace", version, about = "Replay recorded browser sessions")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a recorded document in a headless browser
    Replay {
        /// Recorded document (JSON)
        file: PathBuf,

        /// Treat this step index as skippable (repeatable)
        #[arg(long = "skip", value_name = "INDEX")]
        skip: Vec<usize>,

        /// Attempts per click/input step
        #[arg(long)]
        max_retries: Option<u32>,

        /// Delay between attempts, in milliseconds
        #[arg(long)]
        retry_delay_ms: Option<u64>,

        /// Secret placeholder value, as KEY=VALUE (repeatable)
        #[arg(long = "secret", value_name = "KEY=VALUE", value_parser = parse_secret)]
        secrets: Vec<(String, String)>,

        /// Launch browser in visible mode (not headless)
        #[arg(long)]
        visible: bool,

        /// Config file (defaults to ./retrace.yaml, then ~/.retrace/config.yaml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the run as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve an element descriptor against a saved page
    Resolve {
        /// Element descriptor (JSON)
        descriptor: PathBuf,

        /// Saved page HTML
        #[arg(long)]
        html: PathBuf,

        /// Print candidates as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check that a recorded document loads and validates
    Validate {
        /// Recorded document (JSON)
        file: PathBuf,
    },
}

fn parse_secret(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr so stdout carries only the report.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Replay {
            file,
            skip,
            max_retries,
            retry_delay_ms,
            secrets,
            visible,
            config,
            json,
        } => {
            let mut config = load_config(config.as_deref()).await?;
            if let Some(max_retries) = max_retries {
                config.replay.max_retries = max_retries;
            }
            if let Some(retry_delay_ms) = retry_delay_ms {
                config.replay.retry_delay_ms = retry_delay_ms;
            }
            if visible {
                config.browser.visible = true;
            }
            ConfigLoader::validate(&config)?;

            // Structural checks run in the engine, which knows the `--skip` indexes.
            let document = ReplayDocument::load_unchecked(&file)
                .with_context(|| format!("Failed to load recorded document {}", file.display()))?;

            let cancel = CancellationToken::new();
            let mut options = ReplayOptions::from_config(&config).with_cancel(cancel.clone());
            options.skippable_step_indexes.extend(skip);
            options.secrets.extend(secrets);

            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, stopping after the current step");
                    cancel.cancel();
                }
            });

            let mut engine = ReplayEngine::new(options);
            engine.add_observer(Arc::new(TracingObserver));

            let mut driver = HeadlessDriver::from_config(&config.browser);
            if let Err(e) = driver.launch().await {
                eprintln!("Failed to launch browser: {}", e);
                return Err(e.into());
            }

            let outcome = engine.run_document(&mut driver, &document).await;
            if let Err(e) = driver.close().await {
                warn!("Failed to close browser: {}", e);
            }
            let run = outcome?;

            if json {
                println!("{}", serde_json::to_string_pretty(&run)?);
            } else {
                println!("{}", format_run(&run, document.steps.len()));
            }

            Ok(if run.failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::Resolve {
            descriptor,
            html,
            json,
        } => {
            let raw = std::fs::read_to_string(&descriptor)
                .with_context(|| format!("Failed to read {}", descriptor.display()))?;
            let descriptor: ElementDescriptor =
                serde_json::from_str(&raw).with_context(|| {
                    format!("Invalid element descriptor in {}", descriptor.display())
                })?;
            let page = std::fs::read_to_string(&html)
                .with_context(|| format!("Failed to read {}", html.display()))?;

            let candidates = resolve_html(&page, &descriptor);
            if json {
                println!("{}", serde_json::to_string_pretty(&candidates)?);
            } else {
                println!("{}", format_candidates(&candidates));
            }

            Ok(if candidates.is_empty() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::Validate { file } => {
            let document = load_document(&file)?;
            for step in &document.steps {
                let flag = if step.skippable { " (skippable)" } else { "" };
                println!("[{}] {}{}", step.index, step.action.name(), flag);
            }
            println!("{}: {} steps, valid", file.display(), document.steps.len());
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn load_config(path: Option<&Path>) -> anyhow::Result<RetraceConfig> {
    let config = match path {
        Some(path) => ConfigLoader::load_from(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ConfigLoader::load_default().await?,
    };
    info!(
        max_retries = config.replay.max_retries,
        retry_delay_ms = config.replay.retry_delay_ms,
        "Configuration loaded"
    );
    Ok(config)
}

fn load_document(path: &Path) -> anyhow::Result<ReplayDocument> {
    ReplayDocument::load(path)
        .with_context(|| format!("Failed to load recorded document {}", path.display()))
}
