use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stratix-bff")]
#[command(about = "Stratix BFF: fulfillment gateway between conversational agents and the Stratix data API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the fulfillment gateway (GET / and /health for probes, POST / for webhook and tool calls).
    Serve {
        /// Config file path (default: STRATIX_BFF_CONFIG or ~/.stratix-bff/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// HTTP port (default: PORT env, then config, then 8080)
        #[arg(long, short)]
        port: Option<u16>,

        /// Bind address (default from config or 0.0.0.0)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Print the downstream action and params a request body maps to, without calling anything.
    Normalize {
        /// File holding the request body (default: stdin)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Report resolved settings (never secret values) and probe the downstream API.
    Diagnose {
        /// Config file path (default: STRATIX_BFF_CONFIG or ~/.stratix-bff/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("stratix-bff {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port, bind }) => {
            if let Err(e) = run_serve(config, port, bind).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Normalize { file }) => {
            if let Err(e) = run_normalize(file) {
                log::error!("normalize failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Diagnose { config }) => match run_diagnose(config).await {
            Ok(true) => {}
            Ok(false) => std::process::exit(2),
            Err(e) => {
                log::error!("diagnose failed: {:#}", e);
                std::process::exit(1);
            }
        },
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn resolve_settings(config_path: Option<PathBuf>) -> anyhow::Result<lib::config::ServiceSettings> {
    let (config, path) = lib::config::load_config(config_path)?;
    log::debug!("using config {}", path.display());
    let secrets = lib::secrets::default_secret_source(config.secrets.directory.as_deref());
    Ok(lib::config::ServiceSettings::resolve(&config, &secrets))
}

async fn run_serve(
    config_path: Option<PathBuf>,
    port: Option<u16>,
    bind: Option<String>,
) -> anyhow::Result<()> {
    let mut settings = resolve_settings(config_path)?;
    if let Some(p) = port {
        settings.port = p;
    }
    if let Some(b) = bind {
        settings.bind = b;
    }
    log::info!("starting gateway on {}:{}", settings.bind, settings.port);
    lib::gateway::run_gateway(settings).await
}

fn run_normalize(file: Option<PathBuf>) -> anyhow::Result<()> {
    let body = match file {
        Some(path) => std::fs::read(&path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };
    let request = lib::normalize::classify(&body)?;
    let normalized = lib::normalize::normalize(&request, &lib::normalize::PatternExtractor)?;
    println!("{}", serde_json::to_string_pretty(&normalized)?);
    Ok(())
}

/// Prints the report as JSON; returns whether the downstream probe succeeded.
async fn run_diagnose(config_path: Option<PathBuf>) -> anyhow::Result<bool> {
    let settings = resolve_settings(config_path)?;
    let report = lib::diagnostics::run_diagnostics(&settings).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.is_healthy())
}
