use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use callgate::{CallerIdentity, LimiterConfig, WindowCounter};

/// Operator probe for a Callgate counter store.
#[derive(Debug, Parser)]
#[command(name = "callgate", version, about)]
struct Cli {
    /// YAML configuration file; CALLGATE_* environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Count a request for the caller and report whether it is admitted
    Check(CallerArgs),
    /// Report the caller's count in the current window without counting
    Total(CallerArgs),
}

#[derive(Debug, Args)]
struct CallerArgs {
    /// Client IP address
    #[arg(long)]
    ip: String,

    /// Client user-agent string
    #[arg(long)]
    user_agent: Option<String>,
}

impl From<CallerArgs> for CallerIdentity {
    fn from(args: CallerArgs) -> Self {
        Self {
            ip: args.ip,
            user_agent: args.user_agent,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = LimiterConfig::load(cli.config.as_deref())?;
    info!(
        store = %config.store_url_redacted(),
        max_calls_limit = config.max_calls_limit,
        time_period = config.time_period,
        user_agent = config.user_agent,
        "Configuration loaded"
    );

    let limiter = WindowCounter::connect(&config).await?;

    match cli.command {
        Command::Check(args) => {
            let identity = CallerIdentity::from(args);
            let admitted = limiter.check(&identity).await?;
            let total = limiter.total(&identity).await?;
            println!(
                "{} ({}/{})",
                if admitted { "admitted" } else { "denied" },
                total,
                config.max_calls_limit
            );
            Ok(if admitted { ExitCode::SUCCESS } else { ExitCode::from(1) })
        }
        Command::Total(args) => {
            let total = limiter.total(&CallerIdentity::from(args)).await?;
            println!("{}", total);
            Ok(ExitCode::SUCCESS)
        }
    }
}
