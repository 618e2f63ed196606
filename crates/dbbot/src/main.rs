// dbbot/crates/dbbot/src/main.rs

#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use dbbot::{config::Config, run_server};

/// Chat with a relational database in natural language.
#[cfg(feature = "cli")]
#[derive(Debug, Parser)]
#[command(name = "dbbot", version, about)]
struct Args {
    /// Address to bind, overriding API_HOST.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overriding API_PORT.
    #[arg(long)]
    port: Option<u16>,

    /// Attempts per question, overriding MAX_QUERY_ATTEMPTS.
    #[arg(long)]
    max_attempts: Option<usize>,
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut cfg = Config::from_env()?;
    if let Some(host) = args.host {
        cfg.api_host = host;
    }
    if let Some(port) = args.port {
        cfg.api_port = port;
    }
    if let Some(max_attempts) = args.max_attempts {
        anyhow::ensure!(max_attempts >= 1, "--max-attempts must be at least 1");
        cfg.max_query_attempts = max_attempts;
    }

    run_server(cfg).await
}

#[cfg(not(feature = "cli"))]
fn main() {
    println!("CLI feature not enabled. Enable with --features cli");
}
