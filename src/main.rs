use anyhow::Result;
use clap::{Parser, Subcommand};

use atelier::config::AppConfig;
use atelier::server::{self, ServerConfig};

#[derive(Parser)]
#[command(name = "atelier")]
#[command(version, about = "AI-assisted UI component studio")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the component studio server
    Serve {
        /// Port to serve on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Enable dev mode (permissive CORS for a local frontend dev server)
        #[arg(long)]
        dev: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, dev } => {
            let config = ServerConfig {
                port,
                dev_mode: dev,
                app: AppConfig::from_env(),
            };
            server::start_server(config).await?;
        }
    }

    Ok(())
}
