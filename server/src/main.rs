use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::error::ServerError;
use server::network::Server;
use std::net::IpAddr;
use std::path::PathBuf;

/// Game protocol server for 1.12.2 clients
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// INI file to read (defaults to ./server.ini when present)
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// IP address to bind to, overrides the config file
    #[clap(short = 'H', long)]
    host: Option<IpAddr>,

    /// Port to listen on, overrides the config file
    #[clap(short, long)]
    port: Option<u16>,

    /// Message of the day, overrides the config file
    #[clap(short, long)]
    motd: Option<String>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), ServerError> {
    let mut config = ServerConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(motd) = args.motd {
        config.motd = motd;
    }

    info!(
        "Starting server: max {} players, spawn at {}, {}, {}",
        config.max_players, config.spawn.x, config.spawn.y, config.spawn.z
    );

    let server = Server::bind(config).await?;
    server
        .run_until(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C, shutting down gracefully..."),
                Err(e) => {
                    error!("Failed to listen for Ctrl+C: {}", e);
                    std::future::pending::<()>().await
                }
            }
        })
        .await
}
