use std::sync::Arc;

use clap::Parser;
use skyport_relay::{ApiRelay, HttpRelay};
use skyport_server::{AdminConsole, ServerConfig};
use tokio::io::BufReader;

/// Realtime gateway for the drone-delivery platform.
#[derive(Parser, Debug)]
#[command(name = "skyport", version)]
struct Args {
    /// Listening port; prompted interactively when omitted or out of range.
    #[arg(long)]
    port: Option<u16>,

    /// Backend API endpoint.
    #[arg(long, default_value = "http://127.0.0.1:8080/api")]
    backend_url: String,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout belongs to the operator console.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let port = match args.port {
        Some(port) if skyport_server::port_in_range(port) => port,
        other => {
            if let Some(port) = other {
                eprintln!(
                    "Port {port} is outside [{}, {}].",
                    skyport_server::PORT_MIN,
                    skyport_server::PORT_MAX
                );
            }
            skyport_server::console::prompt_port(
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
            )
            .await
            .expect("failed to read gateway port")
        }
    };

    let relay: Arc<dyn ApiRelay> = Arc::new(HttpRelay::new(&args.backend_url));
    tracing::info!(backend = %args.backend_url, "relaying to backend API");

    let config = ServerConfig {
        port,
        ..Default::default()
    };
    let handle = skyport_server::start(config, Arc::clone(&relay))
        .await
        .expect("failed to start gateway");

    tracing::info!(port = handle.port, "Skyport gateway ready");
    println!("Skyport gateway listening on port {}. Type HELP for commands.", handle.port);

    let console = AdminConsole::new(
        Arc::clone(&handle.registry),
        relay,
        handle.coordinator.clone(),
    );

    tokio::select! {
        _ = console.run(BufReader::new(tokio::io::stdin())) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received");
            handle.coordinator.shutdown();
        }
    }

    tracing::info!("Skyport gateway stopped");
}
