//! Interactive operator console, read line by line from the operator's
//! input stream, independent of connection traffic.

use std::io;
use std::sync::Arc;

use serde_json::json;
use skyport_relay::ApiRelay;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::coordinator::Coordinator;
use crate::registry::ConnectionRegistry;
use crate::server::{PORT_MAX, PORT_MIN};

/// Parsed operator command. The command word is case-insensitive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    Kill(String),
    ListClients,
    TestApi,
    Help,
    Noop,
}

pub fn parse_command(line: &str) -> Command {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return Command::Noop;
    };

    match word.to_ascii_uppercase().as_str() {
        "QUIT" => Command::Quit,
        "KILL" => match parts.next() {
            Some(username) => Command::Kill(username.to_string()),
            None => Command::Help,
        },
        "LIST_CLIENTS" => Command::ListClients,
        "TEST_API" => Command::TestApi,
        _ => Command::Help,
    }
}

/// Prompt until the operator supplies a port in `[PORT_MIN, PORT_MAX]`.
///
/// Runs before anything binds; an invalid value is re-prompted with no
/// side effects.
pub async fn prompt_port<R, W>(mut input: R, mut output: W) -> io::Result<u16>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        output
            .write_all(format!("Gateway port [{PORT_MIN}-{PORT_MAX}]: ").as_bytes())
            .await?;
        output.flush().await?;

        let mut line = String::new();
        if input.read_line(&mut line).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "operator input closed before a port was chosen",
            ));
        }

        match line.trim().parse::<u16>() {
            Ok(port) if crate::server::port_in_range(port) => return Ok(port),
            _ => {
                output
                    .write_all(
                        format!("Invalid port; expected an integer in [{PORT_MIN}, {PORT_MAX}].\n")
                            .as_bytes(),
                    )
                    .await?;
            }
        }
    }
}

/// Operator command surface over the shared registry and coordinator.
pub struct AdminConsole {
    registry: Arc<ConnectionRegistry>,
    relay: Arc<dyn ApiRelay>,
    coordinator: Coordinator,
}

impl AdminConsole {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        relay: Arc<dyn ApiRelay>,
        coordinator: Coordinator,
    ) -> Self {
        Self {
            registry,
            relay,
            coordinator,
        }
    }

    /// Read commands until `QUIT` or the input stream ends.
    pub async fn run<R: AsyncBufRead + Unpin>(&self, input: R) {
        let mut lines = input.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if self.execute(&line).await {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "operator input failed");
                    break;
                }
            }
        }
    }

    /// Execute one command line. Returns true when the gateway should exit.
    pub async fn execute(&self, line: &str) -> bool {
        match parse_command(line) {
            Command::Quit => {
                self.coordinator.shutdown();
                println!("Gateway stopped.");
                true
            }
            Command::Kill(username) => {
                match self.registry.find_by_username(&username) {
                    Some(id) => {
                        self.registry.kill(id, "Connection terminated by administrator");
                        tracing::info!(conn = %id, username = %username, "connection killed by operator");
                        println!("Killed connection for '{username}'.");
                    }
                    None => println!("No connected user named '{username}'."),
                }
                false
            }
            Command::ListClients => {
                let sessions = self.registry.sessions();
                if sessions.is_empty() {
                    println!("No authenticated clients.");
                } else {
                    for (id, session) in sessions {
                        println!(
                            "{id}  {} ({})  connected {}",
                            session.username,
                            session.user_type,
                            session.connected_at.to_rfc3339()
                        );
                    }
                }
                false
            }
            Command::TestApi => {
                let result = self.relay.call("test", json!({})).await;
                if result.success {
                    println!("API OK: {}", result.data);
                } else {
                    println!("API FAILED: {}", result.message);
                }
                false
            }
            Command::Help => {
                print_help();
                false
            }
            Command::Noop => false,
        }
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  QUIT             shut down the gateway");
    println!("  KILL <username>  terminate that user's connection");
    println!("  LIST_CLIENTS     list authenticated clients");
    println!("  TEST_API         check backend API reachability");
}
