use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fabric_client::{load_simulation_file, request_result, run_simulation, send_task};
use fabric_common::config::{self, ClientRetryConfig};
use fabric_common::udp::RetryPolicy;

#[derive(Parser, Debug)]
#[command(name = "fabric-client")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit one task.
    Send { task_type: String, payload: String },
    /// Query a task's result once.
    Result { task_id: u64 },
    /// Load a JSON list of [type, payload] pairs and drive the system through them.
    Simulate { path: PathBuf },
    /// Interactive prompt accepting the same verbs line by line.
    Run,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let _logging_guard = fabric_common::logging::init("client");

    let fabric_config = match config::load_config(&config::config_path_from_env()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration — refusing to start");
            std::process::exit(1);
        }
    };

    let dispatcher_addr = match resolve_dispatcher(&fabric_config).await {
        Some(addr) => addr,
        None => {
            eprintln!("Could not resolve dispatcher address");
            std::process::exit(1);
        }
    };

    let max_bytes = fabric_config.protocol.max_datagram_bytes;
    let policy = retry_policy(&fabric_config.client);

    let exit_code = match args.command {
        Command::Send { task_type, payload } => {
            match send_task(dispatcher_addr, &task_type, parse_payload(&payload), max_bytes, policy).await {
                Ok(response) => {
                    println!("task sent: {response}");
                    0
                }
                Err(e) => {
                    eprintln!("failed to send task: {e}");
                    1
                }
            }
        }
        Command::Result { task_id } => match request_result(dispatcher_addr, task_id, max_bytes, policy).await {
            Ok(response) => {
                println!("result: {response}");
                0
            }
            Err(e) => {
                eprintln!("failed to query result: {e}");
                1
            }
        },
        Command::Simulate { path } => match load_simulation_file(&path) {
            Ok(tasks) => {
                for line in run_simulation(dispatcher_addr, tasks, max_bytes, policy).await {
                    println!("{line}");
                }
                0
            }
            Err(e) => {
                eprintln!("failed to load simulation file: {e}");
                1
            }
        },
        Command::Run => {
            run_repl(dispatcher_addr, max_bytes, policy).await;
            0
        }
    };

    std::process::exit(exit_code);
}

/// Interactive REPL: `send <type> <payload>`, `result <task_id>`, `exit`/`quit`.
/// A request failure is printed and the session continues — only startup
/// failures are fatal for this command.
async fn run_repl(dispatcher_addr: SocketAddr, max_bytes: usize, policy: RetryPolicy) {
    let stdin = io::stdin();
    print!("> ");
    let _ = io::stdout().flush();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        let words: Vec<&str> = line.splitn(3, ' ').collect();

        match words.as_slice() {
            ["exit"] | ["quit"] => break,
            ["send", task_type, payload] => {
                match send_task(dispatcher_addr, task_type, parse_payload(payload), max_bytes, policy).await {
                    Ok(response) => println!("task sent: {response}"),
                    Err(e) => println!("failed to send task: {e}"),
                }
            }
            ["result", task_id] => match task_id.parse::<u64>() {
                Ok(id) => match request_result(dispatcher_addr, id, max_bytes, policy).await {
                    Ok(response) => println!("result: {response}"),
                    Err(e) => println!("failed to query result: {e}"),
                },
                Err(_) => println!("invalid task id: {task_id}"),
            },
            _ => println!("usage: send <type> <payload> | result <task_id> | exit"),
        }

        print!("> ");
        let _ = io::stdout().flush();
    }
}

/// Parses a CLI-supplied payload as JSON when possible (so `[1,2,3]` becomes
/// an array), falling back to a bare string for anything else.
fn parse_payload(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn retry_policy(config: &ClientRetryConfig) -> RetryPolicy {
    RetryPolicy::new(config.retry_attempts, config.request_timeout_secs, config.retry_interval_secs)
}

async fn resolve_dispatcher(fabric_config: &fabric_common::config::FabricConfig) -> Option<SocketAddr> {
    let host = std::env::var("DISPATCHER_IP").unwrap_or_else(|_| fabric_config.ports.dispatcher_host.clone());
    let host_port = format!("{host}:{}", fabric_config.ports.dispatcher);
    tokio::net::lookup_host(&host_port).await.ok()?.next()
}
