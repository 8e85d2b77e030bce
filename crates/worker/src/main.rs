use clap::Parser;
use fabric_common::config;
use tokio::net::UdpSocket;
use tokio::signal::unix::{signal, SignalKind};

/// Run a worker process that serves exactly one task type.
#[derive(Parser, Debug)]
#[command(name = "fabric-worker")]
struct Args {
    /// Task type this worker handles, e.g. "reverse", "upper", "hash", "sum", "wait".
    #[arg(default_value = "reverse")]
    task_type: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let _logging_guard = fabric_common::logging::init(&format!("worker_{}", args.task_type));

    let fabric_config = match config::load_config(&config::config_path_from_env()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration — refusing to start");
            std::process::exit(1);
        }
    };

    let bind_addr = format!("0.0.0.0:{}", fabric_config.ports.worker);
    let socket = match UdpSocket::bind(&bind_addr).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(addr = %bind_addr, error = %e, "Failed to bind worker socket");
            std::process::exit(1);
        }
    };

    let nameservice_addr = resolve(&fabric_config.ports.nameservice_host, fabric_config.ports.nameservice).await;
    let dispatcher_addr = resolve(&fabric_config.ports.dispatcher_host, fabric_config.ports.dispatcher).await;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        let _ = shutdown_tx.send(());
    });

    fabric_worker::run(
        fabric_config,
        args.task_type,
        socket,
        dispatcher_addr,
        nameservice_addr,
        shutdown_rx,
    )
    .await;
}

async fn resolve(host: &str, port: u16) -> std::net::SocketAddr {
    let host_port = format!("{host}:{port}");
    match tokio::net::lookup_host(&host_port).await {
        Ok(mut addrs) => addrs.next().unwrap_or_else(|| fallback(port)),
        Err(e) => {
            tracing::warn!(host_port = %host_port, error = %e, "Failed to resolve host, falling back to loopback");
            fallback(port)
        }
    }
}

fn fallback(port: u16) -> std::net::SocketAddr {
    format!("127.0.0.1:{port}").parse().unwrap()
}
