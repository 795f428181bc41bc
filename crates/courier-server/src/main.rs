use clap::Parser;
use courier_server::server::{
    config::{CliArgs, ServerConfig},
    serve::serve_with_incoming,
    service::Services,
    store::{BlogStore, InMemoryBlogStore},
    telemetry::{init_telemetry, shutdown_telemetry},
};
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tokio_stream::wrappers::TcpListenerStream;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let store: Arc<dyn BlogStore> = Arc::new(InMemoryBlogStore::new());
    let services = Services::new(&config, store);

    let res = if config.uds {
        #[cfg(unix)]
        {
            use tokio::net::UnixListener;
            use tokio_stream::wrappers::UnixListenerStream;
            let uds_path = config.server_addr.clone();
            let uds = UnixListener::bind(&uds_path)?;
            let incoming = UnixListenerStream::new(uds);
            log_startup_info(&uds_path, &config);
            let res = serve_with_incoming(services, &config, incoming, shutdown_signal()).await;
            // Best effort; a panic can still leave the socket file behind.
            let _ = std::fs::remove_file(&uds_path);
            res
        }
        #[cfg(not(unix))]
        {
            anyhow::bail!("Unix domain sockets are not supported on this platform");
        }
    } else {
        let tcp = TcpListener::bind(&config.server_addr).await?;
        let incoming = TcpListenerStream::new(tcp);
        log_startup_info(&config.server_addr, &config);
        serve_with_incoming(services, &config, incoming, shutdown_signal()).await
    };

    shutdown_telemetry(providers);
    res
}

fn log_startup_info(addr: &str, config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting courier on {addr} with full config: {config:#?}");
    } else {
        tracing::info!(
            "Starting courier on {addr} (stream buffer {}, greet count {})",
            config.stream_buffer_size,
            config.greet_count
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
