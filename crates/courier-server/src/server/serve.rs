//! Transport assembly: health, reflection, gRPC-Web, CORS, optional TLS, and
//! graceful shutdown around the courier services.

use crate::server::{config::ServerConfig, service::Services, store::BlogStore};
use core::{future::Future, net::SocketAddr};
use courier_core::proto::FILE_DESCRIPTOR_SET;
use futures::Stream;
use std::sync::Arc;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
    sync::oneshot,
    task::JoinHandle,
};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Server, server::Connected};
use tonic_reflection::server::Builder;
use tonic_web::GrpcWebLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

/// Serves every courier service on `incoming` until `signal` resolves.
///
/// On `signal` the health service reports `NOT_SERVING`, new calls are
/// refused, and in-flight calls get the configured drain window before they
/// are cancelled. Only then does the transport stop.
pub async fn serve_with_incoming<I, IO, IE, F>(
    services: Services,
    config: &ServerConfig,
    incoming: I,
    signal: F,
) -> anyhow::Result<()>
where
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<tower::BoxError>,
    F: Future<Output = ()>,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    services.set_serving(&health_reporter).await;

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    let builder = Server::builder();

    #[cfg(feature = "tls")]
    let builder = match &config.tls {
        Some(paths) => builder.tls_config(load_tls(paths)?)?,
        None => builder,
    };

    #[cfg(not(feature = "tls"))]
    if config.tls.is_some() {
        anyhow::bail!("TLS was requested but the server was built without the `tls` feature");
    }

    let shutdown = {
        let services = services.clone();
        let health_reporter = health_reporter.clone();
        async move {
            signal.await;
            tracing::info!("Shutdown signal received, terminating gracefully...");
            services.set_not_serving(&health_reporter).await;
            services.shutdown().await;
        }
    };

    builder
        .accept_http1(true)
        .http2_adaptive_window(Some(true))
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(GrpcWebLayer::new()),
        )
        .add_service(health_service)
        .add_service(reflection)
        .add_service(services.calculator_server())
        .add_service(services.greet_server())
        .add_service(services.blog_server())
        .serve_with_incoming_shutdown(incoming, shutdown)
        .await?;

    tracing::info!("Server shut down successfully");
    Ok(())
}

#[cfg(feature = "tls")]
fn load_tls(
    paths: &crate::server::config::TlsPaths,
) -> anyhow::Result<tonic::transport::ServerTlsConfig> {
    use anyhow::Context;

    let cert = std::fs::read_to_string(&paths.cert)
        .with_context(|| format!("reading TLS certificate {}", paths.cert.display()))?;
    let key = std::fs::read_to_string(&paths.key)
        .with_context(|| format!("reading TLS key {}", paths.key.display()))?;
    let identity = tonic::transport::Identity::from_pem(cert, key);
    Ok(tonic::transport::ServerTlsConfig::new().identity(identity))
}

/// A server on an ephemeral loopback port, run on the current runtime.
///
/// Used by integration tests and benchmarks to exercise the real transport
/// without fixed ports.
pub struct LocalServer {
    addr: SocketAddr,
    services: Services,
    stop: oneshot::Sender<()>,
    task: JoinHandle<anyhow::Result<()>>,
}

impl LocalServer {
    pub async fn start(config: ServerConfig, store: Arc<dyn BlogStore>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let services = Services::new(&config, store);
        let (stop, stopped) = oneshot::channel::<()>();

        let task = tokio::spawn({
            let services = services.clone();
            async move {
                let signal = async {
                    // A dropped sender also means stop.
                    let _ = stopped.await;
                };
                serve_with_incoming(services, &config, TcpListenerStream::new(listener), signal)
                    .await
            }
        });
        tracing::debug!(%addr, "Local server started");

        Ok(Self {
            addr,
            services,
            stop,
            task,
        })
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `http://` URL suitable for a tonic `Endpoint`.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    #[must_use]
    pub const fn services(&self) -> &Services {
        &self.services
    }

    /// Triggers graceful shutdown and waits for the server task to finish.
    pub async fn stop(self) -> anyhow::Result<()> {
        let _ = self.stop.send(());
        self.task.await?
    }
}
