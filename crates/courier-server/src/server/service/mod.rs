//! gRPC service implementations and their assembly into one server.

pub mod blog;
pub mod calculator;
pub mod greet;

pub use blog::BlogHandler;
pub use calculator::CalculatorHandler;
pub use greet::GreetHandler;

use crate::server::{
    config::ServerConfig,
    lifecycle::CallTracker,
    store::BlogStore,
    telemetry::{increment_call_errors, increment_requests},
};
use core::future::Future;
use courier_core::proto::{
    blog::blog_service_server::BlogServiceServer,
    calculator::calculator_service_server::CalculatorServiceServer,
    greet::greet_service_server::GreetServiceServer,
};
use std::sync::Arc;
use tonic::{Status, codec::CompressionEncoding};
use tonic_health::server::HealthReporter;

/// Every server accepts and sends zstd, gzip, and deflate.
macro_rules! compressed {
    ($server:expr) => {
        $server
            .send_compressed(CompressionEncoding::Zstd)
            .send_compressed(CompressionEncoding::Gzip)
            .send_compressed(CompressionEncoding::Deflate)
            .accept_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Deflate)
    };
}

/// Runs one handler body under `method`'s request and error counters.
///
/// Failures raised after a streaming handler has returned its stream are
/// counted by the producer instead.
pub(crate) async fn observed<T, F>(method: &'static str, call: F) -> Result<T, Status>
where
    F: Future<Output = Result<T, Status>>,
{
    increment_requests(method);
    let outcome = call.await;
    if let Err(status) = &outcome {
        increment_call_errors(method);
        tracing::debug!(code = ?status.code(), "Call failed");
    }
    outcome
}

/// The three courier services, sharing one [`CallTracker`] so a single
/// shutdown drains all of them.
#[derive(Clone)]
pub struct Services {
    calculator: CalculatorHandler,
    greet: GreetHandler,
    blog: BlogHandler,
    tracker: Arc<CallTracker>,
}

impl Services {
    /// Builds every handler. The blog store is injected so tests and
    /// alternative backends can supply their own.
    #[must_use]
    pub fn new(config: &ServerConfig, store: Arc<dyn BlogStore>) -> Self {
        let tracker = CallTracker::new(config.shutdown_timeout);
        Self {
            calculator: CalculatorHandler::new(config.clone(), Arc::clone(&tracker)),
            greet: GreetHandler::new(config.clone(), Arc::clone(&tracker)),
            blog: BlogHandler::new(store, config.clone(), Arc::clone(&tracker)),
            tracker,
        }
    }

    #[must_use]
    pub const fn tracker(&self) -> &Arc<CallTracker> {
        &self.tracker
    }

    #[must_use]
    pub fn calculator_server(&self) -> CalculatorServiceServer<CalculatorHandler> {
        compressed!(CalculatorServiceServer::new(self.calculator.clone()))
    }

    #[must_use]
    pub fn greet_server(&self) -> GreetServiceServer<GreetHandler> {
        compressed!(GreetServiceServer::new(self.greet.clone()))
    }

    #[must_use]
    pub fn blog_server(&self) -> BlogServiceServer<BlogHandler> {
        compressed!(BlogServiceServer::new(self.blog.clone()))
    }

    pub async fn set_serving(&self, health: &HealthReporter) {
        health
            .set_serving::<CalculatorServiceServer<CalculatorHandler>>()
            .await;
        health.set_serving::<GreetServiceServer<GreetHandler>>().await;
        health.set_serving::<BlogServiceServer<BlogHandler>>().await;
    }

    pub async fn set_not_serving(&self, health: &HealthReporter) {
        health
            .set_not_serving::<CalculatorServiceServer<CalculatorHandler>>()
            .await;
        health
            .set_not_serving::<GreetServiceServer<GreetHandler>>()
            .await;
        health
            .set_not_serving::<BlogServiceServer<BlogHandler>>()
            .await;
    }

    /// Refuses new calls, drains in-flight ones, then cancels the rest.
    pub async fn shutdown(&self) {
        self.tracker.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[tokio::test]
    async fn observed_passes_the_outcome_through() {
        assert_eq!(observed("Sum", async { Ok::<_, Status>(3) }).await.unwrap(), 3);

        let err = observed("Sum", async {
            Err::<(), _>(Status::invalid_argument("overflow"))
        })
        .await
        .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        assert_eq!(err.message(), "overflow");
    }
}
