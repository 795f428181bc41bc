use super::observed;
use crate::server::{
    config::ServerConfig,
    lifecycle::CallTracker,
    streaming::{ResponseStream, fold_inbound, spawn_duplex, spawn_producer},
};
use courier_core::{
    Deadline, Error,
    deadline::run_until,
    proto::greet::{
        GreetEveryoneRequest, GreetEveryoneResponse, GreetManyTimesRequest,
        GreetManyTimesResponse, GreetRequest, GreetResponse, GreetWithDeadlineRequest,
        GreetWithDeadlineResponse, LongGreetRequest, LongGreetResponse,
        greet_service_server::GreetService,
    },
};
use std::sync::Arc;
use tonic::{Request, Response, Status, Streaming};

#[derive(Clone)]
pub struct GreetHandler {
    config: ServerConfig,
    tracker: Arc<CallTracker>,
}

impl GreetHandler {
    #[must_use]
    pub const fn new(config: ServerConfig, tracker: Arc<CallTracker>) -> Self {
        Self { config, tracker }
    }
}

#[tonic::async_trait]
impl GreetService for GreetHandler {
    type GreetManyTimesStream = ResponseStream<GreetManyTimesResponse>;
    type GreetEveryoneStream = ResponseStream<GreetEveryoneResponse>;

    #[tracing::instrument(skip_all)]
    async fn greet(&self, req: Request<GreetRequest>) -> Result<Response<GreetResponse>, Status> {
        observed("Greet", async move {
            let greeting = req
                .into_inner()
                .greeting
                .ok_or_else(|| Error::invalid_argument("A greeting is required"))?;
            Ok(Response::new(GreetResponse {
                result: format!("Hello, {}", greeting.first_name),
            }))
        })
        .await
    }

    /// Streams `greet_count` numbered greetings, `greet_interval` apart.
    #[tracing::instrument(skip_all, fields(count = self.config.greet_count))]
    async fn greet_many_times(
        &self,
        req: Request<GreetManyTimesRequest>,
    ) -> Result<Response<Self::GreetManyTimesStream>, Status> {
        observed("GreetManyTimes", async move {
            let deadline = Deadline::from_metadata(req.metadata());
            let first_name = req.into_inner().first_name;
            let guard = self.tracker.begin("GreetManyTimes")?;
            let count = self.config.greet_count;
            let interval = self.config.greet_interval;

            let stream = spawn_producer(
                guard,
                self.config.stream_buffer_size,
                deadline,
                move |emitter| async move {
                    for i in 0..count {
                        let result = format!("hello, {first_name}{i} times.");
                        emitter.emit(GreetManyTimesResponse { result }).await?;
                        if i + 1 < count {
                            emitter.pause(interval).await?;
                        }
                    }
                    Ok(())
                },
            );

            Ok(Response::new(Box::pin(stream) as Self::GreetManyTimesStream))
        })
        .await
    }

    #[tracing::instrument(skip_all)]
    async fn long_greet(
        &self,
        req: Request<Streaming<LongGreetRequest>>,
    ) -> Result<Response<LongGreetResponse>, Status> {
        observed("LongGreet", async move {
            let deadline = Deadline::from_metadata(req.metadata());
            let guard = self.tracker.begin("LongGreet")?;

            let (result, seen) = fold_inbound(
                req.into_inner(),
                deadline,
                guard.token(),
                String::new(),
                |mut acc, msg: LongGreetRequest| {
                    acc.push_str("Hello ");
                    acc.push_str(&msg.first_name);
                    acc.push_str(", ");
                    Ok(acc)
                },
            )
            .await?;

            tracing::debug!(seen, "Greeted client stream");
            Ok(Response::new(LongGreetResponse { result }))
        })
        .await
    }

    #[tracing::instrument(skip_all)]
    async fn greet_everyone(
        &self,
        req: Request<Streaming<GreetEveryoneRequest>>,
    ) -> Result<Response<Self::GreetEveryoneStream>, Status> {
        observed("GreetEveryone", async move {
            let deadline = Deadline::from_metadata(req.metadata());
            let guard = self.tracker.begin("GreetEveryone")?;

            let stream = spawn_duplex(
                guard,
                self.config.stream_buffer_size,
                deadline,
                req.into_inner(),
                |msg: GreetEveryoneRequest| {
                    Ok(Some(GreetEveryoneResponse {
                        result: format!("Hello, {}", msg.first_name),
                    }))
                },
            );

            Ok(Response::new(Box::pin(stream) as Self::GreetEveryoneStream))
        })
        .await
    }

    /// Simulates `deadline_work` of processing. Callers whose deadline is
    /// shorter get `DEADLINE_EXCEEDED` and no greeting.
    #[tracing::instrument(skip_all, fields(deadline = tracing::field::Empty))]
    async fn greet_with_deadline(
        &self,
        req: Request<GreetWithDeadlineRequest>,
    ) -> Result<Response<GreetWithDeadlineResponse>, Status> {
        observed("GreetWithDeadline", async move {
            let deadline = Deadline::from_metadata(req.metadata());
            if let Some(deadline) = deadline {
                tracing::Span::current()
                    .record("deadline", tracing::field::debug(deadline.remaining()));
            }
            let first_name = req.into_inner().first_name;
            let guard = self.tracker.begin("GreetWithDeadline")?;

            let work = tokio::time::sleep(self.config.deadline_work);
            if let Err(e) = run_until(deadline, guard.token(), work).await {
                tracing::info!(error = %e, "Gave up before the greeting was ready");
                return Err(e.into());
            }

            Ok(Response::new(GreetWithDeadlineResponse {
                result: format!("Hello {first_name}"),
            }))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use courier_core::deadline::GRPC_TIMEOUT_HEADER;
    use futures::StreamExt;
    use tonic::{Code, metadata::MetadataValue};

    fn handler(config: ServerConfig) -> GreetHandler {
        GreetHandler::new(config, CallTracker::new(Duration::from_secs(1)))
    }

    #[tokio::test]
    async fn greet_uses_first_name() {
        let req = GreetRequest {
            greeting: Some(courier_core::proto::greet::Greeting {
                first_name: String::from("Stephane"),
                last_name: String::from("Maarek"),
            }),
        };
        let res = handler(ServerConfig::default())
            .greet(Request::new(req))
            .await
            .unwrap();
        assert_eq!(res.into_inner().result, "Hello, Stephane");
    }

    #[tokio::test]
    async fn greet_requires_a_greeting() {
        let err = handler(ServerConfig::default())
            .greet(Request::new(GreetRequest { greeting: None }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn greet_many_times_counts_from_zero() {
        let config = ServerConfig {
            greet_count: 3,
            ..ServerConfig::default()
        };
        let stream = handler(config)
            .greet_many_times(Request::new(GreetManyTimesRequest {
                first_name: String::from("Ada"),
            }))
            .await
            .unwrap()
            .into_inner();

        let greetings: Vec<_> = stream.map(|r| r.unwrap().result).collect().await;
        assert_eq!(
            greetings,
            vec!["hello, Ada0 times.", "hello, Ada1 times.", "hello, Ada2 times."]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn greet_with_deadline_completes_without_deadline() {
        let config = ServerConfig {
            deadline_work: Duration::from_millis(300),
            ..ServerConfig::default()
        };
        let res = handler(config)
            .greet_with_deadline(Request::new(GreetWithDeadlineRequest {
                first_name: String::from("Grace"),
            }))
            .await
            .unwrap();
        assert_eq!(res.into_inner().result, "Hello Grace");
    }

    #[tokio::test(start_paused = true)]
    async fn greet_with_deadline_honours_short_deadline() {
        let mut req = Request::new(GreetWithDeadlineRequest {
            first_name: String::from("Grace"),
        });
        req.metadata_mut()
            .insert(GRPC_TIMEOUT_HEADER, MetadataValue::from_static("100m"));

        let err = handler(ServerConfig::default())
            .greet_with_deadline(req)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::DeadlineExceeded);
    }
}
