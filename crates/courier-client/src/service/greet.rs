use crate::{
    call::{
        CallContext, client_stream::ClientStreamSender, duplex, server_stream::ServerStreamReceiver,
        unary,
    },
    service::{DEFAULT_SEND_BUFFER, accepting},
};
use core::time::Duration;
use courier_core::{
    Result,
    proto::greet::{
        GreetEveryoneRequest, GreetManyTimesRequest, GreetManyTimesResponse, GreetRequest,
        GreetWithDeadlineRequest, Greeting, LongGreetRequest, LongGreetResponse,
        greet_service_client::GreetServiceClient,
    },
};
use tonic::transport::Channel;

#[derive(Clone, Debug)]
pub struct GreetCaller {
    client: GreetServiceClient<Channel>,
    buffer: usize,
}

impl GreetCaller {
    #[must_use]
    pub fn new(channel: Channel) -> Self {
        Self {
            client: accepting!(GreetServiceClient::new(channel)),
            buffer: DEFAULT_SEND_BUFFER,
        }
    }

    /// # Errors
    ///
    /// The call's failure status or the context's abort error.
    pub async fn greet(
        &self,
        ctx: &CallContext,
        first_name: &str,
        last_name: &str,
    ) -> Result<String> {
        let mut client = self.client.clone();
        let req = ctx.request(GreetRequest {
            greeting: Some(Greeting {
                first_name: first_name.to_owned(),
                last_name: last_name.to_owned(),
            }),
        });
        Ok(unary::invoke(ctx, client.greet(req)).await?.result)
    }

    /// # Errors
    ///
    /// The context's abort error if the stream cannot be opened in time.
    pub async fn greet_many_times(
        &self,
        ctx: CallContext,
        first_name: &str,
    ) -> Result<ServerStreamReceiver<GreetManyTimesResponse>> {
        let mut client = self.client.clone();
        let req = ctx.request(GreetManyTimesRequest {
            first_name: first_name.to_owned(),
        });
        ServerStreamReceiver::open(ctx, client.greet_many_times(req)).await
    }

    /// Opens a long-greet call; send names, then `finish()`.
    #[must_use]
    pub fn long_greet(
        &self,
        ctx: CallContext,
    ) -> ClientStreamSender<LongGreetRequest, LongGreetResponse> {
        let mut client = self.client.clone();
        ClientStreamSender::open(ctx, self.buffer, move |req| async move {
            client.long_greet(req).await
        })
    }

    /// Greets every name in `names`, one message each, paced by `pace`.
    /// Replies are returned in the order they arrived.
    ///
    /// # Errors
    ///
    /// The call's failure status or the context's abort error.
    pub async fn greet_everyone<I>(
        &self,
        ctx: &CallContext,
        names: I,
        pace: Duration,
    ) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        let mut client = self.client.clone();
        let outbound = names
            .into_iter()
            .map(|first_name| GreetEveryoneRequest { first_name });
        let exchange = duplex::exchange(
            ctx,
            outbound,
            pace,
            move |req| async move { client.greet_everyone(req).await },
            |res| {
                tracing::debug!(result = %res.result, "Received greeting");
                res.result
            },
        )
        .await?;
        Ok(exchange.received)
    }

    /// # Errors
    ///
    /// `DEADLINE_EXCEEDED` when `ctx` expires before the server answers.
    pub async fn greet_with_deadline(
        &self,
        ctx: &CallContext,
        first_name: &str,
    ) -> Result<String> {
        let mut client = self.client.clone();
        let req = ctx.request(GreetWithDeadlineRequest {
            first_name: first_name.to_owned(),
        });
        Ok(unary::invoke(ctx, client.greet_with_deadline(req)).await?.result)
    }
}
