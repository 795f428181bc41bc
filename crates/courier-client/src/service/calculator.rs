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
    proto::calculator::{
        PrimeFactorRequest, PrimeFactorResponse, RunningAverageRequest, RunningAverageResponse,
        RunningMaxRequest, SquareRootRequest, SumRequest,
        calculator_service_client::CalculatorServiceClient,
    },
};
use tonic::transport::Channel;

#[derive(Clone, Debug)]
pub struct CalculatorCaller {
    client: CalculatorServiceClient<Channel>,
    buffer: usize,
}

impl CalculatorCaller {
    #[must_use]
    pub fn new(channel: Channel) -> Self {
        Self {
            client: accepting!(CalculatorServiceClient::new(channel)),
            buffer: DEFAULT_SEND_BUFFER,
        }
    }

    /// # Errors
    ///
    /// `INVALID_ARGUMENT` when the sum overflows.
    pub async fn sum(&self, ctx: &CallContext, x: i64, y: i64) -> Result<i64> {
        let mut client = self.client.clone();
        let res = unary::invoke(ctx, client.sum(ctx.request(SumRequest { x, y }))).await?;
        Ok(res.result)
    }

    /// # Errors
    ///
    /// `INVALID_ARGUMENT` for negative input.
    pub async fn square_root(&self, ctx: &CallContext, number: f64) -> Result<f64> {
        let mut client = self.client.clone();
        let req = ctx.request(SquareRootRequest { number });
        let res = unary::invoke(ctx, client.square_root(req)).await?;
        Ok(res.root)
    }

    /// Streams the prime factors of `number` in non-decreasing order.
    ///
    /// # Errors
    ///
    /// `INVALID_ARGUMENT` for `number <= 0`, when the server refuses the
    /// call up front.
    pub async fn prime_factor(
        &self,
        ctx: CallContext,
        number: i64,
    ) -> Result<ServerStreamReceiver<PrimeFactorResponse>> {
        let mut client = self.client.clone();
        let req = ctx.request(PrimeFactorRequest { number });
        ServerStreamReceiver::open(ctx, client.prime_factor(req)).await
    }

    /// Collects every prime factor of `number`.
    ///
    /// # Errors
    ///
    /// Same as [`CalculatorCaller::prime_factor`], plus any mid-stream
    /// failure.
    pub async fn prime_factors(&self, ctx: CallContext, number: i64) -> Result<Vec<i64>> {
        let factors = self.prime_factor(ctx, number).await?.collect().await?;
        Ok(factors.into_iter().map(|f| f.factor).collect())
    }

    /// Opens a running-average call; send numbers, then `finish()`.
    #[must_use]
    pub fn running_average(
        &self,
        ctx: CallContext,
    ) -> ClientStreamSender<RunningAverageRequest, RunningAverageResponse> {
        let mut client = self.client.clone();
        ClientStreamSender::open(ctx, self.buffer, move |req| async move {
            client.running_average(req).await
        })
    }

    /// Averages `numbers` in one client-streaming call.
    ///
    /// # Errors
    ///
    /// `INVALID_ARGUMENT` when `numbers` is empty.
    pub async fn average<I>(&self, ctx: CallContext, numbers: I) -> Result<f64>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut sender = self.running_average(ctx);
        for number in numbers {
            sender.send(RunningAverageRequest { number }).await?;
        }
        Ok(sender.finish().await?.average)
    }

    /// Sends `numbers` paced by `pace` and returns each new maximum the
    /// server reports.
    ///
    /// # Errors
    ///
    /// The call's failure status or the context's abort error.
    pub async fn running_max<I>(
        &self,
        ctx: &CallContext,
        numbers: I,
        pace: Duration,
    ) -> Result<Vec<i64>>
    where
        I: IntoIterator<Item = i64>,
        I::IntoIter: Send + 'static,
    {
        let mut client = self.client.clone();
        let outbound = numbers
            .into_iter()
            .map(|number| RunningMaxRequest { number });
        let exchange = duplex::exchange(
            ctx,
            outbound,
            pace,
            move |req| async move { client.running_max(req).await },
            |res| res.max,
        )
        .await?;
        Ok(exchange.received)
    }
}
