//! Arithmetic over every interaction shape.
//!
//! | RPC | Shape | Failure modes |
//! |---|---|---|
//! | `Sum` | unary | `INVALID_ARGUMENT` on overflow |
//! | `SquareRoot` | unary | `INVALID_ARGUMENT` for negative or NaN input |
//! | `PrimeFactor` | server streaming | `INVALID_ARGUMENT` for `number <= 0` |
//! | `RunningAverage` | client streaming | `INVALID_ARGUMENT` for an empty stream |
//! | `RunningMax` | bidirectional | none beyond aborts |

use super::observed;
use crate::server::{
    config::ServerConfig,
    lifecycle::CallTracker,
    streaming::{ResponseStream, fold_inbound, spawn_duplex, spawn_producer},
};
use courier_core::{
    Deadline, Error,
    proto::calculator::{
        PrimeFactorRequest, PrimeFactorResponse, RunningAverageRequest, RunningAverageResponse,
        RunningMaxRequest, RunningMaxResponse, SquareRootRequest, SquareRootResponse, SumRequest,
        SumResponse, calculator_service_server::CalculatorService,
    },
};
use std::sync::Arc;
use tonic::{Request, Response, Status, Streaming};

/// Candidate divisors tried between two cooperative yields while searching
/// for the next prime factor.
const DIVISORS_PER_YIELD: u32 = 4096;

#[derive(Clone)]
pub struct CalculatorHandler {
    config: ServerConfig,
    tracker: Arc<CallTracker>,
}

impl CalculatorHandler {
    #[must_use]
    pub const fn new(config: ServerConfig, tracker: Arc<CallTracker>) -> Self {
        Self { config, tracker }
    }
}

#[tonic::async_trait]
impl CalculatorService for CalculatorHandler {
    type PrimeFactorStream = ResponseStream<PrimeFactorResponse>;
    type RunningMaxStream = ResponseStream<RunningMaxResponse>;

    #[tracing::instrument(skip_all, fields(x = req.get_ref().x, y = req.get_ref().y))]
    async fn sum(&self, req: Request<SumRequest>) -> Result<Response<SumResponse>, Status> {
        observed("Sum", async move {
            let SumRequest { x, y } = req.into_inner();
            let result = x.checked_add(y).ok_or_else(|| {
                Error::invalid_argument(format!("Sum of {x} and {y} overflows a 64-bit integer"))
            })?;
            Ok(Response::new(SumResponse { result }))
        })
        .await
    }

    #[tracing::instrument(skip_all, fields(number = req.get_ref().number))]
    async fn square_root(
        &self,
        req: Request<SquareRootRequest>,
    ) -> Result<Response<SquareRootResponse>, Status> {
        observed("SquareRoot", async move {
            let number = req.into_inner().number;
            if number.is_nan() || number < 0.0 {
                return Err(
                    Error::invalid_argument(format!("Received a negative number: {number}")).into(),
                );
            }
            Ok(Response::new(SquareRootResponse { root: number.sqrt() }))
        })
        .await
    }

    #[tracing::instrument(skip_all, fields(number = req.get_ref().number))]
    async fn prime_factor(
        &self,
        req: Request<PrimeFactorRequest>,
    ) -> Result<Response<Self::PrimeFactorStream>, Status> {
        observed("PrimeFactor", async move {
            let deadline = Deadline::from_metadata(req.metadata());
            let number = req.into_inner().number;
            if number <= 0 {
                return Err(Error::invalid_argument(format!(
                    "Prime factorization requires a positive number, received {number}"
                ))
                .into());
            }

            let guard = self.tracker.begin("PrimeFactor")?;
            let delay = self.config.factor_delay;
            let stream = spawn_producer(
                guard,
                self.config.stream_buffer_size,
                deadline,
                move |emitter| async move {
                    let mut factors = Factorizer::new(number);
                    let mut tried = 0;
                    loop {
                        match factors.step() {
                            Step::Factor(factor) => {
                                emitter.emit(PrimeFactorResponse { factor }).await?;
                                emitter.pause(delay).await?;
                            }
                            Step::Searching => {
                                tried += 1;
                                if tried == DIVISORS_PER_YIELD {
                                    tried = 0;
                                    emitter.check()?;
                                    tokio::task::yield_now().await;
                                }
                            }
                            Step::Done => return Ok(()),
                        }
                    }
                },
            );

            Ok(Response::new(Box::pin(stream) as Self::PrimeFactorStream))
        })
        .await
    }

    #[tracing::instrument(skip_all)]
    async fn running_average(
        &self,
        req: Request<Streaming<RunningAverageRequest>>,
    ) -> Result<Response<RunningAverageResponse>, Status> {
        observed("RunningAverage", async move {
            let deadline = Deadline::from_metadata(req.metadata());
            let guard = self.tracker.begin("RunningAverage")?;

            let (sum, count) = fold_inbound(
                req.into_inner(),
                deadline,
                guard.token(),
                0_i128,
                |sum, msg: RunningAverageRequest| Ok(sum + i128::from(msg.number)),
            )
            .await?;

            if count == 0 {
                return Err(
                    Error::invalid_argument("Cannot average an empty stream of numbers").into(),
                );
            }
            #[allow(clippy::cast_precision_loss)]
            let average = sum as f64 / count as f64;
            tracing::debug!(count, average, "Averaged client stream");
            Ok(Response::new(RunningAverageResponse { average }))
        })
        .await
    }

    #[tracing::instrument(skip_all)]
    async fn running_max(
        &self,
        req: Request<Streaming<RunningMaxRequest>>,
    ) -> Result<Response<Self::RunningMaxStream>, Status> {
        observed("RunningMax", async move {
            let deadline = Deadline::from_metadata(req.metadata());
            let guard = self.tracker.begin("RunningMax")?;

            let mut running = RunningMax::default();
            let stream = spawn_duplex(
                guard,
                self.config.stream_buffer_size,
                deadline,
                req.into_inner(),
                move |msg: RunningMaxRequest| {
                    Ok(running
                        .observe(msg.number)
                        .map(|max| RunningMaxResponse { max }))
                },
            );

            Ok(Response::new(Box::pin(stream) as Self::RunningMaxStream))
        })
        .await
    }
}

/// One unit of trial-division work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Factor(i64),
    Searching,
    Done,
}

/// Trial division that can be driven one candidate divisor at a time, so a
/// producer can check for aborts while searching a large prime.
#[derive(Debug, Clone)]
pub struct Factorizer {
    remaining: i64,
    divisor: i64,
}

impl Factorizer {
    /// `number` must be positive. `1` has no prime factors.
    #[must_use]
    pub const fn new(number: i64) -> Self {
        Self {
            remaining: number,
            divisor: 2,
        }
    }

    pub const fn step(&mut self) -> Step {
        if self.remaining <= 1 {
            return Step::Done;
        }
        // divisor² > remaining: nothing smaller divides it, so it is prime.
        if self.divisor > self.remaining / self.divisor {
            let factor = self.remaining;
            self.remaining = 1;
            return Step::Factor(factor);
        }
        if self.remaining % self.divisor == 0 {
            self.remaining /= self.divisor;
            Step::Factor(self.divisor)
        } else {
            self.divisor += 1;
            Step::Searching
        }
    }
}

impl Iterator for Factorizer {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        loop {
            match self.step() {
                Step::Factor(factor) => return Some(factor),
                Step::Searching => {}
                Step::Done => return None,
            }
        }
    }
}

/// Tracks the maximum of a number stream. The first number only sets the
/// baseline; afterwards every strictly greater number is reported.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunningMax {
    current: Option<i64>,
}

impl RunningMax {
    pub const fn observe(&mut self, number: i64) -> Option<i64> {
        match self.current {
            Some(max) if number <= max => None,
            Some(_) => {
                self.current = Some(number);
                Some(number)
            }
            None => {
                self.current = Some(number);
                None
            }
        }
    }
}
