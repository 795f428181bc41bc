use core::{fmt, hint::black_box};
use courier_core::proto::{
    calculator::{SumRequest, calculator_service_client::CalculatorServiceClient},
    greet::{GreetEveryoneRequest, greet_service_client::GreetServiceClient},
};
use courier_server::server::{
    config::ServerConfig, serve::LocalServer, service::calculator::Factorizer,
    store::InMemoryBlogStore,
};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::{sync::Arc, time::Instant};
use tokio::runtime::Builder;
use tokio_stream::StreamExt;
use tonic::{codec::CompressionEncoding, transport::Channel};

#[derive(Clone, Copy, Debug)]
enum Compression {
    None,
    Gzip,
    Zstd,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Gzip => write!(f, "gzip"),
            Self::Zstd => write!(f, "zstd"),
        }
    }
}

impl From<Compression> for Option<CompressionEncoding> {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => None,
            Compression::Gzip => Some(CompressionEncoding::Gzip),
            Compression::Zstd => Some(CompressionEncoding::Zstd),
        }
    }
}

fn factorize_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("factorize");
    for n in [120_i64, 600_851_475_143, 999_999_000_001] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| Factorizer::new(black_box(n)).count());
        });
    }
    group.finish();
}

fn grpc_bench(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();
    let server = rt
        .block_on(LocalServer::start(
            ServerConfig::default(),
            Arc::new(InMemoryBlogStore::new()),
        ))
        .unwrap();
    let channel = rt
        .block_on(Channel::from_shared(server.url()).unwrap().connect())
        .unwrap();

    let compression_cases = [Compression::None, Compression::Zstd, Compression::Gzip];

    let mut group = c.benchmark_group("grpc/sum");
    group.throughput(Throughput::Elements(1));
    for compression in compression_cases {
        group.bench_function(format!("comp/{compression}"), |b| {
            b.to_async(&rt).iter(|| {
                let mut client = calculator_client(channel.clone(), compression);
                async move {
                    let res = client.sum(SumRequest { x: 3, y: 10 }).await.unwrap();
                    black_box(res.into_inner().result)
                }
            });
        });
    }
    group.finish();

    let mut group = c.benchmark_group("grpc/greet_everyone");
    for names in [1_u64, 100, 1_000] {
        group.throughput(Throughput::Elements(names));
        for compression in compression_cases {
            group.bench_function(format!("names/{names}/comp/{compression}"), |b| {
                b.to_async(&rt).iter_custom(|iters| {
                    let channel = channel.clone();
                    async move {
                        let start = Instant::now();
                        for _ in 0..iters {
                            run_greet_everyone(channel.clone(), compression, names).await;
                        }
                        start.elapsed()
                    }
                });
            });
        }
    }
    group.finish();

    rt.block_on(server.stop()).unwrap();
}

fn calculator_client(
    channel: Channel,
    compression: Compression,
) -> CalculatorServiceClient<Channel> {
    let client = CalculatorServiceClient::new(channel);
    match Option::<CompressionEncoding>::from(compression) {
        Some(encoding) => client
            .send_compressed(encoding)
            .accept_compressed(encoding),
        None => client,
    }
}

async fn run_greet_everyone(channel: Channel, compression: Compression, names: u64) {
    let mut client = GreetServiceClient::new(channel);
    if let Some(encoding) = Option::<CompressionEncoding>::from(compression) {
        client = client.send_compressed(encoding).accept_compressed(encoding);
    }

    let outbound = tokio_stream::iter(0..names).map(|i| GreetEveryoneRequest {
        first_name: format!("name-{i}"),
    });
    let mut inbound = client.greet_everyone(outbound).await.unwrap().into_inner();

    let mut received = 0;
    while let Some(reply) = inbound.next().await {
        black_box(reply.unwrap());
        received += 1;
    }
    assert_eq!(received, names);
}

criterion_group!(benches, factorize_bench, grpc_bench);
criterion_main!(benches);
