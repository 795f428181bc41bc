#![allow(dead_code)]

use core::time::Duration;
use courier_client::{BlogCaller, CalculatorCaller, GreetCaller, connect};
use courier_server::server::{config::ServerConfig, serve::LocalServer, store::InMemoryBlogStore};
use std::sync::Arc;
use tonic::transport::Channel;

pub const GREET_COUNT: usize = 5;
pub const DEADLINE_WORK: Duration = Duration::from_millis(400);

/// A loopback server with short delays so streaming tests stay fast.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        factor_delay: Duration::from_millis(1),
        greet_count: GREET_COUNT,
        greet_interval: Duration::from_millis(10),
        deadline_work: DEADLINE_WORK,
        shutdown_timeout: Duration::from_millis(500),
        ..ServerConfig::default()
    }
}

pub struct Harness {
    pub server: LocalServer,
    pub channel: Channel,
}

impl Harness {
    pub async fn start() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: ServerConfig) -> Self {
        let server = LocalServer::start(config, Arc::new(InMemoryBlogStore::new()))
            .await
            .unwrap();
        let channel = connect(server.url()).await.unwrap();
        Self { server, channel }
    }

    pub fn calculator(&self) -> CalculatorCaller {
        CalculatorCaller::new(self.channel.clone())
    }

    pub fn greet(&self) -> GreetCaller {
        GreetCaller::new(self.channel.clone())
    }

    pub fn blog(&self) -> BlogCaller {
        BlogCaller::new(self.channel.clone())
    }

    pub async fn stop(self) {
        self.server.stop().await.unwrap();
    }
}
