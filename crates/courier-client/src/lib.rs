#![doc = include_str!("../README.md")]

pub mod call;
pub mod cli;
pub mod service;

pub use call::{
    CallContext, channel::connect, client_stream::ClientStreamSender, duplex::Exchange,
    server_stream::ServerStreamReceiver,
};
pub use service::{BlogCaller, CalculatorCaller, GreetCaller};
