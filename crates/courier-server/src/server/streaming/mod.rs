//! Building blocks shared by every streaming handler.
//!
//! - [`producer`]: a spawned task that writes a server stream through a
//!   bounded channel, checking the deadline and cancellation between
//!   messages.
//! - [`inbound`]: folds a client stream into a single aggregate.
//! - [`duplex`]: pairs an inbound stream with a producer for bidirectional
//!   calls.

pub mod duplex;
pub mod inbound;
pub mod producer;

pub use duplex::spawn_duplex;
pub use inbound::fold_inbound;
pub use producer::{Emitter, ResponseStream, spawn_producer};
