#![doc = include_str!("../README.md")]

mod common;
pub use common::*;
// Public re-export so downstream crates can reach the ID library via
// `courier_core::ferroid`
pub use ferroid;

/// gRPC service and message definitions generated from `proto/`.
///
/// Each protobuf package becomes its own module:
///
/// - [`calculator`] - `Sum`, `SquareRoot`, `PrimeFactor`, `RunningAverage`,
///   `RunningMax`.
/// - [`greet`] - `Greet`, `GreetManyTimes`, `LongGreet`, `GreetEveryone`,
///   `GreetWithDeadline`.
/// - [`blog`] - CRUD and `ListBlog` over persisted blog records.
///
/// Between them the three services cover all four interaction shapes: unary,
/// server streaming, client streaming, and bidirectional streaming.
pub mod proto {
    pub mod calculator {
        tonic::include_proto!("calculator");
    }

    pub mod greet {
        tonic::include_proto!("greet");
    }

    pub mod blog {
        tonic::include_proto!("blog");
    }

    /// Encoded `FileDescriptorSet` for every package above, served by the gRPC
    /// reflection endpoint.
    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("courier_descriptor");
}
