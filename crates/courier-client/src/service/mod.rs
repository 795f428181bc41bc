//! Typed callers, one per service. Each method picks the component matching
//! the RPC's interaction shape and hides the wire messages where a plain
//! value says the same thing.

pub mod blog;
pub mod calculator;
pub mod greet;

pub use blog::BlogCaller;
pub use calculator::CalculatorCaller;
pub use greet::GreetCaller;

/// Client-side buffer for outbound streams.
pub const DEFAULT_SEND_BUFFER: usize = 16;

/// Applies the response encodings every courier client accepts.
macro_rules! accepting {
    ($client:expr) => {
        $client
            .accept_compressed(tonic::codec::CompressionEncoding::Zstd)
            .accept_compressed(tonic::codec::CompressionEncoding::Gzip)
            .accept_compressed(tonic::codec::CompressionEncoding::Deflate)
    };
}
pub(crate) use accepting;
