/// Builds the gRPC client and server code for the courier `.proto` definitions
/// using `tonic-prost-build`.
///
/// This code generation step processes the Protocol Buffer definitions located
/// in the `proto` directory and emits Rust modules with gRPC bindings into the
/// crate's `OUT_DIR`, one module per protobuf package.
///
/// # Descriptor Set
///
/// A combined `FileDescriptorSet` for all three packages is written to
/// `OUT_DIR/courier_descriptor.bin`. The server registers it with the gRPC
/// reflection service so tools like `grpcurl` can discover every method.
///
/// # Files and Paths
///
/// - Proto files: `proto/calculator.proto`, `proto/greet.proto`,
///   `proto/blog.proto`
/// - Includes: `proto/`
///
/// # Panics
///
/// This function will `panic!` if code generation fails. For CI use or better
/// diagnostics, wrap with a proper error handler or logging.
///
/// # Output
///
/// Generated code will be accessible in Rust via:
///
/// ```rust
/// pub mod calculator {
///     tonic::include_proto!("calculator");
/// }
/// ```
use std::env;
use std::path::PathBuf;

const PROTOS: [&str; 3] = [
    "proto/calculator.proto",
    "proto/greet.proto",
    "proto/blog.proto",
];

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("courier_descriptor.bin");

    for proto in PROTOS {
        println!("cargo:rerun-if-changed={proto}");
    }

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &PROTOS, &["proto"])
        .unwrap();
}
