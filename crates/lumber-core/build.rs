/// Generates the gRPC client and server bindings for `proto/lumber.proto`.
///
/// The client half is what the `lmc` driver talks through. The server half is
/// generated as well so the driver's tests can stand up an in-process mock of
/// the log store against the exact same contract.
///
/// # Files and Paths
///
/// - Proto file: `proto/lumber.proto`
/// - Includes: `proto/`
///
/// # Panics
///
/// Panics if `protoc` is unavailable or the definition fails to compile.
///
/// # Output
///
/// Generated code is exposed from the crate as:
///
/// ```rust,ignore
/// pub mod proto {
///     tonic::include_proto!("lumber");
/// }
/// ```
fn main() {
    println!("cargo:rerun-if-changed=proto/lumber.proto");

    tonic_prost_build::configure()
        .build_client(true)
        .build_server(true)
        .compile_protos(&["proto/lumber.proto"], &["proto"])
        .unwrap();
}
