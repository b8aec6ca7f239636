//! Generates the RegionService client and server stubs.
//!
//! Message types are declared by hand in `src/pb.rs`, so no `protoc` is
//! required at build time.

fn method(name: &str, route: &str, input: &str, output: &str) -> tonic_build::manual::Method {
    tonic_build::manual::Method::builder()
        .name(name)
        .route_name(route)
        .input_type(&format!("crate::pb::{}", input))
        .output_type(&format!("crate::pb::{}", output))
        .codec_path("tonic::codec::ProstCodec")
        .build()
}

fn main() {
    let service = tonic_build::manual::Service::builder()
        .name("RegionService")
        .package("region_probe")
        .method(method("handshake", "Handshake", "HandshakeRequest", "HandshakeResponse"))
        .method(method("open_region", "OpenRegion", "RegionRequest", "OpenRegionResponse"))
        .method(method("size_on_server", "SizeOnServer", "RegionRequest", "SizeResponse"))
        .method(method("keys_on_server", "KeysOnServer", "RegionRequest", "KeysResponse"))
        .method(method("get", "Get", "GetRequest", "GetResponse"))
        .method(method("disconnect", "Disconnect", "DisconnectRequest", "DisconnectResponse"))
        .build();

    tonic_build::manual::Builder::new().compile(&[service]);
}
