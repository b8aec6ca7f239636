//! Wire messages for the `region_probe.RegionService` gRPC service.
//!
//! The service stubs (`region_service_client`, `region_service_server`) are
//! generated by `build.rs` and included at the bottom of this module.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HandshakeRequest {
    #[prost(string, tag = "1")]
    pub client_name: ::prost::alloc::string::String,
    /// Client-side log verbosity, forwarded so the server can correlate logs
    #[prost(string, tag = "2")]
    pub log_level: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HandshakeResponse {
    #[prost(uint64, tag = "1")]
    pub session_id: u64,
    #[prost(uint32, tag = "2")]
    pub server_id: u32,
    #[prost(uint32, tag = "3")]
    pub region_count: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegionRequest {
    #[prost(uint64, tag = "1")]
    pub session_id: u64,
    #[prost(string, tag = "2")]
    pub region: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OpenRegionResponse {
    #[prost(string, tag = "1")]
    pub region: ::prost::alloc::string::String,
    #[prost(uint64, tag = "2")]
    pub size: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SizeResponse {
    #[prost(uint64, tag = "1")]
    pub size: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KeysResponse {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub keys: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetRequest {
    #[prost(uint64, tag = "1")]
    pub session_id: u64,
    #[prost(string, tag = "2")]
    pub region: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "3")]
    pub key: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetResponse {
    /// False when the key is not (or no longer) present in the region
    #[prost(bool, tag = "1")]
    pub found: bool,
    #[prost(bytes = "vec", tag = "2")]
    pub value: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DisconnectRequest {
    #[prost(uint64, tag = "1")]
    pub session_id: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DisconnectResponse {
    /// Whether the server still knew about the session
    #[prost(bool, tag = "1")]
    pub known: bool,
}

include!(concat!(env!("OUT_DIR"), "/region_probe.RegionService.rs"));
