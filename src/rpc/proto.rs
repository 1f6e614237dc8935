//! Wire messages of the `shorty.v1.Shortener` service.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ShortenRequest {
    #[prost(string, tag = "1")]
    pub url: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ShortenResponse {
    #[prost(string, tag = "1")]
    pub short_url: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BatchItem {
    #[prost(string, tag = "1")]
    pub correlation_id: String,
    #[prost(string, tag = "2")]
    pub original_url: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BatchShortenRequest {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<BatchItem>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BatchResult {
    #[prost(string, tag = "1")]
    pub correlation_id: String,
    #[prost(string, tag = "2")]
    pub short_url: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BatchShortenResponse {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<BatchResult>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResolveRequest {
    #[prost(string, tag = "1")]
    pub short_key: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResolveResponse {
    #[prost(string, tag = "1")]
    pub original_url: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListUserUrlsRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UserUrl {
    #[prost(string, tag = "1")]
    pub short_url: String,
    #[prost(string, tag = "2")]
    pub original_url: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListUserUrlsResponse {
    #[prost(message, repeated, tag = "1")]
    pub urls: Vec<UserUrl>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteUserUrlsRequest {
    #[prost(string, repeated, tag = "1")]
    pub short_keys: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteUserUrlsResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PingRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PingResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatsRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatsResponse {
    #[prost(uint64, tag = "1")]
    pub urls: u64,
    #[prost(uint64, tag = "2")]
    pub users: u64,
}
