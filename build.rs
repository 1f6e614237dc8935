use tonic_build::manual::{Builder, Method, Service};

const CODEC: &str = "tonic_prost::ProstCodec";

fn method(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(&format!("crate::rpc::proto::{input}"))
        .output_type(&format!("crate::rpc::proto::{output}"))
        .codec_path(CODEC)
        .build()
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let shortener = Service::builder()
        .name("Shortener")
        .package("shorty.v1")
        .method(method("shorten", "Shorten", "ShortenRequest", "ShortenResponse"))
        .method(method(
            "batch_shorten",
            "BatchShorten",
            "BatchShortenRequest",
            "BatchShortenResponse",
        ))
        .method(method("resolve", "Resolve", "ResolveRequest", "ResolveResponse"))
        .method(method(
            "list_user_urls",
            "ListUserUrls",
            "ListUserUrlsRequest",
            "ListUserUrlsResponse",
        ))
        .method(method(
            "delete_user_urls",
            "DeleteUserUrls",
            "DeleteUserUrlsRequest",
            "DeleteUserUrlsResponse",
        ))
        .method(method("ping", "Ping", "PingRequest", "PingResponse"))
        .method(method("stats", "Stats", "StatsRequest", "StatsResponse"))
        .build();

    Builder::new().compile(&[shortener]);
}
