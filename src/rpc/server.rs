use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::warn;

use super::auth::{Policy, RpcAuth};
use super::error::already_exists;
use super::proto::{
    BatchResult, BatchShortenRequest, BatchShortenResponse, DeleteUserUrlsRequest,
    DeleteUserUrlsResponse, ListUserUrlsRequest, ListUserUrlsResponse, PingRequest, PingResponse,
    ResolveRequest, ResolveResponse, ShortenRequest, ShortenResponse, StatsRequest,
    StatsResponse, UserUrl,
};
use super::shortener_server::Shortener;
use crate::auth::{client_ip, TrustedSubnet};
use crate::models::BatchItem;
use crate::shortener::{ServiceError, ShortenerService};

/// gRPC adapter over [`ShortenerService`].
pub struct ShortenerRpc {
    service: Arc<ShortenerService>,
    auth: Arc<RpcAuth>,
    subnet: Arc<TrustedSubnet>,
}

impl ShortenerRpc {
    pub fn new(
        service: Arc<ShortenerService>,
        auth: Arc<RpcAuth>,
        subnet: Arc<TrustedSubnet>,
    ) -> Self {
        Self {
            service,
            auth,
            subnet,
        }
    }
}

fn metadata_str<'a, T>(request: &'a Request<T>, key: &str) -> Option<&'a str> {
    request.metadata().get(key).and_then(|v| v.to_str().ok())
}

#[tonic::async_trait]
impl Shortener for ShortenerRpc {
    async fn shorten(
        &self,
        request: Request<ShortenRequest>,
    ) -> Result<Response<ShortenResponse>, Status> {
        let caller = self
            .auth
            .authenticate("Shorten", Policy::Lenient, request.metadata())?;
        let user_id = caller.require_user()?;
        let message = request.into_inner();

        match self.service.shorten(user_id, &message.url).await {
            Ok(shortened) if shortened.is_new => Ok(caller.respond(ShortenResponse {
                short_url: shortened.short_url,
            })),
            Ok(shortened) => Err(caller.fail(already_exists(shortened.short_url))),
            Err(err) => Err(caller.fail(err)),
        }
    }

    async fn batch_shorten(
        &self,
        request: Request<BatchShortenRequest>,
    ) -> Result<Response<BatchShortenResponse>, Status> {
        let caller = self
            .auth
            .authenticate("BatchShorten", Policy::Lenient, request.metadata())?;
        let user_id = caller.require_user()?;
        let items = request
            .into_inner()
            .items
            .into_iter()
            .map(|item| BatchItem {
                correlation_id: item.correlation_id,
                original_url: item.original_url,
            })
            .collect();

        match self.service.batch_shorten(user_id, items).await {
            Ok(results) => Ok(caller.respond(BatchShortenResponse {
                items: results
                    .into_iter()
                    .map(|r| BatchResult {
                        correlation_id: r.correlation_id,
                        short_url: r.short_url,
                    })
                    .collect(),
            })),
            Err(err) => Err(caller.fail(err)),
        }
    }

    async fn resolve(
        &self,
        request: Request<ResolveRequest>,
    ) -> Result<Response<ResolveResponse>, Status> {
        let caller = self
            .auth
            .authenticate("Resolve", Policy::Lenient, request.metadata())?;
        let short_key = request.into_inner().short_key;

        match self.service.resolve(&short_key).await {
            Ok(original_url) => Ok(caller.respond(ResolveResponse { original_url })),
            Err(err) => Err(caller.fail(err)),
        }
    }

    async fn list_user_urls(
        &self,
        request: Request<ListUserUrlsRequest>,
    ) -> Result<Response<ListUserUrlsResponse>, Status> {
        let caller = self
            .auth
            .authenticate("ListUserUrls", Policy::Strict, request.metadata())?;
        let user_id = caller.require_user()?;

        match self.service.list_user_urls(user_id).await {
            Ok(urls) => Ok(caller.respond(ListUserUrlsResponse {
                urls: urls
                    .into_iter()
                    .map(|u| UserUrl {
                        short_url: u.short_url,
                        original_url: u.original_url,
                    })
                    .collect(),
            })),
            Err(err) => Err(caller.fail(err)),
        }
    }

    async fn delete_user_urls(
        &self,
        request: Request<DeleteUserUrlsRequest>,
    ) -> Result<Response<DeleteUserUrlsResponse>, Status> {
        let caller = self
            .auth
            .authenticate("DeleteUserUrls", Policy::Strict, request.metadata())?;
        let user_id = caller.require_user()?;
        let short_keys = request.into_inner().short_keys;

        match self.service.enqueue_delete(user_id, short_keys) {
            Ok(()) => Ok(caller.respond(DeleteUserUrlsResponse {})),
            Err(err) => Err(caller.fail(err)),
        }
    }

    async fn ping(&self, request: Request<PingRequest>) -> Result<Response<PingResponse>, Status> {
        let caller = self
            .auth
            .authenticate("Ping", Policy::Lenient, request.metadata())?;

        match self.service.ping().await {
            Ok(()) => Ok(caller.respond(PingResponse {})),
            Err(err) => Err(caller.fail(err)),
        }
    }

    async fn stats(
        &self,
        request: Request<StatsRequest>,
    ) -> Result<Response<StatsResponse>, Status> {
        let caller = self
            .auth
            .authenticate("Stats", Policy::Lenient, request.metadata())?;

        let client = client_ip::resolve(
            metadata_str(&request, "x-forwarded-for"),
            metadata_str(&request, "x-real-ip"),
            request.remote_addr().map(|addr| addr.ip()),
        );
        if !self.subnet.allows(client) {
            warn!(client = ?client, "Rejected Stats call from outside the trusted subnet");
            return Err(caller.fail(ServiceError::Forbidden));
        }

        match self.service.stats().await {
            Ok(stats) => Ok(caller.respond(StatsResponse {
                urls: stats.urls,
                users: stats.users,
            })),
            Err(err) => Err(caller.fail(err)),
        }
    }
}
