use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use shorty::api;
use shorty::auth::{TokenIssuer, TrustedSubnet};
use shorty::config::Config;
use shorty::deleter::{DeletePipeline, StopOutcome};
use shorty::rpc::{RpcAuth, ShortenerRpc, ShortenerServer};
use shorty::shortener::{RandomKeyGenerator, ShortenerService};
use shorty::storage;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    let storage = storage::connect(&config.storage).await?;
    info!("Storage initialized successfully");

    let tokens = Arc::new(TokenIssuer::from_config(&config.auth));
    let subnet = Arc::new(
        TrustedSubnet::from_config(&config.trusted_subnet)
            .context("invalid TRUSTED_SUBNET")?,
    );
    if !subnet.is_configured() {
        let access = if config.trusted_subnet.deny_if_not_configured {
            "disabled"
        } else {
            "open to everyone"
        };
        warn!("TRUSTED_SUBNET is not set; internal stats are {}", access);
    }

    // Start the deletion pipeline
    let pipeline = Arc::new(DeletePipeline::new(Arc::clone(&storage), config.deleter.clone())?);
    pipeline.start()?;

    let service = Arc::new(ShortenerService::new(
        Arc::clone(&storage),
        Arc::new(RandomKeyGenerator),
        Arc::clone(&pipeline),
        config.base_url.clone(),
    ));

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received shutdown signal"),
                Err(err) => error!(error = %err, "Failed to listen for shutdown signal"),
            }
            shutdown.cancel();
        }
    });

    // HTTP server
    let router = api::create_router(
        Arc::clone(&service),
        Arc::clone(&tokens),
        Arc::clone(&subnet),
    );
    let http_addr = config.http_server.address();
    let http_listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {http_addr}"))?;
    info!("🚀 HTTP server listening on http://{}", http_addr);

    // gRPC server
    let grpc_addr: SocketAddr = config
        .grpc_server
        .address()
        .parse()
        .context("GRPC_HOST/GRPC_PORT do not form a socket address")?;
    let rpc = ShortenerRpc::new(
        Arc::clone(&service),
        Arc::new(RpcAuth::new(Arc::clone(&tokens), config.auth.public_methods.clone())),
        Arc::clone(&subnet),
    );
    info!("🚀 gRPC server listening on {}", grpc_addr);

    let http = async {
        axum::serve(
            http_listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
        .context("HTTP server failed")
    };
    let grpc = async {
        tonic::transport::Server::builder()
            .add_service(ShortenerServer::new(rpc))
            .serve_with_shutdown(grpc_addr, shutdown.clone().cancelled_owned())
            .await
            .context("gRPC server failed")
    };

    let served = tokio::try_join!(http, grpc);
    // Stop the other server if one of them failed
    shutdown.cancel();

    info!("Draining delete pipeline...");
    match pipeline.stop(config.shutdown_timeout).await {
        StopOutcome::Drained => info!("Delete pipeline drained"),
        StopOutcome::TimedOut => warn!("Delete pipeline timed out, some deletions were dropped"),
    }

    if let Err(err) = storage.close().await {
        error!(error = %err, "Failed to close storage");
    }
    info!("Shutdown complete");

    served.map(|_| ())
}
