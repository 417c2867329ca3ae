use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use gorgone_common::Config;
use gorgone_ingest::handlers::{
    PollRuleHandler, RefreshAggregatesHandler, RefreshEngagementHandler, SnapshotItemHandler,
    VectorizeHandler,
};
use gorgone_ingest::providers::ProviderClients;
use gorgone_ingest::Ingestor;
use gorgone_jobs::{CallbackVerifier, HandlerRegistry, JobQueue, WorkerPool};
use gorgone_store::Store;
use gorgone_tracker::RefreshEngine;
use gorgone_vector::{Embedder, PgVectorStore, TextEmbedder};
use newswire_client::NewswireClient;
use tikapi_client::TikApiClient;
use twitterapi_client::TwitterApiClient;

use gorgone_server::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gorgone=info")),
        )
        .json()
        .init();

    tracing::info!("Starting gorgone-server");

    let config = Config::from_env();
    config.log_redacted();

    // Separate connection pools for inbound HTTP and background workers.
    let http_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .connect(&config.database_url)
        .await?;
    let worker_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(8)
        .connect(&config.database_url)
        .await?;
    tracing::info!("Connected to database (http_pool=20, worker_pool=8)");

    sqlx::migrate!("../../migrations").run(&http_pool).await?;
    tracing::info!("Migrations complete");

    // Provider clients share one set of token buckets.
    let providers = ProviderClients::new(
        TwitterApiClient::new(config.twitterapi_api_key.clone()),
        TikApiClient::new(config.tikapi_api_key.clone()),
        NewswireClient::new(config.newswire_api_key.clone()),
    );

    let mut embedder = Embedder::new(&config.embedding_api_key, &config.embedding_model);
    if let Some(base_url) = config.embedding_base_url.as_deref() {
        embedder = embedder.with_base_url(base_url);
    }
    let embedder: Arc<dyn TextEmbedder> = Arc::new(embedder);

    let queue = JobQueue::new(worker_pool.clone());

    // Ingress handles webhooks on the HTTP pool; job handlers run on the
    // worker pool.
    let ingress_ingestor = Arc::new(Ingestor::new(
        Store::new(http_pool.clone()),
        queue.clone(),
        providers.clone(),
    ));
    let job_ingestor = Arc::new(Ingestor::new(
        Store::new(worker_pool.clone()),
        queue.clone(),
        providers.clone(),
    ));
    let engine = Arc::new(RefreshEngine::new(
        Store::new(worker_pool.clone()),
        providers.clone(),
    ));
    let vector_store = Arc::new(PgVectorStore::new(worker_pool.clone()));

    let registry = HandlerRegistry::new()
        .register(Arc::new(PollRuleHandler::new(job_ingestor.clone())))
        .register(Arc::new(RefreshEngagementHandler::new(engine.clone())))
        .register(Arc::new(SnapshotItemHandler::new(engine.clone())))
        .register(Arc::new(VectorizeHandler::new(vector_store, embedder)))
        .register(Arc::new(RefreshAggregatesHandler::new(worker_pool.clone())));

    // Seed the recurring aggregates rebuild; a live chain makes this a no-op.
    RefreshAggregatesHandler::seed(&queue).await?;

    tokio::spawn(WorkerPool::new(queue.clone(), registry.clone()).run());
    tracing::info!("Worker pool started");

    let state = AppState {
        webhook_secret: config.webhook_secret.clone(),
        verifier: CallbackVerifier::new(&config.queue_signing_key, &config.queue_token),
        ingestor: ingress_ingestor,
        registry,
        queue,
    };
    let app = build_router(state);

    let addr = format!("{}:{}", config.web_host, config.web_port);
    tracing::info!(addr, app_url = %config.app_url, "Listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
