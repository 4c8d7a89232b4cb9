use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use scribeflow::dispatch::{InlineDispatcher, QueuedDispatcher, WorkDispatcher};
use scribeflow::insights::{GeminiInsightModel, InsightBuilder, InsightModel};
use scribeflow::queue::{spawn_retention_sweeper, JobQueue, JobStore, RetentionPolicy, WorkerPool};
use scribeflow::transcribe::{NatsSpeechEngine, SpeechEngine, Transcriber};
use scribeflow::{create_router, AppState, Config, ProcessingPipeline, SessionRegistry, TempStore};

#[derive(Debug, Parser)]
#[command(name = "scribeflow", about = "Audio transcription and insight service")]
struct Args {
    /// Config file base path (TOML, extension omitted)
    #[arg(long, default_value = "config/scribeflow")]
    config: String,

    /// Override the configured listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let temp = Arc::new(TempStore::new(&cfg.temp.dir)?);

    let engine: Arc<dyn SpeechEngine> = Arc::new(
        NatsSpeechEngine::connect(&cfg.speech.nats_url, cfg.speech.subject.clone())
            .await
            .context("Failed to connect to the speech engine")?,
    );
    let transcriber = Arc::new(Transcriber::new(engine));

    let model: Arc<dyn InsightModel> = Arc::new(GeminiInsightModel::new(
        cfg.insights.api_key.clone().unwrap_or_default(),
        cfg.insights.model.clone(),
        cfg.insights.base_url.clone(),
    ));
    let insights = Arc::new(InsightBuilder::new(model));

    let pipeline = Arc::new(ProcessingPipeline::new(
        Arc::clone(&transcriber),
        Arc::clone(&insights),
        Arc::clone(&temp),
    ));

    let registry = Arc::new(SessionRegistry::new(
        Arc::clone(&transcriber),
        Arc::clone(&insights),
        Arc::clone(&temp),
    ));

    let (dispatcher, queue): (Arc<dyn WorkDispatcher>, Option<Arc<JobQueue>>) =
        if cfg.queue.enabled {
            let store = Arc::new(JobStore::new(RetentionPolicy::default()));
            let (job_queue, rx) = JobQueue::new(Arc::clone(&store));
            let job_queue = Arc::new(job_queue);

            WorkerPool::spawn(
                cfg.queue.worker_concurrency,
                rx,
                Arc::clone(&store),
                Arc::clone(&pipeline),
            );
            let _sweeper = spawn_retention_sweeper(store, Duration::from_secs(60));

            info!(
                workers = cfg.queue.worker_concurrency,
                "Queued mode: worker pool started"
            );
            (
                Arc::new(QueuedDispatcher::new(
                    Arc::clone(&job_queue),
                    Arc::clone(&temp),
                )),
                Some(job_queue),
            )
        } else {
            info!("Inline mode: requests processed in place");
            (
                Arc::new(InlineDispatcher::new(
                    Arc::clone(&pipeline),
                    Arc::clone(&temp),
                )),
                None,
            )
        };

    let state = AppState {
        dispatcher,
        queue,
        registry,
        bearer_token: cfg.auth.bearer_token.clone(),
    };

    let router = create_router(state);

    let addr: SocketAddr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port)
        .parse()
        .context("Invalid bind address")?;
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
