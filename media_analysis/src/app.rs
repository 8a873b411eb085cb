use crate::classifier::EmotionClient;
use crate::config::Config;
use crate::language::{LibreTranslateClient, Translator};
use crate::sentiment::SentimentService;
use crate::server::{HttpServer, SharedState};
use crate::telemetry::Metrics;
use crate::upload::UploadStore;

use std::sync::Arc;
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> anyhow::Result<()> {
    let classifier = match EmotionClient::new(&config.prediction_service).await {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("Failed to initialize emotion classifier: {:?}", e);
            return Err(e.into());
        }
    };

    let translator: Option<Arc<dyn Translator>> = if config.translation.enabled {
        tracing::info!("Translating non-English text via {}", config.translation.url);
        Some(Arc::new(LibreTranslateClient::new(&config.translation)?))
    } else {
        None
    };

    let state = SharedState {
        classifier,
        video_config: config.video.clone(),
        uploads: Arc::new(UploadStore::new(&config.uploads.directory)?),
        sentiment: Arc::new(SentimentService::new(translator)),
        metrics: Arc::new(Metrics::new()?),
    };

    let server = HttpServer::new(state, &config.server).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_handle = server.run(shutdown_tx.subscribe()).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    server_handle.await??;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
