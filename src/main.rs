use std::sync::Arc;

use adaptive_engine::cache::{CacheStore, MemoryCache, RedisCache};
use adaptive_engine::config::Config;
use adaptive_engine::logging;
use adaptive_engine::personalization::needs::LinearNeedDetector;
use adaptive_engine::personalization::PersonalizationEngine;
use adaptive_engine::state::AppState;
use adaptive_engine::stores::{
    load_catalog, InMemoryContentStore, InMemoryQuestionBank, InMemoryTelemetryStore,
};
use adaptive_engine::workers::WorkerManager;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = logging::init_tracing(&config.log_level);

    let (content, questions) = match config.content_catalog_path {
        Some(ref path) => match load_catalog(path) {
            Ok(catalog) => {
                tracing::info!(path = %path.display(), items = catalog.content.len(), "content catalog loaded");
                (catalog.content, catalog.questions)
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "content catalog not loaded, starting empty");
                (InMemoryContentStore::default(), InMemoryQuestionBank::new())
            }
        },
        None => {
            tracing::warn!("CONTENT_CATALOG_PATH not set, starting with an empty catalog");
            (InMemoryContentStore::default(), InMemoryQuestionBank::new())
        }
    };

    let (cache, cache_backend): (Arc<dyn CacheStore>, &'static str) = match config.redis_url {
        Some(ref url) => match RedisCache::connect(url).await {
            Ok(redis) => {
                tracing::info!("redis cache connected");
                (Arc::new(redis), "redis")
            }
            Err(err) => {
                tracing::warn!(error = %err, "redis unavailable, using in-process cache");
                (Arc::new(MemoryCache::new(config.memory_cache_capacity)), "memory")
            }
        },
        None => (Arc::new(MemoryCache::new(config.memory_cache_capacity)), "memory"),
    };

    let engine = Arc::new(
        PersonalizationEngine::builder(Arc::new(content), Arc::new(InMemoryTelemetryStore::new()))
            .config(config.engine.clone())
            .cache(cache)
            .question_bank(Arc::new(questions))
            .detector(Arc::new(LinearNeedDetector::baseline()))
            .build(),
    );

    let worker_manager = match WorkerManager::new(Arc::clone(&engine)).await {
        Ok(manager) => {
            if let Err(e) = manager.start().await {
                tracing::error!(error = %e, "failed to start workers");
            }
            Some(manager)
        }
        Err(e) => {
            tracing::warn!(error = %e, "worker manager not initialized");
            None
        }
    };

    let app = adaptive_engine::create_app(AppState::new(engine, cache_backend));

    let addr = config.bind_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "bind listener failed");
            return;
        }
    };
    tracing::info!(%addr, "adaptive-engine listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
    }

    tracing::info!("HTTP server stopped, initiating graceful shutdown sequence");

    if let Some(ref manager) = worker_manager {
        manager.stop().await;
    }

    tracing::info!("Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
