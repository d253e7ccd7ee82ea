use std::{env, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::{task::JoinHandle, time::timeout};

use crate::{
    ai::ClassifierClient,
    config::{self, AppConfig},
    db::{self, filtered::FilteredRepository},
    domain::{InterestSet, InterestStore},
    infrastructure::{
        directories::ResolvedPaths,
        notifier::Notifier,
        shutdown::{self, Shutdown},
    },
    tasks::{
        coordinator::{DispatchCoordinator, PipelineTiming},
        queue::BatchQueue,
        source::{DiscoverySource, FeedSource},
    },
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const RECENT_ON_EXIT: i64 = 5;

pub struct FilterApp {
    coordinator: Arc<DispatchCoordinator>,
    classifier: Arc<ClassifierClient>,
    repository: Arc<FilteredRepository>,
    source: Option<Arc<FeedSource>>,
    loop_handle: JoinHandle<()>,
    shutdown: Shutdown,
}

impl FilterApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let pool = db::init_pool(&paths.db_path)
            .await
            .with_context(|| format!("failed to open {}", paths.db_path.display()))?;
        let repository = Arc::new(FilteredRepository::new(pool));

        let http_client = Client::builder()
            .user_agent(format!("interest-filter/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let classifier = Arc::new(ClassifierClient::new(
            http_client,
            config.classifier.clone(),
        ));
        let notifier = Arc::new(Notifier::new(&config.notifier));
        tracing::info!(
            target: "app",
            telegram = notifier.is_mirroring(),
            "notifier ready"
        );

        let interests = Arc::new(InterestStore::new(InterestSet::parse(&config.interests)));
        let queue = Arc::new(BatchQueue::new(config.pipeline.batch_size));

        let source = match FeedSource::open(&paths.feed_path, config.feed.page_size).await {
            Ok(source) => Some(Arc::new(source)),
            Err(err) => {
                tracing::warn!(
                    target: "feed",
                    error = %format!("{err:#}"),
                    "running without a discovery feed"
                );
                None
            }
        };

        let mut coordinator = DispatchCoordinator::new(
            queue,
            classifier.clone(),
            repository.clone(),
            notifier,
            interests,
            PipelineTiming::from(&config.pipeline),
        );
        if let Some(source) = &source {
            coordinator = coordinator.with_source(source.clone());
        }
        let coordinator = Arc::new(coordinator);
        let loop_handle = coordinator.clone().spawn(shutdown.subscribe());

        Ok(Self {
            coordinator,
            classifier,
            repository,
            source,
            loop_handle,
            shutdown,
        })
    }

    pub async fn run(self) -> Result<()> {
        let FilterApp {
            coordinator,
            classifier,
            repository,
            source,
            mut loop_handle,
            shutdown,
        } = self;

        tracing::info!(target: "app", "interest filter starting");
        coordinator.start();

        if let Some(source) = &source {
            match source.request_more().await {
                Ok(items) => {
                    let accepted = coordinator.enqueue_all(items);
                    tracing::info!(target: "app", accepted, "initial page queued");
                }
                Err(err) => {
                    tracing::warn!(target: "feed", error = %format!("{err:#}"), "initial page failed");
                }
            }
        }

        let reload = {
            let coordinator = coordinator.clone();
            let classifier = classifier.clone();
            shutdown::install_reload_handler(shutdown.subscribe(), move || {
                if let Err(err) = apply_settings(&coordinator, &classifier) {
                    tracing::warn!(target: "app", error = %format!("{err:#}"), "reload failed");
                }
            })
        };

        shutdown.subscribe().notified().await;
        tracing::info!(target: "app", "shutting down");
        coordinator.stop();

        tokio::select! {
            res = &mut loop_handle => {
                if let Err(err) = res {
                    if err.is_panic() {
                        tracing::error!(target: "app", "dispatch loop panicked");
                    }
                }
            }
            _ = tokio::time::sleep(SHUTDOWN_TIMEOUT) => {
                tracing::warn!(
                    target: "app",
                    "dispatch loop did not stop within {:?}; aborting",
                    SHUTDOWN_TIMEOUT
                );
                loop_handle.abort();
            }
        }
        if let Some(reload) = reload {
            reload.abort();
        }

        let stats = coordinator.stats();
        match repository.count().await {
            Ok(total) => tracing::info!(
                target: "db",
                total,
                processed = stats.processed,
                filtered = stats.filtered,
                "filtered items on record"
            ),
            Err(err) => tracing::warn!(target: "db", error = %err, "failed to count filtered items"),
        }
        if let Ok(recent) = repository.recent(RECENT_ON_EXIT).await {
            for entry in recent {
                tracing::info!(
                    target: "db",
                    item_id = %entry.item_id,
                    filtered_at = %entry.filtered_at,
                    "{}",
                    entry.text
                );
            }
        }

        if timeout(SHUTDOWN_TIMEOUT, repository.close()).await.is_err() {
            tracing::warn!(
                target: "db",
                "database close did not finish within {:?}",
                SHUTDOWN_TIMEOUT
            );
        }
        tracing::info!(target: "app", "interest filter stopped");
        Ok(())
    }
}

/// Re-reads `.env` and the environment and pushes the reloadable settings
/// into the running pipeline.
fn apply_settings(coordinator: &DispatchCoordinator, classifier: &ClassifierClient) -> Result<()> {
    dotenvy::dotenv_override().ok();
    let config = config::load_config().context("invalid configuration on reload")?;

    classifier.set_credentials(config.classifier.api_url, config.classifier.api_key);
    coordinator.set_interests(InterestSet::parse(&config.interests));
    apply_batch_size(coordinator, env::var("BATCH_SIZE").ok().as_deref())
}

/// Unlike startup, a reload never falls back to the default size: an
/// out-of-range value is rejected by the queue and the current size stays.
fn apply_batch_size(coordinator: &DispatchCoordinator, raw: Option<&str>) -> Result<()> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(());
    };
    let requested: usize = raw
        .parse()
        .with_context(|| format!("BATCH_SIZE is not a number: {raw}"))?;
    if requested != coordinator.snapshot().batch_size {
        coordinator.set_batch_size(requested)?;
    }
    Ok(())
}
