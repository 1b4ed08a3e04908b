use crate::{
    cache::TrackCache,
    config::Config,
    credentials::CredentialStore,
    error::AppError,
    health::{CredentialStoreHealthChecker, HealthService, TrackCacheHealthChecker},
    jobs::{Job, JobScheduler, TokenRefreshJob, TrackCacheSweepJob},
    links::{LinkResolver, SongLinkResolver},
    routes::{callback_handler, create_callback_routes, create_health_routes},
    shutdown::{JobSchedulerShutdown, ShutdownCoordinator, ShutdownManager},
    spotify::{SpotifyApi, SpotifyClient},
    telegram::{BotApi, BotHandler, TelegramClient, UpdatePoller},
    tracks::TrackProvider,
};
use axum::Router;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{error, info};

/// Upstream-facing pieces that tests replace with mocks
pub struct ServerComponents {
    pub credentials: Arc<CredentialStore>,
    pub spotify: Arc<dyn SpotifyApi>,
    pub links: Arc<dyn LinkResolver>,
    pub bot_api: Arc<dyn BotApi>,
}

#[derive(Clone)]
pub struct Server {
    pub config: Arc<Config>,
    pub credentials: Arc<CredentialStore>,
    pub track_cache: Arc<TrackCache>,
    pub spotify: Arc<dyn SpotifyApi>,
    pub links: Arc<dyn LinkResolver>,
    pub bot_api: Arc<dyn BotApi>,
    pub tracks: Arc<TrackProvider>,
    pub bot_handler: Arc<BotHandler>,
    pub health_service: Arc<HealthService>,
    pub job_scheduler: Arc<RwLock<JobScheduler>>,
    pub shutdown_coordinator: Arc<ShutdownCoordinator>,
}

impl Server {
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let credentials = Arc::new(CredentialStore::load(&config.storage.tokens_path).await);
        let spotify: Arc<dyn SpotifyApi> = Arc::new(SpotifyClient::new(&config.spotify)?);
        let links: Arc<dyn LinkResolver> = Arc::new(
            SongLinkResolver::new(&config.links)
                .map_err(|e| AppError::Internal(format!("Failed to create link resolver: {e}")))?,
        );
        let bot_api: Arc<dyn BotApi> = Arc::new(
            TelegramClient::new(&config.telegram)
                .map_err(|e| AppError::Internal(format!("Failed to create Telegram client: {e}")))?,
        );

        Ok(Self::with_components(
            config,
            ServerComponents {
                credentials,
                spotify,
                links,
                bot_api,
            },
        )
        .await)
    }

    /// Assemble the server around the given upstream components.
    pub async fn with_components(config: Config, components: ServerComponents) -> Self {
        let ServerComponents {
            credentials,
            spotify,
            links,
            bot_api,
        } = components;

        let track_cache = Arc::new(TrackCache::new(config.cache.track_ttl()));
        let tracks = Arc::new(TrackProvider::new(spotify.clone(), track_cache.clone()));
        let bot_handler = Arc::new(BotHandler::new(
            bot_api.clone(),
            credentials.clone(),
            tracks.clone(),
            links.clone(),
            spotify.clone(),
            config.telegram.bot_username.clone(),
        ));

        let health_service = Arc::new(HealthService::new());
        health_service
            .register(Arc::new(CredentialStoreHealthChecker::new(
                credentials.clone(),
            )))
            .await;
        health_service
            .register(Arc::new(TrackCacheHealthChecker::new(track_cache.clone())))
            .await;

        let shutdown_coordinator = Arc::new(ShutdownCoordinator::new());
        let job_scheduler = Arc::new(RwLock::new(JobScheduler::with_shutdown_coordinator(
            shutdown_coordinator.subscribe(),
        )));

        Self {
            config: Arc::new(config),
            credentials,
            track_cache,
            spotify,
            links,
            bot_api,
            tracks,
            bot_handler,
            health_service,
            job_scheduler,
            shutdown_coordinator,
        }
    }

    /// The periodic jobs. The cache sweep always runs; the hourly token
    /// refresh can be switched off in configuration.
    pub fn jobs(&self) -> Vec<Arc<dyn Job>> {
        let mut jobs: Vec<Arc<dyn Job>> = Vec::new();
        if self.config.jobs.token_refresh_enabled {
            jobs.push(Arc::new(TokenRefreshJob::new(
                self.credentials.clone(),
                self.spotify.clone(),
                self.config.jobs.token_refresh_interval(),
            )));
        }
        jobs.push(Arc::new(TrackCacheSweepJob::new(self.track_cache.clone())));
        jobs
    }

    pub async fn run(&self) -> Result<(), AppError> {
        let mut shutdown_manager = ShutdownManager::new(Duration::from_secs(30));

        self.bot_handler.setup_bot().await;

        self.job_scheduler.write().await.start(self.jobs()).await?;
        shutdown_manager.register(JobSchedulerShutdown::new(self.job_scheduler.clone()));

        let poller = UpdatePoller::new(
            self.bot_api.clone(),
            self.bot_handler.clone(),
            &self.config.telegram,
        )
        .spawn(self.shutdown_coordinator.subscribe());
        shutdown_manager.register_background_task(poller, "Telegram poller", 5);

        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to bind to {addr}: {e}")))?;

        info!("Callback server listening on http://{}", addr);

        let shutdown_coordinator_clone = self.shutdown_coordinator.clone();
        tokio::spawn(async move {
            shutdown_coordinator_clone.wait_for_shutdown_signal().await;
        });

        let coordinator = self.shutdown_coordinator.clone();
        let result = axum::serve(listener, self.create_app())
            .with_graceful_shutdown(async move {
                coordinator.wait_for_shutdown().await;
                info!("Graceful shutdown initiated");
            })
            .await;

        if let Err(e) = result {
            error!("Server error: {}", e);
        }

        // stops the poller and jobs when serving ended on its own
        self.shutdown_coordinator.initiate_shutdown();
        shutdown_manager.shutdown_all().await;
        info!("Server shutdown complete");

        Ok(())
    }

    /// The HTTP surface: `/health` plus the OAuth callback, which also
    /// answers every other path.
    pub fn create_app(&self) -> Router {
        Router::new()
            .merge(create_health_routes())
            .merge(create_callback_routes())
            .fallback(callback_handler)
            .with_state(self.clone())
    }
}
