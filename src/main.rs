use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use soulmatch::config::{LoggingSettings, Settings, StoreBackend};
use soulmatch::core::{Matcher, MatcherOptions, OnboardingRules};
use soulmatch::dispatch::{run_delivery, Dispatcher, DispatcherSettings, Outbox};
use soulmatch::models::ScoringWeights;
use soulmatch::routes::{self, AppState};
use soulmatch::services::{
    CacheManager, CachedStore, Gateway, HttpGateway, LogGateway, MemoryStore, PostgresStore,
    ProfileStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// LOG_LEVEL and LOG_FORMAT take precedence over the [logging] section
fn init_logging(logging: &LoggingSettings) {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| logging.level.clone());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| logging.format.clone());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn startup_error(message: String) -> std::io::Error {
    error!("{}", message);
    std::io::Error::new(std::io::ErrorKind::Other, message)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = Settings::load();
    init_logging(
        settings
            .as_ref()
            .map(|s| &s.logging)
            .unwrap_or(&LoggingSettings::default()),
    );

    info!("Starting SoulMatch service...");

    let settings =
        settings.map_err(|e| startup_error(format!("Failed to load configuration: {}", e)))?;

    info!("Configuration loaded successfully");

    let backend: Arc<dyn ProfileStore> = match settings.database.backend {
        StoreBackend::Postgres => {
            let store = PostgresStore::from_settings(
                &settings.database.url,
                settings.database.max_connections,
                settings.database.min_connections,
                settings.database.acquire_timeout_secs,
                settings.database.idle_timeout_secs,
            )
            .await
            .map_err(|e| startup_error(format!("Failed to connect to PostgreSQL: {}", e)))?;
            info!(
                "PostgreSQL store initialized (max: {} connections)",
                settings.database.max_connections.unwrap_or(10)
            );
            Arc::new(store)
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Profile cache; Redis is optional and the service runs without it
    let cache_ttl = settings.cache.ttl_secs.unwrap_or(300);
    let l1_cache_size = settings.cache.l1_cache_size.unwrap_or(10_000);
    let cache = match CacheManager::new(settings.cache.redis_url.as_deref(), l1_cache_size, cache_ttl).await {
        Ok(cache) => cache,
        Err(e) => {
            error!("Failed to connect to Redis ({}), continuing with the in-process cache only", e);
            CacheManager::in_memory(l1_cache_size, cache_ttl)
        }
    };
    info!("Cache manager initialized (L1: {} entries, TTL: {}s)", l1_cache_size, cache_ttl);

    let store: Arc<dyn ProfileStore> = Arc::new(CachedStore::new(backend, Arc::new(cache)));

    let gateway: Arc<dyn Gateway> = match &settings.gateway.outbound_url {
        Some(url) => {
            let gateway = HttpGateway::new(
                url.clone(),
                settings.gateway.api_token.clone(),
                Duration::from_secs(settings.gateway.timeout_secs),
            )
            .map_err(|e| startup_error(format!("Failed to build gateway client: {}", e)))?;
            info!("Outbound gateway: {}", url);
            Arc::new(gateway)
        }
        None => {
            warn!("No gateway.outbound_url configured, outbound messages are only logged");
            Arc::new(LogGateway)
        }
    };

    let (outbox, outbox_rx) = Outbox::channel();
    tokio::spawn(run_delivery(outbox_rx, gateway));

    let weights = ScoringWeights {
        interests: settings.scoring.weights.interests,
        age: settings.scoring.weights.age,
        distance: settings.scoring.weights.distance,
        photo: settings.scoring.weights.photo,
    };
    let matcher = Matcher::new(
        weights,
        MatcherOptions {
            min_score: settings.matching.min_score,
            require_mutual_preferences: settings.matching.require_mutual_preferences,
        },
    );

    info!("Matcher initialized with weights: {:?}", weights);

    let dispatcher = Dispatcher::new(
        store.clone(),
        matcher,
        outbox,
        DispatcherSettings {
            pool_size: settings.matching.pool_size,
            history_size: settings.matching.history_size,
            onboarding: OnboardingRules {
                min_age: settings.matching.min_age,
                default_max_distance_km: settings.matching.default_max_distance_km,
            },
        },
    );

    let app_state = AppState {
        store,
        dispatcher: Arc::new(dispatcher),
        inbound_secret: settings.gateway.inbound_secret.clone(),
    };

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .configure(routes::configure_extractors)
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
