use std::time::{Duration, Instant};

use sea_orm::Database;
use tokio_util::sync::CancellationToken;
use tracing::info;

use inkwell_core::config::Config;
use inkwell_core::shutdown::shutdown_signal;
use inkwell_core::tracing::init_tracing;
use inkwell_site::config::SiteConfig;
use inkwell_site::infra::challenge_store::{
    ChallengeBackend, MemoryChallengeStore, RedisChallengeStore,
};
use inkwell_site::infra::connections::ConnectionRegistry;
use inkwell_site::infra::events::{EventHub, spawn_ticker};
use inkwell_site::infra::webauthn::WebauthnCeremony;
use inkwell_site::router::build_router;
use inkwell_site::state::AppState;
use inkwell_site_migration::{Migrator, MigratorTrait};

const JANITOR_PERIOD: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    init_tracing();

    let config = SiteConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");
    Migrator::up(&db, None)
        .await
        .expect("failed to run migrations");

    let shutdown = CancellationToken::new();

    let challenges = match &config.redis_url {
        Some(url) => {
            let redis = deadpool_redis::Config::from_url(url)
                .create_pool(Some(deadpool_redis::Runtime::Tokio1))
                .expect("failed to create Redis pool");
            info!("challenge store: redis");
            ChallengeBackend::Redis(RedisChallengeStore { pool: redis })
        }
        None => {
            let store = MemoryChallengeStore::new();
            store.spawn_janitor(JANITOR_PERIOD, shutdown.clone());
            info!("challenge store: memory");
            ChallengeBackend::Memory(store)
        }
    };

    let ceremony = WebauthnCeremony::build(
        &config.webauthn_rp_id,
        &config.webauthn_origin,
        &config.webauthn_rp_name,
    )
    .expect("invalid WebAuthn configuration");

    let hub = EventHub::new(config.stream_buffer);
    let ticker = spawn_ticker(hub.clone(), config.stream_tick(), shutdown.clone());

    let state = AppState {
        db,
        challenges,
        ceremony,
        hub,
        connections: ConnectionRegistry::new(),
        shutdown: shutdown.clone(),
        session_secret: config.session_secret.clone(),
        cookie_secure: config.cookie_secure,
        allow_registration: config.allow_registration,
        challenge_ttl: config.challenge_ttl(),
        started_at: Instant::now(),
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.site_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("site service listening on {addr}");
    // Open streams never finish on their own; cancelling the token ends them so serve can drain.
    let drain = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            drain.cancel();
        })
        .await
        .expect("server error");

    shutdown.cancel();
    let _ = ticker.await;
    info!("site service stopped");
}
