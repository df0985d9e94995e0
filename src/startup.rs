//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tokio::net::TcpListener;

use crate::application::services::{
    ChatService, IdentityResolver, JwtIdentityResolver, PresenceDirectory,
};
use crate::config::Settings;
use crate::domain::{GroupRepository, MessageRepository, UserRepository};
use crate::infrastructure::repositories::{PgGroupRepository, PgMessageRepository, PgUserRepository};
use crate::infrastructure::{database, pubsub};
use crate::presentation::http::handlers::health;
use crate::presentation::http::routes;
use crate::presentation::middleware::{cors, logging};
use crate::presentation::websocket::{RoutingFabric, SessionContext};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: Option<ConnectionManager>,
    pub sessions: SessionContext,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// State backed by PostgreSQL repositories and JWT verification.
    pub fn new(db: PgPool, redis: Option<ConnectionManager>, settings: Settings) -> Self {
        let users: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(db.clone()));
        let groups: Arc<dyn GroupRepository> = Arc::new(PgGroupRepository::new(db.clone()));
        let messages: Arc<dyn MessageRepository> = Arc::new(PgMessageRepository::new(db.clone()));
        let identity: Arc<dyn IdentityResolver> = Arc::new(JwtIdentityResolver::new(&settings.jwt));

        Self::with_collaborators(db, redis, settings, users, groups, messages, identity)
    }

    /// State with caller supplied collaborators.
    pub fn with_collaborators(
        db: PgPool,
        redis: Option<ConnectionManager>,
        settings: Settings,
        users: Arc<dyn UserRepository>,
        groups: Arc<dyn GroupRepository>,
        messages: Arc<dyn MessageRepository>,
        identity: Arc<dyn IdentityResolver>,
    ) -> Self {
        let sessions = SessionContext {
            chat: Arc::new(ChatService::new(users.clone(), groups, messages)),
            presence: PresenceDirectory::new(users.clone()),
            identity,
            users,
            fabric: Arc::new(RoutingFabric::new()),
        };

        Self {
            db,
            redis,
            sessions,
            settings: Arc::new(settings),
        }
    }
}

/// Router with tracing and CORS layers applied.
pub fn build_router(state: AppState) -> Router {
    let cors_layer = cors::create_cors_layer(&state.settings.cors);
    routes::create_router(state)
        .layer(logging::create_trace_layer())
        .layer(cors_layer)
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();

        // Create database pool
        let db = database::create_pool(&settings.database).await?;
        tracing::info!("Database connection pool created");

        if settings.database.run_migrations {
            database::run_migrations(&db).await?;
            tracing::info!("Database migrations applied");
        }

        let redis = if settings.redis.enabled {
            Some(pubsub::create_redis_client(&settings.redis).await?)
        } else {
            None
        };

        let state = AppState::new(db, redis, settings.clone());

        if settings.fabric.relay_enabled {
            let fabric = Arc::clone(&state.sessions.fabric);
            let client = redis::Client::open(settings.redis.url.as_str())?;
            let publisher = pubsub::start_relay(
                client,
                settings.fabric.relay_channel.clone(),
                fabric.node_id(),
                fabric.clone(),
            );
            fabric.attach_relay(publisher);
        }

        let router = build_router(state);

        // Bind to address
        let listener = TcpListener::bind(settings.server_addr()).await?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
