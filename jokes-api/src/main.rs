use crate::{
    auth::{JwkSource, RemoteJwkSet, TokenValidation, TokenVerifier},
    server::ServerState,
    service::JokeService,
};
use jokes_db::{DbError, JokeRepository, client::DbClient, memory::MemoryDb};
use serde::Deserialize;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

mod auth;
mod server;
mod service;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error building JWK set client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("Error setting up database: {0}")]
    Database(#[from] DbError),
    #[error("Error installing signal handler: {0}")]
    Signal(std::io::Error),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: Option<String>,
    #[serde(default = "default_database_max_connections")]
    database_max_connections: u32,
    #[serde(default = "default_run_migrations")]
    run_migrations: bool,
    jwk_set_uri: Url,
    jwt_issuer: Option<String>,
    jwt_audience: Option<String>,
    #[serde(default = "default_jwt_leeway_seconds")]
    jwt_leeway_seconds: u64,
    #[serde(default = "default_jwks_cache_seconds")]
    jwks_cache_seconds: u64,
    #[serde(default = "default_jwks_min_refetch_seconds")]
    jwks_min_refetch_seconds: u64,
}

fn default_database_max_connections() -> u32 {
    5
}

fn default_run_migrations() -> bool {
    true
}

fn default_jwt_leeway_seconds() -> u64 {
    60
}

fn default_jwks_cache_seconds() -> u64 {
    300
}

fn default_jwks_min_refetch_seconds() -> u64 {
    10
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "jokes_api=debug,jokes_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn repository(env: &Env) -> Result<Arc<dyn JokeRepository>, InitError> {
    let Some(database_url) = &env.database_url else {
        warn!("DATABASE_URL is not set, jokes are kept in memory only");
        return Ok(Arc::new(MemoryDb::new()));
    };

    let client = DbClient::connect(database_url, env.database_max_connections).await?;
    if env.run_migrations {
        client.migrate().await?;
    }

    Ok(Arc::new(client))
}

fn verifier(env: &Env) -> Result<TokenVerifier, InitError> {
    let keys = RemoteJwkSet::new(
        env.jwk_set_uri.clone(),
        Duration::from_secs(env.jwks_cache_seconds),
        Duration::from_secs(env.jwks_min_refetch_seconds),
    )?;
    let validation = TokenValidation {
        issuer: env.jwt_issuer.clone(),
        audience: env.jwt_audience.clone(),
        leeway_seconds: env.jwt_leeway_seconds,
    };

    Ok(TokenVerifier::new(JwkSource::Remote(keys), validation))
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<(), InitError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).map_err(InitError::Signal)?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map_err(InitError::Signal)?,
        _ = sigterm.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<(), InitError> {
    tokio::signal::ctrl_c().await.map_err(InitError::Signal)
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let state = ServerState {
        jokes: Arc::new(JokeService::new(repository(&env).await?)),
        verifier: Arc::new(verifier(&env)?),
    };
    let app = server::app(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = shutdown_signal().await {
                warn!(error = %err, "Serving without graceful shutdown");
                std::future::pending::<()>().await;
            }
            info!("Shutting down");
        })
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
