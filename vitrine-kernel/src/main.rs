/**
 * VITRINE KERNEL - Point d'entrée du backend portfolio
 *
 * RÔLE : Construit config, clients amont, caches et stores puis sert l'API HTTP.
 *
 * ARCHITECTURE : Pas de tâche de fond ; tout appel amont a lieu pendant
 * le traitement d'une requête entrante.
 */

mod art;
mod changelog;
mod config;
mod github;
mod http;
mod models;
mod presence;
mod state;
mod upload;
mod upstream;
mod versions;

use crate::art::AsciiArtRenderer;
use crate::changelog::ChangelogStore;
use crate::config::{load_config, Secrets};
use crate::github::GithubClient;
use crate::http::AppState;
use crate::presence::{HttpPresenceSource, PresenceCache};
use crate::upload::UploadStore;
use crate::versions::VersionCache;

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vitrine_kernel=info")),
        )
        .init();

    let cfg = load_config().await;
    let secrets = Secrets::from_env();

    if secrets.admin_key.is_none() {
        warn!("VITRINE_ADMIN_KEY not set - changelog/upload writes disabled");
    }
    if cfg.presence.url.trim().is_empty() {
        warn!("presence.url not configured - /api/nintendo will fail");
    }

    // client HTTP partagé par toutes les sources amont
    let http_client = upstream::build_http_client(cfg.upstream_timeout())
        .context("failed to build HTTP client")?;

    let github = GithubClient::new(http_client.clone(), cfg.versions.api_base.clone(), secrets.github_token.clone());
    let versions = VersionCache::new(Arc::new(github), cfg.versions.repos.clone(), cfg.versions_ttl());

    let presence_source = HttpPresenceSource::new(http_client.clone(), cfg.presence.url.clone(), secrets.presence_token.clone());
    let renderer = AsciiArtRenderer::new(http_client);
    let presence = PresenceCache::new(Arc::new(presence_source), Arc::new(renderer), cfg.presence.art);

    let changelog = ChangelogStore::open(&cfg.changelog_path)
        .with_context(|| format!("failed to open changelog at {:?}", cfg.changelog_path))?;

    std::fs::create_dir_all(&cfg.uploads_dir)
        .with_context(|| format!("failed to create uploads dir {:?}", cfg.uploads_dir))?;
    let uploads = UploadStore::new(cfg.uploads_dir.clone(), &cfg.public_url);

    // fabrique l'état unique pour Axum
    let app_state = AppState {
        versions: Arc::new(versions),
        presence: Arc::new(presence),
        changelog: Arc::new(changelog),
        uploads: Arc::new(uploads),
        admin_key: secrets.admin_key.map(Arc::from),
    };

    let app = http::build_router(app_state);

    let addr: SocketAddr = cfg.listen.parse()
        .with_context(|| format!("invalid listen address {:?}", cfg.listen))?;
    info!("listening on http://{addr}");
    let listener = TcpListener::bind(addr).await.context("failed to bind listener")?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
