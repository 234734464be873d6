/**
 * VERSION CACHE - Versions courantes de kitty, fish et Hyprland
 *
 * RÔLE :
 * Sert /api/versions : trois numéros de version lus sur GitHub,
 * mémorisés pendant une fenêtre fixe (1h par défaut).
 *
 * FONCTIONNEMENT :
 * - Snapshot frais en mémoire → renvoyé tel quel, aucun appel réseau
 * - Sinon trois lookups lancés en parallèle (tâches tokio)
 * - Lookup : release "latest", sinon premier tag, puis retrait d'un "v" initial
 * - Lookup sans résultat → valeur de repli propre au dépôt
 * - Échec inattendu d'une tâche → snapshot de repli avec `error`, cache NON mis à jour
 *
 * CONCURRENCE :
 * Pas de single-flight : deux requêtes simultanées sur cache expiré
 * déclenchent chacune leur rafraîchissement.
 */

use crate::config::{RepoConf, TrackedRepos};
use crate::github::ReleaseSource;
use crate::models::{to_rfc3339, VersionSnapshot};
use crate::state::SnapshotSlot;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

pub struct VersionCache {
    source: Arc<dyn ReleaseSource>,
    repos: TrackedRepos,
    ttl: Duration,
    slot: SnapshotSlot<VersionSnapshot>,
}

impl VersionCache {
    pub fn new(source: Arc<dyn ReleaseSource>, repos: TrackedRepos, ttl: Duration) -> Self {
        Self { source, repos, ttl, slot: SnapshotSlot::new() }
    }

    pub async fn get_versions(&self) -> VersionSnapshot {
        if let Some(cached) = self.slot.get_fresh(self.ttl) {
            debug!("versions served from cache");
            return cached;
        }

        match self.refresh().await {
            Ok(snapshot) => {
                info!(kitty = %snapshot.kitty, fish = %snapshot.fish, hyprland = %snapshot.hyprland, "versions refreshed");
                self.slot.store(snapshot.clone());
                snapshot
            }
            Err(e) => {
                warn!("version refresh aborted: {}", e);
                self.fallback_snapshot()
            }
        }
    }

    /// Lance les trois lookups en parallèle et fusionne avec les replis
    async fn refresh(&self) -> Result<VersionSnapshot, JoinError> {
        let spawn_lookup = |conf: &RepoConf| {
            let source = Arc::clone(&self.source);
            let repo = conf.repo.clone();
            tokio::spawn(async move { resolve_version(source.as_ref(), &repo).await })
        };

        let (kitty, fish, hyprland) = tokio::try_join!(
            spawn_lookup(&self.repos.kitty),
            spawn_lookup(&self.repos.fish),
            spawn_lookup(&self.repos.hyprland),
        )?;

        Ok(VersionSnapshot {
            kitty: kitty.unwrap_or_else(|| self.repos.kitty.fallback.clone()),
            fish: fish.unwrap_or_else(|| self.repos.fish.fallback.clone()),
            hyprland: hyprland.unwrap_or_else(|| self.repos.hyprland.fallback.clone()),
            fetched_at: to_rfc3339(OffsetDateTime::now_utc()),
            error: None,
        })
    }

    fn fallback_snapshot(&self) -> VersionSnapshot {
        VersionSnapshot {
            kitty: self.repos.kitty.fallback.clone(),
            fish: self.repos.fish.fallback.clone(),
            hyprland: self.repos.hyprland.fallback.clone(),
            fetched_at: None,
            error: Some("Failed to fetch versions".to_string()),
        }
    }
}

/// Version d'un dépôt : release "latest", sinon premier tag. `None` si tout échoue.
pub async fn resolve_version(source: &dyn ReleaseSource, repo: &str) -> Option<String> {
    let tag = match source.latest_release_tag(repo).await {
        Ok(tag) => tag,
        Err(e) => {
            debug!(repo, "latest release unavailable ({}), trying tags", e);
            match source.first_tag(repo).await {
                Ok(tag) => tag,
                Err(e) => {
                    warn!(repo, "no version found: {}", e);
                    return None;
                }
            }
        }
    };
    Some(strip_v(&tag).to_string())
}

/// Retire un seul "v" initial
fn strip_v(tag: &str) -> &str {
    tag.strip_prefix('v').unwrap_or(tag)
}
