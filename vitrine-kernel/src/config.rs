use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};
use tokio::fs;
use tracing::warn;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct KernelConfig {
    pub listen: String,
    /// URL publique du site, préfixe des URLs d'upload renvoyées
    pub public_url: String,
    /// Aucun timeout si absent (comportement historique)
    pub upstream_timeout_secs: Option<u64>,
    pub changelog_path: PathBuf,
    pub uploads_dir: PathBuf,
    pub versions: VersionsConf,
    pub presence: PresenceConf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct VersionsConf {
    pub api_base: String,
    pub ttl_secs: u64,
    pub repos: TrackedRepos,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TrackedRepos {
    pub kitty: RepoConf,
    pub fish: RepoConf,
    pub hyprland: RepoConf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RepoConf {
    pub repo: String,     // ex: "kovidgoyal/kitty"
    pub fallback: String, // servi si release et tags échouent
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PresenceConf {
    pub url: String, // ex: "https://nxapi-presence.fancy.org.uk/api/presence/<nsa id>"
    pub art: ArtConf,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct ArtConf {
    pub width: u32,
    pub height: u32,
    pub color: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".into(),
            public_url: "http://localhost:8080".into(),
            upstream_timeout_secs: None,
            changelog_path: "./data/changelog.json".into(),
            uploads_dir: "./uploads".into(),
            versions: VersionsConf::default(),
            presence: PresenceConf::default(),
        }
    }
}

impl Default for VersionsConf {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".into(),
            ttl_secs: 3600,
            repos: TrackedRepos::default(),
        }
    }
}

impl Default for TrackedRepos {
    fn default() -> Self {
        Self {
            kitty: RepoConf { repo: "kovidgoyal/kitty".into(), fallback: "0.44".into() },
            fish: RepoConf { repo: "fish-shell/fish-shell".into(), fallback: "4.2.1".into() },
            hyprland: RepoConf { repo: "hyprwm/Hyprland".into(), fallback: "0.53".into() },
        }
    }
}

impl Default for PresenceConf {
    fn default() -> Self {
        Self { url: String::new(), art: ArtConf::default() }
    }
}

impl Default for ArtConf {
    fn default() -> Self {
        Self { width: 9, height: 6, color: true }
    }
}

impl KernelConfig {
    pub fn upstream_timeout(&self) -> Option<Duration> {
        self.upstream_timeout_secs.map(Duration::from_secs)
    }

    pub fn versions_ttl(&self) -> Duration {
        Duration::from_secs(self.versions.ttl_secs)
    }
}

/// Secrets lus depuis l'environnement (jamais dans le YAML)
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub admin_key: Option<String>,
    pub github_token: Option<String>,
    pub presence_token: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            admin_key: read("VITRINE_ADMIN_KEY"),
            github_token: read("GITHUB_TOKEN"),
            presence_token: read("VITRINE_PRESENCE_TOKEN"),
        }
    }
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("VITRINE_CONFIG").unwrap_or_else(|_| "vitrine.yaml".into());
    load_config_from(&path).await
}

pub async fn load_config_from(path: impl AsRef<Path>) -> KernelConfig {
    let path = path.as_ref();
    if path.exists() {
        let txt = fs::read_to_string(path).await.unwrap_or_default();
        if txt.trim().is_empty() { return KernelConfig::default(); }
        serde_yaml::from_str(&txt).unwrap_or_else(|e| {
            warn!("config invalide ({}): {e}", path.display());
            KernelConfig::default()
        })
    } else {
        warn!("pas de {}, usage config par défaut", path.display());
        KernelConfig::default()
    }
}
