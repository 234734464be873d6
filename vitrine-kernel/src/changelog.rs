/**
 * CHANGELOG - Journal des versions du site
 *
 * RÔLE :
 * Stocke les entrées affichées sur la page changelog du portfolio.
 * Lecture publique, écriture réservée à l'admin (clé API).
 *
 * FONCTIONNEMENT :
 * - Tableau JSON dans un fichier (./data/changelog.json par défaut)
 * - Copie en mémoire, remplacée seulement après réécriture réussie du fichier
 * - Clé unique = champ `version` ; champs inconnus conservés tels quels
 * - Nouvelle entrée insérée en tête (plus récente d'abord)
 *
 * DONNÉES EXEMPLE :
 * ```json
 * { "version": "2.1.0", "date": "2025-03-02", "title": "Easter eggs", "changes": ["ajout du chat"] }
 * ```
 */

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ChangelogError {
    #[error("Entry not found: {0}")]
    NotFound(String),
    #[error("Entry already exists: {0}")]
    Conflict(String),
    #[error("Invalid entry: {0}")]
    Invalid(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangelogEntry {
    #[serde(default)]
    pub version: String,
    /// AAAA-MM-JJ, date du jour si absente à la création
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub changes: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub struct ChangelogStore {
    storage_path: PathBuf,
    // tenu pendant l'écriture disque : une seule modification à la fois
    entries: Mutex<Vec<ChangelogEntry>>,
}

impl ChangelogStore {
    /// Ouvre (ou crée vide) le fichier de stockage
    pub fn open<P: Into<PathBuf>>(storage_path: P) -> Result<Self, ChangelogError> {
        let storage_path = storage_path.into();
        if let Some(parent) = storage_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        if !storage_path.exists() {
            std::fs::write(&storage_path, "[]")?;
        }

        let content = std::fs::read_to_string(&storage_path)?;
        let entries: Vec<ChangelogEntry> = if content.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&content)?
        };

        info!("changelog loaded: {} entries from {:?}", entries.len(), storage_path);
        Ok(Self { storage_path, entries: Mutex::new(entries) })
    }

    pub async fn list(&self) -> Vec<ChangelogEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn get(&self, version: &str) -> Result<ChangelogEntry, ChangelogError> {
        self.entries
            .lock()
            .await
            .iter()
            .find(|e| e.version == version)
            .cloned()
            .ok_or_else(|| ChangelogError::NotFound(version.to_string()))
    }

    pub async fn create(&self, mut entry: ChangelogEntry) -> Result<ChangelogEntry, ChangelogError> {
        entry.version = validate_version(&entry.version)?;
        if entry.date.is_none() {
            entry.date = Some(OffsetDateTime::now_utc().date().to_string());
        }

        let mut entries = self.entries.lock().await;
        if entries.iter().any(|e| e.version == entry.version) {
            return Err(ChangelogError::Conflict(entry.version));
        }
        let mut next = Vec::with_capacity(entries.len() + 1);
        next.push(entry.clone());
        next.extend(entries.iter().cloned());
        self.save(&next).await?;
        *entries = next;

        info!(version = %entry.version, "changelog entry created");
        Ok(entry)
    }

    /// Remplace l'entrée; la version du chemin fait foi, la date est conservée si omise
    pub async fn update(&self, version: &str, mut entry: ChangelogEntry) -> Result<ChangelogEntry, ChangelogError> {
        let mut entries = self.entries.lock().await;
        let idx = entries
            .iter()
            .position(|e| e.version == version)
            .ok_or_else(|| ChangelogError::NotFound(version.to_string()))?;

        entry.version = entries[idx].version.clone();
        if entry.date.is_none() {
            entry.date = entries[idx].date.clone();
        }
        let mut next = entries.clone();
        next[idx] = entry.clone();
        self.save(&next).await?;
        *entries = next;

        info!(version, "changelog entry updated");
        Ok(entry)
    }

    pub async fn delete(&self, version: &str) -> Result<(), ChangelogError> {
        let mut entries = self.entries.lock().await;
        let next: Vec<ChangelogEntry> = entries.iter().filter(|e| e.version != version).cloned().collect();

        if next.len() == entries.len() {
            return Err(ChangelogError::NotFound(version.to_string()));
        }

        self.save(&next).await?;
        *entries = next;
        info!(version, "changelog entry deleted");
        Ok(())
    }

    /// Le disque fait foi : la copie mémoire n'est remplacée qu'après écriture réussie
    async fn save(&self, entries: &[ChangelogEntry]) -> Result<(), ChangelogError> {
        let json = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&self.storage_path, json).await?;
        Ok(())
    }
}

fn validate_version(version: &str) -> Result<String, ChangelogError> {
    let version = version.trim();
    if version.is_empty() {
        return Err(ChangelogError::Invalid("version is required".into()));
    }
    if version.contains('/') {
        return Err(ChangelogError::Invalid("version must not contain '/'".into()));
    }
    Ok(version.to_string())
}
