//! Upload d'images pour le changelog et les pages du site.
//! Un fichier par requête, nommé d'après l'horodatage, servi sous /uploads.

use axum::extract::multipart::{Multipart, MultipartError};
use axum::body::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("no file in request")]
    MissingFile,
    #[error("invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct UploadStore {
    dir: PathBuf,
    public_url: String,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            dir: dir.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Écrit le fichier et renvoie son URL publique
    pub async fn save(&self, original_name: Option<&str>, bytes: &[u8]) -> Result<String, UploadError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let ext = safe_extension(original_name);
        let mut name = format!("{}{}", millis, ext);
        let mut n = 1;
        // create_new : deux uploads de la même milliseconde n'écrivent jamais le même fichier
        let mut file = loop {
            match OpenOptions::new().write(true).create_new(true).open(self.dir.join(&name)).await {
                Ok(file) => break file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    name = format!("{}-{}{}", millis, n, ext);
                    n += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };
        file.write_all(bytes).await?;
        file.flush().await?;

        info!(file = %name, size = bytes.len(), "upload stored");
        Ok(format!("{}/uploads/{}", self.public_url, name))
    }
}

/// Premier champ fichier du formulaire : (nom d'origine, contenu)
pub async fn read_first_file(mut multipart: Multipart) -> Result<(Option<String>, Bytes), UploadError> {
    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_none() && field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;
        return Ok((file_name, bytes));
    }
    Err(UploadError::MissingFile)
}

/// ".png" etc., alphanumérique ASCII uniquement, sinon vide
fn safe_extension(original_name: Option<&str>) -> String {
    original_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}
