//! Client HTTP partagé vers les services amont (GitHub, présence, images)

use std::time::Duration;

/// Échec d'un appel amont. Jamais exposé tel quel au client HTTP :
/// chaque cache décide du repli.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned {0}")]
    Status(reqwest::StatusCode),
    #[error("no tags published")]
    NoTags,
    #[error("{0} not configured")]
    NotConfigured(&'static str),
}

pub const USER_AGENT: &str = concat!("vitrine-kernel/", env!("CARGO_PKG_VERSION"));

/// Construit le client reqwest commun. `timeout = None` : délai par défaut de reqwest (aucun).
pub fn build_http_client(timeout: Option<Duration>) -> Result<reqwest::Client, UpstreamError> {
    let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Vérifie le statut HTTP avant décodage
pub fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(UpstreamError::Status(response.status()))
    }
}
