/**
 * SOURCE GITHUB - Lecture des releases et tags des dépôts suivis
 *
 * RÔLE :
 * Fournit au VersionCache les deux requêtes amont dont il a besoin :
 * la dernière release d'un dépôt, et à défaut le premier tag publié.
 *
 * FONCTIONNEMENT :
 * - GET {api_base}/repos/{owner}/{repo}/releases/latest → tag_name
 * - GET {api_base}/repos/{owner}/{repo}/tags → [0].name
 * - Token optionnel (GITHUB_TOKEN) pour relever la limite de débit
 *
 * Le trait ReleaseSource sépare la logique de cache du transport HTTP.
 */

use crate::upstream::{ensure_success, UpstreamError};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use tracing::debug;

#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// `tag_name` de la dernière release (préfixe "v" inclus)
    async fn latest_release_tag(&self, repo: &str) -> Result<String, UpstreamError>;

    /// Nom du premier tag de la liste
    async fn first_tag(&self, repo: &str) -> Result<String, UpstreamError>;
}

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
}

#[derive(Debug, Deserialize)]
struct GitHubTag {
    name: String,
}

#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, UpstreamError> {
        let url = format!("{}{}", self.api_base, path);
        debug!(%url, "github request");

        let mut request = self.http.get(&url).header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        ensure_success(request.send().await?)
    }
}

#[async_trait]
impl ReleaseSource for GithubClient {
    async fn latest_release_tag(&self, repo: &str) -> Result<String, UpstreamError> {
        let release: GitHubRelease = self
            .get(&format!("/repos/{}/releases/latest", repo))
            .await?
            .json()
            .await?;
        Ok(release.tag_name)
    }

    async fn first_tag(&self, repo: &str) -> Result<String, UpstreamError> {
        let tags: Vec<GitHubTag> = self.get(&format!("/repos/{}/tags", repo)).await?.json().await?;
        tags.into_iter().next().map(|t| t.name).ok_or(UpstreamError::NoTags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::build_http_client;
    use vitrine_devkit::{Fixtures, StubResponse, StubUpstream};

    const REPO: &str = "kovidgoyal/kitty";

    fn client_for(stub: &StubUpstream, token: Option<&str>) -> GithubClient {
        let http = build_http_client(None).unwrap();
        GithubClient::new(http, format!("{}/", stub.base_url()), token.map(String::from))
    }

    #[tokio::test]
    async fn test_latest_release_tag() {
        let stub = StubUpstream::start().await.unwrap();
        stub.route(&Fixtures::release_path(REPO), StubResponse::json(&Fixtures::github_release("v0.45.0")));

        let client = client_for(&stub, None);
        assert_eq!(client.latest_release_tag(REPO).await.unwrap(), "v0.45.0");

        let req = &stub.requests()[0];
        assert!(req.user_agent.as_deref().unwrap_or("").starts_with("vitrine-kernel/"));
        assert!(req.authorization.is_none());
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let stub = StubUpstream::start().await.unwrap();
        stub.route(&Fixtures::release_path(REPO), StubResponse::status(404));

        let client = client_for(&stub, None);
        let err = client.latest_release_tag(REPO).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status(s) if s.as_u16() == 404));
    }

    #[tokio::test]
    async fn test_first_tag_and_empty_list() {
        let stub = StubUpstream::start().await.unwrap();
        stub.route(&Fixtures::tags_path(REPO), StubResponse::json(&Fixtures::github_tags(&["v0.9", "v0.8"])));
        stub.route(&Fixtures::tags_path("a/empty"), StubResponse::json(&Fixtures::github_tags(&[])));

        let client = client_for(&stub, Some("secret"));
        assert_eq!(client.first_tag(REPO).await.unwrap(), "v0.9");
        assert!(matches!(client.first_tag("a/empty").await, Err(UpstreamError::NoTags)));

        assert_eq!(stub.requests()[0].authorization.as_deref(), Some("Bearer secret"));
    }
}
