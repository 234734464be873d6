/**
 * PRESENCE CACHE - Présence Nintendo Switch du propriétaire du site
 *
 * RÔLE :
 * Sert /api/nintendo : état en ligne, jeu en cours, avatar et jaquette
 * rendus en texte pour l'easter egg du frontend.
 *
 * FONCTIONNEMENT :
 * - Chaque appel interroge l'API de présence (aucune fenêtre de cache)
 * - friend → presence → game extraits niveau par niveau (Option à chaque niveau)
 * - isOnline = state ONLINE ou PLAYING ; isPlaying = objet game non vide
 * - Avatar et jaquette convertis en art texte, échec = champ null
 * - Succès → mémorisé comme "dernière présence connue"
 * - Échec amont → dernière présence connue avec is_online=false,
 *   ou erreur si aucune présence n'a encore été obtenue
 */

use crate::art::ArtRenderer;
use crate::config::ArtConf;
use crate::models::{epoch_to_rfc3339, GameInfo, PresenceResponse, PresenceSnapshot};
use crate::state::SnapshotSlot;
use crate::upstream::{ensure_success, UpstreamError};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============ FORMAT AMONT (nxapi-presence) ============

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct PresenceDocument {
    pub friend: Option<Friend>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Friend {
    pub name: Option<String>,
    pub image_uri: Option<String>,
    pub presence: Option<UpstreamPresence>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct UpstreamPresence {
    pub state: Option<String>,
    pub updated_at: Option<i64>,
    pub logout_at: Option<i64>,
    /// Gardé brut : "en jeu" = au moins une clé
    pub game: Option<Map<String, Value>>,
}

#[derive(Debug, Default)]
struct UpstreamGame {
    name: Option<String>,
    image_uri: Option<String>,
    shop_uri: Option<String>,
    total_play_time: Option<i64>,
    first_played_at: Option<i64>,
}

impl UpstreamGame {
    /// Lecture champ par champ : un type inattendu n'annule que ce champ
    fn from_fields(fields: &Map<String, Value>) -> Self {
        fn field<T: DeserializeOwned>(fields: &Map<String, Value>, key: &str) -> Option<T> {
            let value = fields.get(key).filter(|v| !v.is_null())?;
            serde_json::from_value(value.clone())
                .map_err(|e| info!(key, "game field with unexpected type: {}", e))
                .ok()
        }

        Self {
            name: field(fields, "name"),
            image_uri: field(fields, "imageUri"),
            shop_uri: field(fields, "shopUri"),
            total_play_time: field(fields, "totalPlayTime"),
            first_played_at: field(fields, "firstPlayedAt"),
        }
    }
}

// ============ SOURCE ============

#[async_trait]
pub trait PresenceSource: Send + Sync {
    async fn fetch(&self) -> Result<PresenceDocument, UpstreamError>;
}

pub struct HttpPresenceSource {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpPresenceSource {
    pub fn new(http: reqwest::Client, url: impl Into<String>, token: Option<String>) -> Self {
        Self { http, url: url.into(), token }
    }
}

#[async_trait]
impl PresenceSource for HttpPresenceSource {
    async fn fetch(&self) -> Result<PresenceDocument, UpstreamError> {
        if self.url.trim().is_empty() {
            return Err(UpstreamError::NotConfigured("presence url"));
        }
        let mut request = self.http.get(&self.url);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        Ok(ensure_success(request.send().await?)?.json().await?)
    }
}

// ============ CACHE ============

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// Échec amont sans présence connue à servir
    #[error("{0}")]
    Upstream(#[from] UpstreamError),
}

pub struct PresenceCache {
    source: Arc<dyn PresenceSource>,
    renderer: Arc<dyn ArtRenderer>,
    art: ArtConf,
    last_known: SnapshotSlot<PresenceSnapshot>,
}

impl PresenceCache {
    pub fn new(source: Arc<dyn PresenceSource>, renderer: Arc<dyn ArtRenderer>, art: ArtConf) -> Self {
        Self { source, renderer, art, last_known: SnapshotSlot::new() }
    }

    pub async fn get_presence(&self) -> Result<PresenceResponse, PresenceError> {
        match self.source.fetch().await {
            Ok(doc) => {
                let snapshot = self.build_snapshot(doc).await;
                debug!(state = ?snapshot.state, playing = snapshot.is_playing, "presence fetched");
                self.last_known.store(snapshot.clone());
                Ok(PresenceResponse { is_online: snapshot.is_online, presence: snapshot })
            }
            Err(e) => match self.last_known.get() {
                Some(stale) => {
                    warn!("presence fetch failed, serving last known: {}", e);
                    Ok(PresenceResponse { presence: stale, is_online: false })
                }
                None => {
                    warn!("presence fetch failed, nothing cached: {}", e);
                    Err(e.into())
                }
            },
        }
    }

    async fn build_snapshot(&self, doc: PresenceDocument) -> PresenceSnapshot {
        let friend = doc.friend.unwrap_or_default();
        let presence = friend.presence.unwrap_or_default();

        let is_online = matches!(presence.state.as_deref(), Some("ONLINE") | Some("PLAYING"));
        let game = presence
            .game
            .filter(|fields| !fields.is_empty())
            .map(|fields| UpstreamGame::from_fields(&fields));
        let is_playing = game.is_some();

        let game_image = game.as_ref().and_then(|g| g.image_uri.as_deref());
        let (pfp_ascii_art, game_ascii_art) = tokio::join!(
            self.render_art(friend.image_uri.as_deref()),
            self.render_art(game_image),
        );

        PresenceSnapshot {
            username: friend.name,
            image_uri: friend.image_uri,
            pfp_ascii_art,
            state: presence.state,
            is_online,
            is_playing,
            game: game.map(|g| GameInfo {
                name: g.name,
                image_uri: g.image_uri,
                ascii_art: game_ascii_art,
                shop_uri: g.shop_uri,
                total_play_time: g.total_play_time,
                first_played_at: g.first_played_at,
            }),
            updated_at: presence.updated_at.and_then(epoch_to_rfc3339),
            logout_at: presence.logout_at.and_then(epoch_to_rfc3339),
        }
    }

    /// Échec de conversion avalé : champ null
    async fn render_art(&self, uri: Option<&str>) -> Option<String> {
        let uri = uri?;
        match self.renderer.render(uri, self.art).await {
            Ok(art) => Some(art),
            Err(e) => {
                warn!(uri, "art conversion failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::art::ArtError;
    use crate::upstream::build_http_client;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vitrine_devkit::{Fixtures, StubResponse, StubUpstream};

    /// Document courant; `None` = panne amont
    struct FakeSource {
        next: Mutex<Option<Value>>,
        fetches: AtomicUsize,
    }

    impl FakeSource {
        fn new(doc: Option<Value>) -> Arc<Self> {
            Arc::new(Self { next: Mutex::new(doc), fetches: AtomicUsize::new(0) })
        }
        fn set(&self, doc: Option<Value>) {
            *self.next.lock() = doc;
        }
    }

    #[async_trait]
    impl PresenceSource for FakeSource {
        async fn fetch(&self) -> Result<PresenceDocument, UpstreamError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let doc = self.next.lock().clone();
            match doc {
                Some(v) => Ok(serde_json::from_value(v).expect("fixture must parse")),
                None => Err(UpstreamError::Status(reqwest::StatusCode::BAD_GATEWAY)),
            }
        }
    }

    /// "art:<uri>", échoue pour les URIs contenant "broken"
    struct FakeRenderer;

    #[async_trait]
    impl ArtRenderer for FakeRenderer {
        async fn render(&self, image_uri: &str, _opts: ArtConf) -> Result<String, ArtError> {
            if image_uri.contains("broken") {
                Err(ArtError::InvalidSize(0, 0))
            } else {
                Ok(format!("art:{}", image_uri))
            }
        }
    }

    fn cache_with(source: Arc<FakeSource>) -> PresenceCache {
        PresenceCache::new(source, Arc::new(FakeRenderer), ArtConf::default())
    }

    fn playing_doc() -> Value {
        Fixtures::presence("mark", Some("http://img/pfp.png"), "PLAYING", Fixtures::game("Zelda", Some("http://img/zelda.jpg")))
    }

    #[tokio::test]
    async fn test_playing_with_game() {
        let cache = cache_with(FakeSource::new(Some(playing_doc())));
        let resp = cache.get_presence().await.unwrap();
        let p = &resp.presence;

        assert!(resp.is_online);
        assert!(p.is_online && p.is_playing);
        assert_eq!(p.username.as_deref(), Some("mark"));
        assert_eq!(p.pfp_ascii_art.as_deref(), Some("art:http://img/pfp.png"));

        let game = p.game.as_ref().expect("game present when playing");
        assert_eq!(game.name.as_deref(), Some("Zelda"));
        assert_eq!(game.ascii_art.as_deref(), Some("art:http://img/zelda.jpg"));
        assert_eq!(game.total_play_time, Some(1234));
        assert!(p.updated_at.is_some());
        assert!(p.logout_at.is_none());
    }

    #[tokio::test]
    async fn test_offline_with_empty_game() {
        let doc = Fixtures::presence("mark", None, "OFFLINE", json!({}));
        let resp = cache_with(FakeSource::new(Some(doc))).get_presence().await.unwrap();

        assert!(!resp.is_online);
        assert!(!resp.presence.is_playing);
        assert!(resp.presence.game.is_none());
        assert!(resp.presence.pfp_ascii_art.is_none());
    }

    #[tokio::test]
    async fn test_online_without_game_key() {
        let doc = json!({"friend": {"name": "mark", "presence": {"state": "ONLINE"}}});
        let resp = cache_with(FakeSource::new(Some(doc))).get_presence().await.unwrap();

        assert!(resp.is_online);
        assert!(!resp.presence.is_playing);
        assert!(resp.presence.game.is_none());
    }

    #[tokio::test]
    async fn test_missing_nesting_levels() {
        let resp = cache_with(FakeSource::new(Some(json!({})))).get_presence().await.unwrap();
        let p = resp.presence;
        assert!(p.username.is_none() && p.state.is_none() && p.updated_at.is_none());
        assert!(!p.is_online && !p.is_playing);

        let resp = cache_with(FakeSource::new(Some(json!({"friend": {"presence": null}}))))
            .get_presence()
            .await
            .unwrap();
        assert!(!resp.is_online);
    }

    #[tokio::test]
    async fn test_oddly_shaped_game_still_counts_as_playing() {
        let doc = json!({"friend": {"presence": {"state": "PLAYING", "game": {"name": 42}}}});
        let resp = cache_with(FakeSource::new(Some(doc))).get_presence().await.unwrap();
        assert!(resp.presence.is_playing);
        assert_eq!(resp.presence.game, Some(GameInfo::default()));
    }

    #[tokio::test]
    async fn test_bad_game_field_keeps_the_others() {
        let doc = json!({"friend": {"presence": {"state": "PLAYING", "game": {
            "name": "Zelda", "imageUri": "http://img/zelda.jpg", "totalPlayTime": "lots", "firstPlayedAt": 1_600_000_000
        }}}});
        let resp = cache_with(FakeSource::new(Some(doc))).get_presence().await.unwrap();
        let game = resp.presence.game.unwrap();

        assert_eq!(game.name.as_deref(), Some("Zelda"));
        assert_eq!(game.image_uri.as_deref(), Some("http://img/zelda.jpg"));
        assert_eq!(game.ascii_art.as_deref(), Some("art:http://img/zelda.jpg"));
        assert_eq!(game.total_play_time, None);
        assert_eq!(game.first_played_at, Some(1_600_000_000));
    }

    #[tokio::test]
    async fn test_art_failure_leaves_field_null() {
        let doc = Fixtures::presence("mark", Some("http://img/broken.png"), "PLAYING", Fixtures::game("Zelda", Some("http://img/zelda.jpg")));
        let resp = cache_with(FakeSource::new(Some(doc))).get_presence().await.unwrap();

        assert!(resp.presence.pfp_ascii_art.is_none());
        assert_eq!(resp.presence.game.unwrap().ascii_art.as_deref(), Some("art:http://img/zelda.jpg"));
    }

    #[tokio::test]
    async fn test_every_call_fetches() {
        let source = FakeSource::new(Some(playing_doc()));
        let cache = cache_with(source.clone());
        cache.get_presence().await.unwrap();
        cache.get_presence().await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_after_success_serves_stale_offline() {
        let source = FakeSource::new(Some(playing_doc()));
        let cache = cache_with(source.clone());
        let fresh = cache.get_presence().await.unwrap();

        source.set(None);
        let stale = cache.get_presence().await.unwrap();
        assert!(!stale.is_online);
        assert_eq!(stale.presence, fresh.presence);
    }

    #[tokio::test]
    async fn test_failure_without_prior_is_error() {
        let cache = cache_with(FakeSource::new(None));
        let err = cache.get_presence().await.unwrap_err();
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn test_http_source_against_stub() {
        let stub = StubUpstream::start().await.unwrap();
        stub.route("/api/presence/abc", StubResponse::json(&playing_doc()));
        stub.route("/api/presence/down", StubResponse::status(500));
        let http = build_http_client(None).unwrap();

        let source = HttpPresenceSource::new(http.clone(), stub.url("/api/presence/abc"), Some("tok".into()));
        let doc = source.fetch().await.unwrap();
        let friend = doc.friend.unwrap();
        assert_eq!(friend.name.as_deref(), Some("mark"));
        assert_eq!(friend.presence.unwrap().state.as_deref(), Some("PLAYING"));
        assert_eq!(stub.requests()[0].authorization.as_deref(), Some("Bearer tok"));

        let down = HttpPresenceSource::new(http.clone(), stub.url("/api/presence/down"), None);
        assert!(matches!(down.fetch().await, Err(UpstreamError::Status(_))));

        let unset = HttpPresenceSource::new(http, "", None);
        assert!(matches!(unset.fetch().await, Err(UpstreamError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_stale_snapshot_when_upstream_goes_down() {
        let stub = StubUpstream::start().await.unwrap();
        stub.route("/api/presence/me", StubResponse::json(&playing_doc()));
        let source = HttpPresenceSource::new(build_http_client(None).unwrap(), stub.url("/api/presence/me"), None);
        let cache = PresenceCache::new(Arc::new(source), Arc::new(FakeRenderer), ArtConf::default());

        let fresh = cache.get_presence().await.unwrap();
        assert!(fresh.is_online);

        // l'API tombe après un premier succès
        stub.remove_route("/api/presence/me");
        let stale = cache.get_presence().await.unwrap();
        assert!(!stale.is_online);
        assert_eq!(stale.presence, fresh.presence);
        assert_eq!(stub.hits("/api/presence/me"), 2);
    }
}
