/*!
Stub HTTP des services amont pour tester sans réseau

Démarre un serveur axum local (port éphémère) qui sert des réponses figées
par chemin et enregistre chaque requête reçue. Les routes peuvent être
modifiées en cours de test (ex: faire tomber l'API après un premier succès).
*/

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use anyhow::Result;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub user_agent: Option<String>,
}

/// Réponse figée servie pour un chemin
#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl StubResponse {
    pub fn json(value: &Value) -> Self {
        Self {
            status: 200,
            content_type: "application/json".to_string(),
            body: serde_json::to_vec(value).unwrap_or_default(),
        }
    }

    /// Réponse d'erreur avec un corps JSON façon GitHub
    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: "application/json".to_string(),
            body: br#"{"message":"stub error"}"#.to_vec(),
        }
    }

    pub fn bytes<S: Into<String>>(content_type: S, body: Vec<u8>) -> Self {
        Self { status: 200, content_type: content_type.into(), body }
    }
}

/// Serveur amont simulé, clonable (état partagé)
#[derive(Clone)]
pub struct StubUpstream {
    addr: SocketAddr,
    routes: Arc<Mutex<HashMap<String, StubResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl StubUpstream {
    /// Démarre le stub sur 127.0.0.1 (port choisi par l'OS)
    pub async fn start() -> Result<Self> {
        let _ = env_logger::builder().is_test(true).try_init();

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let stub = Self {
            addr: listener.local_addr()?,
            routes: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: Arc::new(Mutex::new(None)),
        };

        let app = Router::new().fallback(serve_stub).with_state(stub.clone());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::warn!("[stub] server stopped: {}", e);
            }
        });

        log::info!("[stub] listening on {}", stub.addr);
        Ok(stub)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Installe (ou remplace) la réponse servie pour `path`
    pub fn route(&self, path: &str, response: StubResponse) -> &Self {
        self.routes.lock().unwrap().insert(path.to_string(), response);
        self
    }

    pub fn remove_route(&self, path: &str) {
        self.routes.lock().unwrap().remove(path);
    }

    /// Latence ajoutée à chaque réponse
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Toutes les requêtes reçues (pour assertions de tests)
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    pub fn total_hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Reset les requêtes enregistrées (les routes restent)
    pub fn clear(&self) {
        self.requests.lock().unwrap().clear();
    }
}

async fn serve_stub(State(stub): State<StubUpstream>, req: Request) -> Response {
    // le corps n'est pas Sync : on ne garde que les métadonnées avant tout .await
    let recorded = {
        let header_str = |name: header::HeaderName| {
            req.headers().get(name).and_then(|v| v.to_str().ok()).map(|s| s.to_string())
        };
        RecordedRequest {
            method: req.method().to_string(),
            path: req.uri().path().to_string(),
            authorization: header_str(header::AUTHORIZATION),
            user_agent: header_str(header::USER_AGENT),
        }
    };
    drop(req);
    log::info!("[stub] {} {}", recorded.method, recorded.path);

    let response = stub.routes.lock().unwrap().get(&recorded.path).cloned();
    stub.requests.lock().unwrap().push(recorded);

    let delay = *stub.delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    match response {
        Some(r) => {
            let status = StatusCode::from_u16(r.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, [(header::CONTENT_TYPE, r.content_type)], r.body).into_response()
        }
        None => (StatusCode::NOT_FOUND, [(header::CONTENT_TYPE, "application/json".to_string())],
                 br#"{"message":"Not Found"}"#.to_vec()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_serves_routes_and_records() {
        let stub = StubUpstream::start().await.unwrap();
        stub.route("/hello", StubResponse::json(&serde_json::json!({"ok": true})));

        let client = reqwest::Client::new();
        let body: Value = client.get(stub.url("/hello")).send().await.unwrap().json().await.unwrap();
        assert_eq!(body["ok"], true);

        let missing = client.get(stub.url("/nope")).send().await.unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

        assert_eq!(stub.hits("/hello"), 1);
        assert_eq!(stub.total_hits(), 2);

        stub.clear();
        assert_eq!(stub.total_hits(), 0);
    }

    #[tokio::test]
    async fn test_route_can_be_replaced() {
        let stub = StubUpstream::start().await.unwrap();
        stub.route("/x", StubResponse::json(&serde_json::json!(1)));
        stub.route("/x", StubResponse::status(503));

        let resp = reqwest::get(stub.url("/x")).await.unwrap();
        assert_eq!(resp.status().as_u16(), 503);
    }

    #[tokio::test]
    async fn test_removed_route_falls_back_to_404() {
        let stub = StubUpstream::start().await.unwrap();
        stub.route("/x", StubResponse::json(&serde_json::json!({"ok": true})));
        assert_eq!(reqwest::get(stub.url("/x")).await.unwrap().status().as_u16(), 200);

        stub.remove_route("/x");
        assert_eq!(reqwest::get(stub.url("/x")).await.unwrap().status().as_u16(), 404);
        assert_eq!(stub.hits("/x"), 2);
    }

    #[tokio::test]
    async fn test_delay_is_applied() {
        let stub = StubUpstream::start().await.unwrap();
        stub.route("/slow", StubResponse::status(200));
        stub.set_delay(Some(Duration::from_millis(150)));

        let start = std::time::Instant::now();
        reqwest::get(stub.url("/slow")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(150));

        stub.set_delay(None);
        let resp = reqwest::get(stub.url("/slow")).await.unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }
}
