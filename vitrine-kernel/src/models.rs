use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use serde::{Deserialize, Serialize};

/// Versions des trois dépôts suivis, telles que servies sur /api/versions
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VersionSnapshot {
    pub kitty: String,
    pub fish: String,
    pub hyprland: String,
    /// RFC3339, `None` uniquement pour le snapshot de secours
    pub fetched_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceSnapshot {
    pub username: Option<String>,
    pub image_uri: Option<String>,
    pub pfp_ascii_art: Option<String>,
    pub state: Option<String>,
    pub is_online: bool,
    pub is_playing: bool,
    /// Présent ssi `is_playing`
    pub game: Option<GameInfo>,
    pub updated_at: Option<String>,
    pub logout_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GameInfo {
    pub name: Option<String>,
    pub image_uri: Option<String>,
    pub ascii_art: Option<String>,
    pub shop_uri: Option<String>,
    pub total_play_time: Option<i64>, // minutes
    pub first_played_at: Option<i64>, // secondes epoch, tel quel
}

/// Corps de réponse de /api/nintendo
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PresenceResponse {
    pub presence: PresenceSnapshot,
    pub is_online: bool,
}

/// Format ISO-8601 (RFC3339) utilisé sur l'API
pub fn to_rfc3339(dt: OffsetDateTime) -> Option<String> {
    dt.format(&Rfc3339).ok()
}

/// Secondes epoch amont → RFC3339; 0 ou hors plage → `None`
pub fn epoch_to_rfc3339(secs: i64) -> Option<String> {
    if secs <= 0 {
        return None;
    }
    OffsetDateTime::from_unix_timestamp(secs).ok().and_then(to_rfc3339)
}
