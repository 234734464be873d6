/*!
Fixtures conformes aux formats amont

- GitHub REST : release "latest" et liste de tags
- Présence Nintendo (format nxapi-presence) : friend → presence → game
- Images PNG unies pour le rendu texte
*/

use anyhow::Result;
use serde_json::{json, Value};
use std::io::Cursor;

pub struct Fixtures;

impl Fixtures {
    /// Chemin GitHub de la dernière release, ex: "/repos/kovidgoyal/kitty/releases/latest"
    pub fn release_path(repo: &str) -> String {
        format!("/repos/{}/releases/latest", repo)
    }

    pub fn tags_path(repo: &str) -> String {
        format!("/repos/{}/tags", repo)
    }

    pub fn github_release(tag: &str) -> Value {
        json!({
            "tag_name": tag,
            "name": tag,
            "body": "",
            "draft": false,
            "prerelease": false,
            "published_at": chrono::Utc::now().to_rfc3339(),
            "assets": []
        })
    }

    pub fn github_tags(names: &[&str]) -> Value {
        Value::Array(
            names
                .iter()
                .map(|n| json!({ "name": n, "commit": { "sha": "0000000" } }))
                .collect(),
        )
    }

    /// Document de présence; `game` = `{}` pour "pas en jeu"
    pub fn presence(name: &str, image_uri: Option<&str>, state: &str, game: Value) -> Value {
        let now = chrono::Utc::now().timestamp();
        json!({
            "friend": {
                "id": "a1b2c3d4",
                "name": name,
                "imageUri": image_uri,
                "presence": {
                    "state": state,
                    "updatedAt": now,
                    "logoutAt": 0,
                    "game": game
                }
            }
        })
    }

    pub fn game(name: &str, image_uri: Option<&str>) -> Value {
        json!({
            "name": name,
            "imageUri": image_uri,
            "shopUri": "https://ec.nintendo.com/apps/0100000000010000/FR",
            "totalPlayTime": 1234,
            "firstPlayedAt": 1_600_000_000,
            "sysDescription": ""
        })
    }

    /// PNG uni de `width`×`height` pixels
    pub fn png(width: u32, height: u32, rgb: [u8; 3]) -> Result<Vec<u8>> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_shape() {
        let doc = Fixtures::presence("mark", Some("http://img/pfp.png"), "PLAYING", Fixtures::game("Zelda", None));
        assert_eq!(doc["friend"]["name"], "mark");
        assert_eq!(doc["friend"]["presence"]["state"], "PLAYING");
        assert_eq!(doc["friend"]["presence"]["game"]["name"], "Zelda");
    }

    #[test]
    fn test_png_decodes() {
        let bytes = Fixtures::png(4, 2, [255, 0, 0]).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (4, 2));
    }

    #[test]
    fn test_github_paths() {
        assert_eq!(Fixtures::release_path("hyprwm/Hyprland"), "/repos/hyprwm/Hyprland/releases/latest");
        assert_eq!(Fixtures::github_tags(&["v0.9"])[0]["name"], "v0.9");
    }
}
