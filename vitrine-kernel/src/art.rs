//! Rendu texte (ASCII couleur) d'une image distante
//!
//! L'image est téléchargée, réduite pour tenir dans une boîte `width`×`height`
//! (ratio conservé), puis chaque pixel devient un caractère choisi selon sa
//! luminosité, coloré en ANSI 24 bits si demandé.

use crate::config::ArtConf;
use crate::upstream::{ensure_success, UpstreamError};
use async_trait::async_trait;
use image::{imageops::FilterType, DynamicImage};

/// Du plus clair au plus dense
const RAMP: &[char] = &[' ', '.', ',', ':', ';', 'i', '1', 't', 'f', 'L', 'C', 'G', '0', '8', '@'];
const RESET: &str = "\x1b[0m";

#[derive(Debug, thiserror::Error)]
pub enum ArtError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("invalid art size {0}x{1}")]
    InvalidSize(u32, u32),
}

#[async_trait]
pub trait ArtRenderer: Send + Sync {
    async fn render(&self, image_uri: &str, opts: ArtConf) -> Result<String, ArtError>;
}

pub struct AsciiArtRenderer {
    http: reqwest::Client,
}

impl AsciiArtRenderer {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ArtRenderer for AsciiArtRenderer {
    async fn render(&self, image_uri: &str, opts: ArtConf) -> Result<String, ArtError> {
        let response = self.http.get(image_uri).send().await.map_err(UpstreamError::from)?;
        let bytes = ensure_success(response)?.bytes().await.map_err(UpstreamError::from)?;
        let img = image::load_from_memory(&bytes)?;
        render_image(&img, opts)
    }
}

/// Dimensions (colonnes, lignes) de l'image réduite dans la boîte, ratio conservé.
/// Le côté limitant prend exactement la taille de la boîte, l'autre est arrondi par défaut.
pub fn box_fit(img_w: u32, img_h: u32, box_w: u32, box_h: u32) -> (u32, u32) {
    let (iw, ih, bw, bh) = (img_w as u64, img_h as u64, box_w as u64, box_h as u64);
    if iw * bh >= ih * bw {
        let h = (ih * bw / iw.max(1)) as u32;
        (box_w, h.clamp(1, box_h))
    } else {
        let w = (iw * bh / ih.max(1)) as u32;
        (w.clamp(1, box_w), box_h)
    }
}

pub fn render_image(img: &DynamicImage, opts: ArtConf) -> Result<String, ArtError> {
    if opts.width == 0 || opts.height == 0 || img.width() == 0 || img.height() == 0 {
        return Err(ArtError::InvalidSize(opts.width, opts.height));
    }

    let (cols, rows) = box_fit(img.width(), img.height(), opts.width, opts.height);
    let small = img.resize_exact(cols, rows, FilterType::Triangle).to_rgba8();

    let lines: Vec<String> = small
        .rows()
        .map(|row| {
            let mut line = String::new();
            for px in row {
                let [r, g, b, a] = px.0;
                let c = ramp_char(r, g, b, a);
                if opts.color {
                    line.push_str(&format!("\x1b[38;2;{};{};{}m{}", r, g, b, c));
                } else {
                    line.push(c);
                }
            }
            if opts.color {
                line.push_str(RESET);
            }
            line
        })
        .collect();

    Ok(lines.join("\n"))
}

fn ramp_char(r: u8, g: u8, b: u8, a: u8) -> char {
    // luminance Rec. 601, pondérée par l'alpha
    let lum = (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64) * (a as f64 / 255.0);
    let idx = ((lum / 255.0) * (RAMP.len() - 1) as f64).round() as usize;
    RAMP[idx.min(RAMP.len() - 1)]
}
