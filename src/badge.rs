//! Badge image composition.
//!
//! Pure drawing over a fixed template: the posted form fields are rendered
//! line by line onto a copy of the template image, and the result is
//! written as a JPEG with a random file name, ready for the access-point
//! upload. No state is kept between compositions.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rand::Rng;
use serde::Deserialize;

use crate::config::BadgeSettings;
use crate::encode::encode_jpeg;
use crate::frame::Frame;
use crate::glyph;

/// Output quality for composed badges.
const BADGE_JPEG_QUALITY: u8 = 90;
/// Left margin for every text line.
const MARGIN_X: i32 = 24;
/// Top of the first (nickname) line.
const TOP_Y: i32 = 24;
/// Glyph scale of the nickname line.
const NICKNAME_SCALE: i32 = 4;
/// Glyph scale of the remaining lines.
const LINE_SCALE: i32 = 2;
/// Ink color drawn onto the template.
const INK: [u8; 3] = [16, 16, 16];

/// Form fields drawn onto the badge. Missing fields stay blank.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BadgeFields {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub habitat: String,
    #[serde(default)]
    pub space: String,
    #[serde(default)]
    pub languages: String,
    #[serde(default)]
    pub dect: String,
    #[serde(default)]
    pub pronouns: String,
}

/// Compose a badge over the configured template and write it into the
/// output directory under a random name. Returns the written path.
pub fn compose(fields: &BadgeFields, settings: &BadgeSettings) -> Result<PathBuf> {
    let template = image::open(&settings.template_path)
        .with_context(|| {
            format!(
                "load badge template {}",
                settings.template_path.display()
            )
        })?
        .to_rgb8();
    let (width, height) = (template.width(), template.height());
    let mut badge = Frame::from_rgb8(width, height, template.into_raw())?;

    let mut y = TOP_Y;
    if !fields.nickname.is_empty() {
        draw_line(&mut badge, fields.nickname.clone(), y, NICKNAME_SCALE);
    }
    y += glyph::GLYPH_HEIGHT * NICKNAME_SCALE + 16;

    for line in [
        fields.habitat.clone(),
        join_pair(&fields.space, &fields.languages),
        join_pair(&fields.dect, &fields.pronouns),
    ] {
        if !line.is_empty() {
            draw_line(&mut badge, line, y, LINE_SCALE);
        }
        y += glyph::GLYPH_HEIGHT * LINE_SCALE + 10;
    }

    let jpeg = encode_jpeg(&badge, BADGE_JPEG_QUALITY)?;

    fs::create_dir_all(&settings.output_dir).with_context(|| {
        format!(
            "create badge output directory {}",
            settings.output_dir.display()
        )
    })?;
    let path = settings
        .output_dir
        .join(format!("{}.jpg", random_image_name()));
    fs::write(&path, jpeg).with_context(|| format!("write badge {}", path.display()))?;
    Ok(path)
}

fn draw_line(badge: &mut Frame, text: String, y: i32, scale: i32) {
    let width = badge.width();
    let height = badge.height();
    glyph::draw_text(badge.data_mut(), width, height, MARGIN_X, y, &text, INK, scale);
}

fn join_pair(left: &str, right: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (true, true) => String::new(),
        (false, true) => left.to_string(),
        (true, false) => right.to_string(),
        (false, false) => format!("{}  {}", left, right),
    }
}

/// Random 10-character uppercase alphanumeric image name.
pub fn random_image_name() -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..10)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(dir: &std::path::Path) -> BadgeSettings {
        BadgeSettings {
            template_path: dir.join("template.png"),
            output_dir: dir.join("user"),
        }
    }

    fn write_template(settings: &BadgeSettings, width: u32, height: u32) {
        let template =
            image::RgbImage::from_pixel(width, height, image::Rgb([250, 250, 250]));
        template.save(&settings.template_path).expect("save template");
    }

    #[test]
    fn compose_writes_a_jpeg_with_template_dimensions() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let settings = settings(dir.path());
        write_template(&settings, 296, 128);

        let fields = BadgeFields {
            nickname: "GRACE".to_string(),
            habitat: "CHAOS".to_string(),
            dect: "1234".to_string(),
            ..BadgeFields::default()
        };
        let path = compose(&fields, &settings)?;

        let bytes = fs::read(&path)?;
        assert!(!bytes.is_empty());
        let decoded = image::load_from_memory(&bytes)?.to_rgb8();
        assert_eq!((decoded.width(), decoded.height()), (296, 128));

        // Ink actually landed on the template (JPEG smears the exact
        // values, so look for dark pixels on the light background).
        assert!(decoded.pixels().any(|px| px.0.iter().all(|&c| c < 100)));

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with(".jpg"));
        assert_eq!(name.len(), 10 + 4);
        Ok(())
    }

    #[test]
    fn compose_fails_without_a_template() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        assert!(compose(&BadgeFields::default(), &settings).is_err());
    }

    #[test]
    fn random_names_are_uppercase_alphanumeric() {
        for _ in 0..20 {
            let name = random_image_name();
            assert_eq!(name.len(), 10);
            assert!(name
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }
}
