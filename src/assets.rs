//! Texture assets. Every slot is optional: a missing or broken asset leaves
//! its slot empty and the scene falls back to flat colour.

use std::path::Path;

use image::imageops::FilterType;
use image::RgbaImage;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::textures::{self, Surface};

pub const SLOT_COUNT: usize = 5;

/// Layer of the texture array each asset is uploaded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSlot {
    Concrete,
    Ground,
    Roof,
    Leaf,
    Sky,
}

impl TextureSlot {
    pub const ALL: [TextureSlot; SLOT_COUNT] = [
        TextureSlot::Concrete,
        TextureSlot::Ground,
        TextureSlot::Roof,
        TextureSlot::Leaf,
        TextureSlot::Sky,
    ];

    pub fn layer(self) -> u32 {
        self as u32
    }
}

/// Which slots hold a texture. Cheap to copy into the compositor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Loaded([bool; SLOT_COUNT]);

impl Loaded {
    #[cfg(test)]
    pub fn all() -> Self {
        Self([true; SLOT_COUNT])
    }

    /// `Some(slot)` only if that slot holds a texture.
    pub fn get(&self, slot: TextureSlot) -> Option<TextureSlot> {
        self.0[slot.layer() as usize].then_some(slot)
    }
}

#[derive(Debug, Default)]
pub struct Assets {
    images: [Option<RgbaImage>; SLOT_COUNT],
    size: u32,
}

impl Assets {
    /// Generate the procedural maps and load the optional images. Never fails.
    pub fn load(config: &AppConfig) -> Self {
        let size = config.texture_size;
        let seed = config.seed as u32;
        let mut assets = Self {
            images: Default::default(),
            size,
        };

        for (slot, surface) in [
            (TextureSlot::Concrete, Surface::Concrete),
            (TextureSlot::Ground, Surface::Ground),
            (TextureSlot::Roof, Surface::Roof),
        ] {
            match textures::generate(surface, size, seed.wrapping_add(slot.layer())) {
                Ok(map) => assets.set(slot, map),
                Err(e) => log::warn!("No {:?} texture: {}", slot, e),
            }
        }

        for (slot, path) in [
            (TextureSlot::Leaf, config.leaf_path()),
            (TextureSlot::Sky, config.background_path()),
        ] {
            let Some(path) = path else {
                continue;
            };
            match load_image(path, size) {
                Ok(image) => {
                    log::info!("Loaded {:?} from {:?}", slot, path);
                    assets.set(slot, image);
                }
                Err(e) => log::warn!("{}, falling back to flat colour", e),
            }
        }
        assets
    }

    fn set(&mut self, slot: TextureSlot, image: RgbaImage) {
        self.images[slot.layer() as usize] = Some(image);
    }

    pub fn get(&self, slot: TextureSlot) -> Option<&RgbaImage> {
        self.images[slot.layer() as usize].as_ref()
    }

    pub fn loaded(&self) -> Loaded {
        let mut loaded = [false; SLOT_COUNT];
        for (flag, image) in loaded.iter_mut().zip(&self.images) {
            *flag = image.is_some();
        }
        Loaded(loaded)
    }

    /// Edge length shared by every layer.
    pub fn size(&self) -> u32 {
        self.size
    }
}

fn load_image(path: &Path, size: u32) -> Result<RgbaImage, AppError> {
    let image = image::open(path).map_err(|source| AppError::Asset {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image::imageops::resize(&image.to_rgba8(), size, size, FilterType::Triangle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_images_degrade_to_empty_slots() {
        let config = AppConfig {
            texture_size: 16,
            background_image: Some("does/not/exist.png".into()),
            leaf_texture: Some("nor/this.jpg".into()),
            ..AppConfig::default()
        };
        let assets = Assets::load(&config);
        let loaded = assets.loaded();
        assert_eq!(loaded.get(TextureSlot::Concrete), Some(TextureSlot::Concrete));
        assert_eq!(loaded.get(TextureSlot::Roof), Some(TextureSlot::Roof));
        assert_eq!(loaded.get(TextureSlot::Sky), None);
        assert_eq!(loaded.get(TextureSlot::Leaf), None);
        assert_eq!(assets.get(TextureSlot::Ground).unwrap().dimensions(), (16, 16));
    }

    #[test]
    fn bad_texture_size_leaves_everything_empty() {
        let config = AppConfig {
            texture_size: 0,
            ..AppConfig::default()
        };
        assert_eq!(Assets::load(&config).loaded(), Loaded::default());
    }

    #[test]
    fn load_error_names_the_path() {
        let err = load_image(Path::new("missing-sky.png"), 8).unwrap_err();
        assert!(err.to_string().contains("missing-sky.png"));
    }
}
