//! Procedural texture maps for concrete, ground and roofs.
//! RGB carries base colour, alpha carries roughness.

use image::{Rgba, RgbaImage};
use noise::{Fbm, NoiseFn, Perlin};

use crate::error::AppError;

pub const MAX_TEXTURE_SIZE: u32 = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Concrete,
    Ground,
    Roof,
}

/// Generate the map for `surface`. Only the size can make this fail.
pub fn generate(surface: Surface, size: u32, seed: u32) -> Result<RgbaImage, AppError> {
    if size == 0 || size > MAX_TEXTURE_SIZE {
        return Err(AppError::TextureSize(size));
    }
    let fbm: Fbm<Perlin> = Fbm::new(seed);
    let scale = 8.0 / size as f64;
    let sample = |x: u32, y: u32, freq: f64| -> f32 {
        let n = fbm.get([x as f64 * scale * freq, y as f64 * scale * freq]);
        ((n + 1.0) * 0.5).clamp(0.0, 1.0) as f32
    };

    let image = match surface {
        Surface::Concrete => RgbaImage::from_fn(size, size, |x, y| {
            let n = sample(x, y, 1.0);
            let speck = sample(x, y, 6.0);
            let grey = 0.45 + n * 0.2 + (speck - 0.5) * 0.08;
            pixel([grey, grey * 0.98, grey * 0.95], 0.75 + speck * 0.2)
        }),
        Surface::Ground => RgbaImage::from_fn(size, size, |x, y| {
            let n = sample(x, y, 0.5);
            let grit = sample(x, y, 4.0);
            let base = 0.22 + n * 0.12;
            pixel([base * 0.9, base + grit * 0.05, base * 0.85], 0.9 - n * 0.3)
        }),
        Surface::Roof => {
            // Tar roof with seams every 16 px.
            RgbaImage::from_fn(size, size, |x, y| {
                let n = sample(x, y, 2.0);
                let seam = x % 16 == 0 || y % 16 == 0;
                let shade = if seam { 0.08 } else { 0.18 + n * 0.1 };
                pixel([shade, shade, shade * 1.05], if seam { 0.5 } else { 0.95 })
            })
        }
    };
    log::debug!("Generated {:?} map {}x{}", surface, size, size);
    Ok(image)
}

fn pixel(rgb: [f32; 3], roughness: f32) -> Rgba<u8> {
    let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0) as u8;
    Rgba([to_byte(rgb[0]), to_byte(rgb[1]), to_byte(rgb[2]), to_byte(roughness)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_have_requested_size_and_roughness() {
        for surface in [Surface::Concrete, Surface::Ground, Surface::Roof] {
            let map = generate(surface, 32, 5).unwrap();
            assert_eq!(map.dimensions(), (32, 32));
            assert!(map.pixels().all(|p| p.0[3] > 0));
        }
    }

    #[test]
    fn same_seed_same_map() {
        let a = generate(Surface::Concrete, 16, 9).unwrap();
        let b = generate(Surface::Concrete, 16, 9).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn roof_has_dark_seams() {
        let roof = generate(Surface::Roof, 32, 1).unwrap();
        assert!(roof.get_pixel(0, 5).0[0] < roof.get_pixel(5, 5).0[0]);
    }

    #[test]
    fn rejects_bad_sizes() {
        assert!(matches!(generate(Surface::Ground, 0, 1), Err(AppError::TextureSize(0))));
        assert!(generate(Surface::Ground, MAX_TEXTURE_SIZE + 1, 1).is_err());
    }
}
