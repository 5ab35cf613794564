use anyhow::bail;
use image::{Rgb, RgbImage, Rgba};

/// Semi-transparent green painted over predicted road pixels.
pub const ROAD_OVERLAY: Rgba<u8> = Rgba([0, 255, 0, 127]);

/// Alpha-blend `color` onto `img` wherever `mask` is set (row-major, one entry per pixel).
pub fn paint_mask(img: &RgbImage, mask: &[bool], color: Rgba<u8>) -> anyhow::Result<RgbImage> {
    let (w, h) = img.dimensions();
    if mask.len() != (w * h) as usize {
        bail!("mask has {} entries for a {w}x{h} image", mask.len());
    }
    let alpha = color[3] as f32 / 255.0;
    let mut out = img.clone();
    for (x, y, px) in out.enumerate_pixels_mut() {
        if !mask[(y * w + x) as usize] {
            continue;
        }
        let blend = |base: u8, over: u8| -> u8 {
            (base as f32 * (1.0 - alpha) + over as f32 * alpha).round() as u8
        };
        *px = Rgb([
            blend(px[0], color[0]),
            blend(px[1], color[1]),
            blend(px[2], color[2]),
        ]);
    }
    Ok(out)
}
