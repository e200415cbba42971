//! Aspect-preserving thumbnail scaling

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

/// Scaled `(width, height)` fitting inside a `edge` x `edge` square, or `None`
/// when either side would be empty.
pub fn fitted_size(width: u32, height: u32, edge: u32) -> Option<(u32, u32)> {
    if edge == 0 || width == 0 || height == 0 {
        return None;
    }
    let edge = f64::from(edge);
    let scale = (edge / f64::from(width)).min(edge / f64::from(height));
    let scaled_width = (f64::from(width) * scale).round() as u32;
    let scaled_height = (f64::from(height) * scale).round() as u32;
    if scaled_width == 0 || scaled_height == 0 {
        return None;
    }
    Some((scaled_width, scaled_height))
}

/// Scale `source` to fit `edge`, drawn over a white background with a bicubic filter.
pub fn fit_to_edge(source: &RgbaImage, edge: u32) -> Option<RgbaImage> {
    let (width, height) = fitted_size(source.width(), source.height(), edge)?;
    let scaled = imageops::resize(source, width, height, FilterType::CatmullRom);
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    imageops::overlay(&mut canvas, &scaled, 0, 0);
    Some(canvas)
}
