//! Even-odd polygon rasterization.

use image::{GrayImage, Luma};

/// Fills a flat `[x0, y0, x1, y1, ...]` polygon into a `width x height` mask.
///
/// A pixel is foreground when its centre `(x + 0.5, y + 0.5)` lies inside
/// the polygon under the even-odd rule. Polygons with fewer than three
/// vertices produce an empty mask; a trailing odd coordinate is ignored.
pub fn rasterize(points: &[f64], width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let vertices: Vec<(f64, f64)> = points.chunks_exact(2).map(|p| (p[0], p[1])).collect();
    if vertices.len() < 3 {
        return mask;
    }

    let mut crossings: Vec<f64> = Vec::with_capacity(vertices.len());
    for y in 0..height {
        let cy = y as f64 + 0.5;
        crossings.clear();

        for (i, &(x0, y0)) in vertices.iter().enumerate() {
            let (x1, y1) = vertices[(i + 1) % vertices.len()];
            // Half-open on y so shared vertices are counted once
            if (y0 <= cy && cy < y1) || (y1 <= cy && cy < y0) {
                crossings.push(x0 + (cy - y0) * (x1 - x0) / (y1 - y0));
            }
        }
        crossings.sort_by(f64::total_cmp);

        for span in crossings.chunks_exact(2) {
            // Pixel x is covered when span[0] <= x + 0.5 < span[1]
            let start = (span[0] - 0.5).ceil().max(0.0);
            let end = (span[1] - 0.5).ceil().min(width as f64);
            let (start, end) = (start as u32, end.max(0.0) as u32);
            for x in start..end {
                mask.put_pixel(x, y, Luma([1]));
            }
        }
    }
    mask
}
