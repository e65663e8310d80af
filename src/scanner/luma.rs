// SPDX-License-Identifier: GPL-3.0-only

//! Luma plane helpers shared by the decode engines

/// Downscale a packed luma plane with bilinear interpolation
///
/// Returns the plane unchanged when it already fits.
pub(crate) fn downscale_luma(
    luma: &[u8],
    width: u32,
    height: u32,
    max_dimension: u32,
) -> (Vec<u8>, u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (luma.to_vec(), width, height);
    }

    let scale = (width as f32 / max_dimension as f32).max(height as f32 / max_dimension as f32);
    let dst_width = ((width as f32 / scale) as u32).max(1);
    let dst_height = ((height as f32 / scale) as u32).max(1);

    let src_width = width as usize;
    let src_height = height as usize;
    let x_ratio = src_width as f32 / dst_width as f32;
    let y_ratio = src_height as f32 / dst_height as f32;
    let pixel = |x: usize, y: usize| luma.get(y * src_width + x).copied().unwrap_or(0) as f32;

    let mut result = Vec::with_capacity((dst_width * dst_height) as usize);
    for y in 0..dst_height {
        for x in 0..dst_width {
            let src_x = x as f32 * x_ratio;
            let src_y = y as f32 * y_ratio;

            let x0 = src_x as usize;
            let y0 = src_y as usize;
            let x1 = (x0 + 1).min(src_width - 1);
            let y1 = (y0 + 1).min(src_height - 1);
            let x_frac = src_x - x0 as f32;
            let y_frac = src_y - y0 as f32;

            let top = pixel(x0, y0) * (1.0 - x_frac) + pixel(x1, y0) * x_frac;
            let bottom = pixel(x0, y1) * (1.0 - x_frac) + pixel(x1, y1) * x_frac;
            result.push((top * (1.0 - y_frac) + bottom * y_frac).round() as u8);
        }
    }

    (result, dst_width, dst_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downscale_keeps_aspect_ratio() {
        let luma = vec![128u8; 1280 * 720];
        let (plane, width, height) = downscale_luma(&luma, 1280, 720, 640);
        assert_eq!((width, height), (640, 360));
        assert_eq!(plane.len(), 640 * 360);
        assert!(plane.iter().all(|&p| p == 128));
    }

    #[test]
    fn test_small_frames_are_not_resampled() {
        let luma: Vec<u8> = (0..16).collect();
        let (plane, width, height) = downscale_luma(&luma, 4, 4, 640);
        assert_eq!((width, height), (4, 4));
        assert_eq!(plane, luma);
    }
}
