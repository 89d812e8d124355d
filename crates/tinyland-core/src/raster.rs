use image::{GrayImage, Luma, Rgb, RgbImage};

#[inline]
fn get_rgb(src: &RgbImage, x: i64, y: i64) -> [f64; 3] {
    if x < 0 || y < 0 || x >= src.width() as i64 || y >= src.height() as i64 {
        return [0.0; 3];
    }
    let p = src.get_pixel(x as u32, y as u32).0;
    [p[0] as f64, p[1] as f64, p[2] as f64]
}

/// Bilinear sample with pixel centres at integer coordinates and a black
/// border outside the image.
#[inline]
pub fn sample_bilinear_rgb(src: &RgbImage, x: f64, y: f64) -> Rgb<u8> {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (xi, yi) = (x0 as i64, y0 as i64);

    let p00 = get_rgb(src, xi, yi);
    let p10 = get_rgb(src, xi + 1, yi);
    let p01 = get_rgb(src, xi, yi + 1);
    let p11 = get_rgb(src, xi + 1, yi + 1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let a = p00[c] + fx * (p10[c] - p00[c]);
        let b = p01[c] + fx * (p11[c] - p01[c]);
        out[c] = (a + fy * (b - a)).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// Binary threshold: strictly brighter than `threshold` becomes 255, the rest 0.
pub fn to_binary(gray: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = gray.clone();
    for p in out.pixels_mut() {
        *p = Luma([if p.0[0] > threshold { 255 } else { 0 }]);
    }
    out
}
