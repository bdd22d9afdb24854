use serde::{Deserialize, Serialize};

/// Interleaved 8-bit pixel layouts a camera frame can arrive in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Gray8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    #[inline]
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// Integer pixel rectangle `[x, x + width) × [y, y + height)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelRect {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    pub data: &'a [u8], // row-major, interleaved, len = w*h*channels
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl Image {
    /// Zero-filled image.
    pub fn new(width: usize, height: usize, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            data: vec![0u8; width * height * format.channels()],
        }
    }

    /// Wrap an existing buffer, returning `None` when its length does not match the dimensions.
    pub fn from_raw(width: usize, height: usize, format: PixelFormat, data: Vec<u8>) -> Option<Self> {
        if data.len() != width * height * format.channels() {
            return None;
        }
        Some(Self {
            width,
            height,
            format,
            data,
        })
    }

    pub fn view(&self) -> ImageView<'_> {
        ImageView {
            width: self.width,
            height: self.height,
            format: self.format,
            data: &self.data,
        }
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let c = self.format.channels();
        let i = (y * self.width + x) * c;
        &self.data[i..i + c]
    }

    #[inline]
    pub fn pixel_mut(&mut self, x: usize, y: usize) -> &mut [u8] {
        let c = self.format.channels();
        let i = (y * self.width + x) * c;
        &mut self.data[i..i + c]
    }
}

impl ImageView<'_> {
    /// Whether `data` is large enough for the declared dimensions.
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.width * self.height * self.format.channels()
    }

    #[inline]
    pub fn contains(&self, rect: &PixelRect) -> bool {
        rect.x + rect.width <= self.width && rect.y + rect.height <= self.height
    }

    /// Copy a sub-rectangle into an owned image. `None` if it is not contained.
    pub fn crop(&self, rect: &PixelRect) -> Option<Image> {
        if !self.contains(rect) {
            return None;
        }
        let c = self.format.channels();
        let row_len = rect.width * c;
        let mut data = Vec::with_capacity(row_len * rect.height);
        for y in rect.y..rect.y + rect.height {
            let start = (y * self.width + rect.x) * c;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }
        Some(Image {
            width: rect.width,
            height: rect.height,
            format: self.format,
            data,
        })
    }
}

#[inline]
fn get_channel(src: &ImageView<'_>, x: i64, y: i64, ch: usize) -> f32 {
    if x < 0 || y < 0 || x >= src.width as i64 || y >= src.height as i64 {
        return 0.0;
    }
    let c = src.format.channels();
    src.data[(y as usize * src.width + x as usize) * c + ch] as f32
}

/// Bilinear sample of every channel at `(x, y)`, where integer coordinates
/// are pixel centers. Outside the image reads as zero.
#[inline]
pub fn sample_bilinear(src: &ImageView<'_>, x: f64, y: f64, out: &mut [u8]) {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = (x - x0) as f32;
    let fy = (y - y0) as f32;
    let (x0, y0) = (x0 as i64, y0 as i64);

    for (ch, o) in out.iter_mut().enumerate().take(src.format.channels()) {
        let p00 = get_channel(src, x0, y0, ch);
        let p10 = get_channel(src, x0 + 1, y0, ch);
        let p01 = get_channel(src, x0, y0 + 1, ch);
        let p11 = get_channel(src, x0 + 1, y0 + 1, ch);

        let a = p00 + fx * (p10 - p00);
        let b = p01 + fx * (p11 - p01);
        *o = (a + fy * (b - a)).round().clamp(0.0, 255.0) as u8;
    }
}

/// Bilinear resize with pixel-center alignment (same-size resize is exact).
pub fn resize_bilinear(src: &ImageView<'_>, out_w: usize, out_h: usize) -> Image {
    let mut out = Image::new(out_w, out_h, src.format);
    if src.width == 0 || src.height == 0 {
        return out;
    }
    let sx = src.width as f64 / out_w as f64;
    let sy = src.height as f64 / out_h as f64;
    let max_x = (src.width - 1) as f64;
    let max_y = (src.height - 1) as f64;

    for y in 0..out_h {
        // clamp to the border instead of fading into the zero padding
        let fy = ((y as f64 + 0.5) * sy - 0.5).clamp(0.0, max_y);
        for x in 0..out_w {
            let fx = ((x as f64 + 0.5) * sx - 0.5).clamp(0.0, max_x);
            sample_bilinear(src, fx, fy, out.pixel_mut(x, y));
        }
    }
    out
}
