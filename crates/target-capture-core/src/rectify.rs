use crate::{
    homography_from_4pt, resize_bilinear, warp_perspective, Homography, Image, ImageView,
    PixelRect,
};
use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RectifyError {
    #[error("expected 4 corner points, got {got}")]
    InvalidCorners { got: usize },
    #[error("frame buffer length does not match its {width}x{height} dimensions")]
    InvalidFrame { width: usize, height: usize },
    #[error("corner bounding box {rect:?} is outside the {width}x{height} frame")]
    OutOfBounds {
        rect: [f64; 4],
        width: usize,
        height: usize,
    },
    #[error("corner quad is degenerate (min triangle area {area:.3} px²)")]
    DegenerateQuad { area: f64 },
    #[error("homography estimation failed")]
    HomographyFailed,
}

/// Rectification settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifierParams {
    /// Canonical output width in pixels.
    pub output_width: usize,
    /// Canonical output height in pixels.
    pub output_height: usize,
    /// Smallest area any three of the four corners may span.
    pub min_triangle_area_px: f64,
}

impl Default for RectifierParams {
    fn default() -> Self {
        Self {
            output_width: 1024,
            output_height: 1024,
            min_triangle_area_px: 0.5,
        }
    }
}

/// Perspective-corrected, fixed-size image of a quad region.
#[derive(Clone, Debug)]
pub struct Rectified {
    pub image: Image,
    /// Region of the source frame the quad was cropped from.
    pub crop: PixelRect,
    /// Maps crop-sized rectangle pixels into crop pixels.
    pub h_crop_from_rect: Homography,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Rectifier {
    params: RectifierParams,
}

fn triangle_area(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> f64 {
    ((b - a).perp(&(c - a)) / 2.0).abs()
}

/// Smallest triangle spanned by any three of the four points.
fn min_triangle_area(p: &[Point2<f64>; 4]) -> f64 {
    [
        triangle_area(p[0], p[1], p[2]),
        triangle_area(p[0], p[1], p[3]),
        triangle_area(p[0], p[2], p[3]),
        triangle_area(p[1], p[2], p[3]),
    ]
    .into_iter()
    .fold(f64::INFINITY, f64::min)
}

fn bounding_box(p: &[Point2<f64>; 4]) -> [f64; 4] {
    let mut b = [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
    for q in p {
        b[0] = b[0].min(q.x);
        b[1] = b[1].min(q.y);
        b[2] = b[2].max(q.x);
        b[3] = b[3].max(q.y);
    }
    b
}

impl Rectifier {
    pub fn new(params: RectifierParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RectifierParams {
        &self.params
    }

    /// Crop the quad's bounding box, undo its perspective and resize to the
    /// canonical resolution.
    ///
    /// `corners` are top-left, top-right, bottom-left, bottom-right in frame
    /// pixels. Intermediate buffers (crop, warp) live only for this call.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, frame, corners), fields(width = frame.width, height = frame.height))
    )]
    pub fn rectify(
        &self,
        frame: &ImageView<'_>,
        corners: &[Point2<f64>],
    ) -> Result<Rectified, RectifyError> {
        let corners: &[Point2<f64>; 4] = corners
            .try_into()
            .map_err(|_| RectifyError::InvalidCorners { got: corners.len() })?;
        if !frame.is_consistent() {
            return Err(RectifyError::InvalidFrame {
                width: frame.width,
                height: frame.height,
            });
        }

        // 1) bounding box, which must lie inside the frame
        let bbox = bounding_box(corners);
        let out_of_bounds = RectifyError::OutOfBounds {
            rect: bbox,
            width: frame.width,
            height: frame.height,
        };
        if !bbox.iter().all(|v| v.is_finite())
            || bbox[0] < 0.0
            || bbox[1] < 0.0
            || bbox[2] > frame.width as f64
            || bbox[3] > frame.height as f64
        {
            return Err(out_of_bounds);
        }
        let x0 = bbox[0].floor() as usize;
        let y0 = bbox[1].floor() as usize;
        let crop = PixelRect {
            x: x0,
            y: y0,
            width: (bbox[2].ceil() as usize).saturating_sub(x0),
            height: (bbox[3].ceil() as usize).saturating_sub(y0),
        };

        let area = min_triangle_area(corners);
        if crop.is_empty() || !(area >= self.params.min_triangle_area_px) {
            return Err(RectifyError::DegenerateQuad { area });
        }

        // 2) corners relative to the crop origin
        let origin = Point2::new(x0 as f64, y0 as f64);
        let rel = corners.map(|p| Point2::from(p - origin));

        // 3) crop
        let cropped = frame.crop(&crop).ok_or(out_of_bounds)?;

        // 4) crop-sized rectangle -> quad, same corner order
        let (w, h) = (crop.width as f64, crop.height as f64);
        let rect = [
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(0.0, h),
            Point2::new(w, h),
        ];
        let h_crop_from_rect =
            homography_from_4pt(&rect, &rel).ok_or(RectifyError::HomographyFailed)?;

        // 5) warp at crop size, 6) resize to the canonical resolution
        let warped = warp_perspective(&cropped.view(), &h_crop_from_rect, crop.width, crop.height);
        drop(cropped);
        let image = resize_bilinear(
            &warped.view(),
            self.params.output_width,
            self.params.output_height,
        );

        debug!(
            "rectified crop {}x{} at ({}, {}) into {}x{}",
            crop.width, crop.height, crop.x, crop.y, image.width, image.height
        );

        Ok(Rectified {
            image,
            crop,
            h_crop_from_rect,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PixelFormat;

    fn checker(w: usize, h: usize) -> Image {
        let mut img = Image::new(w, h, PixelFormat::Rgb8);
        for y in 0..h {
            for x in 0..w {
                let on = ((x / 8) + (y / 8)) % 2 == 0;
                let v = if on { 220 } else { 30 };
                img.pixel_mut(x, y).copy_from_slice(&[v, v / 2, (x % 256) as u8]);
            }
        }
        img
    }

    fn params(w: usize, h: usize) -> RectifierParams {
        RectifierParams {
            output_width: w,
            output_height: h,
            ..RectifierParams::default()
        }
    }

    #[test]
    fn canonical_rectangle_is_identity() {
        let src = checker(64, 48);
        let corners = [
            Point2::new(0.0, 0.0),
            Point2::new(64.0, 0.0),
            Point2::new(0.0, 48.0),
            Point2::new(64.0, 48.0),
        ];
        let out = Rectifier::new(params(64, 48))
            .rectify(&src.view(), &corners)
            .expect("rectify");
        assert_eq!(out.crop, PixelRect { x: 0, y: 0, width: 64, height: 48 });
        let max_diff = out
            .image
            .data
            .iter()
            .zip(src.data.iter())
            .map(|(a, b)| (*a as i32 - *b as i32).abs())
            .max()
            .unwrap_or(0);
        assert!(max_diff <= 1, "max diff {max_diff}");
    }

    #[test]
    fn sub_region_is_cropped_and_resized() {
        let src = checker(100, 80);
        let corners = [
            Point2::new(20.0, 10.0),
            Point2::new(60.0, 10.0),
            Point2::new(20.0, 50.0),
            Point2::new(60.0, 50.0),
        ];
        let out = Rectifier::new(params(80, 80))
            .rectify(&src.view(), &corners)
            .expect("rectify");
        assert_eq!(out.crop, PixelRect { x: 20, y: 10, width: 40, height: 40 });
        assert_eq!((out.image.width, out.image.height), (80, 80));
        assert_eq!(out.image.format, PixelFormat::Rgb8);
    }

    #[test]
    fn default_output_is_1024_square() {
        let src = checker(64, 64);
        let corners = [
            Point2::new(4.0, 6.0),
            Point2::new(58.0, 2.0),
            Point2::new(8.0, 60.0),
            Point2::new(62.0, 56.0),
        ];
        let out = Rectifier::default().rectify(&src.view(), &corners).expect("rectify");
        assert_eq!((out.image.width, out.image.height), (1024, 1024));
    }

    #[test]
    fn perspective_quad_maps_corners_to_rectangle() {
        let src = checker(120, 100);
        let corners = [
            Point2::new(30.0, 20.0),
            Point2::new(90.0, 25.0),
            Point2::new(20.0, 80.0),
            Point2::new(100.0, 90.0),
        ];
        let out = Rectifier::new(params(64, 64))
            .rectify(&src.view(), &corners)
            .expect("rectify");
        let (w, h) = (out.crop.width as f64, out.crop.height as f64);
        let origin = Point2::new(out.crop.x as f64, out.crop.y as f64);
        let rect = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)];
        for (r, c) in rect.iter().zip(corners.iter()) {
            let p = out.h_crop_from_rect.apply(Point2::new(r.0, r.1));
            assert!((p - (c - origin.coords)).norm() < 1e-6);
        }
    }

    #[test]
    fn empty_or_short_corners_fail() {
        let src = checker(32, 32);
        let r = Rectifier::default();
        assert_eq!(
            r.rectify(&src.view(), &[]).unwrap_err(),
            RectifyError::InvalidCorners { got: 0 }
        );
        assert!(matches!(
            r.rectify(&src.view(), &[Point2::new(1.0, 1.0); 3]),
            Err(RectifyError::InvalidCorners { got: 3 })
        ));
    }

    #[test]
    fn box_outside_frame_fails() {
        let src = checker(32, 32);
        let corners = [
            Point2::new(10.0, 10.0),
            Point2::new(40.0, 10.0),
            Point2::new(10.0, 30.0),
            Point2::new(40.0, 30.0),
        ];
        assert!(matches!(
            Rectifier::default().rectify(&src.view(), &corners),
            Err(RectifyError::OutOfBounds { .. })
        ));
        let negative = corners.map(|p| Point2::new(p.x - 15.0, p.y));
        assert!(matches!(
            Rectifier::default().rectify(&src.view(), &negative),
            Err(RectifyError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn collinear_corners_fail() {
        let src = checker(64, 64);
        let corners = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(20.0, 20.0),
            Point2::new(30.0, 30.0),
        ];
        assert!(matches!(
            Rectifier::default().rectify(&src.view(), &corners),
            Err(RectifyError::DegenerateQuad { .. })
        ));
    }

    #[test]
    fn inconsistent_frame_fails() {
        let view = ImageView {
            width: 10,
            height: 10,
            format: PixelFormat::Rgba8,
            data: &[0u8; 10],
        };
        let corners = [Point2::new(0.0, 0.0); 4];
        assert_eq!(
            Rectifier::default().rectify(&view, &corners).unwrap_err(),
            RectifyError::InvalidFrame { width: 10, height: 10 }
        );
    }
}
