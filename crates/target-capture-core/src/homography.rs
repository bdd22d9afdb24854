use crate::{sample_bilinear, Image, ImageView};
use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};

/// Projective map `p' ~ H * p` between two planes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        let w = v[2];
        Point2::new(v[0] / w, v[1] / w)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }

    pub fn is_finite(&self) -> bool {
        self.h.iter().all(|v| v.is_finite())
    }
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        (2.0_f64).sqrt() / mean_dist
    } else {
        1.0
    };

    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn normalize_points4(pts: &[Point2<f64>; 4]) -> ([Point2<f64>; 4], Matrix3<f64>) {
    // translate to centroid, scale so the mean distance is sqrt(2)
    let (cx, cy) = pts
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let (cx, cy) = (cx / 4.0, cy / 4.0);

    let mean_dist = pts
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / 4.0;

    let t = hartley_normalization(cx, cy, mean_dist);
    let out = pts.map(|p| {
        let v = t * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v[0], v[1])
    });

    (out, t)
}

fn normalize_homography(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    Some(h / s)
}

/// Compute H such that `dst ~ H * src` from exactly four correspondences.
///
/// Corner order must be consistent between `src` and `dst`. Returns `None`
/// when the linear system is singular (e.g. three collinear points) or the
/// solution is not finite.
pub fn homography_from_4pt(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Option<Homography> {
    // Unknowns: [h11 h12 h13 h21 h22 h23 h31 h32], with h33 = 1
    // h11 x + h12 y + h13 - u h31 x - u h32 y = u
    // h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let (src_n, t_src) = normalize_points4(src);
    let (dst_n, t_dst) = normalize_points4(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let (x, y) = (src_n[k].x, src_n[k].y);
        let (u, v) = (dst_n[k].x, dst_n[k].y);

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;

    let hn = Matrix3::<f64>::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    // H = T_dst^-1 * Hn * T_src
    let h = t_dst.try_inverse()? * hn * t_src;
    let h = Homography::new(normalize_homography(h)?);
    h.is_finite().then_some(h)
}

/// Warp into a `out_w × out_h` image: every destination pixel center is
/// mapped into `src` through `h_src_from_dst` and sampled bilinearly.
pub fn warp_perspective(
    src: &ImageView<'_>,
    h_src_from_dst: &Homography,
    out_w: usize,
    out_h: usize,
) -> Image {
    let mut out = Image::new(out_w, out_h, src.format);

    for y in 0..out_h {
        for x in 0..out_w {
            let p = h_src_from_dst.apply(Point2::new(x as f64 + 0.5, y as f64 + 0.5));
            sample_bilinear(src, p.x - 0.5, p.y - 0.5, out.pixel_mut(x, y));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PixelFormat;

    fn assert_close(a: Point2<f64>, b: Point2<f64>, tol: f64) {
        let dx = (a.x - b.x).abs();
        let dy = (a.y - b.y).abs();
        assert!(
            dx < tol && dy < tol,
            "expected ({:.6},{:.6}) ~ ({:.6},{:.6}) within {}",
            a.x,
            a.y,
            b.x,
            b.y,
            tol
        );
    }

    #[test]
    fn inverse_round_trips_points() {
        let h = Homography::new(Matrix3::new(
            1.2, 0.1, 5.0, //
            -0.05, 0.9, 3.0, //
            0.001, 0.0005, 1.0,
        ));
        let inv = h.inverse().expect("invertible");

        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(50.0, -20.0),
            Point2::new(320.0, 200.0),
        ] {
            assert_close(inv.apply(h.apply(p)), p, 1e-9);
        }
    }

    #[test]
    fn four_points_recover_ground_truth() {
        let ground_truth = Homography::new(Matrix3::new(
            0.8, 0.05, 120.0, //
            -0.02, 1.1, 80.0, //
            0.0009, -0.0004, 1.0,
        ));

        // canonical order: top-left, top-right, bottom-left, bottom-right
        let rect = [
            Point2::new(0.0, 0.0),
            Point2::new(180.0, 0.0),
            Point2::new(0.0, 130.0),
            Point2::new(180.0, 130.0),
        ];
        let dst = rect.map(|p| ground_truth.apply(p));

        let recovered = homography_from_4pt(&rect, &dst).expect("recoverable");
        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(60.0, 40.0),
            Point2::new(150.0, 120.0),
        ] {
            assert_close(recovered.apply(p), ground_truth.apply(p), 1e-6);
        }
    }

    #[test]
    fn identical_quads_give_identity() {
        let q = [
            Point2::new(0.0, 0.0),
            Point2::new(64.0, 0.0),
            Point2::new(0.0, 48.0),
            Point2::new(64.0, 48.0),
        ];
        let h = homography_from_4pt(&q, &q).expect("identity");
        assert!((h.h - Matrix3::identity()).abs().max() < 1e-9);
    }

    #[test]
    fn coincident_points_are_rejected() {
        let rect = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 10.0),
            Point2::new(10.0, 10.0),
        ];
        let collapsed = [Point2::new(0.0, 0.0); 4];
        assert!(homography_from_4pt(&collapsed, &rect).is_none());
    }

    #[test]
    fn identity_warp_reproduces_source() {
        let mut src = Image::new(6, 4, PixelFormat::Gray8);
        for (i, v) in src.data.iter_mut().enumerate() {
            *v = (i * 9) as u8;
        }
        let out = warp_perspective(&src.view(), &Homography::identity(), 6, 4);
        assert_eq!(out, src);
    }
}
