//! Geometry and image primitives for capturing a tracked planar target.
//!
//! This crate knows nothing about tracking sessions. It provides:
//! - camera/target geometry conventions ([`CameraModel`], [`world_corners`]),
//! - ray/plane projection of target corners onto the camera background
//!   quad ([`PlaneProjector`], [`BackgroundPlane`]),
//! - a four-point homography, perspective warp and resize,
//! - the [`Rectifier`] that turns a frame plus four corners into a
//!   canonical, fixed-resolution image.

mod geometry;
mod homography;
mod image;
mod logger;
mod projection;
mod rectify;

pub use geometry::{
    facing_parent_rotation, horizontal_fov_rad, local_corners, look_at, plane_up, world_corners,
    CameraModel, ImageCorners, WorldCorners, BOTTOM_LEFT, BOTTOM_RIGHT, TOP_LEFT, TOP_RIGHT,
};
pub use homography::{homography_from_4pt, warp_perspective, Homography};
pub use image::{resize_bilinear, sample_bilinear, Image, ImageView, PixelFormat, PixelRect};
pub use projection::{BackgroundPlane, PlaneProjector, ProjectionError};
pub use rectify::{Rectified, Rectifier, RectifierParams, RectifyError};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init, init_with_level, write_record, LogSpec, LogSpecError, LOG_ENV};
