// src/overlay.rs

use crate::config::{CircleStyle, LaneOverlayStyle};
use crate::types::{Bgr, Circle, LineSegment};
use anyhow::Result;
use opencv::{
    core::{self, Mat, Vector},
    imgproc,
    prelude::*,
};

pub fn scalar(color: Bgr) -> core::Scalar {
    core::Scalar::new(color.0, color.1, color.2, 0.0)
}

/// Ring plus center dot.
pub fn draw_circle(frame: &mut Mat, circle: &Circle, style: &CircleStyle) -> Result<()> {
    let center = core::Point::new(circle.x, circle.y);

    imgproc::circle(
        frame,
        center,
        circle.r,
        scalar(style.ring_color),
        style.ring_thickness,
        imgproc::LINE_8,
        0,
    )?;

    imgproc::circle(
        frame,
        center,
        style.center_radius,
        scalar(style.center_color),
        style.center_thickness,
        imgproc::LINE_8,
        0,
    )?;

    Ok(())
}

/// Draw each present segment; absent ones are skipped.
pub fn draw_segments(
    img: &mut Mat,
    segments: &[Option<LineSegment>],
    color: Bgr,
    thickness: i32,
) -> Result<()> {
    for seg in segments.iter().flatten() {
        imgproc::line(
            img,
            core::Point::new(seg.x1, seg.y1),
            core::Point::new(seg.x2, seg.y2),
            scalar(color),
            thickness,
            imgproc::LINE_8,
            0,
        )?;
    }
    Ok(())
}

/// Keep only the pixels of `img` inside the polygon.
pub fn region_of_interest(img: &Mat, vertices: &[(i32, i32)]) -> Result<Mat> {
    let mut mask = Mat::zeros_size(img.size()?, img.typ())?.to_mat()?;

    let mut pts_vec = Vector::<Vector<core::Point>>::new();
    pts_vec.push(Vector::from_iter(
        vertices.iter().map(|&(x, y)| core::Point::new(x, y)),
    ));
    imgproc::fill_poly(
        &mut mask,
        &pts_vec,
        core::Scalar::all(255.0),
        imgproc::LINE_8,
        0,
        core::Point::new(0, 0),
    )?;

    let mut masked = Mat::default();
    core::bitwise_and_def(img, &mask, &mut masked)?;
    Ok(masked)
}

/// Black canvas the same shape as `frame`.
pub fn blank_like(frame: &Mat) -> Result<Mat> {
    Ok(Mat::zeros_size(frame.size()?, frame.typ())?.to_mat()?)
}

/// `frame * frame_weight + overlay * overlay_weight + gamma`.
pub fn blend(frame: &Mat, overlay: &Mat, style: &LaneOverlayStyle) -> Result<Mat> {
    let mut blended = Mat::default();
    core::add_weighted(
        frame,
        style.frame_weight,
        overlay,
        style.overlay_weight,
        style.gamma,
        &mut blended,
        -1,
    )?;
    Ok(blended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoiConfig;
    use crate::lane_geometry::roi_vertices;

    #[test]
    fn test_region_of_interest_zeroes_outside_trapezoid() {
        let img = Mat::new_rows_cols_with_default(480, 640, core::CV_8UC1, core::Scalar::all(255.0))
            .unwrap();
        let vertices = roi_vertices(640, 480, &RoiConfig::default());
        let masked = region_of_interest(&img, &vertices).unwrap();

        // inside, near the bottom center
        assert_eq!(*masked.at_2d::<u8>(470, 320).unwrap(), 255);
        // above the horizon and in the bottom corners
        assert_eq!(*masked.at_2d::<u8>(100, 320).unwrap(), 0);
        assert_eq!(*masked.at_2d::<u8>(479, 5).unwrap(), 0);
        assert_eq!(*masked.at_2d::<u8>(479, 635).unwrap(), 0);
    }

    #[test]
    fn test_absent_segments_are_not_drawn() {
        let mut img = Mat::new_rows_cols_with_default(100, 100, core::CV_8UC3, core::Scalar::all(0.0))
            .unwrap();
        draw_segments(&mut img, &[None, None], Bgr::GREEN, 3).unwrap();
        assert_eq!(*img.at_2d::<core::Vec3b>(50, 50).unwrap(), core::Vec3b::from([0, 0, 0]));

        draw_segments(&mut img, &[None, Some(LineSegment::new(10, 10, 90, 90))], Bgr::GREEN, 3)
            .unwrap();
        assert_eq!(*img.at_2d::<core::Vec3b>(50, 50).unwrap(), core::Vec3b::from([0, 255, 0]));
        assert_eq!(*img.at_2d::<core::Vec3b>(10, 90).unwrap(), core::Vec3b::from([0, 0, 0]));
    }
}
