// src/lane_geometry.rs
//
// Lane line averaging. Hough segments are fitted one by one, split by slope
// sign into left/right buckets, averaged per bucket and stretched between the
// bottom of the frame and a fixed horizon row.

use crate::config::RoiConfig;
use crate::types::{LanePair, LineSegment, SlopeIntercept};
use tracing::debug;

/// Default horizon row, as a fraction of image height measured from the top.
pub const DEFAULT_HORIZON_RATIO: f64 = 3.0 / 5.0;

/// Degree-1 least-squares fit through `points`.
///
/// Returns `None` with fewer than two points or when all x are equal
/// (vertical line, no finite slope).
pub fn fit_points(points: &[(f64, f64)]) -> Option<SlopeIntercept> {
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for &(x, y) in points {
        sxx += (x - mean_x) * (x - mean_x);
        sxy += (x - mean_x) * (y - mean_y);
    }

    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    Some(SlopeIntercept {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

/// Fit the line through a segment's two endpoints.
pub fn fit_segment(seg: &LineSegment) -> Option<SlopeIntercept> {
    fit_points(&[
        (seg.x1 as f64, seg.y1 as f64),
        (seg.x2 as f64, seg.y2 as f64),
    ])
}

/// Stretch a fitted line from the image bottom up to the horizon row.
pub fn make_points(fit: SlopeIntercept, image_height: i32, horizon_ratio: f64) -> Option<LineSegment> {
    if fit.slope == 0.0 || !fit.slope.is_finite() || !fit.intercept.is_finite() {
        return None;
    }

    let y1 = image_height;
    let y2 = (y1 as f64 * horizon_ratio) as i32;
    let x1 = (y1 as f64 - fit.intercept) / fit.slope;
    let x2 = (y2 as f64 - fit.intercept) / fit.slope;

    Some(LineSegment::new(to_pixel(x1)?, y1, to_pixel(x2)?, y2))
}

/// Truncate toward zero; `None` when the value has no i32 pixel.
fn to_pixel(v: f64) -> Option<i32> {
    let t = v.trunc();
    if t.is_finite() && t >= i32::MIN as f64 && t <= i32::MAX as f64 {
        Some(t as i32)
    } else {
        None
    }
}

fn midpoint(a: i32, b: i32) -> i32 {
    ((a as i64 + b as i64) / 2) as i32
}

fn average(fits: &[SlopeIntercept]) -> Option<SlopeIntercept> {
    if fits.is_empty() {
        return None;
    }
    let n = fits.len() as f64;
    Some(SlopeIntercept {
        slope: fits.iter().map(|f| f.slope).sum::<f64>() / n,
        intercept: fits.iter().map(|f| f.intercept).sum::<f64>() / n,
    })
}

/// Collapse raw segments into one left and one right lane line.
///
/// Negative slope means left (y grows downward). Vertical segments are
/// dropped. A side with no segments comes back as `None`.
pub fn average_slope_intercept(
    segments: &[LineSegment],
    image_height: i32,
    horizon_ratio: f64,
) -> LanePair {
    let mut left_fit = Vec::new();
    let mut right_fit = Vec::new();
    let mut vertical = 0usize;

    for seg in segments {
        match fit_segment(seg) {
            Some(fit) if fit.slope < 0.0 => left_fit.push(fit),
            Some(fit) => right_fit.push(fit),
            None => vertical += 1,
        }
    }

    debug!(
        "Lane buckets: left={} right={} vertical={}",
        left_fit.len(),
        right_fit.len(),
        vertical
    );

    LanePair {
        left: average(&left_fit).and_then(|f| make_points(f, image_height, horizon_ratio)),
        right: average(&right_fit).and_then(|f| make_points(f, image_height, horizon_ratio)),
    }
}

/// Midline between the two lane lines; `None` unless both sides exist.
pub fn center_line(left: Option<LineSegment>, right: Option<LineSegment>) -> Option<LineSegment> {
    let (l, r) = (left?, right?);
    Some(LineSegment::new(
        midpoint(l.x1, r.x1),
        l.y1,
        midpoint(l.x2, r.x2),
        l.y2,
    ))
}

/// Trapezoid corners: bottom-left, top-left, top-right, bottom-right.
pub fn roi_vertices(width: i32, height: i32, roi: &RoiConfig) -> [(i32, i32); 4] {
    let w = width as f64;
    let h = height as f64;
    let top = (h * roi.top_y) as i32;
    [
        ((w * roi.bottom_left_x) as i32, height),
        ((w * roi.top_left_x) as i32, top),
        ((w * roi.top_right_x) as i32, top),
        ((w * roi.bottom_right_x) as i32, height),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed_segments() -> Vec<LineSegment> {
        vec![
            // slope -1
            LineSegment::new(100, 200, 200, 100),
            LineSegment::new(150, 250, 250, 150),
            // slope +1
            LineSegment::new(300, 100, 400, 200),
            LineSegment::new(350, 100, 450, 200),
        ]
    }

    #[test]
    fn test_fit_segment_slope_and_intercept() {
        let fit = fit_segment(&LineSegment::new(100, 200, 200, 100)).unwrap();
        assert!((fit.slope + 1.0).abs() < 1e-12);
        assert!((fit.intercept - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_vertical_segment_has_no_fit() {
        assert!(fit_segment(&LineSegment::new(10, 0, 10, 50)).is_none());
    }

    #[test]
    fn test_fit_points_least_squares() {
        // y = 2x + 1 with symmetric noise
        let pts = [(0.0, 1.5), (1.0, 2.5), (2.0, 5.5), (3.0, 6.5)];
        let fit = fit_points(&pts).unwrap();
        assert!((fit.slope - 1.8).abs() < 1e-9);
        assert!((fit.intercept - 1.3).abs() < 1e-9);
        assert!(fit_points(&[(1.0, 1.0)]).is_none());
    }

    #[test]
    fn test_average_splits_by_slope_sign() {
        let pair = average_slope_intercept(&mixed_segments(), 480, DEFAULT_HORIZON_RATIO);

        // left: slope -1, intercept (300 + 400) / 2 = 350
        assert_eq!(pair.left.unwrap().to_array(), [-130, 480, 62, 288]);
        // right: slope 1, intercept (-200 + -250) / 2 = -225
        assert_eq!(pair.right.unwrap().to_array(), [705, 480, 513, 288]);
    }

    #[test]
    fn test_only_negative_slopes_leaves_right_absent() {
        let segments = &mixed_segments()[..2];
        let pair = average_slope_intercept(segments, 480, DEFAULT_HORIZON_RATIO);
        assert!(pair.left.is_some());
        assert!(pair.right.is_none());
    }

    #[test]
    fn test_no_segments_gives_empty_pair() {
        let pair = average_slope_intercept(&[], 480, DEFAULT_HORIZON_RATIO);
        assert!(pair.is_empty());
    }

    #[test]
    fn test_horizontal_fit_cannot_be_extended() {
        let fit = SlopeIntercept {
            slope: 0.0,
            intercept: 100.0,
        };
        assert!(make_points(fit, 480, DEFAULT_HORIZON_RATIO).is_none());

        // a horizontal segment lands in the right bucket and is then discarded
        let pair = average_slope_intercept(&[LineSegment::new(0, 50, 100, 50)], 480, 0.6);
        assert!(pair.is_empty());
    }

    #[test]
    fn test_center_line_midpoint() {
        let left = LineSegment::from([0, 100, 50, 60]);
        let right = LineSegment::from([100, 100, 150, 60]);
        let center = center_line(Some(left), Some(right)).unwrap();
        assert_eq!(center.to_array(), [50, 100, 100, 60]);
    }

    #[test]
    fn test_nearly_flat_fits_do_not_extend_past_i32() {
        let segments = [
            LineSegment::new(0, 1000, 2_000_000_000, 999),
            LineSegment::new(0, 0, 2_000_000_000, 1),
        ];
        let pair = average_slope_intercept(&segments, 480, DEFAULT_HORIZON_RATIO);
        assert!(pair.left.is_none());
        assert!(pair.right.is_none());
        assert!(center_line(pair.left, pair.right).is_none());
    }

    #[test]
    fn test_center_line_at_i32_extremes() {
        let left = LineSegment::new(i32::MAX, 100, i32::MAX - 2, 60);
        let right = LineSegment::new(i32::MAX, 100, i32::MAX, 60);
        let center = center_line(Some(left), Some(right)).unwrap();
        assert_eq!(center.to_array(), [i32::MAX, 100, i32::MAX - 1, 60]);

        let left = LineSegment::new(i32::MIN, 100, -3, 60);
        let right = LineSegment::new(i32::MIN, 100, 0, 60);
        let center = center_line(Some(left), Some(right)).unwrap();
        assert_eq!(center.to_array(), [i32::MIN, 100, -1, 60]);
    }

    #[test]
    fn test_center_line_needs_both_sides() {
        let left = LineSegment::from([0, 100, 50, 60]);
        assert!(center_line(Some(left), None).is_none());
        assert!(center_line(None, Some(left)).is_none());
    }

    #[test]
    fn test_averaging_is_repeatable() {
        let segments = mixed_segments();
        let a = average_slope_intercept(&segments, 480, DEFAULT_HORIZON_RATIO);
        let b = average_slope_intercept(&segments, 480, DEFAULT_HORIZON_RATIO);
        assert_eq!(a, b);
    }

    #[test]
    fn test_roi_vertices_default_trapezoid() {
        let v = roi_vertices(640, 480, &RoiConfig::default());
        assert_eq!(v, [(64, 480), (256, 288), (384, 288), (576, 480)]);
    }
}
