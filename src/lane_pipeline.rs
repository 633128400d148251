// src/lane_pipeline.rs

use crate::config::LaneConfig;
use crate::display::Display;
use crate::lane_geometry::{average_slope_intercept, center_line, roi_vertices};
use crate::overlay;
use crate::source::FrameSource;
use crate::types::{LanePair, LineSegment};
use crate::video_processor::{create_writer, VideoReader};
use anyhow::Result;
use opencv::{
    core::{self, Mat, Vector},
    imgproc,
    prelude::*,
    videoio::VideoWriter,
};
use std::time::Instant;
use tracing::{debug, info};

pub struct LaneFrame {
    pub combined: Mat,
    pub masked_edges: Mat,
    pub lanes: LanePair,
    pub center: Option<LineSegment>,
}

pub struct LaneDetector {
    config: LaneConfig,
}

impl LaneDetector {
    pub fn new(config: LaneConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LaneConfig {
        &self.config
    }

    /// Canny edges restricted to the road trapezoid.
    pub fn masked_edges(&self, frame: &Mat) -> Result<Mat> {
        let mut gray = Mat::default();
        imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_BGR2GRAY)?;

        let mut edges = Mat::default();
        imgproc::canny_def(
            &gray,
            &mut edges,
            self.config.canny_low,
            self.config.canny_high,
        )?;

        let vertices = roi_vertices(frame.cols(), frame.rows(), &self.config.roi);
        overlay::region_of_interest(&edges, &vertices)
    }

    pub fn detect_segments(&self, masked_edges: &Mat) -> Result<Vec<LineSegment>> {
        let hough = &self.config.hough;
        let mut lines = Vector::<core::Vec4i>::new();
        imgproc::hough_lines_p(
            masked_edges,
            &mut lines,
            hough.rho,
            hough.theta_degrees.to_radians(),
            hough.threshold,
            hough.min_line_length,
            hough.max_line_gap,
        )?;

        debug!("HoughLinesP: {} segments", lines.len());

        Ok(lines
            .iter()
            .map(|l| LineSegment::new(l[0], l[1], l[2], l[3]))
            .collect())
    }

    pub fn process_frame(&self, frame: &Mat) -> Result<LaneFrame> {
        let masked_edges = self.masked_edges(frame)?;
        let segments = self.detect_segments(&masked_edges)?;
        let lanes = average_slope_intercept(&segments, frame.rows(), self.config.horizon_ratio);
        let center = center_line(lanes.left, lanes.right);

        let style = &self.config.style;
        let mut line_image = overlay::blank_like(frame)?;
        overlay::draw_segments(
            &mut line_image,
            &[lanes.left, lanes.right],
            style.lane_color,
            style.lane_thickness,
        )?;
        overlay::draw_segments(
            &mut line_image,
            &[center],
            style.center_color,
            style.center_thickness,
        )?;

        let combined = overlay::blend(frame, &line_image, style)?;

        Ok(LaneFrame {
            combined,
            masked_edges,
            lanes,
            center,
        })
    }
}

#[derive(Debug, Default)]
pub struct LaneStats {
    pub frames: u64,
    pub frames_with_both_lanes: u64,
    pub frames_without_lanes: u64,
    pub duration_secs: f64,
}

/// Lane and center line overlay on a camera feed or video file.
pub fn run_stream(source: &FrameSource, config: LaneConfig, display: &mut Display) -> Result<LaneStats> {
    let detector = LaneDetector::new(config);
    let mut reader = VideoReader::open(source)?;
    let mut writer: Option<VideoWriter> = None;
    let mut stats = LaneStats::default();
    let start = Instant::now();

    while let Some(frame) = reader.read_frame()? {
        let result = detector.process_frame(&frame)?;
        stats.frames += 1;

        if result.center.is_some() {
            stats.frames_with_both_lanes += 1;
        }
        if result.lanes.is_empty() {
            stats.frames_without_lanes += 1;
            debug!("No lane lines in frame {}", stats.frames);
        }

        if display.is_headless() {
            if writer.is_none() {
                let (w, _) = create_writer(
                    display.output_dir(),
                    &source.annotated_file_name("mp4"),
                    frame.cols(),
                    frame.rows(),
                    reader.fps,
                )?;
                writer = Some(w);
            }
            if let Some(w) = writer.as_mut() {
                w.write(&result.combined)?;
            }
        } else {
            display.show(&detector.config().window_title, &result.combined)?;
            display.show(&detector.config().edges_window_title, &result.masked_edges)?;
        }

        if display.poll_quit(detector.config().key_delay_ms)? {
            break;
        }
    }

    reader.release()?;
    stats.duration_secs = start.elapsed().as_secs_f64();

    info!(
        "Lane stream done: {} frames, {} with both lanes, {} with none ({:.1}s)",
        stats.frames, stats.frames_with_both_lanes, stats.frames_without_lanes, stats.duration_secs
    );

    Ok(stats)
}
