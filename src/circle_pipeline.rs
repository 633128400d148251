// src/circle_pipeline.rs
//
// Can rim / bottom detection. One routine covers still photos and streams;
// the presets in `config` carry the per-scene thresholds.

use crate::config::{BlurConfig, CircleConfig};
use crate::display::Display;
use crate::frame_schedule::FrameStride;
use crate::overlay;
use crate::selection::resolve_detection;
use crate::source::FrameSource;
use crate::types::Circle;
use crate::video_processor::{create_writer, load_image, save_image, VideoReader};
use anyhow::{Context, Result};
use opencv::{
    core::{self, Mat, Vector},
    imgproc,
    prelude::*,
    videoio::VideoWriter,
};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct CircleFrame {
    pub annotated: Mat,
    pub circle: Option<Circle>,
    pub candidates: usize,
}

#[derive(Debug, Default)]
pub struct StreamStats {
    pub frames_read: u64,
    pub frames_processed: u64,
    pub frames_with_circle: u64,
    pub duration_secs: f64,
}

pub struct CircleDetector {
    config: CircleConfig,
}

impl CircleDetector {
    pub fn new(config: CircleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CircleConfig {
        &self.config
    }

    fn resize(&self, frame: &Mat) -> Result<Mat> {
        match self.config.target_size(frame.cols(), frame.rows()) {
            Some((w, h)) => {
                let mut resized = Mat::default();
                imgproc::resize(
                    frame,
                    &mut resized,
                    core::Size::new(w, h),
                    0.0,
                    0.0,
                    imgproc::INTER_LINEAR,
                )?;
                Ok(resized)
            }
            None => Ok(frame.try_clone()?),
        }
    }

    fn preprocess(&self, frame: &Mat) -> Result<Mat> {
        let mut gray = Mat::default();
        imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_BGR2GRAY)?;

        let mut blurred = Mat::default();
        match self.config.blur {
            BlurConfig::Gaussian { kernel, sigma } => {
                imgproc::gaussian_blur_def(
                    &gray,
                    &mut blurred,
                    core::Size::new(kernel, kernel),
                    sigma,
                )?;
            }
            BlurConfig::Median { kernel } => {
                imgproc::median_blur(&gray, &mut blurred, kernel)?;
            }
        }
        Ok(blurred)
    }

    /// Raw Hough candidates on a blurred gray image, in detector order.
    pub fn detect(&self, gray: &Mat) -> Result<Vec<Circle>> {
        let (width, height) = (gray.cols(), gray.rows());
        let hough = &self.config.hough;
        let min_dist = hough.min_dist.resolve(width, height).max(1);
        let min_radius = hough.min_radius.resolve(width, height);
        let max_radius = hough.max_radius.resolve(width, height);

        let mut found = Vector::<core::Vec3f>::new();
        imgproc::hough_circles(
            gray,
            &mut found,
            imgproc::HOUGH_GRADIENT,
            hough.dp,
            min_dist as f64,
            hough.param1,
            hough.param2,
            min_radius,
            max_radius,
        )?;

        debug!(
            "HoughCircles: {} candidates (radius {}..{}, min_dist {})",
            found.len(),
            min_radius,
            max_radius,
            min_dist
        );

        Ok(found
            .iter()
            .map(|c| Circle::from_detection(c[0], c[1], c[2]))
            .collect())
    }

    /// Detect, select and draw on a copy of `frame`.
    pub fn process_frame(&self, frame: &Mat) -> Result<CircleFrame> {
        let mut annotated = self.resize(frame)?;
        let gray = self.preprocess(&annotated)?;
        let candidates = self.detect(&gray)?;
        let circle = resolve_detection(&candidates, self.config.on_missing)?;

        if let Some(c) = &circle {
            overlay::draw_circle(&mut annotated, c, &self.config.style)?;
        }

        Ok(CircleFrame {
            annotated,
            circle,
            candidates: candidates.len(),
        })
    }
}

/// Detect the can in a single photo and show it until a key is pressed.
pub fn run_image(path: &Path, config: CircleConfig, display: &mut Display) -> Result<Option<Circle>> {
    let detector = CircleDetector::new(config);
    let image = load_image(path)?;

    let result = detector
        .process_frame(&image)
        .with_context(|| format!("Circle detection failed on {}", path.display()))?;

    match &result.circle {
        Some(c) => info!("Detected: Center({}, {}), Radius {}", c.x, c.y, c.r),
        None => warn!("{}", detector.config().missing_hint),
    }

    if display.is_headless() {
        let file_name = FrameSource::Image(path.to_path_buf()).annotated_file_name("png");
        std::fs::create_dir_all(display.output_dir())?;
        let out = display.output_dir().join(file_name);
        save_image(&out, &result.annotated)?;
    } else {
        display.show(&detector.config().window_title, &result.annotated)?;
        display.wait_any_key()?;
    }

    Ok(result.circle)
}

/// Track the can through a camera feed or video file.
pub fn run_stream(source: &FrameSource, config: CircleConfig, display: &mut Display) -> Result<StreamStats> {
    let detector = CircleDetector::new(config);
    let stride = FrameStride::new(detector.config().frame_stride);
    let mut reader = VideoReader::open(source)?;
    let mut writer: Option<VideoWriter> = None;
    let mut stats = StreamStats::default();
    let start = Instant::now();

    while let Some(frame) = reader.read_frame()? {
        if stride.should_process(stats.frames_read) {
            let result = detector.process_frame(&frame).with_context(|| {
                format!("Circle detection failed at frame {}", stats.frames_read)
            })?;
            stats.frames_processed += 1;

            match &result.circle {
                Some(c) => {
                    stats.frames_with_circle += 1;
                    info!("Detected: Center({}, {}), Radius {}", c.x, c.y, c.r);
                }
                None => {
                    warn!("{} (frame {})", detector.config().missing_hint, stats.frames_read);
                }
            }

            if display.is_headless() {
                if writer.is_none() {
                    let (w, _) = create_writer(
                        display.output_dir(),
                        &source.annotated_file_name("mp4"),
                        result.annotated.cols(),
                        result.annotated.rows(),
                        stride.output_fps(reader.fps),
                    )?;
                    writer = Some(w);
                }
                if let Some(w) = writer.as_mut() {
                    w.write(&result.annotated)?;
                }
            } else {
                display.show(&detector.config().window_title, &result.annotated)?;
            }
        }

        stats.frames_read += 1;

        if display.poll_quit(detector.config().key_delay_ms)? {
            break;
        }
    }

    reader.release()?;
    stats.duration_secs = start.elapsed().as_secs_f64();

    info!(
        "Stream done: {} frames read, {} processed, {} with a circle ({:.1}s)",
        stats.frames_read, stats.frames_processed, stats.frames_with_circle, stats.duration_secs
    );

    Ok(stats)
}
