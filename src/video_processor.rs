// src/video_processor.rs

use crate::frame_schedule::FALLBACK_FPS;
use crate::source::FrameSource;
use anyhow::{Context, Result};
use opencv::{
    core::{self, Mat},
    imgcodecs,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTraitConst, VideoWriter},
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Load a still image in BGR color.
pub fn load_image(path: &Path) -> Result<Mat> {
    let path_str = path
        .to_str()
        .with_context(|| format!("Non UTF-8 path: {}", path.display()))?;
    let image = imgcodecs::imread(path_str, imgcodecs::IMREAD_COLOR)?;
    if image.empty() {
        anyhow::bail!("Image could not be loaded: {}", path.display());
    }
    debug!("Loaded {} ({}x{})", path.display(), image.cols(), image.rows());
    Ok(image)
}

pub fn save_image(path: &Path, image: &Mat) -> Result<()> {
    let path_str = path
        .to_str()
        .with_context(|| format!("Non UTF-8 path: {}", path.display()))?;
    if !imgcodecs::imwrite_def(path_str, image)? {
        anyhow::bail!("Failed to write {}", path.display());
    }
    info!("Saved {}", path.display());
    Ok(())
}

/// A camera or video file held open for the duration of a loop.
pub struct VideoReader {
    cap: VideoCapture,
    pub fps: f64,
    pub width: i32,
    pub height: i32,
    pub current_frame: u64,
}

impl VideoReader {
    pub fn open(source: &FrameSource) -> Result<Self> {
        let cap = match source {
            FrameSource::Camera(index) => {
                info!("Opening camera {}", index);
                VideoCapture::new(*index, videoio::CAP_ANY)?
            }
            FrameSource::Video(path) => {
                info!("Opening video: {}", path.display());
                let path_str = path
                    .to_str()
                    .with_context(|| format!("Non UTF-8 path: {}", path.display()))?;
                VideoCapture::from_file(path_str, videoio::CAP_ANY)?
            }
            FrameSource::Image(path) => {
                anyhow::bail!("{} is a still image, not a stream", path.display())
            }
        };

        if !cap.is_opened()? {
            anyhow::bail!("Cannot open video stream or file: {:?}", source);
        }

        let fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS)?;
        let width = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_HEIGHT)? as i32;

        info!("Stream properties: {}x{} @ {:.1} FPS", width, height, fps);

        Ok(Self {
            cap,
            fps,
            width,
            height,
            current_frame: 0,
        })
    }

    /// Next frame, or `None` at end of stream.
    pub fn read_frame(&mut self) -> Result<Option<Mat>> {
        use opencv::videoio::VideoCaptureTrait;

        let mut mat = Mat::default();
        if !VideoCaptureTrait::read(&mut self.cap, &mut mat)? || mat.empty() {
            return Ok(None);
        }
        self.current_frame += 1;
        Ok(Some(mat))
    }

    pub fn release(&mut self) -> Result<()> {
        use opencv::videoio::VideoCaptureTrait;
        VideoCaptureTrait::release(&mut self.cap)?;
        Ok(())
    }
}

impl Drop for VideoReader {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

/// Writer for annotated streams in headless mode.
pub fn create_writer(
    output_dir: &Path,
    file_name: &str,
    width: i32,
    height: i32,
    fps: f64,
) -> Result<(VideoWriter, PathBuf)> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let output_path = output_dir.join(file_name);
    let path_str = output_path
        .to_str()
        .with_context(|| format!("Non UTF-8 path: {}", output_path.display()))?;

    let fps = if fps > 0.0 { fps } else { FALLBACK_FPS };

    info!("Output video: {}", output_path.display());

    let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
    let writer = VideoWriter::new(
        path_str,
        fourcc,
        fps,
        core::Size::new(width, height),
        true,
    )?;

    Ok((writer, output_path))
}
