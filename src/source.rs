// src/source.rs

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];
const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSource {
    Camera(i32),
    Video(PathBuf),
    Image(PathBuf),
}

impl FrameSource {
    /// Digits name a camera; known image extensions are still images;
    /// everything else is opened as a video.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            anyhow::bail!("Empty frame source");
        }
        if s.chars().all(|c| c.is_ascii_digit()) {
            return Ok(FrameSource::Camera(s.parse()?));
        }

        let path = PathBuf::from(s);
        if has_extension(&path, &IMAGE_EXTENSIONS) {
            Ok(FrameSource::Image(path))
        } else {
            Ok(FrameSource::Video(path))
        }
    }

    pub fn is_stream(&self) -> bool {
        !matches!(self, FrameSource::Image(_))
    }

    /// Short name used for output files and logs.
    pub fn label(&self) -> String {
        match self {
            FrameSource::Camera(idx) => format!("camera{}", idx),
            FrameSource::Video(p) | FrameSource::Image(p) => p
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "frame".to_string()),
        }
    }

    /// File name for annotated output, e.g. `solidWhiteRight_annotated.mp4`.
    pub fn annotated_file_name(&self, extension: &str) -> String {
        format!("{}_annotated.{}", self.label(), extension)
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// All video files under `dir`, sorted by path.
pub fn find_video_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }

    let mut videos: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| has_extension(p, &VIDEO_EXTENSIONS))
        .collect();
    videos.sort();

    info!("Found {} video files in {}", videos.len(), dir.display());
    Ok(videos)
}

/// Expand a CLI argument into concrete sources; directories become their videos.
pub fn expand_sources(arg: &str) -> Result<Vec<FrameSource>> {
    let path = Path::new(arg);
    if path.is_dir() {
        let videos = find_video_files(path)?;
        if videos.is_empty() {
            anyhow::bail!("No video files found in {}", path.display());
        }
        return Ok(videos.into_iter().map(FrameSource::Video).collect());
    }
    Ok(vec![FrameSource::parse(arg)?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_camera_index() {
        assert_eq!(FrameSource::parse("0").unwrap(), FrameSource::Camera(0));
        assert_eq!(FrameSource::parse("2").unwrap(), FrameSource::Camera(2));
    }

    #[test]
    fn test_parse_image_and_video() {
        assert_eq!(
            FrameSource::parse("soda_can.JPEG").unwrap(),
            FrameSource::Image(PathBuf::from("soda_can.JPEG"))
        );
        assert_eq!(
            FrameSource::parse("movie.mp4").unwrap(),
            FrameSource::Video(PathBuf::from("movie.mp4"))
        );
        // unknown extensions go to the video backend
        assert!(matches!(
            FrameSource::parse("rtsp://cam/stream").unwrap(),
            FrameSource::Video(_)
        ));
    }

    #[test]
    fn test_empty_source_rejected() {
        assert!(FrameSource::parse("").is_err());
    }

    #[test]
    fn test_labels() {
        assert_eq!(FrameSource::Camera(1).label(), "camera1");
        assert_eq!(FrameSource::parse("clips/movie.mp4").unwrap().label(), "movie");
        assert!(!FrameSource::parse("a.png").unwrap().is_stream());
        assert!(FrameSource::Camera(0).is_stream());
    }

    #[test]
    fn test_annotated_file_names() {
        let video = FrameSource::parse("clips/solidWhiteRight.mp4").unwrap();
        assert_eq!(video.annotated_file_name("mp4"), "solidWhiteRight_annotated.mp4");
        assert_eq!(
            FrameSource::parse("soda_can.jpg").unwrap().annotated_file_name("png"),
            "soda_can_annotated.png"
        );
        assert_eq!(FrameSource::Camera(0).annotated_file_name("mp4"), "camera0_annotated.mp4");
    }

    #[test]
    fn test_find_video_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        for name in ["b.mp4", "a.MOV", "notes.txt", "nested/c.mkv", "still.jpg"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let videos = find_video_files(dir.path()).unwrap();
        let names: Vec<String> = videos
            .iter()
            .map(|p| {
                p.strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(names, vec!["a.MOV", "b.mp4", "nested/c.mkv"]);
    }

    #[test]
    fn test_expand_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("run.avi"), b"").unwrap();

        let sources = expand_sources(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(sources, vec![FrameSource::Video(dir.path().join("run.avi"))]);

        let empty = tempfile::tempdir().unwrap();
        fs::write(empty.path().join("readme.txt"), b"").unwrap();
        let err = expand_sources(empty.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().starts_with("No video files found in"));

        let single = expand_sources("0").unwrap();
        assert_eq!(single, vec![FrameSource::Camera(0)]);
    }
}
