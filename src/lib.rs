// src/lib.rs

pub mod config;
pub mod frame_schedule;
pub mod lane_geometry;
pub mod selection;
pub mod source;
pub mod types;

#[cfg(feature = "vision")]
pub mod circle_pipeline;
#[cfg(feature = "vision")]
pub mod display;
#[cfg(feature = "vision")]
pub mod lane_pipeline;
#[cfg(feature = "vision")]
pub mod overlay;
#[cfg(feature = "vision")]
pub mod video_processor;
