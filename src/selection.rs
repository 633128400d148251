// src/selection.rs

use crate::types::Circle;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// What to do when a frame yields no circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDetection {
    /// Log an advisory and keep going.
    #[default]
    Skip,
    /// Abort the run.
    Fail,
}

/// Pick the circle with the largest radius. Ties go to the earliest circle.
pub fn select_largest(circles: &[Circle]) -> Option<Circle> {
    // max_by_key keeps the last maximum, so fold manually to keep the first
    circles.iter().copied().fold(None, |best, c| match best {
        Some(b) if b.r >= c.r => Some(b),
        _ => Some(c),
    })
}

/// Apply the missing-detection policy on top of [`select_largest`].
pub fn resolve_detection(circles: &[Circle], policy: MissingDetection) -> Result<Option<Circle>> {
    match (select_largest(circles), policy) {
        (Some(c), _) => Ok(Some(c)),
        (None, MissingDetection::Skip) => Ok(None),
        (None, MissingDetection::Fail) => anyhow::bail!("No circles detected."),
    }
}
