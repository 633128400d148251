// src/display.rs

use crate::config::DisplayConfig;
use anyhow::Result;
use opencv::{core::Mat, highgui};
use std::path::{Path, PathBuf};
use tracing::debug;

/// HighGUI windows, or nothing at all when headless.
pub struct Display {
    headless: bool,
    quit_key: char,
    output_dir: PathBuf,
    opened: bool,
}

impl Display {
    pub fn new(config: &DisplayConfig) -> Self {
        Self {
            headless: config.headless,
            quit_key: config.quit_key,
            output_dir: config.output_dir.clone(),
            opened: false,
        }
    }

    pub fn is_headless(&self) -> bool {
        self.headless
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn show(&mut self, title: &str, frame: &Mat) -> Result<()> {
        if self.headless {
            return Ok(());
        }
        highgui::imshow(title, frame)?;
        self.opened = true;
        Ok(())
    }

    /// Poll the keyboard once; true when the quit key was pressed.
    pub fn poll_quit(&self, delay_ms: i32) -> Result<bool> {
        if self.headless {
            return Ok(false);
        }
        let key = highgui::wait_key(delay_ms.max(1))?;
        let quit = is_quit_key(key, self.quit_key);
        if quit {
            debug!("Quit key pressed");
        }
        Ok(quit)
    }

    /// Block until any key is pressed.
    pub fn wait_any_key(&self) -> Result<()> {
        if !self.headless {
            highgui::wait_key(0)?;
        }
        Ok(())
    }
}

impl Drop for Display {
    fn drop(&mut self) {
        if self.opened {
            let _ = highgui::destroy_all_windows();
        }
    }
}

/// Compare the low byte of a `wait_key` code against `quit_key`.
pub fn is_quit_key(code: i32, quit_key: char) -> bool {
    code >= 0 && (code & 0xFF) == quit_key as i32
}
