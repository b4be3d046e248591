//! Replay a directory of still images as a frame stream.

use std::fs;
use std::path::{Path, PathBuf};

use gazecal_session::{FrameSource, OwnedFrame};

use crate::detect::{to_core_image, DetectError};

const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "bmp", "pgm", "tif", "tiff"];

/// Images from one directory in file-name order, stamped at a fixed rate.
///
/// Files that fail to decode are skipped with a warning.
#[derive(Clone, Debug)]
pub struct ImageDirectorySource {
    paths: Vec<PathBuf>,
    next: usize,
    emitted: u64,
    fps: f64,
}

impl ImageDirectorySource {
    pub fn new(dir: impl AsRef<Path>, fps: f64) -> Result<Self, DetectError> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(Self::from_paths(paths, fps))
    }

    pub fn from_paths(paths: Vec<PathBuf>, fps: f64) -> Self {
        Self {
            paths,
            next: 0,
            emitted: 0,
            fps: if fps > 0.0 { fps } else { 30.0 },
        }
    }

    /// Frames not yet delivered, including any that will fail to decode.
    pub fn remaining(&self) -> usize {
        self.paths.len() - self.next
    }
}

impl FrameSource for ImageDirectorySource {
    fn is_available(&self) -> bool {
        !self.paths.is_empty()
    }

    fn next_frame(&mut self) -> Option<OwnedFrame> {
        while let Some(path) = self.paths.get(self.next) {
            self.next += 1;
            match ::image::open(path) {
                Ok(img) => {
                    let index = self.emitted;
                    self.emitted += 1;
                    return Some(OwnedFrame {
                        image: to_core_image(&img.to_luma8()),
                        timestamp: index as f64 / self.fps,
                        index,
                    });
                }
                Err(err) => log::warn!("skipping {}: {err}", path.display()),
            }
        }
        None
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}
