//! Target site sets for calibration and accuracy runs.

use nalgebra::Point2;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::RunMode;

/// One target location in normalized screen space (origin bottom-left).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub target: Point2<f32>,
}

impl Site {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            target: Point2::new(x, y),
        }
    }
}

/// 3x3 grid over the unit square, row by row from the bottom.
pub fn calibration_grid() -> Vec<Site> {
    let steps = [0.0, 0.5, 1.0];
    steps
        .iter()
        .flat_map(|&y| steps.iter().map(move |&x| Site::new(x, y)))
        .collect()
}

/// Calibration grid shuffled once with `rng`.
pub fn calibration_sites<R: Rng + ?Sized>(rng: &mut R) -> Vec<Site> {
    let mut sites = calibration_grid();
    sites.shuffle(rng);
    sites
}

/// Center followed by the four quarter points, never shuffled.
pub fn accuracy_sites() -> Vec<Site> {
    vec![
        Site::new(0.5, 0.5),
        Site::new(0.25, 0.25),
        Site::new(0.25, 0.75),
        Site::new(0.75, 0.75),
        Site::new(0.75, 0.25),
    ]
}

pub fn sites_for<R: Rng + ?Sized>(mode: RunMode, rng: &mut R) -> Vec<Site> {
    match mode {
        RunMode::Calibration => calibration_sites(rng),
        RunMode::Accuracy => accuracy_sites(),
    }
}
