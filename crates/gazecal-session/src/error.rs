use std::ops::RangeInclusive;

/// Invalid or unreadable calibration configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("sample duration {value} outside {range:?}")]
    SampleDuration {
        value: u32,
        range: RangeInclusive<u32>,
    },
    #[error("marker scale {value} outside {range:?}")]
    MarkerScale {
        value: f32,
        range: RangeInclusive<f32>,
    },
    #[error("lead-in must be at least one frame")]
    ZeroLeadIn,
    #[error("{name} of {value} frames exceeds the maximum of {max}")]
    LeadFrames {
        name: &'static str,
        value: u32,
        max: u32,
    },
    #[error("abort limit must be positive, got {0}")]
    AbortLimit(i32),
    #[error("pupil confidence threshold {0} outside [0, 1]")]
    ConfidenceThreshold(f32),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Failure of a finishing collaborator.
#[derive(thiserror::Error, Debug)]
pub enum FinishError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("capture device unavailable, calibration not started")]
    CaptureUnavailable,
    #[error("a calibration session is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("finishing collaborator failed: {0}")]
    Finish(#[from] FinishError),
}

#[derive(thiserror::Error, Debug)]
pub enum SurfaceError {
    #[error("a surface named {0:?} already exists")]
    DuplicateName(String),
    #[error("no surface named {0:?}")]
    UnknownSurface(String),
    #[error("gaze history length must be a positive number, got {0}")]
    NonPositiveHistory(f64),
    #[error("can not add a new surface: no markers found in the image")]
    NoMarkers,
    #[error("surface corners do not define a valid homography")]
    DegenerateSurface,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
