//! Append-only sample collection across a whole session.

use gazecal_core::Marker;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Marker observation recorded inside the sampling window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    #[serde(rename = "norm_pos")]
    pub normalized_position: Point2<f32>,
    #[serde(rename = "screen_pos")]
    pub raw_image_position: Point2<f32>,
    pub timestamp: f64,
}

impl ReferencePoint {
    pub fn from_marker(marker: &Marker, timestamp: f64) -> Self {
        Self {
            normalized_position: marker.normalized_position,
            raw_image_position: marker.position,
            timestamp,
        }
    }
}

/// One pupil/gaze datum as delivered by the tracker.
///
/// Only `confidence` and `timestamp` are interpreted here; everything else is
/// carried through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PupilSample {
    pub confidence: f32,
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub norm_pos: Option<Point2<f32>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PupilSample {
    pub fn new(confidence: f32, timestamp: f64) -> Self {
        Self {
            confidence,
            timestamp,
            norm_pos: None,
            extra: Map::new(),
        }
    }

    pub fn with_norm_pos(mut self, pos: Point2<f32>) -> Self {
        self.norm_pos = Some(pos);
        self
    }
}

/// A fixation reported by an external detector. Its presence in a tick is
/// what matters to the session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FixationEvent {
    pub timestamp: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FixationEvent {
    pub fn new(timestamp: f64, duration: f64) -> Self {
        Self {
            timestamp,
            duration,
            extra: Map::new(),
        }
    }
}

/// The two sequences handed to a finishing collaborator.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectedSamples {
    pub ref_list: Vec<ReferencePoint>,
    pub pupil_list: Vec<PupilSample>,
}

impl CollectedSamples {
    pub fn is_empty(&self) -> bool {
        self.ref_list.is_empty() && self.pupil_list.is_empty()
    }
}

/// Accumulates samples; never reset between sites.
#[derive(Clone, Debug)]
pub struct SampleCollector {
    confidence_threshold: f32,
    samples: CollectedSamples,
}

impl SampleCollector {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            confidence_threshold,
            samples: CollectedSamples::default(),
        }
    }

    pub fn push_reference(&mut self, reference: ReferencePoint) {
        self.samples.ref_list.push(reference);
    }

    /// Append the samples strictly above the confidence threshold; returns how
    /// many were kept.
    pub fn push_pupil(&mut self, pupil: &[PupilSample]) -> usize {
        let before = self.samples.pupil_list.len();
        self.samples.pupil_list.extend(
            pupil
                .iter()
                .filter(|p| p.confidence > self.confidence_threshold)
                .cloned(),
        );
        self.samples.pupil_list.len() - before
    }

    pub fn samples(&self) -> &CollectedSamples {
        &self.samples
    }

    pub fn ref_count(&self) -> usize {
        self.samples.ref_list.len()
    }

    pub fn into_samples(self) -> CollectedSamples {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_strict() {
        let mut c = SampleCollector::new(0.6);
        let kept = c.push_pupil(&[
            PupilSample::new(0.6, 1.0),
            PupilSample::new(0.61, 1.1),
            PupilSample::new(0.2, 1.2),
            PupilSample::new(0.99, 1.3),
        ]);
        assert_eq!(kept, 2);
        let ts: Vec<f64> = c.samples().pupil_list.iter().map(|p| p.timestamp).collect();
        assert_eq!(ts, vec![1.1, 1.3]);
    }

    #[test]
    fn opaque_gaze_fields_survive_round_trip() {
        let raw = r#"{"confidence":0.9,"timestamp":12.5,"diameter":3.4,"id":1}"#;
        let sample: PupilSample = serde_json::from_str(raw).expect("parse");
        assert_eq!(sample.extra.get("diameter"), Some(&Value::from(3.4)));
        let back: Value = serde_json::to_value(&sample).expect("serialize");
        assert_eq!(back["id"], Value::from(1));
        assert_eq!(back["confidence"], Value::from(0.9f32));
    }
}
