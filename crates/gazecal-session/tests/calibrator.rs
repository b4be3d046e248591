use std::sync::Arc;

use gazecal_core::{GrayImage, GrayImageView, Marker, MarkerKind, MemorySink, NullSink};
use gazecal_marker::MarkerDetector;
use gazecal_session::{
    CalibrationConfig, Calibrator, CollectedSamples, FinishError, FrameSource, InputEvent,
    JsonReportFinisher, Key, MemoryFinisher, MemoryFrameSource, PupilSample, RunMode,
    SessionError, SessionFinisher, SessionOutcome,
};
use nalgebra::Point2;

/// Reports the same marker on every frame.
struct FixedDetector;

impl MarkerDetector for FixedDetector {
    fn kind(&self) -> MarkerKind {
        MarkerKind::ConcentricRings
    }

    fn detect(&self, _image: &GrayImageView<'_>) -> Vec<Marker> {
        vec![Marker {
            kind: MarkerKind::ConcentricRings,
            id: None,
            position: Point2::new(4.0, 4.0),
            normalized_position: Point2::new(0.5, 0.5),
            confidence: 1.0,
            geometry: Vec::new(),
        }]
    }
}

fn frames(n: usize) -> MemoryFrameSource {
    MemoryFrameSource::repeat(&GrayImage::filled(8, 8, 0), n, 30.0)
}

fn calibrator(mode: RunMode) -> Calibrator<MemoryFinisher> {
    let cfg = CalibrationConfig {
        run_mode: mode,
        shuffle_seed: Some(5),
        ..CalibrationConfig::default()
    };
    Calibrator::new(cfg, MemoryFinisher::default(), Arc::new(NullSink))
        .expect("valid config")
        .with_detector(Box::new(FixedDetector))
}

#[test]
fn abort_forwards_collected_samples_unmodified() {
    let mut cal = calibrator(RunMode::Calibration);
    let mut source = frames(200);
    cal.start(&source).expect("start");

    let pupil = [PupilSample::new(0.9, 0.0)];
    for _ in 0..40 {
        let frame = source.next_frame().expect("frame");
        cal.push_event(InputEvent::KeyDown(Key::Space));
        cal.process_frame(&frame.as_frame(), &pupil, &[]).expect("tick");
    }
    let collected = cal.session().expect("session").samples().clone();
    assert!(!collected.ref_list.is_empty());
    assert_eq!(collected.pupil_list.len(), 40);

    cal.push_event(InputEvent::KeyDown(Key::Escape));
    let frame = source.next_frame().expect("frame");
    let snap = cal
        .process_frame(&frame.as_frame(), &pupil, &[])
        .expect("tick")
        .expect("session running");
    assert_eq!(snap.outcome, Some(SessionOutcome::Aborted));

    let handoffs = &cal.finisher().handoffs;
    assert_eq!(handoffs.len(), 1);
    assert_eq!(handoffs[0].mode, RunMode::Calibration);
    assert_eq!(handoffs[0].outcome, SessionOutcome::Aborted);
    assert_eq!(handoffs[0].samples, collected);

    // further frames are ignored and nothing is handed off twice
    let frame = source.next_frame().expect("frame");
    assert!(cal
        .process_frame(&frame.as_frame(), &pupil, &[])
        .expect("tick")
        .is_none());
    assert_eq!(cal.finisher().handoffs.len(), 1);
}

#[test]
fn accuracy_run_completes_through_accuracy_finisher() {
    let mut cal = calibrator(RunMode::Accuracy);
    let mut source = frames(1000);
    cal.start(&source).expect("start");

    let mut ticks = 0;
    while let Some(frame) = source.next_frame() {
        cal.push_event(InputEvent::KeyDown(Key::Space));
        let Some(snap) = cal.process_frame(&frame.as_frame(), &[], &[]).expect("tick") else {
            break;
        };
        ticks += 1;
        if snap.outcome.is_some() {
            break;
        }
    }
    // five sites of 70 steps plus one switching tick each
    assert_eq!(ticks, 5 * 71);
    let handoffs = &cal.finisher().handoffs;
    assert_eq!(handoffs.len(), 1);
    assert_eq!(handoffs[0].mode, RunMode::Accuracy);
    assert_eq!(handoffs[0].outcome, SessionOutcome::Completed);
    assert!(handoffs[0].samples.ref_list.len() <= 5 * 40);
}

#[test]
fn clicks_cancel_after_abort_limit() {
    let sink = Arc::new(MemorySink::new());
    let mut cal = Calibrator::new(CalibrationConfig::default(), MemoryFinisher::default(), sink)
        .expect("valid config")
        .with_detector(Box::new(FixedDetector));
    let mut source = frames(20);
    cal.start(&source).expect("start");

    for i in 0..5 {
        cal.push_event(InputEvent::PointerClick);
        let frame = source.next_frame().expect("frame");
        let snap = cal
            .process_frame(&frame.as_frame(), &[], &[])
            .expect("tick")
            .expect("running");
        if i < 4 {
            assert_eq!(snap.abort_clicks_remaining, Some(4 - i));
            assert!(snap.outcome.is_none());
        } else {
            assert_eq!(snap.outcome, Some(SessionOutcome::Aborted));
        }
    }
    assert_eq!(cal.finisher().handoffs.len(), 1);
}

#[test]
fn second_start_while_running_is_refused() {
    let mut cal = calibrator(RunMode::Calibration);
    let source = frames(5);
    cal.start(&source).expect("start");
    assert!(matches!(cal.start(&source), Err(SessionError::AlreadyRunning)));
}

#[test]
fn stop_hands_off_immediately() {
    let mut cal = calibrator(RunMode::Calibration);
    let source = frames(5);
    cal.start(&source).expect("start");
    cal.stop().expect("stop");
    assert!(!cal.is_active());
    assert_eq!(cal.finisher().handoffs[0].outcome, SessionOutcome::Aborted);
}

#[test]
fn json_report_is_written_on_completion() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = CalibrationConfig {
        run_mode: RunMode::Accuracy,
        sample_duration: 10,
        ..CalibrationConfig::default()
    };
    let mut cal = Calibrator::new(cfg, JsonReportFinisher::new(dir.path()), Arc::new(NullSink))
        .expect("valid config")
        .with_detector(Box::new(FixedDetector));
    let mut source = frames(1000);
    cal.start(&source).expect("start");
    while let Some(frame) = source.next_frame() {
        cal.push_event(InputEvent::KeyDown(Key::Space));
        if cal
            .process_frame(&frame.as_frame(), &[], &[])
            .expect("tick")
            .is_none()
        {
            break;
        }
    }
    let path = dir.path().join(JsonReportFinisher::ACCURACY_FILE);
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).expect("report")).expect("json");
    assert_eq!(json["outcome"], "completed");
    assert!(json["ref_count"].as_u64().is_some_and(|n| n > 0));
}

/// Fails the first `failures` handoffs, then records them.
#[derive(Default)]
struct FailingFinisher {
    failures: usize,
    delivered: Vec<(SessionOutcome, usize)>,
}

impl FailingFinisher {
    fn record(
        &mut self,
        outcome: SessionOutcome,
        samples: &CollectedSamples,
    ) -> Result<(), FinishError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(FinishError::Io(std::io::Error::other("report target unavailable")));
        }
        self.delivered.push((outcome, samples.pupil_list.len()));
        Ok(())
    }
}

impl SessionFinisher for FailingFinisher {
    fn finish_calibration(
        &mut self,
        outcome: SessionOutcome,
        samples: &CollectedSamples,
    ) -> Result<(), FinishError> {
        self.record(outcome, samples)
    }

    fn finish_accuracy_test(
        &mut self,
        outcome: SessionOutcome,
        samples: &CollectedSamples,
    ) -> Result<(), FinishError> {
        self.record(outcome, samples)
    }
}

#[test]
fn failed_handoff_is_retried_until_delivered() {
    let finisher = FailingFinisher {
        failures: 2,
        ..FailingFinisher::default()
    };
    let mut cal = Calibrator::new(CalibrationConfig::default(), finisher, Arc::new(NullSink))
        .expect("valid config")
        .with_detector(Box::new(FixedDetector));
    let mut source = frames(10);
    cal.start(&source).expect("start");

    let pupil = [PupilSample::new(0.9, 0.0)];
    for _ in 0..3 {
        let frame = source.next_frame().expect("frame");
        cal.process_frame(&frame.as_frame(), &pupil, &[]).expect("tick");
    }

    assert!(matches!(cal.stop(), Err(SessionError::Finish(_))));
    assert!(cal.finisher().delivered.is_empty());

    // a later frame retries, fails once more, then stop delivers
    let frame = source.next_frame().expect("frame");
    assert!(cal.process_frame(&frame.as_frame(), &pupil, &[]).is_err());
    cal.stop().expect("delivered");
    assert_eq!(cal.finisher().delivered, vec![(SessionOutcome::Aborted, 3)]);

    // delivered exactly once
    cal.stop().expect("no-op");
    let frame = source.next_frame().expect("frame");
    assert!(cal
        .process_frame(&frame.as_frame(), &pupil, &[])
        .expect("ignored")
        .is_none());
    assert_eq!(cal.finisher().delivered.len(), 1);
}
