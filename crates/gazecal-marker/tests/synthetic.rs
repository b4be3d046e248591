use std::sync::Arc;

use gazecal_core::{GrayImage, MarkerKind, MemorySink, NullSink, SharedSink};
use gazecal_marker::{
    DetectorConfig, MarkerDetector, RingDetectorParams, RingMarkerDetector, ScreenCornerDetector,
    ScreenCornerParams,
};
use nalgebra::Point2;

fn draw_rings(img: &mut GrayImage, c: (f32, f32), radii: &[f32]) {
    let outer = radii.last().copied().unwrap_or(0.0);
    for y in 0..img.height {
        for x in 0..img.width {
            let r = ((x as f32 - c.0).powi(2) + (y as f32 - c.1).powi(2)).sqrt();
            if r >= outer {
                continue;
            }
            let band = radii.iter().filter(|&&edge| r >= edge).count();
            img.set(x, y, if band % 2 == 1 { 0 } else { 255 });
        }
    }
}

fn fill_rect(img: &mut GrayImage, x0: usize, y0: usize, x1: usize, y1: usize, v: u8) {
    for y in y0..y1 {
        for x in x0..x1 {
            img.set(x, y, v);
        }
    }
}

/// Gray background, dark bezel, bright screen with some dark content.
fn monitor_frame() -> GrayImage {
    let mut img = GrayImage::filled(640, 480, 128);
    fill_rect(&mut img, 100, 60, 540, 420, 30);
    fill_rect(&mut img, 120, 80, 520, 400, 220);
    fill_rect(&mut img, 280, 200, 360, 280, 50);
    img
}

#[test]
fn ring_marker_position_is_normalized_with_flipped_y() {
    let mut img = GrayImage::filled(320, 240, 255);
    draw_rings(&mut img, (100.0, 80.0), &[15.0, 30.0, 45.0, 60.0]);

    let det = RingMarkerDetector::new(RingDetectorParams::default(), Arc::new(NullSink));
    let markers = det.detect(&img.view());
    assert_eq!(markers.len(), 1);

    let m = &markers[0];
    assert_eq!(m.kind, MarkerKind::ConcentricRings);
    assert!((m.position.x - 100.0).abs() < 1.0, "{:?}", m.position);
    assert!((m.position.y - 80.0).abs() < 1.0, "{:?}", m.position);
    assert!((m.normalized_position.x - 0.3125).abs() < 0.005);
    assert!((m.normalized_position.y - (1.0 - 80.0 / 240.0)).abs() < 0.005);
    assert_eq!(m.geometry.len(), 16);
    // outline follows the outermost detected ring
    let r_out = (m.geometry[0] - m.position).norm();
    assert!(r_out > 40.0 && r_out < 62.0, "outline radius {r_out}");
}

#[test]
fn two_targets_give_two_markers() {
    let mut img = GrayImage::filled(320, 240, 255);
    draw_rings(&mut img, (80.0, 120.0), &[12.0, 24.0, 36.0, 48.0]);
    draw_rings(&mut img, (240.0, 120.0), &[12.0, 24.0, 36.0, 48.0]);

    let det = DetectorConfig::default().build(Arc::new(NullSink));
    let mut xs: Vec<f32> = det
        .detect(&img.view())
        .iter()
        .map(|m| m.position.x)
        .collect();
    xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(xs.len(), 2);
    assert!((xs[0] - 80.0).abs() < 1.0);
    assert!((xs[1] - 240.0).abs() < 1.0);
}

#[test]
fn screen_corners_are_ordered_around_bezel() {
    let img = monitor_frame();
    let memory = Arc::new(MemorySink::new());
    let sink: SharedSink = memory.clone();
    let det = ScreenCornerDetector::new(ScreenCornerParams::default(), sink);

    let markers = det.detect(&img.view());
    assert_eq!(markers.len(), 1);
    let m = &markers[0];
    assert_eq!(m.kind, MarkerKind::ScreenCorners);
    assert_eq!(m.id, Some(32));
    assert_eq!(m.confidence, 1.0);
    assert_eq!(m.geometry.len(), 4);

    let expected = [
        Point2::new(100.0f32, 60.0),
        Point2::new(540.0, 60.0),
        Point2::new(540.0, 420.0),
        Point2::new(100.0, 420.0),
    ];
    for (got, want) in m.geometry.iter().zip(expected.iter()) {
        assert!((got - want).norm() < 25.0, "corner {got:?} vs {want:?}");
    }
    assert!((m.position.x - 320.0).abs() < 10.0);
    assert!((m.position.y - 240.0).abs() < 10.0);

    // nested outlines (background, bezel, screen) all qualify
    assert!(memory
        .warnings()
        .iter()
        .any(|w| w.contains("using the first")));
}

#[test]
fn frame_without_screen_yields_no_marker() {
    let img = GrayImage::filled(640, 480, 128);
    let det = ScreenCornerDetector::new(ScreenCornerParams::default(), Arc::new(NullSink));
    assert!(det.detect(&img.view()).is_empty());
}

#[test]
fn small_outline_is_below_area_threshold() {
    let mut img = GrayImage::filled(320, 240, 128);
    fill_rect(&mut img, 100, 80, 180, 140, 30);
    fill_rect(&mut img, 110, 90, 170, 130, 220);
    let det = ScreenCornerDetector::new(ScreenCornerParams::default(), Arc::new(NullSink));
    assert!(det.detect(&img.view()).is_empty());
}
